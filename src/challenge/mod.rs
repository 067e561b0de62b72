//! Direct challenges between players, including rematches

pub mod registry;

pub use registry::ChallengeRegistry;
