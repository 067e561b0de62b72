//! Matchmaking: the rank-ordered FIFO queue and the per-player poller
//! that widens its search tolerance over time

pub mod poller;
pub mod queue;

pub use poller::MatchPoller;
pub use queue::MatchQueue;
