//! Session lifecycle management
//!
//! A session is one in-progress match. The manager owns the live session
//! table, serializes moves per session, arms the inactivity timer after
//! every accepted move, and settles terminal outcomes through the rating
//! engine.

pub mod manager;

pub use manager::SessionManager;
