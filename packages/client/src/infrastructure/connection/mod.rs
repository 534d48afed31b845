//! Realtime connection lifecycle.

pub mod manager;
pub mod reconnect;

pub use manager::ConnectionManager;
