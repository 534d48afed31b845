//! Infrastructure layer: wire formats, transport and external services.

pub mod auth;
pub mod connection;
pub mod dto;
pub mod transport;
