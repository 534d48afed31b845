//! Data Transfer Objects (DTOs) for the chat client.
//!
//! DTOs are organized by protocol:
//! - `websocket`: realtime event frames
//! - `http`: auth API response bodies

pub mod conversion;
pub mod http;
pub mod websocket;
