//! Yapper chat client.
//!
//! One realtime connection per user, shared by the chat rooms, the
//! all-chats summary list and partner matchmaking.

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub use config::ClientConfig;
pub use error::ClientError;
pub use usecase::ChatSession;
