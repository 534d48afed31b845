//! Transport abstraction for the realtime link.
//!
//! A [`Connector`] produces a [`Link`]: a sink and a stream of text frames.
//! The connection manager only ever talks to this seam, so tests can
//! substitute an in-memory connector.

pub mod websocket;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, Stream};
use thiserror::Error;

use crate::domain::value_object::UserId;

pub use websocket::WebSocketConnector;

/// Outgoing half of a link.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Incoming half of a link. Ends when the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// One established connection.
pub struct Link {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Link {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

/// Transport-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server refused the handshake for this identity
    #[error("Server rejected the connection as unauthorized")]
    Unauthorized,

    #[error("Invalid server URL '{0}'")]
    InvalidUrl(String),

    /// Connection could not be established
    #[error("Connection error: {0}")]
    Connect(String),

    /// Established link failed while reading or writing
    #[error("Link error: {0}")]
    Io(String),
}

/// Opens links to the realtime server.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, user_id: &UserId) -> Result<Link, TransportError>;
}
