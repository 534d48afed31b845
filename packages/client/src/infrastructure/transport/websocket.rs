//! WebSocket connector built on tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, future, stream};
use reqwest::Url;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, protocol::Message},
};

use super::{Connector, Link, TransportError};
use crate::domain::value_object::UserId;

/// Connects to `server_url?userId=<id>`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    server_url: String,
}

impl WebSocketConnector {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }

    /// Server URL with the identity attached as a query parameter.
    pub fn endpoint(&self, user_id: &UserId) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.server_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", self.server_url, e)))?;
        url.query_pairs_mut().append_pair("userId", user_id.as_str());
        Ok(url)
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, user_id: &UserId) -> Result<Link, TransportError> {
        let url = self.endpoint(user_id)?;
        tracing::debug!("Opening WebSocket to {}", url);

        let (ws_stream, response) = connect_async(url.as_str())
            .await
            .map_err(map_handshake_error)?;
        tracing::debug!("Handshake completed with status {}", response.status());

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| TransportError::Io(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text.into()))));

        let stream = stream::unfold(read, |mut read| async move {
            loop {
                match read.next().await? {
                    Ok(Message::Text(text)) => return Some((Ok(text.as_str().to_owned()), read)),
                    Ok(Message::Close(frame)) => {
                        tracing::info!("Server closed the connection: {:?}", frame);
                        return None;
                    }
                    Ok(Message::Binary(data)) => {
                        tracing::debug!("Ignoring {} bytes of binary data", data.len());
                    }
                    Ok(_) => {}
                    Err(e) => return Some((Err(TransportError::Io(e.to_string())), read)),
                }
            }
        });

        Ok(Link::new(Box::pin(sink), Box::pin(stream)))
    }
}

fn map_handshake_error(error: tungstenite::Error) -> TransportError {
    match &error {
        tungstenite::Error::Http(response)
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            TransportError::Unauthorized
        }
        _ => TransportError::Connect(error.to_string()),
    }
}
