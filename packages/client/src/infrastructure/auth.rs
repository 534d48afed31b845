//! Identity lookup against the HTTP API.

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::{
    domain::{error::ValidationError, value_object::UserId},
    infrastructure::dto::http::MeResponse,
};

#[derive(Debug, Error)]
pub enum AuthError {
    /// The API refused the credentials
    #[error("Not authenticated. Please log in again.")]
    Unauthenticated,

    #[error("Auth request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected auth response status {0}")]
    UnexpectedStatus(u16),

    #[error("Auth response carried an invalid user id: {0}")]
    InvalidUser(#[from] ValidationError),
}

/// Resolves the local user before the realtime link is opened.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn current_user(&self) -> Result<UserId, AuthError>;
}

/// `GET {api_url}/me`, optionally with a bearer token.
pub struct HttpAuthGateway {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl HttpAuthGateway {
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            token,
        }
    }

    fn me_url(&self) -> String {
        format!("{}/me", self.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn current_user(&self) -> Result<UserId, AuthError> {
        let url = self.me_url();
        tracing::debug!("Resolving identity via {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::Unauthenticated),
            status if status.is_success() => {
                let me: MeResponse = response.json().await?;
                let user_id = UserId::new(me.user_id)?;
                tracing::info!("Authenticated as '{}'", user_id);
                Ok(user_id)
            }
            status => Err(AuthError::UnexpectedStatus(status.as_u16())),
        }
    }
}

/// Gateway for an identity given up front.
pub struct StaticAuthGateway {
    user_id: UserId,
}

impl StaticAuthGateway {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

#[async_trait]
impl AuthGateway for StaticAuthGateway {
    async fn current_user(&self) -> Result<UserId, AuthError> {
        Ok(self.user_id.clone())
    }
}
