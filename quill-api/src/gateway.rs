use async_trait::async_trait;
use quill_common::{
    error::ErrorKind,
    model::{Id, auth::AuthToken, user::UserMarker},
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("The authentication service rejected the token")]
    Rejected,
    #[error("The authentication service accepted the token but sent no user id")]
    MissingUserId,
    #[error("The authentication service replied with status {0}")]
    Status(StatusCode),
    #[error("Calling the authentication service failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl AuthError {
    /// Every way of failing to resolve a token counts as an authentication failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Authentication
    }
}

/// Resolves an opaque token into the identity of the acting user.
///
/// Implementations must revalidate on every call; nothing is cached.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn authenticate(&self, token: &AuthToken) -> Result<Id<UserMarker>, AuthError>;
}

#[derive(Serialize)]
struct IsAuthenticatedRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct IsAuthenticatedResponse {
    is_authenticated: bool,
    #[serde(default)]
    user_id: Option<i64>,
}

/// [`AuthGateway`] backed by the external authentication service's
/// `POST /is-authenticated` endpoint.
#[derive(Clone, Debug)]
pub struct HttpAuthGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAuthGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = format!("{}/is-authenticated", base_url.trim_end_matches('/'));

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn authenticate(&self, token: &AuthToken) -> Result<Id<UserMarker>, AuthError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&IsAuthenticatedRequest {
                token: token.as_str(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status(status));
        }

        let body: IsAuthenticatedResponse = response.json().await?;
        if !body.is_authenticated {
            debug!("Token rejected by authentication service");
            return Err(AuthError::Rejected);
        }

        body.user_id.map(Id::new).ok_or(AuthError::MissingUserId)
    }
}
