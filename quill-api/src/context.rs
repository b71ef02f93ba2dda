use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use tower_http::request_id::RequestId;

/// Per-request values handed explicitly to every service call.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct RequestContext {
    request_id: String,
}

impl RequestContext {
    pub const UNKNOWN_REQUEST_ID: &'static str = "unknown";

    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .unwrap_or(Self::UNKNOWN_REQUEST_ID);

        Ok(Self::new(request_id))
    }
}
