use crate::server::ServerError;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use quill_common::model::auth::AuthToken;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The bearer token of a request, not yet validated.
///
/// Validation is left to the service so that it happens exactly once per
/// operation and before any storage access.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct BearerToken(pub AuthToken);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?
            .token()
            .parse()?;

        Ok(Self(token))
    }
}
