use std::{
    fmt::{Debug, Formatter},
    str::FromStr,
};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The auth token was empty")]
pub struct EmptyAuthTokenError;

/// An opaque bearer token issued by the authentication service.
///
/// The token is never interpreted locally; it is only forwarded for validation.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: String) -> Result<Self, EmptyAuthTokenError> {
        if token.is_empty() {
            Err(EmptyAuthTokenError)
        } else {
            Ok(Self(token))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AuthToken {
    type Err = EmptyAuthTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthToken").field(&"[redacted]").finish()
    }
}
