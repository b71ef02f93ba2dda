use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The closed set of failure categories every layer reports in.
///
/// Each error type in the workspace maps onto exactly one of these through a
/// `kind()` method, and the HTTP layer derives its status code from it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A request field was missing or malformed.
    Validation,
    /// The token was missing, invalid or expired, or could not be checked.
    Authentication,
    /// The acting user does not own the resource.
    Authorization,
    /// The referenced post does not exist.
    NotFound,
    /// The mutation would violate a uniqueness rule.
    Conflict,
    /// The request ran past its deadline and was abandoned.
    Timeout,
    /// Storage or infrastructure failure.
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
