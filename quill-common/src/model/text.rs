//! Text fields that must never be empty. Whitespace counts as content.

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("The {field} must not be empty")]
pub struct EmptyTextError {
    pub field: &'static str,
}

macro_rules! non_empty_text {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const FIELD: &'static str = $field;

            pub fn new(text: String) -> Result<Self, EmptyTextError> {
                if text.is_empty() {
                    Err(EmptyTextError { field: Self::FIELD })
                } else {
                    Ok(Self(text))
                }
            }

            #[must_use]
            pub fn get(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = EmptyTextError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let inner = String::deserialize(deserializer)?;
                if inner.is_empty() {
                    return Err(Error::invalid_value(
                        Unexpected::Str(&inner),
                        &concat!("a non-empty ", $field),
                    ));
                }

                Ok(Self(inner))
            }
        }
    };
}

non_empty_text!(
    /// Title of a post.
    PostTitle, "title"
);
non_empty_text!(
    /// Body text of a post.
    PostContent, "content"
);
non_empty_text!(
    /// Body text of a comment.
    CommentContent, "content"
);
