use thiserror::Error;

/// Errors raised while registering routes.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    #[error("pattern '{pattern}' is already registered")]
    Duplicate { pattern: String },

    #[error("pattern '{pattern}' conflicts with an existing route: {source}")]
    Conflict {
        pattern: String,
        #[source]
        source: matchit::InsertError,
    },
}

impl RouteError {
    pub(crate) fn invalid(pattern: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidPattern { pattern: pattern.into(), reason }
    }
}
