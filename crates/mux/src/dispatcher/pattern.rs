use crate::error::RouteError;
use http::Method;

/// Marker for a trailing-slash pattern that must not match anything below it.
const EXACT_SLASH: &str = "{$}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    /// matches the path only
    Exact,
    /// path ends with `/`, matches the path and everything below it
    Subtree,
}

/// A parsed registration pattern: `[METHOD<space|tab>]path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pattern {
    pub(crate) method: Option<Method>,
    /// the path as handed to the matcher, with `{$}` removed
    pub(crate) path: String,
    pub(crate) kind: Kind,
}

impl Pattern {
    pub(crate) fn parse(pattern: &str) -> Result<Self, RouteError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(RouteError::invalid(pattern, "empty pattern"));
        }

        let (method, path) = match pattern.split_once([' ', '\t']) {
            Some((method, path)) => {
                let method = Method::from_bytes(method.as_bytes())
                    .ok()
                    .ok_or_else(|| RouteError::invalid(pattern, "invalid method token"))?;
                (Some(method), path.trim_start())
            }
            None => (None, pattern),
        };

        if !path.starts_with('/') {
            return Err(RouteError::invalid(pattern, "path must start with '/'"));
        }

        let (path, kind) = match path.strip_suffix(EXACT_SLASH) {
            Some(path) if path.ends_with('/') => (path, Kind::Exact),
            Some(_) => return Err(RouteError::invalid(pattern, "'{$}' is only allowed after a trailing '/'")),
            None if path.ends_with('/') => (path, Kind::Subtree),
            None => (path, Kind::Exact),
        };

        if path.contains(EXACT_SLASH) {
            return Err(RouteError::invalid(pattern, "'{$}' is only allowed at the end of a pattern"));
        }

        Ok(Self { method, path: path.to_owned(), kind })
    }
}
