use thiserror::Error;

/// Errors from a model backend call.
///
/// Any of these fails the query in progress. None are retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The request never got an HTTP response.
    #[error("network: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("provider api ({status}): {body}")]
    Api { status: u16, body: String },

    /// The provider response could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// Build from a failed HTTP exchange.
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        Self::Api {
            status: status.as_u16(),
            body,
        }
    }

    /// 401/403: the configured key was rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_kept() {
        let err = ModelError::from_status(reqwest::StatusCode::UNAUTHORIZED, "bad key".into());
        assert!(err.is_auth());
        assert_eq!(err.to_string(), "provider api (401): bad key");

        let err = ModelError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(!err.is_auth());
    }
}
