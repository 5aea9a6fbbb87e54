//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Whether GitHub rejected a create because the object already exists
    ///
    /// Covers refs ("Reference already exists") and validation failures
    /// carrying an `already_exists` error code, which is how a second
    /// release for the same tag is reported.
    pub fn is_already_exists(&self) -> bool {
        match self {
            Error::Api(octocrab::Error::GitHub { source, .. }) => {
                already_exists(&source.message, source.errors.as_deref().unwrap_or_default())
            }
            _ => false,
        }
    }
}

/// Classify a GitHub error body as "already exists"
pub(crate) fn already_exists(message: &str, errors: &[serde_json::Value]) -> bool {
    message.contains("already exists")
        || errors
            .iter()
            .any(|e| e.get("code").and_then(|c| c.as_str()) == Some("already_exists"))
}

impl From<Error> for relbot_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Auth(_) | Error::Parse(_) => relbot_core::Error::Config(err.to_string()),
            Error::Api(_) => relbot_core::Error::Remote(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conversion_into_core_error() {
        let err: relbot_core::Error = Error::Parse("bad name".to_string()).into();
        assert!(matches!(err, relbot_core::Error::Config(_)));

        let err: relbot_core::Error = Error::Auth("no token".to_string()).into();
        assert!(matches!(err, relbot_core::Error::Config(ref msg) if msg.contains("no token")));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_already_exists_classification() {
        assert!(already_exists("Reference already exists", &[]));
        assert!(already_exists(
            "Validation Failed",
            &[json!({"resource": "Release", "code": "already_exists", "field": "tag_name"})]
        ));
        assert!(!already_exists(
            "Validation Failed",
            &[json!({"resource": "Release", "code": "invalid", "field": "tag_name"})]
        ));
        assert!(!already_exists("Not Found", &[]));
        assert!(!Error::Parse("already exists".to_string()).is_already_exists());
    }
}
