//! Error Handling
//!
//! Error type definitions used in gh-reposync

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error types for gh-reposync
#[derive(Error, Debug)]
pub enum Error {
    #[error("authentication failed: token is invalid or lacks the required scope")]
    Auth,

    #[error("repository not found or inaccessible: {0}")]
    RepositoryNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("GitHub API rate limit exceeded")]
    RateLimit,

    #[error("{entity}: rejected by GitHub: {message}")]
    Validation { entity: String, message: String },

    #[error("secret {name}: {reason}")]
    Seal { name: String, reason: String },

    #[error("GitHub API error: {0}")]
    GitHubApi(#[from] octocrab::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {context}")]
    UnexpectedStatus { status: u16, context: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid repository format: {0} (expected 'owner/repo')")]
    InvalidRepositoryFormat(String),

    #[error("invalid label color: {0} (expected 6 hex digits)")]
    InvalidLabelColor(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config(message.into())
    }

    /// Create a new validation error for an operation rejected by the remote
    pub fn validation<E: Into<String>, M: Into<String>>(entity: E, message: M) -> Self {
        Error::Validation {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Create a new seal error for a secret that could not be encrypted
    pub fn seal<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Error::Seal {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is worth retrying with backoff.
    ///
    /// Rate limits, server-side failures and transport problems are
    /// transient; everything else (auth, validation, seal preconditions)
    /// fails the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::RateLimit => true,
            Error::UnexpectedStatus { status, .. } => *status == 429 || *status >= 500,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::GitHubApi(octocrab::Error::GitHub { source, .. }) => {
                let status = source.status_code.as_u16();
                status == 429 || status >= 500
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_transient() {
        assert!(Error::RateLimit.is_transient());
    }

    #[test]
    fn test_server_errors_are_transient() {
        let err = Error::UnexpectedStatus {
            status: 502,
            context: "PUT topics".to_string(),
        };
        assert!(err.is_transient());

        let err = Error::UnexpectedStatus {
            status: 429,
            context: "PUT topics".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        let err = Error::UnexpectedStatus {
            status: 422,
            context: "PUT protection".to_string(),
        };
        assert!(!err.is_transient());

        assert!(!Error::Auth.is_transient());
        assert!(!Error::validation("label bug", "already exists").is_transient());
        assert!(!Error::seal("API_KEY", "malformed public key").is_transient());
    }

    #[test]
    fn test_error_display_names_entity() {
        let err = Error::validation("branch protection 'main'", "invalid pattern");
        assert!(err.to_string().contains("branch protection 'main'"));

        let err = Error::seal("API_KEY", "environment variable not set");
        assert!(err.to_string().contains("API_KEY"));
    }
}
