use thiserror::Error;

/// Classification of a failed host request. Transient failures are eligible
/// for retry; everything else is surfaced immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostErrorKind {
    /// Network hiccup, rate limit, or a 5xx response.
    Transient,
    /// The credentials were rejected.
    Auth,
    /// The requested object does not exist.
    NotFound,
    /// Any other definitive rejection.
    Permanent,
}

/// Unified error type for release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Version error: {0}")]
    Version(String),

    #[error("Version marker error in '{path}': {reason}")]
    Marker { path: String, reason: String },

    #[error("No release label found in the unreleased history of commit {sha}")]
    NoReleaseLabel { sha: String },

    #[error("{op}: host request failed: {message}")]
    Host {
        op: String,
        kind: HostErrorKind,
        message: String,
    },

    #[error("{op}: giving up after {attempts} attempts: {message}")]
    RetriesExhausted {
        op: String,
        attempts: u32,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in relbot
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    /// Create a version error with context
    pub fn version(msg: impl Into<String>) -> Self {
        ReleaseError::Version(msg.into())
    }

    /// Create a version marker error for a tracked file
    pub fn marker(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ReleaseError::Marker {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a host error for the named operation
    pub fn host(op: impl Into<String>, kind: HostErrorKind, msg: impl Into<String>) -> Self {
        ReleaseError::Host {
            op: op.into(),
            kind,
            message: msg.into(),
        }
    }

    /// Create a transient host error for the named operation
    pub fn transient(op: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::host(op, HostErrorKind::Transient, msg)
    }

    /// Whether a bounded retry may still succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ReleaseError::Host {
                kind: HostErrorKind::Transient,
                ..
            }
        )
    }

    /// Whether the error names a missing object rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ReleaseError::Host {
                kind: HostErrorKind::NotFound,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReleaseError::config("missing release branch");
        assert_eq!(
            err.to_string(),
            "Configuration error: missing release branch"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ReleaseError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_host_error_names_operation() {
        let err = ReleaseError::host("create_release", HostErrorKind::Permanent, "422");
        assert!(err.to_string().starts_with("create_release:"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ReleaseError::transient("get_commit", "timeout").is_transient());
        assert!(!ReleaseError::host("get_commit", HostErrorKind::Auth, "401").is_transient());
        assert!(!ReleaseError::config("x").is_transient());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(ReleaseError::host("get_issue", HostErrorKind::NotFound, "404").is_not_found());
        assert!(!ReleaseError::transient("get_issue", "timeout").is_not_found());
    }

    #[test]
    fn test_marker_error_mentions_path() {
        let err = ReleaseError::marker("Cargo.toml", "no version assignment found");
        let msg = err.to_string();
        assert!(msg.contains("Cargo.toml"));
        assert!(msg.contains("no version assignment found"));
    }

    #[test]
    fn test_no_release_label_mentions_sha() {
        let err = ReleaseError::NoReleaseLabel {
            sha: "abc1234".to_string(),
        };
        assert!(err.to_string().contains("abc1234"));
    }
}
