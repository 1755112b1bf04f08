//! # Error Handling
//!
//! Error taxonomy shared by every vkv subsystem. The remote client maps
//! transport and HTTP failures onto these variants; the walker, snapshot,
//! import and search engines propagate them unchanged so the CLI can print
//! one operator-facing line per failure.

use thiserror::Error;

/// Result type for vkv operations.
pub type Result<T> = std::result::Result<T, VkvError>;

/// Errors that can occur while talking to the store or shaping its data.
#[derive(Error, Debug)]
pub enum VkvError {
    /// Two or more options were combined in a way that is not allowed.
    #[error("invalid option combination: {message}")]
    BadOptionCombo { message: String },

    /// Payload or argument could not be understood.
    #[error("invalid input: {message}")]
    BadInput { message: String },

    /// A regular expression failed to compile.
    #[error("invalid pattern '{pattern}': {reason}")]
    BadPattern { pattern: String, reason: String },

    /// Path has no listable children or is not a leaf.
    #[error("not found: {path}")]
    NotFound { path: String },

    /// The token is not allowed to touch the path.
    #[error("permission denied: {path}")]
    Forbidden { path: String },

    /// The target already exists.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// The store could not be reached.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The store answered with something unexpected.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Rendering or invariant failure inside vkv.
    #[error("internal error: {message}")]
    Internal { message: String },

    /// Local filesystem error.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl VkvError {
    /// Create a bad option combination error.
    pub fn bad_option_combo(message: impl Into<String>) -> Self {
        Self::BadOptionCombo { message: message.into() }
    }

    /// Create a bad input error.
    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::BadInput { message: message.into() }
    }

    /// Create a bad pattern error.
    pub fn bad_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadPattern { pattern: pattern.into(), reason: reason.into() }
    }

    /// Create a not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a forbidden error.
    pub fn forbidden(path: impl Into<String>) -> Self {
        Self::Forbidden { path: path.into() }
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol { message: message.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Create an I/O error bound to a local path.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Taxonomy label of this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadOptionCombo { .. } => "bad-option-combo",
            Self::BadInput { .. } => "bad-input",
            Self::BadPattern { .. } => "bad-pattern",
            Self::NotFound { .. } => "not-found",
            Self::Forbidden { .. } => "forbidden",
            Self::Conflict { .. } => "conflict",
            Self::Transport { .. } => "transport",
            Self::Protocol { .. } => "protocol",
            Self::Internal { .. } | Self::Io { .. } => "internal",
        }
    }

    /// Whether a walker running with skip-errors may drop the node.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Forbidden { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = VkvError::not_found("kv/app");
        assert!(matches!(err, VkvError::NotFound { .. }));
        assert_eq!(err.to_string(), "not found: kv/app");

        let err = VkvError::bad_pattern("([", "unclosed group");
        assert_eq!(err.kind(), "bad-pattern");
        assert!(err.to_string().contains("(["));
    }

    #[test]
    fn test_skippable_errors() {
        assert!(VkvError::not_found("a").is_skippable());
        assert!(VkvError::forbidden("a").is_skippable());
        assert!(!VkvError::transport("down").is_skippable());
        assert!(!VkvError::conflict("exists").is_skippable());
    }

    #[test]
    fn test_io_error_kind() {
        let err = VkvError::io("/tmp/x", std::io::Error::other("boom"));
        assert_eq!(err.kind(), "internal");
        assert!(err.to_string().contains("/tmp/x"));
    }
}
