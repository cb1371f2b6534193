use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A token could not be opened: wrong key, tampering, truncation,
    /// malformed encoding or padding, or non-UTF-8 content. Deliberately
    /// not broken down any further.
    InvalidKey,
    /// No key was supplied, found in a key file, or entered at the prompt.
    KeyUnavailable,
    /// Refused to overwrite an existing key file.
    KeyFileExists,
    /// The external editor could not be started or exited unsuccessfully.
    Editor,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct LockboxError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl LockboxError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The one error every failed token operation produces.
    ///
    /// Carries no source so that nothing about the failing check leaks
    /// through `Display` or the source chain.
    pub fn invalid_key() -> Self {
        Self::with_kind(ErrorCategory::User, ErrorKind::InvalidKey, "Invalid key")
    }

    /// Shorthand for an I/O failure, classified as a user error when the path
    /// simply does not exist.
    pub fn io(msg: impl Into<String>, err: std::io::Error) -> Self {
        let category = if err.kind() == std::io::ErrorKind::NotFound {
            ErrorCategory::User
        } else {
            ErrorCategory::Internal
        };
        Self::with_kind_and_source(category, ErrorKind::Io, msg, err)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// True if this error is, or was wrapped from, an [`ErrorKind::InvalidKey`] failure.
    pub fn is_invalid_key(&self) -> bool {
        self.kind == Some(ErrorKind::InvalidKey)
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, LockboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_key_has_no_source() {
        let err = LockboxError::invalid_key();
        assert_eq!(err.to_string(), "Invalid key");
        assert_eq!(err.kind, Some(ErrorKind::InvalidKey));
        assert!(err.source().is_none());
    }

    #[test]
    fn context_keeps_kind_and_chain() {
        let err = LockboxError::invalid_key().with_context("failed to unlock secrets.txt");
        assert_eq!(err.kind, Some(ErrorKind::InvalidKey));
        assert!(err.is_invalid_key());
        assert_eq!(err.message(), "failed to unlock secrets.txt");
        assert_eq!(err.source().map(|e| e.to_string()).as_deref(), Some("Invalid key"));
    }

    #[test]
    fn not_found_io_is_user_error() {
        let err = LockboxError::io(
            "failed to read from missing.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.category, ErrorCategory::User);
        assert_eq!(err.kind, Some(ErrorKind::Io));

        let err = LockboxError::io(
            "failed to read from locked.txt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert_eq!(err.category, ErrorCategory::Internal);
    }

    #[test]
    fn untagged_error_is_not_invalid_key() {
        let err = LockboxError::new(ErrorCategory::Internal, "something odd");
        assert_eq!(err.kind, None);
        assert!(!err.is_invalid_key());
    }
}
