//! The error taxonomy raised and propagated by every part of the core.
//!
//! Backend-specific failures (a `std::io::Error`, an AWS SDK error, a zip
//! error) are normalized into [`TfmError`] at the boundary where they are
//! produced; nothing above the `PathImpl` layer ever matches on a
//! backend-native error type.

use std::fmt;

/// The closed set of error kinds the core raises and propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    UnsupportedOperation,
    NetworkFailure,
    ConflictingState,
    Cancelled,
    IoFailure,
    ConfigInvalid,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::UnsupportedOperation => "unsupported operation",
            ErrorKind::NetworkFailure => "network failure",
            ErrorKind::ConflictingState => "conflicting state",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::IoFailure => "I/O failure",
            ErrorKind::ConfigInvalid => "invalid configuration",
        };
        f.write_str(s)
    }
}

/// An error with its kind plus a human-readable message and, where
/// available, the underlying cause.
pub struct TfmError {
    kind: ErrorKind,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl TfmError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { kind, message: message.into(), source: Some(Box::new(source)) }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// `Cancelled` is a normal, non-error completion for cooperative tasks
    /// (see spec §9); callers that treat cancellation as success check this.
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl fmt::Debug for TfmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TfmError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish()
    }
}

impl fmt::Display for TfmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TfmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

pub type Result<T> = std::result::Result<T, TfmError>;

/// Normalizes a local filesystem I/O error the way every `PathImpl`
/// backend must at its boundary (spec §7: "Backend-specific codes are
/// normalized at the PathImpl boundary").
impl From<std::io::Error> for TfmError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            std::io::ErrorKind::TimedOut => ErrorKind::NetworkFailure,
            _ => match raw_os_error_kind(&err) {
                Some(k) => k,
                None => ErrorKind::IoFailure,
            },
        };
        TfmError::with_source(kind, "local filesystem operation failed", err)
    }
}

#[cfg(unix)]
fn raw_os_error_kind(err: &std::io::Error) -> Option<ErrorKind> {
    match err.raw_os_error() {
        Some(libc::ENOTEMPTY) => Some(ErrorKind::ConflictingState),
        Some(libc::ENOSPC) => Some(ErrorKind::IoFailure),
        Some(libc::EROFS) => Some(ErrorKind::PermissionDenied),
        Some(libc::EXDEV) => Some(ErrorKind::UnsupportedOperation),
        _ => None,
    }
}

#[cfg(not(unix))]
fn raw_os_error_kind(_err: &std::io::Error) -> Option<ErrorKind> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_through() {
        let io_err = std::io::Error::from(std::io::ErrorKind::NotFound);
        let tfm: TfmError = io_err.into();
        assert_eq!(tfm.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn cancelled_is_not_an_error_completion() {
        let err = TfmError::new(ErrorKind::Cancelled, "superseded");
        assert!(err.is_cancelled());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = TfmError::new(ErrorKind::NotFound, "a/b/c");
        assert_eq!(err.to_string(), "not found: a/b/c");
    }
}
