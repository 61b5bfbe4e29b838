// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-07-14

//! Error taxonomy shared by every filegate operation.
//!
//! Each variant carries the message sent to the client; the wire code and
//! HTTP status are fixed per variant so handlers never pick them ad hoc.

use thiserror::Error;

/// Terminal request errors, one variant per wire error code.
#[derive(Debug, Error)]
pub enum FileGateError {
    /// Malformed body, missing required field, or invalid derived name.
    #[error("{0}")]
    BadRequest(String),

    /// Missing or unrecognized bearer token.
    #[error("{0}")]
    Unauthorized(String),

    /// The sandbox rejected a user-supplied path.
    #[error("path {0:?} escapes workspace root")]
    PathEscape(String),

    /// The target does not exist on disk.
    #[error("{0}")]
    NotFound(String),

    /// Any other OS failure, surfaced with a best-effort message.
    #[error("{0}")]
    Internal(String),
}

impl FileGateError {
    /// Wire error code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            FileGateError::BadRequest(_) => "BAD_REQUEST",
            FileGateError::Unauthorized(_) => "UNAUTHORIZED",
            FileGateError::PathEscape(_) => "PATH_TRAVERSAL",
            FileGateError::NotFound(_) => "NOT_FOUND",
            FileGateError::Internal(_) => "INTERNAL",
        }
    }

    /// HTTP status code matching the variant.
    pub fn status(&self) -> u16 {
        match self {
            FileGateError::BadRequest(_) => 400,
            FileGateError::Unauthorized(_) => 401,
            FileGateError::PathEscape(_) => 403,
            FileGateError::NotFound(_) => 404,
            FileGateError::Internal(_) => 500,
        }
    }

    /// Map an I/O error onto the taxonomy: a missing target becomes
    /// [`FileGateError::NotFound`] with the given message, everything else
    /// is surfaced as [`FileGateError::Internal`].
    pub fn from_io(err: std::io::Error, missing: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            FileGateError::NotFound(missing.to_string())
        } else {
            FileGateError::Internal(err.to_string())
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FileGateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_statuses_line_up() {
        let cases = [
            (FileGateError::BadRequest("x".into()), "BAD_REQUEST", 400),
            (FileGateError::Unauthorized("x".into()), "UNAUTHORIZED", 401),
            (FileGateError::PathEscape("x".into()), "PATH_TRAVERSAL", 403),
            (FileGateError::NotFound("x".into()), "NOT_FOUND", 404),
            (FileGateError::Internal("x".into()), "INTERNAL", 500),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let mapped = FileGateError::from_io(err, "file not found");
        assert!(matches!(mapped, FileGateError::NotFound(_)));
        assert_eq!(mapped.to_string(), "file not found");
    }

    #[test]
    fn other_io_errors_map_to_internal() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let mapped = FileGateError::from_io(err, "file not found");
        assert!(matches!(mapped, FileGateError::Internal(_)));
    }
}
