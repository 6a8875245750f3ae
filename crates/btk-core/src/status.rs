//! Uniform error taxonomy shared across the workspace (spec §6, §7).
//!
//! Individual crates still define their own small, local error `enum`s for
//! operations with a handful of failure shapes (see `btk-portfolio::ledger`
//! for the pattern this follows). `StatusError` exists for the operations
//! that need to cross a crate boundary and be matched on by *code*, not by
//! `enum` variant — the price archive, the order book, and the simulation
//! driver's top-level `Result`.

use std::fmt;

/// The five-member error code surface from spec §6.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    NotFound,
    InvalidArgument,
    AlreadyExists,
    FailedPrecondition,
    Internal,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::Internal => "INTERNAL",
        };
        write!(f, "{s}")
    }
}

/// A status error: a code plus a human-readable message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusError {
    pub code: StatusCode,
    pub message: String,
}

impl StatusError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(StatusCode::AlreadyExists, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FailedPrecondition, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StatusError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let e = StatusError::not_found("symbol 'ZZZZ' has no data");
        let s = e.to_string();
        assert!(s.contains("NOT_FOUND"));
        assert!(s.contains("ZZZZ"));
    }

    #[test]
    fn constructors_set_expected_code() {
        assert_eq!(StatusError::invalid_argument("x").code, StatusCode::InvalidArgument);
        assert_eq!(StatusError::already_exists("x").code, StatusCode::AlreadyExists);
        assert_eq!(StatusError::failed_precondition("x").code, StatusCode::FailedPrecondition);
        assert_eq!(StatusError::internal("x").code, StatusCode::Internal);
    }
}
