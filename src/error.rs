//! Error handling for the job queue core.
//!
//! This module provides:
//! - A machine-readable [`ErrorCode`] for programmatic branching
//! - A single [`CoreError`] type with a user-facing message and optional
//!   internal detail, in the style of `ApexError` from the orchestration
//!   engine this crate's scheduling core was extracted from
//! - A `Result` alias used throughout the crate

use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// A specialized `Result` type for job queue operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A worker declaration or retry setting was invalid or inconsistent.
    Configuration,
    /// A worker's `invoke` panicked or its task was otherwise killed
    /// without producing an in-band result.
    WorkerPanicked,
    /// A scheduler invariant was violated (programming error).
    InvariantViolation,
    /// The scheduler's actor task is no longer running.
    ActorUnavailable,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configuration => "CONFIGURATION",
            Self::WorkerPanicked => "WORKER_PANICKED",
            Self::InvariantViolation => "INVARIANT_VIOLATION",
            Self::ActorUnavailable => "ACTOR_UNAVAILABLE",
        };
        write!(f, "{s}")
    }
}

/// The crate's error type.
///
/// Carries a stable [`ErrorCode`] plus a short message safe to surface to
/// callers, and an optional internal-only detail string for logs.
#[derive(Error, Debug)]
pub struct CoreError {
    code: ErrorCode,
    message: Cow<'static, str>,
    detail: Option<String>,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " (detail: {detail})")?;
        }
        Ok(())
    }
}

impl CoreError {
    /// Create a new error with a code and a public message.
    pub fn new(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }

    /// Attach an internal-only detail string (logged but not part of `Display`
    /// unless explicitly asked for via [`CoreError::detail`]).
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// A worker declaration or retry override is invalid.
    pub fn configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Configuration, message)
    }

    /// A worker's `invoke` panicked or its task was killed.
    pub fn worker_panicked(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::WorkerPanicked, "the job runner crashed")
            .with_detail(detail)
    }

    /// The scheduler actor has shut down and can no longer be reached.
    pub fn actor_unavailable() -> Self {
        Self::new(
            ErrorCode::ActorUnavailable,
            "scheduler actor is no longer running",
        )
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_detail() {
        let err = CoreError::configuration("bad retry override").with_detail("exponent < 0");
        let rendered = err.to_string();
        assert!(rendered.contains("CONFIGURATION"));
        assert!(rendered.contains("bad retry override"));
        assert!(rendered.contains("exponent < 0"));
    }

    #[test]
    fn worker_panicked_carries_detail() {
        let err = CoreError::worker_panicked("task aborted");
        assert_eq!(err.code(), ErrorCode::WorkerPanicked);
        assert_eq!(err.detail(), Some("task aborted"));
    }
}
