//! Error types for AgencyPulse.
//!
//! Library crates use [`AgencyPulseError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Message shown to end users for any fatal generation failure.
pub const GENERATION_FAILED_MESSAGE: &str = "generation failed, try again";

/// Top-level error type for all AgencyPulse operations.
#[derive(Debug, thiserror::Error)]
pub enum AgencyPulseError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A record-store read failed. Collectors turn this into a `failed`
    /// section; it only escapes when a caller queries the store directly.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// The generation call failed, timed out, or returned an unusable envelope.
    #[error("transport error: {0}")]
    Transport(String),

    /// Model text could not be parsed as the expected structured format.
    #[error("malformed model output: {message}")]
    MalformedOutput {
        message: String,
        /// Raw model text, kept for diagnostics only.
        raw: String,
    },

    /// Model output parsed but failed schema validation.
    #[error("schema violation at `{field}`: {message}")]
    SchemaViolation { field: String, message: String },

    /// The caller-facing request deadline elapsed.
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid caller input (empty request fields, bad import file, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AgencyPulseError>;

/// Coarse classification of an [`AgencyPulseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SourceUnavailable,
    Transport,
    MalformedOutput,
    SchemaViolation,
    DeadlineExceeded,
    Config,
    Storage,
    Io,
    Validation,
}

impl AgencyPulseError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a malformed-output error, keeping the raw text for logs.
    pub fn malformed(msg: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedOutput {
            message: msg.into(),
            raw: raw.into(),
        }
    }

    /// Create a schema violation for `field`.
    pub fn schema(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SchemaViolation {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Transport(_) => ErrorKind::Transport,
            Self::MalformedOutput { .. } => ErrorKind::MalformedOutput,
            Self::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            Self::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            Self::Io { .. } => ErrorKind::Io,
            Self::Validation { .. } => ErrorKind::Validation,
        }
    }

    /// Whether this error comes from the generation stage (transport,
    /// parsing, or validation of model output).
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transport | ErrorKind::MalformedOutput | ErrorKind::SchemaViolation
        )
    }

    /// Message safe to show to an end user. Never includes model output.
    ///
    /// A blown request deadline reads the same as a failed generation.
    pub fn user_message(&self) -> String {
        if self.is_generation_failure() || self.kind() == ErrorKind::DeadlineExceeded {
            return GENERATION_FAILED_MESSAGE.to_string();
        }
        match self.kind() {
            ErrorKind::Validation => self.to_string(),
            _ => "internal error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = AgencyPulseError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = AgencyPulseError::schema("lineItems[1].price", "must be >= 0");
        assert!(err.to_string().contains("lineItems[1].price"));
    }

    #[test]
    fn generation_failures_share_one_user_message() {
        let errors = [
            AgencyPulseError::Transport("connection reset".into()),
            AgencyPulseError::malformed("expected object", "{{secret raw text"),
            AgencyPulseError::schema("title", "missing"),
        ];
        for err in errors {
            assert!(err.is_generation_failure());
            assert_eq!(err.user_message(), GENERATION_FAILED_MESSAGE);
        }
        let late = AgencyPulseError::DeadlineExceeded(std::time::Duration::from_secs(30));
        assert_eq!(late.user_message(), GENERATION_FAILED_MESSAGE);
    }

    #[test]
    fn user_message_never_leaks_raw_output() {
        let err = AgencyPulseError::malformed("bad json", "INTERNAL STRATEGY: undercut");
        assert!(!err.user_message().contains("INTERNAL"));
    }

    #[test]
    fn kind_classification() {
        assert_eq!(
            AgencyPulseError::SourceUnavailable("down".into()).kind(),
            ErrorKind::SourceUnavailable
        );
        assert_eq!(
            AgencyPulseError::DeadlineExceeded(std::time::Duration::from_secs(1)).kind(),
            ErrorKind::DeadlineExceeded
        );
        assert!(!AgencyPulseError::Storage("x".into()).is_generation_failure());
    }
}
