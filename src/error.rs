//! Unified error types for Mnemosyne.
//!
//! Errors fall into two families. Caller errors (missing evidence at PLAN,
//! unknown ids, out-of-range values) propagate as distinct typed failures so
//! the caller can fix its input and retry. Infrastructure errors (storage,
//! serialization, config) are handled fail-open: the belief store logs them,
//! records them in its persistence health, and keeps serving in-memory state.
//!
//! A safety-rail cap is not an error and never appears here.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::LoopStage;

/// The main error type for Mnemosyne operations.
#[derive(Error, Debug)]
pub enum MnemosyneError {
    /// A stage was executed without the evidence it is bound to.
    #[error("missing evidence at {stage}: {message}")]
    MissingEvidence { stage: LoopStage, message: String },

    /// No handler is registered for the loop's current stage.
    #[error("no handler registered for stage {stage}")]
    UnregisteredStage { stage: LoopStage },

    /// A stage finished without emitting its mandatory artifact.
    #[error("stage {stage} completed without emitting {artifact}")]
    MissingArtifact {
        stage: LoopStage,
        artifact: &'static str,
    },

    /// Lookup of an entity by id failed.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// An input value is outside its permitted range.
    #[error("invalid {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    /// I/O errors from collection files.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },
}

/// A specialized Result type for Mnemosyne operations.
pub type Result<T> = std::result::Result<T, MnemosyneError>;

impl MnemosyneError {
    /// Create a missing evidence error.
    pub fn missing_evidence(stage: LoopStage, message: impl Into<String>) -> Self {
        Self::MissingEvidence {
            stage,
            message: message.into(),
        }
    }

    /// Create an unregistered stage error.
    pub fn unregistered_stage(stage: LoopStage) -> Self {
        Self::UnregisteredStage { stage }
    }

    /// Create a missing artifact error.
    pub fn missing_artifact(stage: LoopStage, artifact: &'static str) -> Self {
        Self::MissingArtifact { stage, artifact }
    }

    /// Create a not found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }

    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the caller can fix this by supplying different input.
    ///
    /// Returns false for wiring bugs (unregistered stage, missing artifact)
    /// and infrastructure failures.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::MissingEvidence { .. } | Self::NotFound { .. } | Self::InvalidValue { .. }
        )
    }
}

impl From<io::Error> for MnemosyneError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for MnemosyneError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for fail-open error handling.
///
/// Logs the error as a warning and substitutes a safe value.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using fallback)", context, err);
                fallback
            }
        }
    }
}

/// Exit codes for the Mnemosyne CLI.
pub mod exit_codes {
    /// Command succeeded.
    pub const OK: i32 = 0;

    /// Command failed for a reason the caller can fix.
    pub const ERROR: i32 = 1;

    /// Command failed because of a wiring or internal bug.
    pub const INTERNAL: i32 = 3;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_evidence_display() {
        let err = MnemosyneError::missing_evidence(LoopStage::Plan, "no active assumption");
        assert_eq!(
            err.to_string(),
            "missing evidence at PLAN: no active assumption"
        );
    }

    #[test]
    fn test_unregistered_stage_display() {
        let err = MnemosyneError::unregistered_stage(LoopStage::Observe);
        assert_eq!(err.to_string(), "no handler registered for stage OBSERVE");
    }

    #[test]
    fn test_missing_artifact_display() {
        let err = MnemosyneError::missing_artifact(LoopStage::Adapt, "StrategyChange");
        assert_eq!(
            err.to_string(),
            "stage ADAPT completed without emitting StrategyChange"
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = MnemosyneError::not_found("assumption", "asm_001");
        assert_eq!(err.to_string(), "assumption not found: asm_001");
    }

    #[test]
    fn test_storage_error_display() {
        let err = MnemosyneError::storage(
            "/tmp/assumptions.json",
            io::Error::new(io::ErrorKind::NotFound, "file not found"),
        );
        assert!(err.to_string().contains("storage error"));
        assert!(err.to_string().contains("/tmp/assumptions.json"));
    }

    #[test]
    fn test_caller_errors_are_distinct_from_wiring_bugs() {
        assert!(MnemosyneError::missing_evidence(LoopStage::Plan, "x").is_caller_error());
        assert!(MnemosyneError::invalid_value("confidence_delta", "x").is_caller_error());
        assert!(!MnemosyneError::unregistered_stage(LoopStage::Plan).is_caller_error());
        assert!(!MnemosyneError::missing_artifact(LoopStage::Adapt, "x").is_caller_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: MnemosyneError = io_err.into();
        assert!(matches!(err, MnemosyneError::Storage { .. }));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: MnemosyneError = json_err.into();
        assert!(matches!(err, MnemosyneError::Serde { .. }));
    }

    #[test]
    fn test_fail_open_default() {
        let result: Result<Vec<String>> = Err(MnemosyneError::serde("test"));
        assert!(result.fail_open_default("test context").is_empty());
    }

    #[test]
    fn test_fail_open_with() {
        let result: Result<i32> = Err(MnemosyneError::config("test"));
        assert_eq!(result.fail_open_with("test context", 42), 42);
    }

    #[test]
    fn test_fail_open_success() {
        let result: Result<i32> = Ok(100);
        assert_eq!(result.fail_open_default("test context"), 100);
    }
}
