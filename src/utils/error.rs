use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShipError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Command failed in stage '{stage}' (exit code {exit_code:?}): {stderr}")]
    CommandFailed {
        stage: String,
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Stage '{stage}' failed: {details}")]
    StageFailed { stage: String, details: String },

    #[error("Manifest error in {path}: {message}")]
    ManifestError { path: String, message: String },

    #[error("Pipeline exceeded its timeout of {timeout:?}")]
    TimeoutError { timeout: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Execution,
    Io,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ShipError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ShipError::MissingConfigError { .. }
            | ShipError::InvalidConfigValueError { .. }
            | ShipError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            ShipError::CommandFailed { .. } | ShipError::StageFailed { .. } => {
                ErrorCategory::Execution
            }
            ShipError::IoError(_)
            | ShipError::SerializationError(_)
            | ShipError::ManifestError { .. } => ErrorCategory::Io,
            ShipError::TimeoutError { .. } => ErrorCategory::Timeout,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Execution => ErrorSeverity::High,
            ErrorCategory::Timeout => ErrorSeverity::Medium,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ShipError::MissingConfigError { field } => {
                format!("Add '{}' to the pipeline configuration", field)
            }
            ShipError::InvalidConfigValueError { field, .. }
            | ShipError::ConfigValidationError { field, .. } => {
                format!("Check the value of '{}' in the pipeline configuration", field)
            }
            ShipError::CommandFailed { stage, .. } => {
                format!("Inspect the '{}' stage output above and fix the failing tool run", stage)
            }
            ShipError::StageFailed { stage, .. } => {
                format!("Re-run the pipeline after fixing the '{}' stage", stage)
            }
            ShipError::ManifestError { path, .. } => {
                format!("Make sure {} exists and contains KEY=VALUE lines", path)
            }
            ShipError::TimeoutError { .. } => {
                "Raise pipeline.timeout_minutes or look for a hanging stage".to_string()
            }
            ShipError::IoError(_) | ShipError::SerializationError(_) => {
                "Check file permissions and free disk space in the workspace".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ShipError::CommandFailed {
                stage, exit_code, ..
            } => match exit_code {
                Some(code) => format!("Stage '{}' failed with exit code {}", stage, code),
                None => format!("Stage '{}' was terminated by a signal", stage),
            },
            ShipError::TimeoutError { timeout } => {
                format!("Pipeline timed out after {:?}", timeout)
            }
            other => other.to_string(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        ShipError::MissingConfigError {
            field: field.into(),
        }
    }

    pub fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ShipError::InvalidConfigValueError {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShipError>;
