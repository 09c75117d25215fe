//! Error types module
//!
//! Every failure a wizard session can surface is expressed as a `WizardError`.
//! Local upload constraint violations have their own typed `UploadRejection`
//! so callers can branch on the reason without string matching.

use std::collections::BTreeMap;

use serde::Serialize;

/// Field name to the list of messages reported for it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub type WizardResult<T> = Result<T, WizardError>;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a failed autosave
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented to the user
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "SAVE_FAILED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (the same action can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether the wizard session cannot continue after this error
    fn is_fatal(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Reason a file was refused before any network call was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UploadRejection {
    #[error("File too large: {size} bytes exceeds maximum of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("Invalid file type: {detail}")]
    InvalidType { detail: String },

    #[error("Too many files: at most {max} allowed")]
    TooManyFiles { max: usize },

    #[error("File is empty")]
    EmptyFile,
}

impl UploadRejection {
    /// Stable code shared with upload widgets (`file-too-large`, ...).
    pub fn code(&self) -> &'static str {
        match self {
            UploadRejection::TooLarge { .. } => "file-too-large",
            UploadRejection::InvalidType { .. } => "file-invalid-type",
            UploadRejection::TooManyFiles { .. } => "too-many-files",
            UploadRejection::EmptyFile => "file-empty",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WizardError {
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(FieldErrors),

    #[error("Failed to save draft: {message}")]
    SaveFailure {
        message: String,
        field_errors: FieldErrors,
    },

    #[error("Upload rejected: {0}")]
    UploadRejected(#[from] UploadRejection),

    #[error("Upload failed: {0}")]
    UploadFailure(String),

    #[error("Draft not found: {0}")]
    NotFound(String),

    #[error("Invalid transition from step {from} to step {to}")]
    InvalidTransition { from: u32, to: u32 },

    #[error("Cannot jump to step {target}: furthest reachable step is {max_allowed}")]
    JumpNotAllowed { target: u32, max_allowed: u32 },

    #[error("Another navigation request is already in progress")]
    Busy,

    #[error("Wizard session is closed")]
    SessionClosed,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl WizardError {
    pub fn save_failure(message: impl Into<String>) -> Self {
        WizardError::SaveFailure {
            message: message.into(),
            field_errors: FieldErrors::new(),
        }
    }

    /// Field-level messages carried by this error, if any.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            WizardError::Validation(errors) => Some(errors),
            WizardError::SaveFailure { field_errors, .. } if !field_errors.is_empty() => {
                Some(field_errors)
            }
            _ => None,
        }
    }

    /// Get the error type name for event payloads
    pub fn error_type(&self) -> &str {
        match self {
            WizardError::Validation(_) => "Validation",
            WizardError::SaveFailure { .. } => "SaveFailure",
            WizardError::UploadRejected(_) => "UploadRejected",
            WizardError::UploadFailure(_) => "UploadFailure",
            WizardError::NotFound(_) => "NotFound",
            WizardError::InvalidTransition { .. } => "InvalidTransition",
            WizardError::JumpNotAllowed { .. } => "JumpNotAllowed",
            WizardError::Busy => "Busy",
            WizardError::SessionClosed => "SessionClosed",
            WizardError::Configuration(_) => "Configuration",
        }
    }
}

impl From<validator::ValidationErrors> for WizardError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field_errors = err
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        WizardError::Validation(field_errors)
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, fatal, log_level).
fn wizard_error_static_metadata(
    err: &WizardError,
) -> (&'static str, bool, Option<&'static str>, bool, LogLevel) {
    match err {
        WizardError::Validation(_) => (
            "VALIDATION_FAILED",
            true,
            Some("Correct the highlighted fields and try again"),
            false,
            LogLevel::Debug,
        ),
        WizardError::SaveFailure { .. } => (
            "SAVE_FAILED",
            true,
            Some("Retry saving the draft"),
            false,
            LogLevel::Warn,
        ),
        WizardError::UploadRejected(_) => (
            "UPLOAD_REJECTED",
            false,
            Some("Choose a different file"),
            false,
            LogLevel::Debug,
        ),
        WizardError::UploadFailure(_) => (
            "UPLOAD_FAILED",
            true,
            Some("Add the file again to retry the upload"),
            false,
            LogLevel::Warn,
        ),
        WizardError::NotFound(_) => (
            "DRAFT_NOT_FOUND",
            false,
            Some("Restart the wizard"),
            true,
            LogLevel::Error,
        ),
        WizardError::InvalidTransition { .. } => (
            "INVALID_TRANSITION",
            false,
            None,
            false,
            LogLevel::Debug,
        ),
        WizardError::JumpNotAllowed { .. } => (
            "JUMP_NOT_ALLOWED",
            false,
            Some("Complete the current step first"),
            false,
            LogLevel::Debug,
        ),
        WizardError::Busy => (
            "NAVIGATION_IN_PROGRESS",
            true,
            Some("Wait for the current step change to finish"),
            false,
            LogLevel::Debug,
        ),
        WizardError::SessionClosed => ("SESSION_CLOSED", false, None, true, LogLevel::Warn),
        WizardError::Configuration(_) => (
            "CONFIGURATION_ERROR",
            false,
            Some("Check the wizard configuration"),
            true,
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for WizardError {
    fn error_code(&self) -> &'static str {
        wizard_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        wizard_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        wizard_error_static_metadata(self).2
    }

    fn is_fatal(&self) -> bool {
        wizard_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        wizard_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            WizardError::Validation(_) => "Some fields need your attention".to_string(),
            WizardError::SaveFailure { .. } => "Your changes could not be saved".to_string(),
            WizardError::UploadRejected(rejection) => rejection.to_string(),
            WizardError::UploadFailure(ref msg) => msg.clone(),
            WizardError::NotFound(_) => {
                "This draft no longer exists. Please start the wizard again".to_string()
            }
            WizardError::InvalidTransition { .. } => "That step is not available".to_string(),
            WizardError::JumpNotAllowed { max_allowed, .. } => {
                format!("You can go up to step {} for now", max_allowed)
            }
            WizardError::Busy => "Please wait, the step is still changing".to_string(),
            WizardError::SessionClosed => "The wizard has been closed".to_string(),
            WizardError::Configuration(_) => "The wizard is misconfigured".to_string(),
        }
    }
}
