//! Draftkit Core Library
//!
//! This crate provides the domain models, error types, configuration, and step
//! validation schemas shared by every draftkit component.

pub mod config;
pub mod error;
pub mod models;
pub mod store_types;
pub mod validation;

// Re-export commonly used types
pub use config::{AutosaveConfig, UploadConfig, WizardConfig};
pub use error::{ErrorMetadata, FieldErrors, LogLevel, UploadRejection, WizardError, WizardResult};
pub use models::{
    AssetStatus, AssetType, DraftAsset, DraftId, DraftPatch, StepDefinition, WizardDraft,
};
pub use store_types::DraftStoreBackend;
pub use validation::{FieldRule, StepSchema, ValidationResult};
