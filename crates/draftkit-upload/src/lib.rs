//! Draftkit Upload Library
//!
//! Validates files locally, then uploads each one concurrently to the
//! `AssetService` in fixed-size chunks. A finished upload becomes a
//! `DraftAsset` appended to the step through an [`AssetSink`].

pub mod deleted;
pub mod file;
pub mod orchestrator;
pub mod sink;
pub mod types;
pub mod validator;

// Re-export commonly used types
pub use deleted::{extract_file_id_from_url, DeletedAssetCache};
pub use file::UploadFile;
pub use orchestrator::{RefreshSummary, UploadOrchestrator};
pub use sink::AssetSink;
pub use types::{UploadEvent, UploadHandle, UploadId, UploadSnapshot, UploadState};
pub use validator::UploadValidator;
