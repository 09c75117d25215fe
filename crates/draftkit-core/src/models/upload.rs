use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request for a place to send a file's bytes.
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadTargetRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Filename must be between 1 and 255 characters"
    ))]
    pub file_name: String,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Content type must be between 1 and 255 characters"
    ))]
    pub content_type: String,
    #[validate(range(min = 1, message = "File size must be at least 1 byte"))]
    pub file_size: u64,
}

/// Where to send the bytes, and the id the service will know the asset by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    pub upload_url: String,
    pub asset_id: String,
}

/// Processing state of an uploaded asset as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AssetProcessingStatus {
    Ready { url: String },
    Processing,
    /// The asset was deleted on the service side
    Gone,
}
