use serde::{Deserialize, Serialize};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif", "bmp", "svg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "avi", "mkv", "m4v"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Image,
    Video,
    Unknown,
}

impl AssetType {
    /// Classify from the MIME type, falling back to the file extension.
    pub fn detect(content_type: &str, file_name: &str) -> Self {
        let content_type = content_type.to_lowercase();
        if content_type.starts_with("image/") {
            return AssetType::Image;
        }
        if content_type.starts_with("video/") {
            return AssetType::Video;
        }

        match file_extension(file_name).as_deref() {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => AssetType::Image,
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext) => AssetType::Video,
            _ => AssetType::Unknown,
        }
    }
}

/// Processing state reported by the asset service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    #[default]
    Ready,
    /// Accepted by the service but not yet processed
    Processing,
}

/// One uploaded file referenced from a step's `assets` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftAsset {
    pub id: String,
    pub url: String,
    pub file_name: String,
    pub file_size: u64,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    /// True until the owning draft has been saved with this asset attached
    pub temporary: bool,
    #[serde(default)]
    pub status: AssetStatus,
}

/// Lowercased extension of `file_name`, if any.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Make a user-supplied file name safe to send to the upload service.
///
/// Directory components and control characters are dropped, whitespace runs
/// become a single `-`, and anything outside `[A-Za-z0-9._-]` is replaced.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut out = String::with_capacity(base.len());
    let mut last_dash = false;
    for c in base.chars().filter(|c| !c.is_control()) {
        let mapped = if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            c
        } else {
            '-'
        };
        if mapped == '-' {
            if last_dash {
                continue;
            }
            last_dash = true;
        } else {
            last_dash = false;
        }
        out.push(mapped);
    }

    let trimmed = out.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        "unnamed-file".to_string()
    } else {
        trimmed.to_string()
    }
}
