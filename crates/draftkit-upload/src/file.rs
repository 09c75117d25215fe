use std::borrow::Cow;
use std::path::Path;

use bytes::Bytes;
use draftkit_core::models::{file_extension, sanitize_file_name, AssetType};

use crate::validator::content_types_for_extension;

/// A file selected by the user, held in memory until its upload finishes.
#[derive(Debug, Clone)]
pub struct UploadFile {
    file_name: String,
    content_type: String,
    data: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Read a file from disk. The content type is inferred from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed-file")
            .to_string();

        Ok(Self::new(file_name, "", Bytes::from(data)))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Name safe to send to the asset service
    pub fn sanitized_name(&self) -> String {
        sanitize_file_name(&self.file_name)
    }

    /// Declared content type, or one inferred from the extension when none was given
    pub fn content_type(&self) -> Cow<'_, str> {
        if !self.content_type.trim().is_empty() {
            return Cow::Borrowed(self.content_type.as_str());
        }

        file_extension(&self.file_name)
            .and_then(|ext| content_types_for_extension(&ext))
            .and_then(|types| types.first())
            .map(|ct| Cow::Borrowed(*ct))
            .unwrap_or(Cow::Borrowed("application/octet-stream"))
    }

    pub fn asset_type(&self) -> AssetType {
        AssetType::detect(&self.content_type(), &self.file_name)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_from_path_infers_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Launch Teaser.mp4");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"not really a video").unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.file_name(), "Launch Teaser.mp4");
        assert_eq!(file.sanitized_name(), "Launch-Teaser.mp4");
        assert_eq!(file.content_type(), "video/mp4");
        assert_eq!(file.asset_type(), AssetType::Video);
        assert_eq!(file.size(), 18);
    }

    #[test]
    fn test_unknown_extension_is_octet_stream() {
        let file = UploadFile::new("blob.bin", "", Bytes::from_static(b"x"));
        assert_eq!(file.content_type(), "application/octet-stream");
        assert_eq!(file.asset_type(), AssetType::Unknown);
    }
}
