use draftkit_core::models::{file_extension, AssetType};
use draftkit_core::{UploadConfig, UploadRejection};

use crate::file::UploadFile;

/// Local upload validator
///
/// Everything here runs before any network call, so a rejected file never
/// reaches the asset service.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_file_size: u64,
    max_video_size: u64,
    max_files: usize,
    allowed_extensions: Vec<String>,
    allowed_content_types: Vec<String>,
}

impl UploadValidator {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            max_file_size: config.max_file_size_bytes,
            max_video_size: config.max_video_size_bytes,
            max_files: config.max_files,
            allowed_extensions: config.allowed_extensions.clone(),
            allowed_content_types: config.allowed_content_types.clone(),
        }
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Validate file size. Videos get their own limit.
    pub fn validate_file_size(&self, size: u64, asset_type: AssetType) -> Result<(), UploadRejection> {
        if size == 0 {
            return Err(UploadRejection::EmptyFile);
        }

        let max = match asset_type {
            AssetType::Video => self.max_video_size,
            _ => self.max_file_size,
        };
        if size > max {
            return Err(UploadRejection::TooLarge { size, max });
        }

        Ok(())
    }

    /// Validate file extension
    pub fn validate_extension(&self, file_name: &str) -> Result<(), UploadRejection> {
        let extension = file_extension(file_name).ok_or_else(|| UploadRejection::InvalidType {
            detail: format!("{} has no file extension", file_name),
        })?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(UploadRejection::InvalidType {
                detail: format!(
                    ".{} files are not accepted (allowed: {})",
                    extension,
                    self.allowed_extensions.join(", ")
                ),
            });
        }

        Ok(())
    }

    /// Validate content type
    pub fn validate_content_type(&self, content_type: &str) -> Result<(), UploadRejection> {
        let normalized = content_type.to_lowercase();

        if !self.allowed_content_types.iter().any(|ct| ct == &normalized) {
            return Err(UploadRejection::InvalidType {
                detail: format!("{} is not an accepted content type", content_type),
            });
        }

        Ok(())
    }

    /// Validate that the content type matches the file extension
    pub fn validate_extension_content_type_match(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> Result<(), UploadRejection> {
        let Some(extension) = file_extension(file_name) else {
            return Err(UploadRejection::InvalidType {
                detail: format!("{} has no file extension", file_name),
            });
        };

        let Some(expected) = content_types_for_extension(&extension) else {
            tracing::debug!(
                extension = %extension,
                content_type = %content_type,
                "Unknown extension, skipping content type/extension cross-validation"
            );
            return Ok(());
        };

        let normalized = content_type.to_lowercase();
        if !expected.iter().any(|ct| *ct == normalized) {
            return Err(UploadRejection::InvalidType {
                detail: format!(
                    "{} does not match extension '{}' (expected one of: {})",
                    content_type,
                    extension,
                    expected.join(", ")
                ),
            });
        }

        Ok(())
    }

    /// Reject when `already_present` files plus this one exceed the limit
    pub fn validate_count(&self, already_present: usize) -> Result<(), UploadRejection> {
        if already_present >= self.max_files {
            return Err(UploadRejection::TooManyFiles {
                max: self.max_files,
            });
        }
        Ok(())
    }

    /// Validate a file's own properties (size, extension, content type)
    pub fn validate_file(&self, file: &UploadFile) -> Result<(), UploadRejection> {
        let content_type = file.content_type();
        self.validate_file_size(file.size(), file.asset_type())?;
        self.validate_extension(file.file_name())?;
        self.validate_content_type(&content_type)?;
        self.validate_extension_content_type_match(file.file_name(), &content_type)?;
        Ok(())
    }
}

/// Expected MIME types for the image and video extensions the wizard accepts
pub fn content_types_for_extension(extension: &str) -> Option<&'static [&'static str]> {
    let types: &'static [&'static str] = match extension {
        // Images
        "jpg" | "jpeg" => &["image/jpeg"],
        "png" => &["image/png"],
        "gif" => &["image/gif"],
        "webp" => &["image/webp"],
        "avif" => &["image/avif"],
        "svg" => &["image/svg+xml"],
        "bmp" => &["image/bmp"],
        // Videos
        "mp4" => &["video/mp4"],
        "webm" => &["video/webm"],
        "mov" => &["video/quicktime"],
        "avi" => &["video/x-msvideo"],
        "mkv" => &["video/x-matroska"],
        "m4v" => &["video/x-m4v"],
        _ => return None,
    };
    Some(types)
}
