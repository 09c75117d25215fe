//! Configuration module
//!
//! Settings for a wizard session: where drafts are persisted, how the autosave
//! scheduler debounces edits, and which files the upload orchestrator accepts.

use std::env;
use std::time::Duration;

use crate::store_types::DraftStoreBackend;

// Common constants
const AUTOSAVE_QUIET_PERIOD_MS: u64 = 2000;
const HTTP_TIMEOUT_SECS: u64 = 60;
const MAX_FILE_SIZE_MB: u64 = 4;
const MAX_VIDEO_SIZE_MB: u64 = 1024;
const MAX_FILES: usize = 10;
const CHUNK_SIZE_KB: usize = 5120;
const CHUNK_ATTEMPTS: u32 = 3;
const RETRY_DELAY_SECS: u64 = 2;
const START_TIMEOUT_SECS: u64 = 10;
const MAX_CONCURRENT_UPLOADS: usize = 3;

const DEFAULT_EXTENSIONS: &str = "jpg,jpeg,png,gif,webp,mp4,mov,webm";
const DEFAULT_CONTENT_TYPES: &str =
    "image/jpeg,image/png,image/gif,image/webp,video/mp4,video/quicktime,video/webm";

/// Debounce behaviour of the autosave scheduler
#[derive(Clone, Debug)]
pub struct AutosaveConfig {
    pub enabled: bool,
    pub quiet_period_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quiet_period_ms: AUTOSAVE_QUIET_PERIOD_MS,
        }
    }
}

impl AutosaveConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }
}

/// Local constraints and transfer settings for uploads
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub max_file_size_bytes: u64,
    pub max_video_size_bytes: u64,
    pub max_files: usize,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
    pub chunk_size_bytes: usize,
    pub chunk_attempts: u32,
    pub retry_delay_secs: u64,
    pub start_timeout_secs: u64,
    pub max_concurrent_uploads: usize,
    /// Refuse upload targets that are not served over https
    pub require_https: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            max_video_size_bytes: MAX_VIDEO_SIZE_MB * 1024 * 1024,
            max_files: MAX_FILES,
            allowed_extensions: parse_list(DEFAULT_EXTENSIONS),
            allowed_content_types: parse_list(DEFAULT_CONTENT_TYPES),
            chunk_size_bytes: CHUNK_SIZE_KB * 1024,
            chunk_attempts: CHUNK_ATTEMPTS,
            retry_delay_secs: RETRY_DELAY_SECS,
            start_timeout_secs: START_TIMEOUT_SECS,
            max_concurrent_uploads: MAX_CONCURRENT_UPLOADS,
            require_https: true,
        }
    }
}

impl UploadConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }
}

/// Wizard session configuration
#[derive(Clone, Debug)]
pub struct WizardConfig {
    pub environment: String,
    pub api_url: String,
    pub api_key: Option<String>,
    pub api_version: String,
    pub http_timeout_secs: u64,
    pub store_backend: DraftStoreBackend,
    pub autosave: AutosaveConfig,
    pub upload: UploadConfig,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            api_url: "http://localhost:3000".to_string(),
            api_key: None,
            api_version: "v1".to_string(),
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            store_backend: DraftStoreBackend::Http,
            autosave: AutosaveConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl WizardConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let is_production = is_production_env(&environment);

        let store_backend = env::var("DRAFT_STORE_BACKEND")
            .unwrap_or_else(|_| "http".to_string())
            .parse::<DraftStoreBackend>()?;

        let autosave = AutosaveConfig {
            enabled: env::var("AUTOSAVE_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            quiet_period_ms: env::var("AUTOSAVE_QUIET_PERIOD_MS")
                .unwrap_or_else(|_| AUTOSAVE_QUIET_PERIOD_MS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("AUTOSAVE_QUIET_PERIOD_MS must be a valid number"))?,
        };

        let max_file_size_mb = env::var("UPLOAD_MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let max_video_size_mb = env::var("UPLOAD_MAX_VIDEO_SIZE_MB")
            .unwrap_or_else(|_| MAX_VIDEO_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_VIDEO_SIZE_MB);

        let upload = UploadConfig {
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            max_video_size_bytes: max_video_size_mb * 1024 * 1024,
            max_files: env::var("UPLOAD_MAX_FILES")
                .unwrap_or_else(|_| MAX_FILES.to_string())
                .parse()
                .unwrap_or(MAX_FILES),
            allowed_extensions: parse_list(
                &env::var("UPLOAD_ALLOWED_EXTENSIONS")
                    .unwrap_or_else(|_| DEFAULT_EXTENSIONS.to_string()),
            ),
            allowed_content_types: parse_list(
                &env::var("UPLOAD_ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|_| DEFAULT_CONTENT_TYPES.to_string()),
            ),
            chunk_size_bytes: env::var("UPLOAD_CHUNK_SIZE_KB")
                .unwrap_or_else(|_| CHUNK_SIZE_KB.to_string())
                .parse::<usize>()
                .unwrap_or(CHUNK_SIZE_KB)
                * 1024,
            chunk_attempts: env::var("UPLOAD_CHUNK_ATTEMPTS")
                .unwrap_or_else(|_| CHUNK_ATTEMPTS.to_string())
                .parse()
                .unwrap_or(CHUNK_ATTEMPTS),
            retry_delay_secs: env::var("UPLOAD_RETRY_DELAY_SECS")
                .unwrap_or_else(|_| RETRY_DELAY_SECS.to_string())
                .parse()
                .unwrap_or(RETRY_DELAY_SECS),
            start_timeout_secs: env::var("UPLOAD_START_TIMEOUT_SECS")
                .unwrap_or_else(|_| START_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(START_TIMEOUT_SECS),
            max_concurrent_uploads: env::var("UPLOAD_MAX_CONCURRENT")
                .unwrap_or_else(|_| MAX_CONCURRENT_UPLOADS.to_string())
                .parse()
                .unwrap_or(MAX_CONCURRENT_UPLOADS),
            require_https: env::var("UPLOAD_REQUIRE_HTTPS")
                .unwrap_or_else(|_| is_production.to_string())
                .parse()
                .unwrap_or(is_production),
        };

        Ok(Self {
            environment,
            api_url: env::var("DRAFTKIT_API_URL")
                .or_else(|_| env::var("API_URL"))
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            api_key: env::var("DRAFTKIT_API_KEY")
                .or_else(|_| env::var("API_KEY"))
                .ok(),
            api_version: env::var("DRAFTKIT_API_VERSION").unwrap_or_else(|_| "v1".to_string()),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| HTTP_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(HTTP_TIMEOUT_SECS),
            store_backend,
            autosave,
            upload,
        })
    }

    /// Check if the wizard is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.environment)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// API path prefix, e.g. "/api/v1"
    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.api_version)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.autosave.quiet_period_ms == 0 {
            return Err(anyhow::anyhow!(
                "AUTOSAVE_QUIET_PERIOD_MS must be greater than zero"
            ));
        }

        if self.upload.chunk_size_bytes == 0 {
            return Err(anyhow::anyhow!("UPLOAD_CHUNK_SIZE_KB must be greater than zero"));
        }

        if self.upload.chunk_attempts == 0 {
            return Err(anyhow::anyhow!("UPLOAD_CHUNK_ATTEMPTS must be at least 1"));
        }

        if self.upload.max_files == 0 {
            return Err(anyhow::anyhow!("UPLOAD_MAX_FILES must be at least 1"));
        }

        if self.upload.max_concurrent_uploads == 0 {
            return Err(anyhow::anyhow!("UPLOAD_MAX_CONCURRENT must be at least 1"));
        }

        if self.store_backend == DraftStoreBackend::Http
            && !self.api_url.starts_with("http://")
            && !self.api_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "DRAFTKIT_API_URL must start with http:// or https://"
            ));
        }

        if self.is_production() && !self.upload.require_https {
            tracing::warn!("UPLOAD_REQUIRE_HTTPS is disabled in production");
        }

        Ok(())
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
