//! HTTP client for the remote draft API.
//!
//! Provides a minimal client with configurable auth (Bearer token or X-API-Key),
//! generic GET/POST/PATCH helpers, and domain methods for drafts and uploads.
//! Non-success responses surface as [`ApiStatusError`] inside the `anyhow`
//! error so callers can branch on the status code.

pub mod api;

use std::time::Duration;

use anyhow::{Context, Result};
use draftkit_core::{FieldErrors, WizardConfig};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

/// Authentication strategy for the API.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
    /// No credentials (local development servers)
    Anonymous,
}

/// Non-success HTTP status returned by the API.
#[derive(Debug, Clone, thiserror::Error)]
#[error("API request failed with status {status}: {body}")]
pub struct ApiStatusError {
    pub status: u16,
    pub body: String,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ApiStatusError {
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn is_gone(&self) -> bool {
        self.status == 410
    }

    /// Human-readable message from an `{error}` / `{message}` body, else the raw body.
    pub fn message(&self) -> String {
        serde_json::from_str::<ErrorBody>(&self.body)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .unwrap_or_else(|| self.body.clone())
    }

    /// Field-level messages from a `details` object.
    ///
    /// Each entry may be a single message or a list of messages.
    pub fn field_errors(&self) -> FieldErrors {
        let Some(details) = serde_json::from_str::<ErrorBody>(&self.body)
            .ok()
            .and_then(|b| b.details)
        else {
            return FieldErrors::new();
        };

        details
            .into_iter()
            .filter_map(|(field, value)| {
                let messages: Vec<String> = match value {
                    serde_json::Value::String(msg) => vec![msg],
                    serde_json::Value::Array(items) => items
                        .into_iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                    _ => Vec::new(),
                };
                (!messages.is_empty()).then_some((field, messages))
            })
            .collect()
    }
}

/// HTTP client for the draft API with configurable auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    prefix: String,
    auth: Auth,
}

impl ApiClient {
    pub fn new(base_url: String, api_version: &str, auth: Auth, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            prefix: format!("/api/{}", api_version),
            auth,
        })
    }

    /// Create a client from wizard configuration. Uses X-API-Key auth when a key is set.
    pub fn from_config(config: &WizardConfig) -> Result<Self> {
        let auth = match &config.api_key {
            Some(key) => Auth::XApiKey(key.clone()),
            None => Auth::Anonymous,
        };
        Self::new(
            config.api_url.clone(),
            &config.api_version,
            auth,
            config.http_timeout(),
        )
    }

    /// Create client from environment: DRAFTKIT_API_URL (or API_URL), DRAFTKIT_API_KEY (or API_KEY).
    pub fn from_env() -> Result<Self> {
        let config = WizardConfig::from_env()?;
        Self::from_config(&config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// API version prefix (e.g. "/api/v1").
    pub fn api_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
            Auth::XApiKey(key) => request.header("X-API-Key", key.as_str()),
            Auth::Anonymous => request,
        }
    }

    /// GET request. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.get(&url));

        let response = request.send().await.context("Failed to send request")?;
        let response = ensure_success(response).await?;

        let body: T = response
            .json()
            .await
            .context("Failed to parse response as JSON")?;

        Ok(body)
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.post(&url).json(body));

        let response = request.send().await.context("Failed to send request")?;
        let response = ensure_success(response).await?;

        let body: T = response
            .json()
            .await
            .context("Failed to parse response as JSON")?;

        Ok(body)
    }

    /// PATCH JSON body and deserialize response.
    pub async fn patch_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.patch(&url).json(body));

        let response = request.send().await.context("Failed to send request")?;
        let response = ensure_success(response).await?;

        let body: T = response
            .json()
            .await
            .context("Failed to parse response as JSON")?;

        Ok(body)
    }

    /// Raw client for requests outside the API (e.g. presigned upload URLs).
    pub fn client(&self) -> &Client {
        &self.client
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::debug!(status = status.as_u16(), "API request failed");

    Err(ApiStatusError {
        status: status.as_u16(),
        body,
    }
    .into())
}

/// Status error carried by `err`, if the failure was an HTTP status.
pub fn status_error(err: &anyhow::Error) -> Option<&ApiStatusError> {
    err.downcast_ref::<ApiStatusError>()
}

// Re-export domain types for convenience.
pub use draftkit_core::models::{
    AssetProcessingStatus, DraftPatch, SaveReceipt, UploadTarget, UploadTargetRequest, WizardDraft,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_from_details() {
        let err = ApiStatusError {
            status: 400,
            body: r#"{"error":"Invalid request","details":{"name":["Name is required"],"budget":"Must be positive","extra":5}}"#
                .to_string(),
        };
        let fields = err.field_errors();
        assert_eq!(fields["name"], vec!["Name is required".to_string()]);
        assert_eq!(fields["budget"], vec!["Must be positive".to_string()]);
        assert!(!fields.contains_key("extra"));
        assert_eq!(err.message(), "Invalid request");
    }

    #[test]
    fn test_message_falls_back_to_body() {
        let err = ApiStatusError {
            status: 502,
            body: "Bad gateway".to_string(),
        };
        assert_eq!(err.message(), "Bad gateway");
        assert!(err.field_errors().is_empty());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_status_error_downcast() {
        let err: anyhow::Error = ApiStatusError {
            status: 404,
            body: String::new(),
        }
        .into();
        let err = err.context("Failed to load draft");
        assert!(status_error(&err).map(|e| e.is_not_found()).unwrap_or(false));
    }

    #[test]
    fn test_build_url_trims_trailing_slash() {
        let client = ApiClient::new(
            "http://localhost:3000/".to_string(),
            "v1",
            Auth::Anonymous,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.build_url("/api/v1/drafts"), "http://localhost:3000/api/v1/drafts");
        assert_eq!(client.api_prefix(), "/api/v1");
    }
}

