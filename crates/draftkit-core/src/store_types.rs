use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Draft store backend types
///
/// Selects which `DraftStore` implementation a session persists through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStoreBackend {
    /// Process-local store, used for development and tests
    Memory,
    /// Remote draft API reached through the HTTP client
    Http,
}

impl FromStr for DraftStoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(DraftStoreBackend::Memory),
            "http" => Ok(DraftStoreBackend::Http),
            _ => Err(anyhow::anyhow!("Invalid draft store backend: {}", s)),
        }
    }
}

impl Display for DraftStoreBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DraftStoreBackend::Memory => write!(f, "memory"),
            DraftStoreBackend::Http => write!(f, "http"),
        }
    }
}
