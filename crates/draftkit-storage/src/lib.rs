//! Draftkit Storage Library
//!
//! This crate defines the two external collaborators a wizard session talks to:
//! the `DraftStore` that persists partial drafts, and the `AssetService` that
//! receives uploaded files. Each has an in-memory backend and an HTTP backend
//! built on `draftkit-api-client`.
//!
//! # Save ordering
//!
//! Every `DraftPatch` carries the session id and a per-session sequence number.
//! Backends must never apply a patch from a session whose sequence is not newer
//! than the last one applied for that session.

pub mod factory;
#[cfg(feature = "store-http")]
pub mod http;
#[cfg(feature = "store-memory")]
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use draftkit_core::DraftStoreBackend;
pub use factory::{create_asset_service, create_draft_store};
#[cfg(feature = "store-http")]
pub use http::{HttpAssetService, HttpDraftStore};
#[cfg(feature = "store-memory")]
pub use memory::{MemoryAssetService, MemoryDraftStore};
pub use traits::{AssetService, DraftStore, StoreError, StoreResult};
