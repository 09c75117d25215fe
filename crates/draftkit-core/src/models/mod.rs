//! Data models shared by every wizard component
//!
//! `WizardDraft` is the persisted shape, `DraftPatch` the partial update sent
//! on every save, and `DraftAsset` one uploaded file referenced by a step.

mod asset;
mod draft;
mod step;
mod upload;

pub use asset::*;
pub use draft::*;
pub use step::*;
pub use upload::*;
