//! Draftkit Engine Library
//!
//! Multi-step wizard engine: an in-memory form per step, a debounced autosave
//! actor that keeps at most one save in flight, and a step navigator that only
//! moves on after the current step validated and saved.
//!
//! A [`WizardSession`] ties these together with the upload orchestrator from
//! `draftkit-upload` and publishes every state change as a [`WizardEvent`].

pub mod events;
pub mod form;
pub mod navigator;
pub mod payload;
pub mod scheduler;
pub mod session;
pub mod telemetry;

// Re-export commonly used types
pub use events::WizardEvent;
pub use form::{FormSnapshot, FormState};
pub use navigator::{NavigatorState, StepNavigator, Transition};
pub use payload::{build_patch, PreparedSave};
pub use scheduler::{AutosaveHandle, AutosaveStatus, SaveOutcome};
pub use session::WizardSession;
pub use telemetry::{init_telemetry, shutdown_telemetry};
