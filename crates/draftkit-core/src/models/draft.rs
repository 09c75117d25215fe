use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Field values owned by one step, keyed by field name.
pub type StepFields = Map<String, Value>;

/// Opaque draft identifier assigned by the draft store on first save.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(String);

impl DraftId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DraftId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DraftId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Persisted, partial representation of one multi-step object under construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardDraft {
    pub id: DraftId,
    pub current_step: u32,
    #[serde(default)]
    pub step_completion: BTreeSet<u32>,
    #[serde(default)]
    pub fields: BTreeMap<u32, StepFields>,
    #[serde(default)]
    pub last_saved_at: Option<DateTime<Utc>>,
}

impl WizardDraft {
    pub fn new(id: DraftId) -> Self {
        Self {
            id,
            current_step: 1,
            step_completion: BTreeSet::new(),
            fields: BTreeMap::new(),
            last_saved_at: None,
        }
    }

    /// Stored fields for `step`, empty when the step was never saved.
    pub fn step_fields(&self, step: u32) -> StepFields {
        self.fields.get(&step).cloned().unwrap_or_default()
    }

    pub fn is_step_complete(&self, step: u32) -> bool {
        self.step_completion.contains(&step)
    }

    /// Highest completed step, 0 when nothing is complete yet.
    pub fn max_completed_step(&self) -> u32 {
        self.step_completion.iter().next_back().copied().unwrap_or(0)
    }

    /// Merge a patch into this draft.
    ///
    /// Only the keys present in the patch are replaced in the patched step;
    /// other keys and other steps are left untouched. Completion only grows.
    pub fn apply_patch(&mut self, patch: &DraftPatch, saved_at: DateTime<Utc>) {
        let entry = self.fields.entry(patch.step).or_default();
        for (key, value) in &patch.fields {
            entry.insert(key.clone(), value.clone());
        }
        if let Some(step) = patch.completed_step {
            self.step_completion.insert(step);
        }
        self.current_step = patch.current_step;
        self.last_saved_at = Some(saved_at);
    }
}

/// Partial update for one step, produced by the payload builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPatch {
    /// Step whose fields are carried
    pub step: u32,
    /// Step the user is positioned on once this patch is applied
    pub current_step: u32,
    pub fields: StepFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_step: Option<u32>,
    /// Wizard session that produced the patch
    pub session_id: Uuid,
    /// Monotonic per session, in initiation order
    pub sequence: u64,
}

impl DraftPatch {
    /// Whether this patch may replace the last applied `(session_id, sequence)`.
    pub fn supersedes(&self, session_id: Uuid, sequence: u64) -> bool {
        self.session_id != session_id || self.sequence > sequence
    }
}

/// Store acknowledgement of a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub id: DraftId,
    pub success: bool,
}
