//! Draft payload builder
//!
//! Pure mapping from a [`FormSnapshot`] to the partial update sent to the
//! draft store. Only the snapshot's own step is carried; fields the schema
//! does not know about pass through untouched.

use draftkit_core::models::{DraftAsset, DraftPatch, ASSETS_FIELD};
use uuid::Uuid;

use crate::form::{assets_value, FormSnapshot};

/// A patch together with what the form needs to know once it is stored
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSave {
    pub patch: DraftPatch,
    /// Form revision the patch was built from
    pub revision: u64,
    /// Assets carried by the patch
    pub asset_ids: Vec<String>,
}

/// Build the patch for `snapshot`, positioning the draft at `current_step`.
///
/// Assets are persisted as non-temporary. The step is reported complete only
/// when its last validation passed at the snapshot's revision.
pub fn build_patch(
    snapshot: &FormSnapshot,
    current_step: u32,
    session_id: Uuid,
    sequence: u64,
) -> PreparedSave {
    let mut fields = snapshot.values.clone();
    let mut asset_ids = Vec::new();

    if let Some(assets) = &snapshot.assets {
        let persisted: Vec<DraftAsset> = assets
            .iter()
            .map(|asset| DraftAsset {
                temporary: false,
                ..asset.clone()
            })
            .collect();
        asset_ids = assets.iter().map(|asset| asset.id.clone()).collect();
        fields.insert(ASSETS_FIELD.to_string(), assets_value(&persisted));
    }

    PreparedSave {
        patch: DraftPatch {
            step: snapshot.step,
            current_step,
            fields,
            completed_step: snapshot.is_validated().then_some(snapshot.step),
            session_id,
            sequence,
        },
        revision: snapshot.revision,
        asset_ids,
    }
}
