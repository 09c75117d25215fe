use draftkit_core::models::DraftAsset;

/// Destination for finished uploads.
///
/// Implemented by the form state of a wizard session. Every method must apply
/// its change atomically with respect to concurrent field edits.
pub trait AssetSink: Send + Sync {
    /// Step currently displayed
    fn current_step(&self) -> u32;

    /// Assets already attached to the current step
    fn asset_count(&self) -> usize;

    /// Attach an asset to `step`, marking the form dirty
    fn append_asset(&self, step: u32, asset: DraftAsset);

    /// Record that a processing asset is now usable at `url`
    fn mark_asset_ready(&self, asset_id: &str, url: &str) -> bool;

    /// Detach an asset, returning whether it was present
    fn remove_asset(&self, asset_id: &str) -> bool;

    /// Assets accepted by the service but not processed yet
    fn processing_assets(&self) -> Vec<DraftAsset>;
}
