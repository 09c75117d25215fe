//! Deleted-asset tracking
//!
//! Assets removed by the user or reported gone by the service are remembered
//! for the lifetime of one orchestrator so they are never polled or shown again.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

/// Asset ids known to be deleted, scoped to one upload orchestrator
#[derive(Debug, Default)]
pub struct DeletedAssetCache {
    ids: RwLock<HashSet<String>>,
}

impl DeletedAssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the id was not already recorded
    pub fn insert(&self, asset_id: &str) -> bool {
        self.ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(asset_id.to_string())
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(asset_id)
    }

    /// Whether the asset behind `url` was deleted
    pub fn contains_url(&self, url: &str) -> bool {
        extract_file_id_from_url(url)
            .map(|id| self.contains(&id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.ids.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Pull the asset id out of a delivery URL.
///
/// Recognises `.../f/{id}`, `.../files/{id}` and a `fileId={id}` query parameter.
pub fn extract_file_id_from_url(url: &str) -> Option<String> {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    };

    if let Some(query) = query {
        let from_query = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "fileId")
            .map(|(_, value)| value.split('#').next().unwrap_or(value))
            .filter(|value| !value.is_empty());
        if let Some(id) = from_query {
            return Some(id.to_string());
        }
    }

    let path = path.split('#').next().unwrap_or(path);
    let mut segments = path.split('/');
    while let Some(segment) = segments.next() {
        if segment == "f" || segment == "files" {
            if let Some(id) = segments.next().filter(|s| !s.is_empty()) {
                return Some(id.to_string());
            }
        }
    }

    None
}
