//! Advisory image change detection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::item::CatalogItem;

/// Item id → provider image name.
///
/// Persisted next to the catalog so the next refresh can tell which product
/// images changed upstream. Not authoritative: losing it only means the next
/// diff reports every image as new.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageFingerprintMap(BTreeMap<String, String>);

/// Result of comparing two fingerprint maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintDiff {
    /// Items that have an image now but had none before.
    pub added: Vec<String>,
    /// Items whose image name changed.
    pub changed: Vec<String>,
}

impl FingerprintDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty()
    }
}

impl ImageFingerprintMap {
    /// Build from items; items without an image are skipped.
    pub fn from_items(items: &[CatalogItem]) -> Self {
        Self(
            items
                .iter()
                .filter(|item| !item.image_name.is_empty())
                .map(|item| (item.item_id.clone(), item.image_name.clone()))
                .collect(),
        )
    }

    /// Compare against the previous generation's map.
    pub fn diff(&self, previous: &ImageFingerprintMap) -> FingerprintDiff {
        let mut diff = FingerprintDiff::default();
        for (id, image) in &self.0 {
            match previous.0.get(id) {
                None => diff.added.push(id.clone()),
                Some(old) if old != image => diff.changed.push(id.clone()),
                Some(_) => {}
            }
        }
        diff
    }

    pub fn get(&self, item_id: &str) -> Option<&str> {
        self.0.get(item_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
