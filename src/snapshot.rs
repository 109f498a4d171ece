//! On-disk catalog snapshot.
//!
//! A single JSON document holding the last successfully published catalog.
//! Read only when the hot cache is empty (cold start, store outage), written
//! after every successful refresh.
//!
//! The document is versioned (`{ "version": 1, "written_at": ..., "items": [...] }`);
//! a bare JSON array of items is also accepted on read. Missing or corrupt
//! files read as "no snapshot".

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::now_millis;
use crate::types::CatalogItem;
use crate::{Result, StockroomError};

/// Maximum supported snapshot format version.
const MAX_SUPPORTED_VERSION: u32 = 1;

/// Default snapshot path: `~/.cache/stockroom/products-cache.json`.
pub fn default_snapshot_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("stockroom")
        .join("products-cache.json")
}

/// Versioned snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// Format version (currently 1).
    pub version: u32,
    /// Unix millis at write time.
    #[serde(default)]
    pub written_at: u64,
    pub items: Vec<CatalogItem>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSnapshot {
    Versioned(SnapshotDocument),
    Legacy(Vec<CatalogItem>),
}

fn parse_snapshot(json: &str) -> Result<Vec<CatalogItem>> {
    let raw: RawSnapshot = serde_json::from_str(json)
        .map_err(|e| StockroomError::Snapshot(format!("failed to parse snapshot: {e}")))?;
    match raw {
        RawSnapshot::Versioned(doc) => {
            if doc.version > MAX_SUPPORTED_VERSION {
                return Err(StockroomError::Snapshot(format!(
                    "unsupported snapshot version {} (max supported: {MAX_SUPPORTED_VERSION})",
                    doc.version
                )));
            }
            Ok(doc.items)
        }
        RawSnapshot::Legacy(items) => Ok(items),
    }
}

/// Handle to the snapshot file.
#[derive(Debug, Clone)]
pub struct Snapshot {
    path: PathBuf,
}

impl Snapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot.
    ///
    /// Returns `None` on a missing file, and logs and returns `None` on an
    /// unreadable or corrupt one.
    pub fn load(&self) -> Option<Vec<CatalogItem>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read snapshot");
                return None;
            }
        };
        match parse_snapshot(&content) {
            Ok(items) => Some(items),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt snapshot");
                None
            }
        }
    }

    /// Write the snapshot atomically (tmp file + rename).
    pub fn save(&self, items: &[CatalogItem]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StockroomError::Snapshot(format!(
                    "failed to create snapshot dir {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let doc = SnapshotDocument {
            version: MAX_SUPPORTED_VERSION,
            written_at: now_millis(),
            items: items.to_vec(),
        };
        let json = serde_json::to_string(&doc)?;
        std::fs::write(&tmp_path, &json).map_err(|e| {
            StockroomError::Snapshot(format!(
                "failed to write snapshot {}: {e}",
                tmp_path.display()
            ))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            StockroomError::Snapshot(format!(
                "failed to rename snapshot {} → {}: {e}",
                tmp_path.display(),
                self.path.display()
            ))
        })?;

        Ok(())
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new(default_snapshot_path())
    }
}
