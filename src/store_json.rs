//! JSON file backend for the catalog.
//!
//! The whole collection lives in one file (by default
//! `./data/macfreeapps_apps.json`). Writes go to a sibling temp file that is
//! then renamed over the target.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use macfreeapps_core::models::CatalogRecord;
use macfreeapps_core::store::{decode_blob, encode_blob, CatalogStore};

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CatalogStore for JsonFileStore {
    fn read_all(&self) -> Vec<CatalogRecord> {
        match std::fs::read_to_string(&self.path) {
            Ok(blob) => decode_blob(&blob),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!("cannot read {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    fn write_all(&self, records: &[CatalogRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create store directory: {}", parent.display())
                })?;
            }
        }
        let blob = encode_blob(records)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, blob)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}
