//! In-memory [`CatalogStore`] for tests and embedded use.
//!
//! Keeps the serialized blob rather than the decoded records so it behaves
//! exactly like a key-value backend: every read decodes, every write
//! encodes.

use std::sync::RwLock;

use anyhow::{anyhow, Result};

use crate::models::CatalogRecord;

use super::{decode_blob, encode_blob, CatalogStore};

/// Blob store held in process memory.
pub struct InMemoryStore {
    blob: RwLock<Option<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            blob: RwLock::new(None),
        }
    }

    /// Start from an arbitrary raw blob, e.g. to simulate corruption.
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: RwLock::new(Some(blob.into())),
        }
    }

    /// The raw stored document, if anything was written.
    pub fn raw(&self) -> Option<String> {
        self.blob.read().ok().and_then(|b| b.clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore for InMemoryStore {
    fn read_all(&self) -> Vec<CatalogRecord> {
        match self.blob.read() {
            Ok(guard) => guard.as_deref().map(decode_blob).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    fn write_all(&self, records: &[CatalogRecord]) -> Result<()> {
        let encoded = encode_blob(records)?;
        let mut guard = self
            .blob
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        *guard = Some(encoded);
        Ok(())
    }
}
