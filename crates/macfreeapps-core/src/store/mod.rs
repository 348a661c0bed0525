//! Storage abstraction for the catalog.
//!
//! The [`CatalogStore`] trait is blob-shaped: the whole
//! collection is read and written as one serialized document, never
//! partially. Backends (JSON file, in-memory) only decide *where* the blob
//! lives.
//!
//! Operations are synchronous. The catalog service relies on that to keep
//! every read-modify-write cycle inside a single critical section.

pub mod memory;

use anyhow::Result;

use crate::models::CatalogRecord;

/// Key under which the collection is persisted.
pub const CATALOG_KEY: &str = "macfreeapps_apps";

/// Abstract storage backend for the catalog blob.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`read_all`](CatalogStore::read_all) | Load the whole collection |
/// | [`write_all`](CatalogStore::write_all) | Replace the whole collection |
pub trait CatalogStore: Send + Sync {
    /// Load the collection in stored order.
    ///
    /// Returns an empty vector when nothing has been stored yet or the
    /// stored blob cannot be decoded.
    fn read_all(&self) -> Vec<CatalogRecord>;

    /// Replace the stored collection with `records`, preserving order.
    fn write_all(&self, records: &[CatalogRecord]) -> Result<()>;
}

/// Decode a stored blob, treating corruption as an empty collection.
pub fn decode_blob(blob: &str) -> Vec<CatalogRecord> {
    match serde_json::from_str(blob) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("stored catalog is unreadable, starting empty: {}", e);
            Vec::new()
        }
    }
}

/// Encode the collection as a single JSON document.
pub fn encode_blob(records: &[CatalogRecord]) -> Result<String> {
    Ok(serde_json::to_string(records)?)
}
