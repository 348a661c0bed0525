//! Catalog service: validated CRUD over a [`CatalogStore`].
//!
//! Every mutation is a full `read_all → mutate → write_all` cycle executed
//! while holding the service's write lock, so two callers can never
//! interleave their cycles even when the service is shared between threads.
//!
//! # Operations
//!
//! | Method | Failure |
//! |--------|---------|
//! | [`add`](Catalog::add) | `Validation` when name/description/icon is blank |
//! | [`update`](Catalog::update) | `NotFound`, or `Validation` when a required field is blanked |
//! | [`delete`](Catalog::delete) | `NotFound` |
//! | [`get`](Catalog::get), [`list`](Catalog::list), [`search`](Catalog::search) | never |
//! | [`increment_views`](Catalog::increment_views) | never (unknown id is a no-op) |

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{fold_case, CatalogDraft, CatalogRecord, CatalogStats, Category, RecordPatch};
use crate::store::CatalogStore;

/// Catalog service over an injected store.
pub struct Catalog<S: CatalogStore> {
    store: S,
    write_lock: Mutex<()>,
}

impl<S: CatalogStore> Catalog<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, records: &[CatalogRecord]) -> CatalogResult<()> {
        self.store.write_all(records).map_err(CatalogError::Storage)
    }

    /// Validate `draft`, give it an id and creation time, and append it.
    pub fn add(&self, draft: CatalogDraft) -> CatalogResult<CatalogRecord> {
        let missing = draft.missing_required();
        if !missing.is_empty() {
            return Err(CatalogError::Validation { missing });
        }

        let _guard = self.lock();
        let mut records = self.store.read_all();
        let id = fresh_id(&records);
        let record = draft.into_record(id, Utc::now());
        records.push(record.clone());
        self.persist(&records)?;
        tracing::debug!(id = %record.id, name = %record.name, "added app");
        Ok(record)
    }

    /// Shallow-merge `patch` over the record with `id`.
    pub fn update(&self, id: &str, patch: RecordPatch) -> CatalogResult<CatalogRecord> {
        let blanked = patch.blanked_required();
        if !blanked.is_empty() {
            return Err(CatalogError::Validation { missing: blanked });
        }

        let _guard = self.lock();
        let mut records = self.store.read_all();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        patch.apply_to(record);
        let updated = record.clone();
        self.persist(&records)?;
        tracing::debug!(id = %updated.id, "updated app");
        Ok(updated)
    }

    /// Remove the record with `id`, returning it.
    pub fn delete(&self, id: &str) -> CatalogResult<CatalogRecord> {
        let _guard = self.lock();
        let mut records = self.store.read_all();
        let pos = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        let removed = records.remove(pos);
        self.persist(&records)?;
        tracing::debug!(id = %removed.id, "deleted app");
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Option<CatalogRecord> {
        self.store.read_all().into_iter().find(|r| r.id == id)
    }

    /// All records in insertion order, optionally restricted to one category.
    pub fn list(&self, filter: Option<Category>) -> Vec<CatalogRecord> {
        let records = self.store.read_all();
        match filter {
            Some(category) => records
                .into_iter()
                .filter(|r| r.category == category)
                .collect(),
            None => records,
        }
    }

    /// Case-insensitive substring search over name, description, and the
    /// category's id or display name.
    pub fn search(&self, term: &str) -> Vec<CatalogRecord> {
        let needle = fold_case(term.trim());
        self.store
            .read_all()
            .into_iter()
            .filter(|r| {
                fold_case(&r.name).contains(&needle)
                    || fold_case(&r.description).contains(&needle)
                    || r.category.as_str().contains(&needle)
                    || fold_case(r.category.display_name()).contains(&needle)
            })
            .collect()
    }

    /// First record whose name contains `fragment`, ignoring case.
    pub fn find_by_name(&self, fragment: &str) -> Option<CatalogRecord> {
        let needle = fold_case(fragment.trim());
        if needle.is_empty() {
            return None;
        }
        self.store
            .read_all()
            .into_iter()
            .find(|r| fold_case(&r.name).contains(&needle))
    }

    /// Count one download of `id`.
    ///
    /// Unknown ids and storage failures are swallowed so a download link
    /// never fails because of the counter. Returns whether a view was
    /// recorded.
    pub fn increment_views(&self, id: &str) -> bool {
        let _guard = self.lock();
        let mut records = self.store.read_all();
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        record.views = record.views.saturating_add(1);
        match self.store.write_all(&records) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(id, "failed to record view: {}", e);
                false
            }
        }
    }

    pub fn stats(&self) -> CatalogStats {
        let records = self.store.read_all();
        CatalogStats {
            total_apps: records.len(),
            total_views: records.iter().map(|r| r.views).sum(),
        }
    }

    pub fn len(&self) -> usize {
        self.store.read_all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the starter catalog when the collection is empty.
    ///
    /// Returns how many records were written (zero when records already exist).
    pub fn seed_defaults(&self) -> CatalogResult<usize> {
        let _guard = self.lock();
        let mut records = self.store.read_all();
        if !records.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        for draft in default_drafts() {
            let id = fresh_id(&records);
            records.push(draft.into_record(id, now));
        }
        self.persist(&records)?;
        Ok(records.len())
    }
}

fn fresh_id(existing: &[CatalogRecord]) -> String {
    loop {
        let id = Uuid::new_v4().to_string();
        if !existing.iter().any(|r| r.id == id) {
            return id;
        }
    }
}

/// Starter entries written by [`Catalog::seed_defaults`].
pub fn default_drafts() -> Vec<CatalogDraft> {
    let entry = |name: &str, description: &str, icon: &str, url: &str, category: Category| {
        CatalogDraft {
            name: name.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            download_url: Some(url.to_string()),
            category,
            ..Default::default()
        }
    };
    vec![
        entry(
            "Notion",
            "Notlar, görevler ve projelerinizi organize edin",
            "📝",
            "https://www.notion.so/",
            Category::Productivity,
        ),
        entry(
            "GIMP",
            "Ücretsiz ve güçlü görsel düzenleme aracı",
            "🎨",
            "https://www.gimp.org/",
            Category::Design,
        ),
        entry(
            "Visual Studio Code",
            "Microsoft'un ücretsiz kod editörü",
            "💻",
            "https://code.visualstudio.com/",
            Category::Development,
        ),
        entry(
            "Spotify",
            "Müzik dinleme ve keşfetme platformu",
            "🎵",
            "https://www.spotify.com/",
            Category::Entertainment,
        ),
        entry(
            "LibreOffice",
            "Microsoft Office'e ücretsiz alternatif",
            "📊",
            "https://www.libreoffice.org/",
            Category::Productivity,
        ),
        entry(
            "1Password",
            "Şifre yöneticisi ve güvenlik aracı",
            "🔒",
            "https://1password.com/",
            Category::Security,
        ),
    ]
}
