//! Core data models: catalog records, drafts, partial updates, and the
//! fixed category enumeration.
//!
//! A [`CatalogRecord`] is what the store persists. A [`CatalogDraft`] is what
//! forms and the metadata normalizer produce before the catalog service
//! assigns identity. A [`RecordPatch`] carries a shallow partial update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Glyph used when neither the app name nor the category yields one.
pub const DEFAULT_ICON: &str = "📱";

/// Marker stored in `price` for free applications.
pub const FREE_PRICE: &str = "Ücretsiz";

/// Lowercase `text` for matching, folding Turkish dotted and dotless `i`
/// into plain `i`.
///
/// ```rust
/// use macfreeapps_core::models::fold_case;
///
/// assert_eq!(fold_case("TASARIM"), fold_case("tasarım"));
/// assert_eq!(fold_case("LİSTELE"), "listele");
/// ```
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| *c != '\u{307}')
        .map(|c| if c == 'ı' { 'i' } else { c })
        .collect()
}

/// Bring a rating into `0..=5`. Non-finite values become `0`, since JSON
/// has no encoding for them.
///
/// ```rust
/// use macfreeapps_core::models::clamp_rating;
///
/// assert_eq!(clamp_rating(7.0), 5.0);
/// assert_eq!(clamp_rating(f64::NAN), 0.0);
/// ```
pub fn clamp_rating(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 5.0)
    } else {
        0.0
    }
}

/// The fixed set of catalog categories.
///
/// Serialized as the lowercase canonical id (`"design"`). Unknown values
/// coming from outside are mapped to [`Category::Utilities`] by the
/// normalizer, never stored as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Productivity,
    Design,
    Development,
    Entertainment,
    #[default]
    Utilities,
    Security,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Productivity,
        Category::Design,
        Category::Development,
        Category::Entertainment,
        Category::Utilities,
        Category::Security,
    ];

    /// Canonical lowercase id.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Productivity => "productivity",
            Category::Design => "design",
            Category::Development => "development",
            Category::Entertainment => "entertainment",
            Category::Utilities => "utilities",
            Category::Security => "security",
        }
    }

    /// Turkish display name shown in listings and assistant replies.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Productivity => "Verimlilik",
            Category::Design => "Tasarım",
            Category::Development => "Geliştirme",
            Category::Entertainment => "Eğlence",
            Category::Utilities => "Araçlar",
            Category::Security => "Güvenlik",
        }
    }

    /// Default glyph for records of this category.
    pub fn glyph(&self) -> &'static str {
        match self {
            Category::Productivity => "📝",
            Category::Design => "🎨",
            Category::Development => "💻",
            Category::Entertainment => "🎵",
            Category::Utilities => "🔧",
            Category::Security => "🔒",
        }
    }

    /// Parse a canonical id or a display name, ignoring case.
    ///
    /// ```rust
    /// use macfreeapps_core::models::Category;
    ///
    /// assert_eq!(Category::parse("design"), Some(Category::Design));
    /// assert_eq!(Category::parse("Tasarım"), Some(Category::Design));
    /// assert_eq!(Category::parse("games"), None);
    /// ```
    pub fn parse(value: &str) -> Option<Category> {
        let needle = fold_case(value.trim());
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == needle || fold_case(c.display_name()) == needle)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted catalog entry.
///
/// Field names serialize in camelCase so the stored blob keeps the same
/// shape as catalogs exported by the browser admin panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub developer: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub minimum_os_version: String,
    #[serde(default)]
    pub supported_devices: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub views: u64,
}

/// A record before it has been given an id, a creation time and a view
/// counter. Produced by admin forms and by the metadata normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogDraft {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub download_url: Option<String>,
    pub category: Category,
    pub version: String,
    pub size: String,
    pub developer: String,
    pub rating: f64,
    pub price: String,
    pub screenshots: Vec<String>,
    pub requirements: Vec<String>,
    pub last_updated: String,
    pub release_date: String,
    pub minimum_os_version: String,
    pub supported_devices: Vec<String>,
}

impl CatalogDraft {
    /// Names of required fields that are empty after trimming.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if self.icon.trim().is_empty() {
            missing.push("icon");
        }
        missing
    }

    /// Turn the draft into a record with the given identity.
    ///
    /// Text fields are trimmed; an empty download URL becomes `None`.
    pub fn into_record(self, id: String, created_at: DateTime<Utc>) -> CatalogRecord {
        CatalogRecord {
            id,
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            icon: self.icon.trim().to_string(),
            download_url: self
                .download_url
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            category: self.category,
            version: self.version,
            size: self.size,
            developer: self.developer,
            rating: clamp_rating(self.rating),
            price: self.price,
            screenshots: self.screenshots,
            requirements: self.requirements,
            last_updated: self.last_updated,
            release_date: self.release_date,
            minimum_os_version: self.minimum_os_version,
            supported_devices: self.supported_devices,
            created_at,
            views: 0,
        }
    }
}

/// Partial update: every `Some` field overwrites the stored value, every
/// `None` field keeps it. `id`, `createdAt` and `views` cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub download_url: Option<String>,
    pub category: Option<Category>,
    pub version: Option<String>,
    pub size: Option<String>,
    pub developer: Option<String>,
    pub rating: Option<f64>,
    pub price: Option<String>,
    pub screenshots: Option<Vec<String>>,
    pub requirements: Option<Vec<String>>,
    pub last_updated: Option<String>,
    pub release_date: Option<String>,
    pub minimum_os_version: Option<String>,
    pub supported_devices: Option<Vec<String>>,
}

impl RecordPatch {
    /// Required fields this patch would blank out.
    pub fn blanked_required(&self) -> Vec<&'static str> {
        let mut blanked = Vec::new();
        let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&self.name) {
            blanked.push("name");
        }
        if blank(&self.description) {
            blanked.push("description");
        }
        if blank(&self.icon) {
            blanked.push("icon");
        }
        blanked
    }

    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }

    /// Shallow-merge this patch over `record`.
    pub fn apply_to(self, record: &mut CatalogRecord) {
        if let Some(v) = self.name {
            record.name = v.trim().to_string();
        }
        if let Some(v) = self.description {
            record.description = v.trim().to_string();
        }
        if let Some(v) = self.icon {
            record.icon = v.trim().to_string();
        }
        if let Some(v) = self.download_url {
            let v = v.trim().to_string();
            record.download_url = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = self.category {
            record.category = v;
        }
        if let Some(v) = self.version {
            record.version = v;
        }
        if let Some(v) = self.size {
            record.size = v;
        }
        if let Some(v) = self.developer {
            record.developer = v;
        }
        if let Some(v) = self.rating {
            record.rating = clamp_rating(v);
        }
        if let Some(v) = self.price {
            record.price = v;
        }
        if let Some(v) = self.screenshots {
            record.screenshots = v;
        }
        if let Some(v) = self.requirements {
            record.requirements = v;
        }
        if let Some(v) = self.last_updated {
            record.last_updated = v;
        }
        if let Some(v) = self.release_date {
            record.release_date = v;
        }
        if let Some(v) = self.minimum_os_version {
            record.minimum_os_version = v;
        }
        if let Some(v) = self.supported_devices {
            record.supported_devices = v;
        }
    }
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total_apps: usize,
    pub total_views: u64,
}
