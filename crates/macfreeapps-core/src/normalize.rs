//! Metadata normalizer: turns an external app-metadata payload into a
//! [`CatalogDraft`].
//!
//! Every transport (lookup API, page scrape, JSONP) converts its own
//! response shape into [`RawMetadata`] first; [`normalize`] only ever sees
//! that one type. Missing optional fields are never an error: each field
//! degrades to an empty string, an empty list, or zero.
//!
//! # Pipeline
//!
//! ```text
//! RawMetadata ──▶ clean description ──▶ map genre ──▶ pick icon
//!             ──▶ format size/price/dates ──▶ screenshots ≤ 5
//!             ──▶ requirement lines ──▶ CatalogDraft
//! ```

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::Value;

use crate::models::{clamp_rating, CatalogDraft, Category, DEFAULT_ICON, FREE_PRICE};

/// Maximum description length, in characters, before the ellipsis.
pub const DESCRIPTION_LIMIT: usize = 200;

/// Maximum number of screenshots kept on a record.
pub const MAX_SCREENSHOTS: usize = 5;

const ELLIPSIS: &str = "...";

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// External genre substrings and the category they map to.
const GENRE_TABLE: &[(&str, Category)] = &[
    ("Productivity", Category::Productivity),
    ("Business", Category::Productivity),
    ("Graphics & Design", Category::Design),
    ("Photo & Video", Category::Design),
    ("Developer Tools", Category::Development),
    ("Utilities", Category::Utilities),
    ("Entertainment", Category::Entertainment),
    ("Music", Category::Entertainment),
    ("Games", Category::Entertainment),
    ("Security", Category::Security),
    ("Finance", Category::Utilities),
    ("Education", Category::Utilities),
    ("Lifestyle", Category::Utilities),
];

/// Well-known application name fragments and their glyphs.
const NAME_GLYPHS: &[(&str, &str)] = &[
    ("canva", "🎨"),
    ("davinci", "🎬"),
    ("resolve", "🎬"),
    ("photoshop", "🖼️"),
    ("illustrator", "✏️"),
    ("sketch", "🎨"),
    ("figma", "🎨"),
    ("notion", "📝"),
    ("slack", "💬"),
    ("spotify", "🎵"),
    ("vscode", "💻"),
    ("xcode", "💻"),
    ("safari", "🌐"),
    ("chrome", "🌐"),
    ("firefox", "🦊"),
    ("zoom", "📹"),
    ("teams", "👥"),
    ("discord", "💬"),
    ("whatsapp", "💬"),
    ("telegram", "✈️"),
];

/// Source-independent metadata payload produced by a transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetadata {
    pub name: Option<String>,
    /// Free text, possibly containing markup.
    pub description: Option<String>,
    /// Store genre, e.g. `"Graphics & Design"`.
    pub genre: Option<String>,
    pub version: Option<String>,
    pub file_size_bytes: Option<u64>,
    /// Already human-readable size (scraped pages), used when no byte count exists.
    pub size_text: Option<String>,
    pub developer: Option<String>,
    pub rating: Option<f64>,
    /// Numeric price in the store currency.
    pub price: Option<f64>,
    /// Display price text (scraped pages), used when no numeric price exists.
    pub price_text: Option<String>,
    pub screenshots: Vec<String>,
    /// Requirement lines listed verbatim by the source.
    pub requirements: Vec<String>,
    pub minimum_os_version: Option<String>,
    pub supported_devices: Vec<String>,
    /// ISO-8601 timestamp or display text.
    pub last_updated: Option<String>,
    pub release_date: Option<String>,
}

impl RawMetadata {
    /// Map one entry of the store lookup/search API `results` array.
    ///
    /// Accepts both the `screenshotUrls` array and the numbered
    /// `screenshot{n}Url` keys, and a byte count given as a number or a
    /// numeric string.
    pub fn from_lookup_result(app: &Value) -> Self {
        let text = |key: &str| {
            app.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .filter(|s| !s.trim().is_empty())
        };
        let strings = |key: &str| -> Vec<String> {
            app.get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        let file_size_bytes = app.get("fileSizeBytes").and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });

        let mut screenshots = strings("screenshotUrls");
        for n in 1..=MAX_SCREENSHOTS {
            if let Some(url) = text(&format!("screenshot{}Url", n)) {
                screenshots.push(url);
            }
        }

        Self {
            name: text("trackName"),
            description: text("description"),
            genre: text("primaryGenreName"),
            version: text("version"),
            file_size_bytes,
            size_text: None,
            developer: text("artistName"),
            rating: app.get("averageUserRating").and_then(Value::as_f64),
            price: app.get("price").and_then(Value::as_f64),
            price_text: None,
            screenshots,
            requirements: Vec::new(),
            minimum_os_version: text("minimumOsVersion"),
            supported_devices: strings("supportedDevices"),
            last_updated: text("lastUpdated").or_else(|| text("currentVersionReleaseDate")),
            release_date: text("releaseDate"),
        }
    }
}

/// Convert a raw payload into a catalog draft.
///
/// `source_url` becomes the draft's download URL.
pub fn normalize(raw: RawMetadata, source_url: &str) -> CatalogDraft {
    let name = raw.name.as_deref().map(str::trim).unwrap_or_default().to_string();
    let category = raw
        .genre
        .as_deref()
        .map(map_category)
        .unwrap_or_default();
    let icon = pick_icon(&name, raw.genre.as_deref());

    let size = match raw.file_size_bytes {
        Some(bytes) => format_file_size(bytes),
        None => raw
            .size_text
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
    };

    let price = match (raw.price, raw.price_text.as_deref()) {
        (Some(amount), _) => format_price(Some(amount)),
        (None, Some(text)) => normalize_price_text(text),
        (None, None) => format_price(None),
    };

    let mut requirements: Vec<String> = raw
        .requirements
        .iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();
    if let Some(min_os) = raw.minimum_os_version.as_deref() {
        requirements.push(format!("macOS {} veya üzeri", min_os.trim()));
    }
    if !size.is_empty() {
        requirements.push(format!("En az {} boş alan", size));
    }

    let source_url = source_url.trim();

    CatalogDraft {
        name,
        description: clean_description(raw.description.as_deref().unwrap_or_default()),
        icon,
        download_url: (!source_url.is_empty()).then(|| source_url.to_string()),
        category,
        version: raw.version.unwrap_or_default().trim().to_string(),
        size,
        developer: raw.developer.unwrap_or_default().trim().to_string(),
        rating: clamp_rating(raw.rating.unwrap_or(0.0)),
        price,
        screenshots: collect_screenshots(&raw.screenshots),
        requirements,
        last_updated: raw.last_updated.as_deref().map(format_date).unwrap_or_default(),
        release_date: raw.release_date.as_deref().map(format_date).unwrap_or_default(),
        minimum_os_version: raw.minimum_os_version.unwrap_or_default().trim().to_string(),
        supported_devices: raw
            .supported_devices
            .into_iter()
            .filter(|d| d.contains("Mac"))
            .collect(),
    }
}

fn markup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid markup pattern"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Strip tags, collapse whitespace, cut to [`DESCRIPTION_LIMIT`] characters
/// and append an ellipsis. Empty input stays empty.
///
/// ```rust
/// use macfreeapps_core::normalize::clean_description;
///
/// assert_eq!(clean_description("<p>Fast\n\n  notes</p>"), "Fast notes...");
/// assert_eq!(clean_description("   "), "");
/// ```
pub fn clean_description(text: &str) -> String {
    let stripped = markup_re().replace_all(text, "");
    let collapsed = whitespace_re().replace_all(&stripped, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let mut out: String = trimmed.chars().take(DESCRIPTION_LIMIT).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Human-readable size with base-1024 units, rounded to two decimals.
///
/// ```rust
/// use macfreeapps_core::normalize::format_file_size;
///
/// assert_eq!(format_file_size(0), "0 Bytes");
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// assert_eq!(format_file_size(1_048_576), "1 MB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[unit])
}

/// Map a store genre to a catalog category.
///
/// The longest table key contained in `genre` (ignoring case) wins; ties
/// keep table order. No match falls back to [`Category::Utilities`].
pub fn map_category(genre: &str) -> Category {
    let haystack = genre.to_lowercase();
    let mut best: Option<(usize, Category)> = None;
    for (key, category) in GENRE_TABLE {
        if haystack.contains(&key.to_lowercase()) && best.map_or(true, |(len, _)| key.len() > len) {
            best = Some((key.len(), *category));
        }
    }
    best.map(|(_, c)| c).unwrap_or(Category::Utilities)
}

/// Choose a glyph: known app name first, then the genre's category glyph,
/// then [`DEFAULT_ICON`].
pub fn pick_icon(app_name: &str, genre: Option<&str>) -> String {
    let lower = app_name.to_lowercase();
    if let Some((_, glyph)) = NAME_GLYPHS.iter().find(|(key, _)| lower.contains(key)) {
        return glyph.to_string();
    }
    match genre {
        Some(g) if !g.trim().is_empty() => map_category(g).glyph().to_string(),
        _ => DEFAULT_ICON.to_string(),
    }
}

/// `None` or zero is free; anything else is suffixed with the lira sign.
pub fn format_price(amount: Option<f64>) -> String {
    match amount {
        Some(a) if a > 0.0 => format!("{} ₺", a),
        _ => FREE_PRICE.to_string(),
    }
}

/// Normalize a scraped price label.
pub fn normalize_price_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.contains(FREE_PRICE) || trimmed.contains("Free") {
        FREE_PRICE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Format an ISO-8601 timestamp or date as `dd.mm.yyyy`.
///
/// Anything unparseable is returned trimmed, since scraped pages already
/// carry display text.
pub fn format_date(value: &str) -> String {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.format("%d.%m.%Y").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.format("%d.%m.%Y").to_string();
    }
    trimmed.to_string()
}

/// De-duplicate and cap at [`MAX_SCREENSHOTS`], keeping first-seen order.
pub fn collect_screenshots(urls: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for url in urls {
        let url = url.trim();
        if url.is_empty() || out.iter().any(|u| u == url) {
            continue;
        }
        out.push(url.to_string());
        if out.len() == MAX_SCREENSHOTS {
            break;
        }
    }
    out
}
