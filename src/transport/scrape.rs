//! Listing-page scrape transport.
//!
//! Fetches the rendered listing page through each configured relay in turn
//! (or directly when no relay is configured) and reads every field from a
//! prioritized selector list: the first selector yielding non-empty text
//! wins.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;

use macfreeapps_core::normalize::RawMetadata;

use super::{http_client, Transport, TransportError};
use crate::config::FetchConfig;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

const NAME_SELECTORS: &[&str] = &[
    "h1[data-testid=\"product-title\"]",
    ".product-header__title",
    "h1.product-header__title",
    ".product-header h1",
    "h1",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    "[data-testid=\"product-description\"]",
    ".product-description",
    ".what-is-new__content",
    ".product-header__description",
    ".product-description p",
];

const VERSION_SELECTORS: &[&str] = &[
    ".whats-new__latest__version",
    "[data-testid=\"version-info\"]",
    ".version",
];

const SIZE_SELECTORS: &[&str] = &[
    "[data-testid=\"file-size\"]",
    ".file-size",
    ".information-list__item__definition",
];

const SCREENSHOT_SELECTORS: &[&str] = &[
    ".we-artwork--screenshot-platform-mac picture source[srcset]",
    "picture.we-artwork--screenshot-platform-mac source[srcset]",
    ".screenshot img",
    ".artwork img",
];

const REQUIREMENT_SELECTORS: &[&str] = &[".requirements li", ".system-requirements li"];

const DEVELOPER_SELECTORS: &[&str] = &[
    "[data-testid=\"developer-name\"]",
    ".product-header__identity .product-header__identity__name",
    ".product-header__identity__name",
    ".information-list__item__definition a",
];

const CATEGORY_SELECTORS: &[&str] = &["[data-testid=\"category\"]", ".category"];
const RATING_SELECTORS: &[&str] = &["[data-testid=\"rating\"]", ".rating"];
const PRICE_SELECTORS: &[&str] = &["[data-testid=\"price\"]", ".price"];
const UPDATED_SELECTORS: &[&str] = &["[data-testid=\"last-updated\"]", ".last-updated"];

/// Descriptions shorter than this are navigation text, not copy.
const MIN_DESCRIPTION_LEN: usize = 10;

pub struct ScrapeTransport {
    client: reqwest::Client,
    relays: Vec<String>,
}

impl ScrapeTransport {
    pub fn from_config(config: &FetchConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: http_client(Duration::from_secs(config.timeout_secs))?,
            relays: config.cors_proxies.clone(),
        })
    }

    async fn get_page(&self, target: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .get(target)
            .header(reqwest::header::ACCEPT, ACCEPT_HTML)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: target.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Whether `url` looks like a store listing (`https://apps.apple.com/…/app/…/id<digits>`).
pub fn is_listing_url(url: &str) -> bool {
    static LISTING: OnceLock<Regex> = OnceLock::new();
    LISTING
        .get_or_init(|| {
            Regex::new(r"^https://apps\.apple\.com/.*/app/.*/id\d+").expect("valid listing pattern")
        })
        .is_match(url)
}

#[async_trait]
impl Transport for ScrapeTransport {
    fn name(&self) -> &'static str {
        "scrape"
    }

    async fn fetch(&self, url: &str) -> Result<RawMetadata, TransportError> {
        if !is_listing_url(url) {
            return Err(TransportError::InvalidUrl(url.to_string()));
        }

        let targets: Vec<String> = if self.relays.is_empty() {
            vec![url.to_string()]
        } else {
            self.relays
                .iter()
                .map(|relay| format!("{}{}", relay, urlencoding::encode(url)))
                .collect()
        };

        let mut last_err = None;
        for (i, target) in targets.iter().enumerate() {
            match self.get_page(target).await {
                Ok(html) => return parse_listing(&html),
                Err(e) => {
                    tracing::debug!("relay {} failed: {}", i + 1, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| TransportError::InvalidUrl(url.to_string())))
    }
}

/// Extract raw metadata from a listing page.
///
/// Fails with [`TransportError::Malformed`] when no app name can be found,
/// which is how relay error pages are told apart from real listings.
pub fn parse_listing(html: &str) -> Result<RawMetadata, TransportError> {
    let document = Html::parse_document(html);

    let name = first_text(&document, NAME_SELECTORS, 1)
        .ok_or_else(|| TransportError::Malformed("listing page has no app name".into()))?;

    Ok(RawMetadata {
        name: Some(name),
        description: first_text(&document, DESCRIPTION_SELECTORS, MIN_DESCRIPTION_LEN),
        genre: first_text(&document, CATEGORY_SELECTORS, 1),
        version: first_match(&document, VERSION_SELECTORS, version_number),
        size_text: first_match(&document, SIZE_SELECTORS, size_text),
        developer: first_text(&document, DEVELOPER_SELECTORS, 1),
        rating: first_text(&document, RATING_SELECTORS, 1).and_then(|t| leading_number(&t)),
        price_text: first_text(&document, PRICE_SELECTORS, 1),
        screenshots: screenshots(&document),
        requirements: all_texts(&document, REQUIREMENT_SELECTORS),
        last_updated: first_text(&document, UPDATED_SELECTORS, 1),
        ..Default::default()
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_text(document: &Html, selectors: &[&str], min_len: usize) -> Option<String> {
    first_match(document, selectors, |text| {
        (text.chars().count() >= min_len).then(|| text.to_string())
    })
}

/// Run `extract` over the first element of each selector in order.
fn first_match(
    document: &Html,
    selectors: &[&str],
    extract: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            if let Some(value) = extract(&element_text(element)) {
                return Some(value);
            }
        }
    }
    None
}

fn all_texts(document: &Html, selectors: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    for raw in selectors {
        if let Ok(selector) = Selector::parse(raw) {
            out.extend(
                document
                    .select(&selector)
                    .map(element_text)
                    .filter(|t| !t.is_empty()),
            );
        }
    }
    out
}

fn version_number(text: &str) -> Option<String> {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = RES.get_or_init(|| {
        [r"(?i)Version\s+([\d.]+)", r"(?i)Sürüm\s+([\d.]+)", r"(\d[\d.]*)"]
            .iter()
            .map(|p| Regex::new(p).expect("valid version pattern"))
            .collect()
    });
    patterns
        .iter()
        .find_map(|re| re.captures(text).map(|c| c[1].to_string()))
}

fn size_text(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)([\d.,]+)\s*(GB|MB|KB)").expect("valid size pattern"))
        .find(text)
        .map(|m| m.as_str().to_string())
}

fn leading_number(text: &str) -> Option<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:[.,]\d+)?)").expect("valid number pattern"))
        .captures(text)
        .and_then(|c| c[1].replace(',', ".").parse().ok())
}

/// Screenshot URLs from `<source srcset>` (largest candidate) and `<img src>`,
/// skipping icons, logos and animations.
fn screenshots(document: &Html) -> Vec<String> {
    let skip = |url: &str| url.contains("icon") || url.contains("logo") || url.contains(".gif");
    let mut urls = Vec::new();
    for raw in SCREENSHOT_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        for element in document.select(&selector) {
            let candidate = match element.value().name() {
                "source" => element.value().attr("srcset").and_then(|srcset| {
                    srcset
                        .split(',')
                        .filter_map(|entry| entry.split_whitespace().next())
                        .last()
                }),
                "img" => element.value().attr("src"),
                _ => None,
            };
            if let Some(url) = candidate.filter(|u| !u.is_empty() && !skip(u)) {
                urls.push(url.to_string());
            }
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<!doctype html>
<html><body>
  <header class="product-header">
    <h1 class="product-header__title">Canva: Design, Photo &amp; Video</h1>
    <h2 class="product-header__identity"><a class="product-header__identity__name">Canva</a></h2>
  </header>
  <section class="product-description"><p>Canva makes design simple for everyone, everywhere.</p></section>
  <p class="whats-new__latest__version">Sürüm 1.92.0</p>
  <dl><dd class="information-list__item__definition">245,3 MB</dd></dl>
  <span class="category">Graphics &amp; Design</span>
  <span class="rating">4,8 out of 5</span>
  <span class="price">Ücretsiz</span>
  <time class="last-updated">12 Mar 2024</time>
  <ul class="requirements"><li>macOS 10.15 veya üzeri</li><li> </li></ul>
  <picture class="we-artwork--screenshot-platform-mac">
    <source srcset="https://img/a-small.png 1x, https://img/a-large.png 2x">
  </picture>
  <div class="artwork"><img src="https://img/app-icon.png"><img src="https://img/b.png"></div>
</body></html>"#;

    #[test]
    fn test_listing_url_validation() {
        assert!(is_listing_url("https://apps.apple.com/tr/app/canva/id897446215"));
        assert!(!is_listing_url("https://apps.apple.com/tr/app/canva"));
        assert!(!is_listing_url("http://apps.apple.com/tr/app/canva/id1"));
        assert!(!is_listing_url("https://example.com/tr/app/canva/id1"));
    }

    #[test]
    fn test_parse_listing_fields() {
        let raw = parse_listing(LISTING).unwrap();
        assert_eq!(raw.name.as_deref(), Some("Canva: Design, Photo & Video"));
        assert_eq!(raw.developer.as_deref(), Some("Canva"));
        assert_eq!(
            raw.description.as_deref(),
            Some("Canva makes design simple for everyone, everywhere.")
        );
        assert_eq!(raw.version.as_deref(), Some("1.92.0"));
        assert_eq!(raw.size_text.as_deref(), Some("245,3 MB"));
        assert_eq!(raw.genre.as_deref(), Some("Graphics & Design"));
        assert_eq!(raw.rating, Some(4.8));
        assert_eq!(raw.price_text.as_deref(), Some("Ücretsiz"));
        assert_eq!(raw.last_updated.as_deref(), Some("12 Mar 2024"));
        assert_eq!(raw.requirements, vec!["macOS 10.15 veya üzeri"]);
        assert_eq!(
            raw.screenshots,
            vec!["https://img/a-large.png", "https://img/b.png"]
        );
    }

    #[test]
    fn test_page_without_name_is_malformed() {
        let err = parse_listing("<html><body><p>Too many requests</p></body></html>").unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_rejects_non_listing_url_before_network() {
        let transport = ScrapeTransport::from_config(&FetchConfig::default()).unwrap();
        let err = transport.fetch("https://example.com/id1").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }
}
