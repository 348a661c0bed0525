//! Transport strategies for pulling app metadata from the store.
//!
//! Three interchangeable fetchers implement [`Transport`]:
//!
//! | Strategy | Type | Source |
//! |----------|------|--------|
//! | `lookup` | [`lookup::LookupTransport`] | Store lookup JSON API |
//! | `scrape` | [`scrape::ScrapeTransport`] | Listing page HTML, through relays |
//! | `jsonp`  | [`jsonp::JsonpTransport`]   | Lookup API with callback padding |
//!
//! Each produces a [`RawMetadata`] for the normalizer. [`FetchChain`] tries
//! the configured strategies in order, bounding each attempt with the
//! configured deadline, and reports every failure when all of them fail.

pub mod jsonp;
pub mod lookup;
pub mod scrape;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use macfreeapps_core::models::CatalogDraft;
use macfreeapps_core::normalize::{normalize, RawMetadata};

use crate::config::FetchConfig;

/// Failure of a single transport attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid App Store URL: {0}")]
    InvalidUrl(String),
    #[error("no app id found in URL: {0}")]
    MissingAppId(String),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("app not found")]
    NotFound,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("all strategies failed: {}", format_failures(.0))]
    Exhausted(Vec<(String, String)>),
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(name, reason)| format!("{}: {}", name, reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A fetcher that turns an app listing URL into raw metadata.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short identifier used in config and logs (`lookup`, `scrape`, `jsonp`).
    fn name(&self) -> &'static str;

    async fn fetch(&self, url: &str) -> Result<RawMetadata, TransportError>;
}

/// Pull the numeric app id out of a listing URL (`…/id1234567`).
pub fn extract_app_id(url: &str) -> Option<String> {
    static ID: OnceLock<Regex> = OnceLock::new();
    let re = ID.get_or_init(|| Regex::new(r"/id(\d+)").expect("static regex"));
    re.captures(url).map(|c| c[1].to_string())
}

/// Map a lookup/search API document to the first result.
pub(crate) fn first_result(json: &serde_json::Value) -> Result<RawMetadata, TransportError> {
    let results = json
        .get("results")
        .and_then(|r| r.as_array())
        .ok_or_else(|| TransportError::Malformed("missing results array".to_string()))?;
    let app = results.first().ok_or(TransportError::NotFound)?;
    Ok(RawMetadata::from_lookup_result(app))
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, TransportError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("mfa/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Ordered fallback over several transports.
pub struct FetchChain {
    strategies: Vec<Box<dyn Transport>>,
    deadline: Duration,
}

impl FetchChain {
    pub fn new(strategies: Vec<Box<dyn Transport>>, deadline: Duration) -> Self {
        Self {
            strategies,
            deadline,
        }
    }

    /// Build the chain named by `[fetch].strategies`.
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        let mut strategies: Vec<Box<dyn Transport>> = Vec::new();
        for name in &config.strategies {
            let transport: Box<dyn Transport> = match name.as_str() {
                "lookup" => Box::new(lookup::LookupTransport::from_config(config)?),
                "scrape" => Box::new(scrape::ScrapeTransport::from_config(config)?),
                "jsonp" => Box::new(jsonp::JsonpTransport::from_config(config)?),
                other => anyhow::bail!("Unknown fetch strategy: '{}'", other),
            };
            strategies.push(transport);
        }
        Ok(Self::new(
            strategies,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each strategy in order; the first success wins.
    ///
    /// Returns the payload with the name of the strategy that produced it.
    pub async fn fetch(&self, url: &str) -> Result<(RawMetadata, &'static str), TransportError> {
        let mut failures = Vec::new();
        for strategy in &self.strategies {
            let name = strategy.name();
            tracing::debug!(strategy = name, url, "fetching app metadata");
            let outcome = match tokio::time::timeout(self.deadline, strategy.fetch(url)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(self.deadline)),
            };
            match outcome {
                Ok(raw) => {
                    tracing::info!(strategy = name, "fetched app metadata");
                    return Ok((raw, name));
                }
                Err(e) => {
                    tracing::warn!(strategy = name, "strategy failed, trying next: {}", e);
                    failures.push((name.to_string(), e.to_string()));
                }
            }
        }
        Err(TransportError::Exhausted(failures))
    }

    /// Fetch and normalize in one step.
    pub async fn fetch_draft(&self, url: &str) -> Result<CatalogDraft, TransportError> {
        let (raw, _) = self.fetch(url).await?;
        Ok(normalize(raw, url))
    }
}
