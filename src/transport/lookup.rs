//! Direct store lookup API transport, plus the name search used by the
//! assistant's add flow.

use async_trait::async_trait;
use std::time::Duration;

use macfreeapps_core::normalize::RawMetadata;

use super::{extract_app_id, first_result, http_client, Transport, TransportError};
use crate::config::FetchConfig;

pub struct LookupTransport {
    client: reqwest::Client,
    lookup_url: String,
    search_url: String,
    country: String,
    lang: String,
}

/// Best match of a name search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub raw: RawMetadata,
    /// Canonical listing URL built from the result's track id.
    pub url: String,
}

impl LookupTransport {
    pub fn from_config(config: &FetchConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: http_client(Duration::from_secs(config.timeout_secs))?,
            lookup_url: config.lookup_url.clone(),
            search_url: config.search_url.clone(),
            country: config.country.clone(),
            lang: config.lang.clone(),
        })
    }

    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, TransportError> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| TransportError::Malformed(e.to_string()))
    }

    /// Look up the best-matching app for `name`.
    ///
    /// Returns `Ok(None)` when the search yields no results.
    pub async fn search_app(&self, name: &str) -> Result<Option<SearchHit>, TransportError> {
        let json = self
            .get_json(
                &self.search_url,
                &[
                    ("term", name),
                    ("country", self.country.as_str()),
                    ("entity", "software"),
                    ("limit", "1"),
                ],
            )
            .await?;

        let raw = match first_result(&json) {
            Ok(raw) => raw,
            Err(TransportError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        let track_id = json["results"][0]
            .get("trackId")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| TransportError::Malformed("search result has no trackId".into()))?;

        Ok(Some(SearchHit {
            raw,
            url: format!("https://apps.apple.com/{}/app/id{}", self.country, track_id),
        }))
    }
}

#[async_trait]
impl Transport for LookupTransport {
    fn name(&self) -> &'static str {
        "lookup"
    }

    async fn fetch(&self, url: &str) -> Result<RawMetadata, TransportError> {
        let id = extract_app_id(url).ok_or_else(|| TransportError::MissingAppId(url.into()))?;
        let json = self
            .get_json(
                &self.lookup_url,
                &[
                    ("id", id.as_str()),
                    ("country", self.country.as_str()),
                    ("lang", self.lang.as_str()),
                ],
            )
            .await?;
        first_result(&json)
    }
}
