//! Callback-padded lookup transport.
//!
//! Requests the lookup API with `callback=mfa_jsonp_<n>` and unwraps the
//! `mfa_jsonp_<n>(...)` padding. Each request registers its callback name
//! while in flight; the registration is released when the request resolves,
//! fails, times out or is dropped, so a late response can never be matched
//! to a finished request.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use macfreeapps_core::normalize::RawMetadata;

use super::{extract_app_id, first_result, http_client, Transport, TransportError};
use crate::config::FetchConfig;

static CALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_callback_name() -> String {
    format!("mfa_jsonp_{}", CALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed) + 1)
}

type Registry = Arc<Mutex<HashSet<String>>>;

/// In-flight callback registration, released on drop.
struct PendingCallback {
    registry: Registry,
    name: String,
}

impl PendingCallback {
    fn register(registry: &Registry, name: String) -> Self {
        registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.clone());
        Self {
            registry: Arc::clone(registry),
            name,
        }
    }

    fn is_registered(&self) -> bool {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&self.name)
    }
}

impl Drop for PendingCallback {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.name);
    }
}

pub struct JsonpTransport {
    client: reqwest::Client,
    lookup_url: String,
    country: String,
    lang: String,
    timeout: Duration,
    pending: Registry,
}

impl JsonpTransport {
    pub fn from_config(config: &FetchConfig) -> Result<Self, TransportError> {
        let timeout = Duration::from_secs(config.jsonp_timeout_secs);
        Ok(Self {
            client: http_client(timeout)?,
            lookup_url: config.lookup_url.clone(),
            country: config.country.clone(),
            lang: config.lang.clone(),
            timeout,
            pending: Arc::default(),
        })
    }

    /// Number of callbacks currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    async fn request(&self, id: &str, callback: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .get(&self.lookup_url)
            .query(&[
                ("id", id),
                ("country", self.country.as_str()),
                ("lang", self.lang.as_str()),
                ("callback", callback),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: self.lookup_url.clone(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Remove the `callback( … );` padding around a JSON body.
///
/// The padding must name `callback`; a response addressed to any other
/// callback is rejected.
pub fn strip_padding<'a>(body: &'a str, callback: &str) -> Result<&'a str, TransportError> {
    let trimmed = body.trim();
    let trimmed = trimmed.strip_prefix("/**/").unwrap_or(trimmed).trim_start();
    let inner = trimmed
        .strip_prefix(callback)
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('('))
        .ok_or_else(|| {
            TransportError::Malformed(format!("response is not padded with {}", callback))
        })?;
    let inner = inner.trim_end();
    let inner = inner.strip_suffix(';').unwrap_or(inner).trim_end();
    inner
        .strip_suffix(')')
        .ok_or_else(|| TransportError::Malformed("unterminated callback padding".into()))
}

#[async_trait]
impl Transport for JsonpTransport {
    fn name(&self) -> &'static str {
        "jsonp"
    }

    async fn fetch(&self, url: &str) -> Result<RawMetadata, TransportError> {
        let id = extract_app_id(url).ok_or_else(|| TransportError::MissingAppId(url.into()))?;
        let pending = PendingCallback::register(&self.pending, next_callback_name());

        let body = tokio::time::timeout(self.timeout, self.request(&id, &pending.name))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;

        if !pending.is_registered() {
            return Err(TransportError::Malformed("callback already released".into()));
        }
        let payload = strip_padding(&body, &pending.name)?;
        let json: serde_json::Value =
            serde_json::from_str(payload).map_err(|e| TransportError::Malformed(e.to_string()))?;
        first_result(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_names_are_unique() {
        let a = next_callback_name();
        let b = next_callback_name();
        assert_ne!(a, b);
        assert!(a.starts_with("mfa_jsonp_"));
    }

    #[test]
    fn test_strip_padding_variants() {
        assert_eq!(strip_padding("cb({\"a\":1})", "cb").unwrap(), "{\"a\":1}");
        assert_eq!(
            strip_padding("/**/ cb ({\"a\":1});\n", "cb").unwrap(),
            "{\"a\":1}"
        );
    }

    #[test]
    fn test_strip_padding_rejects_other_callback() {
        assert!(strip_padding("other({})", "cb").is_err());
        assert!(strip_padding("{\"results\":[]}", "cb").is_err());
        assert!(strip_padding("cb({}", "cb").is_err());
    }

    #[test]
    fn test_registration_released_on_drop() {
        let registry: Registry = Arc::default();
        {
            let guard = PendingCallback::register(&registry, "mfa_jsonp_x".into());
            assert!(guard.is_registered());
            assert_eq!(registry.lock().unwrap().len(), 1);
        }
        assert!(registry.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_id_fails_without_registering() {
        let transport = JsonpTransport::from_config(&FetchConfig::default()).unwrap();
        let err = transport.fetch("https://apps.apple.com/tr/app/x").await.unwrap_err();
        assert!(matches!(err, TransportError::MissingAppId(_)));
        assert_eq!(transport.pending_count(), 0);
    }
}
