use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the conversational model's API key.
pub const ASSISTANT_KEY_ENV: &str = "DEEPSEEK_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Built-in defaults, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/macfreeapps_apps.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_lookup_url")]
    pub lookup_url: String,
    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default = "default_locale")]
    pub country: String,
    #[serde(default = "default_locale")]
    pub lang: String,
    #[serde(default = "default_cors_proxies")]
    pub cors_proxies: Vec<String>,
    #[serde(default = "default_strategies")]
    pub strategies: Vec<String>,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_fetch_timeout")]
    pub jsonp_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            lookup_url: default_lookup_url(),
            search_url: default_search_url(),
            country: default_locale(),
            lang: default_locale(),
            cors_proxies: default_cors_proxies(),
            strategies: default_strategies(),
            timeout_secs: default_fetch_timeout(),
            jsonp_timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_lookup_url() -> String {
    "https://itunes.apple.com/lookup".to_string()
}
fn default_search_url() -> String {
    "https://itunes.apple.com/search".to_string()
}
fn default_locale() -> String {
    "tr".to_string()
}
fn default_cors_proxies() -> Vec<String> {
    vec![
        "https://api.allorigins.win/raw?url=".to_string(),
        "https://corsproxy.io/?".to_string(),
        "https://cors-anywhere.herokuapp.com/".to_string(),
    ]
}
fn default_strategies() -> Vec<String> {
    vec![
        "lookup".to_string(),
        "scrape".to_string(),
        "jsonp".to_string(),
    ]
}
fn default_fetch_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_assistant_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_assistant_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl AssistantConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_api_url() -> String {
    "https://api.deepseek.com/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "deepseek-chat".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_assistant_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    #[serde(default = "default_password")]
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            password: default_password(),
        }
    }
}

fn default_password() -> String {
    "admin123".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Load and validate the config at `path`.
///
/// A missing file yields [`Config::minimal`]; a file that exists but fails
/// to parse or validate is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("no config at {}, using defaults", path.display());
        return Ok(Config::minimal());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.fetch.timeout_secs == 0 {
        anyhow::bail!("fetch.timeout_secs must be > 0");
    }
    if config.fetch.jsonp_timeout_secs == 0 {
        anyhow::bail!("fetch.jsonp_timeout_secs must be > 0");
    }
    if config.fetch.strategies.is_empty() {
        anyhow::bail!("fetch.strategies must name at least one strategy");
    }
    for name in &config.fetch.strategies {
        match name.as_str() {
            "lookup" | "scrape" | "jsonp" => {}
            other => anyhow::bail!(
                "Unknown fetch strategy: '{}'. Must be lookup, scrape, or jsonp.",
                other
            ),
        }
    }

    // Validate assistant
    if !(0.0..=2.0).contains(&config.assistant.temperature) {
        anyhow::bail!("assistant.temperature must be in [0.0, 2.0]");
    }
    if config.assistant.max_tokens == 0 {
        anyhow::bail!("assistant.max_tokens must be > 0");
    }
    match config.assistant.provider.as_str() {
        "disabled" | "deepseek" => {}
        other => anyhow::bail!(
            "Unknown assistant provider: '{}'. Must be disabled or deepseek.",
            other
        ),
    }

    if config.admin.password.is_empty() {
        anyhow::bail!("admin.password must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("mfa.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.fetch.strategies, vec!["lookup", "scrape", "jsonp"]);
        assert_eq!(config.fetch.jsonp_timeout_secs, 10);
        assert!(!config.assistant.is_enabled());
        assert_eq!(config.admin.password, "admin123");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"
[store]
path = "/tmp/apps.json"

[fetch]
strategies = ["jsonp"]
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.store.path, PathBuf::from("/tmp/apps.json"));
        assert_eq!(config.fetch.strategies, vec!["jsonp"]);
        assert_eq!(config.fetch.country, "tr");
        assert_eq!(config.assistant.model, "deepseek-chat");
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "[fetch]\nstrategies = [\"carrier-pigeon\"]\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn test_rejects_out_of_range_temperature() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "[assistant]\ntemperature = 3.5\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "[assistant]\nprovider = \"oracle\"\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_example_config_is_valid() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, include_str!("../config/mfa.example.toml"));
        let config = load_config(&path).unwrap();
        assert_eq!(config.fetch.cors_proxies.len(), 3);
        assert_eq!(config.assistant.max_retries, 2);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "[store\npath = 1");
        assert!(load_config(&path).is_err());
    }
}
