use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Remote search endpoint. Absent means local substring search.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_action")]
    pub action: String,
    /// Credential passed through to the endpoint, if any.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            action: default_action(),
            token: None,
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_action() -> String {
    "wp_pfg_search".to_string()
}
fn default_debounce_ms() -> u64 {
    250
}

impl SearchConfig {
    pub fn is_remote(&self) -> bool {
        self.endpoint
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Nonce the reference endpoint requires, if any.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            token: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Defaults used when no config file is present: local search, 250ms debounce.
    pub fn minimal() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if self.search.token.is_none() {
            if let Ok(token) = std::env::var("PFG_SEARCH_TOKEN") {
                if !token.trim().is_empty() {
                    self.search.token = Some(token);
                }
            }
        }
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.apply_env();

    if config.search.debounce_ms == 0 {
        anyhow::bail!("search.debounce_ms must be > 0");
    }
    if config.search.debounce_ms > 10_000 {
        anyhow::bail!("search.debounce_ms must be <= 10000");
    }
    if config.search.action.trim().is_empty() {
        anyhow::bail!("search.action must not be empty");
    }
    if let Some(endpoint) = config.search.endpoint.as_deref() {
        let endpoint = endpoint.trim();
        if !endpoint.is_empty() {
            reqwest::Url::parse(endpoint)
                .with_context(|| format!("search.endpoint is not a valid URL: {}", endpoint))?;
        }
    }
    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert!(!config.search.is_remote());
        assert_eq!(config.search.debounce(), Duration::from_millis(250));
        assert_eq!(config.search.action, "wp_pfg_search");
        assert_eq!(config.server.bind, "127.0.0.1:7341");
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_remote_search_config() {
        let config = parse_config(
            r#"
[search]
endpoint = "http://127.0.0.1:9000/search"
token = "n0nce"
debounce_ms = 100
"#,
        )
        .unwrap();
        assert!(config.search.is_remote());
        assert_eq!(config.search.token.as_deref(), Some("n0nce"));
        assert_eq!(config.search.debounce_ms, 100);
    }

    #[test]
    fn test_blank_endpoint_is_local() {
        let config = parse_config("[search]\nendpoint = \"  \"\n").unwrap();
        assert!(!config.search.is_remote());
    }

    #[test]
    fn test_rejects_zero_debounce() {
        let err = parse_config("[search]\ndebounce_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("debounce_ms"));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        assert!(parse_config("[search]\nendpoint = \"not a url\"\n").is_err());
    }
}
