use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "newsdesk.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub oracle: OracleConfig,
    pub news: NewsConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "newsdesk.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3001".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Replace the remote oracle with the canned deterministic verdict.
    pub stand_in: bool,
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub stand_in_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            stand_in: false,
            api_key: None,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash-preview-09-2025".to_string(),
            stand_in_delay_ms: 2_000,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub country: String, // used by the national and city filters
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://gnews.io/api/v4".to_string(),
            country: "in".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_secret: Option<String>,
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Reads `path` when it exists (defaults otherwise), then applies the
    /// process environment on top.
    pub fn resolve(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(path) = lookup("DATABASE_URL") {
            self.database.path = path;
        }
        if let Some(bind) = lookup("NEWSDESK_BIND") {
            self.server.bind = bind;
        }
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.oracle.api_key = Some(key);
        }
        if let Some(flag) = lookup("MOCK_AI_VERIFICATION").and_then(|v| parse_bool(&v)) {
            self.oracle.stand_in = flag;
        }
        if let Some(key) = lookup("GNEWS_API_KEY") {
            self.news.api_key = Some(key);
        }
        if let Some(secret) = lookup("AUTH_TOKEN_SECRET") {
            self.auth.token_secret = Some(secret);
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [oracle]
            stand_in = true
            stand_in_delay_ms = 0
            "#,
        )
        .unwrap();
        assert!(config.oracle.stand_in);
        assert_eq!(config.oracle.stand_in_delay_ms, 0);
        assert_eq!(config.oracle.timeout_secs, 60);
        assert_eq!(config.database.path, "newsdesk.db");
        assert_eq!(config.news.country, "in");
        assert!(config.auth.token_secret.is_none());
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = AppConfig::from_toml_str(
            r#"
            [database]
            path = "from-file.db"

            [oracle]
            api_key = "file-key"
            "#,
        )
        .unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "from-env.db"),
            ("GEMINI_API_KEY", "env-key"),
            ("MOCK_AI_VERIFICATION", "true"),
            ("GNEWS_API_KEY", ""),
        ]);
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.database.path, "from-env.db");
        assert_eq!(config.oracle.api_key.as_deref(), Some("env-key"));
        assert!(config.oracle.stand_in);
        assert!(config.news.api_key.is_none());
    }

    #[test]
    fn unparseable_stand_in_flag_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(|name| (name == "MOCK_AI_VERIFICATION").then(|| "maybe".to_string()));
        assert!(!config.oracle.stand_in);
    }
}
