use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Email of the bootstrap administrator account, created on first start
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    /// Password of the bootstrap administrator account
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    /// Static API token granting admin access (for automation)
    #[serde(default = "default_admin_token")]
    pub admin_token: String,
    /// Session lifetime in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_email: default_admin_email(),
            admin_password: default_admin_password(),
            admin_token: default_admin_token(),
            session_days: default_session_days(),
        }
    }
}

fn default_admin_email() -> String {
    "admin@clinicore.local".to_string()
}

fn default_admin_password() -> String {
    // Random password if not provided; printed once at startup
    uuid::Uuid::new_v4().to_string()
}

fn default_admin_token() -> String {
    // Generate a random token if not provided
    uuid::Uuid::new_v4().to_string()
}

fn default_session_days() -> i64 {
    7
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    /// Seconds a presence lease stays valid without a heartbeat (default: 60)
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl_secs: u64,
    /// Interval between sweeps for expired leases in seconds (default: 15)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            lease_ttl_secs: default_lease_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_lease_ttl() -> u64 {
    60
}

fn default_sweep_interval() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Enable the text-generation helpers (summaries, billing suggestions)
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible completion endpoint
    pub base_url: Option<String>,
    /// API key for the completion endpoint
    pub api_key: Option<String>,
    #[serde(default = "default_ai_model")]
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            api_key: None,
            model: default_ai_model(),
        }
    }
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.session_days, 7);
        assert_eq!(config.presence.lease_ttl_secs, 60);
        assert!(!config.ai.enabled);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9090

            [ai]
            enabled = true
            base_url = "https://llm.internal.example"
            api_key = "sk-test"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.ai.enabled);
        assert_eq!(
            config.ai.base_url.as_deref(),
            Some("https://llm.internal.example")
        );
        // Unset sections fall back to defaults
        assert_eq!(config.presence.sweep_interval_secs, 15);
    }
}
