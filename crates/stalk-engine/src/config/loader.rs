use super::schema::StalkConfig;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const BASE_URL_VAR: &str = "STALK_BASE_URL";
pub const SERVER_HOST_VAR: &str = "STALK_SERVER_HOST";
pub const SERVER_PORT_VAR: &str = "STALK_SERVER_PORT";
pub const FETCH_TIMEOUT_VAR: &str = "STALK_FETCH_TIMEOUT_MS";
pub const SUBMISSION_DETAILS_VAR: &str = "STALK_SUBMISSION_DETAILS";
pub const VISIBLE_VAR: &str = "STALK_VISIBLE";
pub const BROWSER_VAR: &str = "STALK_BROWSER";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations, then apply `STALK_*` overrides:
    /// 1. ./stalk.yaml
    /// 2. ~/.stalk/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<StalkConfig, ConfigError> {
        let config = Self::find_file().await?;
        Self::apply_env(config, env_var)
    }

    pub async fn load_from(path: &Path) -> Result<StalkConfig, ConfigError> {
        let config = Self::read_file(path).await?;
        Self::apply_env(config, env_var)
    }

    async fn find_file() -> Result<StalkConfig, ConfigError> {
        let local_config = PathBuf::from("./stalk.yaml");
        if local_config.exists() {
            return Self::read_file(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".stalk").join("config.yaml");
            if home_config.exists() {
                return Self::read_file(&home_config).await;
            }
        }

        Ok(StalkConfig::default())
    }

    async fn read_file(path: &Path) -> Result<StalkConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: StalkConfig = serde_yaml::from_str(&content)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Override file values with whatever `lookup` resolves. Blank values
    /// are ignored.
    pub fn apply_env(
        mut config: StalkConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<StalkConfig, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(BASE_URL_VAR) {
            config.site.base_url = url;
        }
        if let Some(host) = get(SERVER_HOST_VAR) {
            config.server.host = host;
        }
        if let Some(port) = get(SERVER_PORT_VAR) {
            config.server.port = parse(SERVER_PORT_VAR, port)?;
        }
        if let Some(ms) = get(FETCH_TIMEOUT_VAR) {
            config.fetch.timeout_ms = parse(FETCH_TIMEOUT_VAR, ms)?;
        }
        if let Some(flag) = get(SUBMISSION_DETAILS_VAR) {
            config.fetch.submission_details = parse_flag(SUBMISSION_DETAILS_VAR, flag)?;
        }
        if let Some(flag) = get(VISIBLE_VAR) {
            config.browser.visible = parse_flag(VISIBLE_VAR, flag)?;
        }
        if let Some(path) = get(BROWSER_VAR) {
            config.browser.executable = Some(path);
        }
        Ok(config)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { var, value }),
    }
}
