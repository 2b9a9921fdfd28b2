use crate::auth::AuthConfig;
use crate::details::DetailSelectors;
use crate::fetcher::FetchConfig;
use crate::site::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StalkConfig {
    pub site: SiteConfig,
    pub auth: AuthSection,
    pub fetch: FetchSection,
    pub browser: BrowserConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Login page, relative to the site base URL unless absolute.
    pub login_path: String,
    pub username_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
    pub session_cookie: String,
    pub poll_interval_ms: u64,
    pub element_timeout_ms: u64,
}

impl Default for AuthSection {
    fn default() -> Self {
        let defaults = AuthConfig::default();
        Self {
            login_path: "accounts/login/".into(),
            username_selector: defaults.username_selector,
            password_selector: defaults.password_selector,
            submit_selector: defaults.submit_selector,
            session_cookie: defaults.session_cookie,
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
            element_timeout_ms: defaults.element_timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    pub timeout_ms: u64,
    pub submission_details: bool,
    pub language_selector: String,
    pub problem_link_selector: String,
}

impl Default for FetchSection {
    fn default() -> Self {
        let selectors = DetailSelectors::default();
        Self {
            timeout_ms: 60_000,
            submission_details: true,
            language_selector: selectors.language,
            problem_link_selector: selectors.problem_link,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub visible: bool,
    /// Chromium binary; falls back to the `CHROME_BIN` environment variable.
    pub executable: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9100,
        }
    }
}

impl StalkConfig {
    pub fn auth_config(&self) -> AuthConfig {
        let auth = &self.auth;
        let login_url = if auth.login_path.contains("://") {
            auth.login_path.clone()
        } else {
            format!(
                "{}/{}",
                self.site.base_url.trim_end_matches('/'),
                auth.login_path.trim_start_matches('/')
            )
        };
        AuthConfig {
            login_url,
            username_selector: auth.username_selector.clone(),
            password_selector: auth.password_selector.clone(),
            submit_selector: auth.submit_selector.clone(),
            session_cookie: auth.session_cookie.clone(),
            poll_interval: Duration::from_millis(auth.poll_interval_ms),
            element_timeout: Duration::from_millis(auth.element_timeout_ms),
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_millis(self.fetch.timeout_ms),
            submission_details: self.fetch.submission_details,
            detail_selectors: DetailSelectors {
                language: self.fetch.language_selector.clone(),
                problem_link: self.fetch.problem_link_selector.clone(),
                element_timeout: Duration::from_millis(self.auth.element_timeout_ms),
            },
        }
    }
}
