//! Login state machine.
//!
//! `Start -> CredentialsSubmitted -> SessionEstablished`, with `Failed` as the
//! terminal state of an unsuccessful attempt. Nothing is retried here: a
//! repeated form submission has side effects, so the caller decides whether to
//! call [`Authenticator::ensure_session`] again.

use crate::deadline::{Deadline, Interrupted};
use crate::session::{BrowserSession, SessionError};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Start,
    CredentialsSubmitted,
    SessionEstablished,
    Failed,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Login step '{step}' failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: SessionError,
    },

    #[error("Failed to read cookies: {0}")]
    Cookies(#[source] SessionError),

    #[error("Timed out waiting for session cookie '{0}'")]
    Timeout(String),

    #[error("Timed out submitting the login form at {0}")]
    SubmitTimeout(String),

    #[error("Login cancelled")]
    Cancelled,
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub login_url: String,
    pub username_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
    /// Cookie whose presence means the login went through.
    pub session_cookie: String,
    pub poll_interval: Duration,
    /// Upper bound for each wait on a form field.
    pub element_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_url: "https://leetcode.com/accounts/login/".into(),
            username_selector: "input[name='login']".into(),
            password_selector: "input[name='password']".into(),
            submit_selector: "button#signin_btn".into(),
            session_cookie: "LEETCODE_SESSION".into(),
            poll_interval: Duration::from_secs(2),
            element_timeout: Duration::from_secs(30),
        }
    }
}

pub struct Authenticator {
    credentials: Credentials,
    config: AuthConfig,
    state: AuthState,
}

impl Authenticator {
    pub fn new(credentials: Credentials, config: AuthConfig) -> Self {
        Self {
            credentials,
            config,
            state: AuthState::Start,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Log in unless the session is already established.
    pub async fn ensure_session<S: BrowserSession + ?Sized>(
        &mut self,
        session: &mut S,
        deadline: &Deadline,
    ) -> Result<(), AuthError> {
        if self.state == AuthState::SessionEstablished {
            debug!("Session already established, skipping login");
            return Ok(());
        }

        self.state = AuthState::Start;
        let result = self.login(session, deadline).await;
        if result.is_err() {
            self.state = AuthState::Failed;
        }
        result
    }

    async fn login<S: BrowserSession + ?Sized>(
        &mut self,
        session: &mut S,
        deadline: &Deadline,
    ) -> Result<(), AuthError> {
        info!("Logging in as {}", self.credentials.username);
        match deadline.run(self.submit_credentials(session, deadline)).await {
            Ok(result) => result?,
            Err(Interrupted::TimedOut) => {
                return Err(AuthError::SubmitTimeout(self.config.login_url.clone()));
            }
            Err(Interrupted::Cancelled) => return Err(AuthError::Cancelled),
        }
        self.state = AuthState::CredentialsSubmitted;

        info!("Credentials submitted, waiting for session cookie");
        match deadline.run(self.poll_session_cookie(session)).await {
            Ok(result) => result?,
            Err(interrupted) => return Err(self.interrupted(interrupted)),
        }
        self.state = AuthState::SessionEstablished;
        info!("Session established");
        Ok(())
    }

    async fn submit_credentials<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        deadline: &Deadline,
    ) -> Result<(), AuthError> {
        let cfg = &self.config;
        let step =
            |step: &'static str| move |source: SessionError| AuthError::Step { step, source };
        let field_timeout = cfg.element_timeout.min(deadline.remaining());

        session
            .navigate(&cfg.login_url)
            .await
            .map_err(step("navigate"))?;

        session
            .wait_until_interactable(&cfg.username_selector, field_timeout)
            .await
            .map_err(step("wait for username"))?;
        session
            .send_keys(&cfg.username_selector, &self.credentials.username)
            .await
            .map_err(step("enter username"))?;

        session
            .wait_until_interactable(&cfg.password_selector, field_timeout)
            .await
            .map_err(step("wait for password"))?;
        session
            .send_keys(&cfg.password_selector, &self.credentials.password)
            .await
            .map_err(step("enter password"))?;

        session
            .wait_until_interactable(&cfg.submit_selector, field_timeout)
            .await
            .map_err(step("wait for submit"))?;
        session
            .evaluate(&click_script(&cfg.submit_selector))
            .await
            .map_err(step("submit"))?;

        Ok(())
    }

    async fn poll_session_cookie<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
    ) -> Result<(), AuthError> {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            ticker.tick().await;
            let cookies = session.get_cookies().await.map_err(AuthError::Cookies)?;
            if cookies.iter().any(|c| c.name == self.config.session_cookie) {
                return Ok(());
            }
            debug!("Session cookie '{}' not set yet", self.config.session_cookie);
        }
    }

    fn interrupted(&self, interrupted: Interrupted) -> AuthError {
        match interrupted {
            Interrupted::TimedOut => AuthError::Timeout(self.config.session_cookie.clone()),
            Interrupted::Cancelled => AuthError::Cancelled,
        }
    }
}

fn click_script(selector: &str) -> String {
    // A JSON string literal is a valid JS string literal.
    let quoted = serde_json::Value::String(selector.to_string()).to_string();
    format!("document.querySelector({}).click()", quoted)
}
