use crate::cdp::CdpClient;
use crate::events::forward_network_events;
use crate::inject;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{self, GetResponseBodyParams};
use stalk_engine::protocol::{Cookie, RequestId};
use stalk_engine::session::{BrowserSession, NavigationResult, NetworkEventStream, SessionError};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Interval between element readiness checks.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub visible: bool,
    pub executable: Option<PathBuf>,
}

pub struct HeadlessSession {
    client: Option<CdpClient>,
    options: LaunchOptions,
}

impl HeadlessSession {
    pub fn new(options: LaunchOptions) -> Self {
        Self {
            client: None,
            options,
        }
    }

    pub fn get_client(&self) -> Option<&CdpClient> {
        self.client.as_ref()
    }

    fn page(&self) -> Result<&chromiumoxide::Page, SessionError> {
        self.client
            .as_ref()
            .map(|c| &c.page)
            .ok_or(SessionError::NotReady)
    }

    async fn get_navigation_result(
        page: &chromiumoxide::Page,
    ) -> Result<NavigationResult, SessionError> {
        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| SessionError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult {
            url,
            title,
            status: 200,
        })
    }
}

impl Default for HeadlessSession {
    fn default() -> Self {
        Self::new(LaunchOptions::default())
    }
}

/// Readiness of the first element matching a selector, as reported by the page.
fn readiness_script(selector: &str) -> String {
    let quoted = serde_json::Value::String(selector.to_string()).to_string();
    format!(
        r#"(() => {{
    const el = document.querySelector({});
    if (!el) return "missing";
    if (el.disabled) return "disabled";
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    if (rect.width === 0 || rect.height === 0 || style.visibility === "hidden" || style.display === "none") return "hidden";
    return "ready";
}})()"#,
        quoted
    )
}

#[async_trait]
impl BrowserSession for HeadlessSession {
    async fn launch(&mut self) -> Result<(), SessionError> {
        info!("Launching headless session (Chromium)...");
        let client = CdpClient::launch(&self.options)
            .await
            .map_err(|e| SessionError::Other(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| SessionError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, SessionError> {
        let page = self.page()?;

        info!("Navigating to: {}", url);
        page.goto(url)
            .await
            .map_err(|e| SessionError::Navigation(e.to_string()))?;

        Self::get_navigation_result(page).await
    }

    async fn wait_until_interactable(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let page = self.page()?;
        let script = readiness_script(selector);
        let give_up = Instant::now() + timeout;

        loop {
            let state = inject::evaluate(page, &script).await?;
            let state = state.as_str().unwrap_or("missing");
            if state == "ready" {
                return Ok(());
            }
            if Instant::now() >= give_up {
                debug!("{} still {} after {:?}", selector, state, timeout);
                return Err(match state {
                    "missing" => SessionError::ElementNotFound {
                        selector: selector.to_string(),
                    },
                    reason => SessionError::ElementNotInteractable {
                        selector: selector.to_string(),
                        reason: reason.to_string(),
                    },
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    async fn send_keys(&mut self, selector: &str, text: &str) -> Result<(), SessionError> {
        let page = self.page()?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|_| SessionError::ElementNotFound {
                selector: selector.to_string(),
            })?;

        let not_interactable = |e: chromiumoxide::error::CdpError| {
            SessionError::ElementNotInteractable {
                selector: selector.to_string(),
                reason: e.to_string(),
            }
        };
        element.click().await.map_err(not_interactable)?;
        element.type_str(text).await.map_err(not_interactable)?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, SessionError> {
        inject::evaluate(self.page()?, script).await
    }

    async fn get_cookies(&mut self) -> Result<Vec<Cookie>, SessionError> {
        let cookies = self
            .page()?
            .get_cookies()
            .await
            .map_err(|e| SessionError::Other(format!("Get cookies failed: {}", e)))?;

        Ok(cookies
            .into_iter()
            .map(|c| Cookie {
                name: c.name,
                value: c.value,
                domain: Some(c.domain),
                path: Some(c.path),
                expires: Some(c.expires),
                http_only: Some(c.http_only),
                secure: Some(c.secure),
            })
            .collect())
    }

    async fn subscribe(&mut self) -> Result<NetworkEventStream, SessionError> {
        forward_network_events(self.page()?).await
    }

    async fn get_response_body(
        &mut self,
        request_id: &RequestId,
    ) -> Result<Vec<u8>, SessionError> {
        let page = self.page()?;
        let response = page
            .execute(GetResponseBodyParams::new(network::RequestId::new(
                request_id.as_str(),
            )))
            .await
            .map_err(|e| SessionError::ResponseBody {
                request_id: request_id.to_string(),
                reason: e.to_string(),
            })?;

        let body = response.result;
        if body.base64_encoded {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(&body.body)
                .map_err(|e| SessionError::ResponseBody {
                    request_id: request_id.to_string(),
                    reason: format!("Invalid base64 body: {}", e),
                })
        } else {
            Ok(body.body.into_bytes())
        }
    }
}
