use async_trait::async_trait;
pub use stalk_common::error::SessionError;
use stalk_common::protocol::{Cookie, NetworkEvent, RequestId};
use std::time::Duration;
use tokio::sync::mpsc;

/// Receiving end of a network-event subscription. Dropping it unsubscribes.
pub type NetworkEventStream = mpsc::UnboundedReceiver<NetworkEvent>;

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
    pub status: u16, // generic status code (e.g. 200)
}

/// The browser capability everything in the engine is written against.
///
/// Implementations drive one page. Primitives are not safe to interleave, so
/// callers hold exclusive access (`&mut self`) for the duration of a sequence.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Launch the browser and open the page.
    async fn launch(&mut self) -> Result<(), SessionError>;

    /// Close the browser and cleanup resources.
    async fn close(&mut self) -> Result<(), SessionError>;

    /// Check if the session is ready to accept commands.
    async fn is_ready(&self) -> bool;

    /// Navigate the page to `url`.
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, SessionError>;

    /// Wait until an element matching `selector` can receive input.
    async fn wait_until_interactable(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), SessionError>;

    /// Type `text` into the element matching `selector`.
    async fn send_keys(&mut self, selector: &str, text: &str) -> Result<(), SessionError>;

    /// Evaluate a script in the page and return its value.
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, SessionError>;

    /// Get all cookies visible to the page.
    async fn get_cookies(&mut self) -> Result<Vec<Cookie>, SessionError>;

    /// Open a new subscription to the page's network events.
    ///
    /// Events are delivered in the order the browser reports them. Only events
    /// emitted after this call returns are guaranteed to be delivered.
    async fn subscribe(&mut self) -> Result<NetworkEventStream, SessionError>;

    /// Fetch the response body of a request observed on the current page.
    async fn get_response_body(&mut self, request_id: &RequestId)
    -> Result<Vec<u8>, SessionError>;
}
