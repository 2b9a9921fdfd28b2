//! Forwarding of DevTools network events into engine [`NetworkEvent`]s.

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived, GetRequestPostDataParams,
};
use futures::StreamExt;
use stalk_engine::protocol::{NetworkEvent, RequestId};
use stalk_engine::session::{NetworkEventStream, SessionError};
use tokio::sync::mpsc;

/// Subscribe to the page's request lifecycle and forward it on one channel.
///
/// The three DevTools streams are drained by a single task that always
/// prefers request-sent over response-received over loading-finished, so a
/// request is reported before its completion. The task exits once the
/// receiver is dropped.
pub async fn forward_network_events(page: &Page) -> Result<NetworkEventStream, SessionError> {
    let mut sent = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(|e| SessionError::Subscription(e.to_string()))?;
    let mut received = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(|e| SessionError::Subscription(e.to_string()))?;
    let mut finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(|e| SessionError::Subscription(e.to_string()))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let page = page.clone();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = tx.closed() => break,
                Some(event) = sent.next() => {
                    let request_id = RequestId::new(event.request_id.inner().clone());
                    let payload = match &event.request.post_data {
                        Some(data) => Some(data.clone()),
                        None if event.request.has_post_data == Some(true) => {
                            fetch_post_data(&page, &event.request_id).await
                        }
                        None => None,
                    };
                    NetworkEvent::RequestSent {
                        request_id,
                        url: event.request.url.clone(),
                        payload,
                    }
                }
                Some(event) = received.next() => NetworkEvent::ResponseReceived {
                    request_id: RequestId::new(event.request_id.inner().clone()),
                },
                Some(event) = finished.next() => NetworkEvent::LoadingFinished {
                    request_id: RequestId::new(event.request_id.inner().clone()),
                },
                else => break,
            };

            if tx.send(event).is_err() {
                break;
            }
        }
        tracing::debug!("Network event forwarder ended");
    });

    Ok(rx)
}

// Large request bodies are left out of the event and have to be asked for.
async fn fetch_post_data(
    page: &Page,
    request_id: &chromiumoxide::cdp::browser_protocol::network::RequestId,
) -> Option<String> {
    match page
        .execute(GetRequestPostDataParams::new(request_id.clone()))
        .await
    {
        Ok(response) => Some(response.result.post_data),
        Err(e) => {
            tracing::debug!("No post data for {}: {}", request_id.inner(), e);
            None
        }
    }
}
