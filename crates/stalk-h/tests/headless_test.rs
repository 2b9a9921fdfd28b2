use serial_test::serial;
use stalk_engine::protocol::NetworkEvent;
use stalk_engine::session::{BrowserSession, SessionError};
use stalk_h::HeadlessSession;
use std::time::Duration;

/// Launch a browser, or `None` when the environment has no Chromium.
async fn launch() -> Option<HeadlessSession> {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::INFO)
        .try_init()
        .ok();

    let mut session = HeadlessSession::default();
    match session.launch().await {
        Ok(()) => Some(session),
        Err(e) => {
            eprintln!("Failed to launch browser (is Chromium installed?): {}", e);
            None
        }
    }
}

const LOGIN_PAGE: &str = "data:text/html,<html><head><title>Sign in</title></head><body>\
<input name='login'><input name='password' type='password'>\
<button id='signin_btn' disabled>Sign In</button></body></html>";

#[tokio::test]
#[serial]
async fn test_form_primitives() {
    let Some(mut session) = launch().await else {
        return;
    };

    let nav = session.navigate(LOGIN_PAGE).await.expect("Navigation failed");
    assert_eq!(nav.title, "Sign in");

    session
        .wait_until_interactable("input[name='login']", Duration::from_secs(2))
        .await
        .expect("login field never became interactable");
    session
        .send_keys("input[name='login']", "alice")
        .await
        .expect("send_keys failed");
    let typed = session
        .evaluate("document.querySelector(\"input[name='login']\").value")
        .await
        .unwrap();
    assert_eq!(typed, "alice");

    let err = session
        .wait_until_interactable("button#signin_btn", Duration::from_millis(300))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::ElementNotInteractable { .. }));

    let err = session
        .wait_until_interactable("#nope", Duration::from_millis(300))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::ElementNotFound { .. }));

    // Statements without a value evaluate to null.
    let value = session.evaluate("void 0").await.unwrap();
    assert!(value.is_null());

    session.close().await.expect("close failed");
}

#[tokio::test]
#[serial]
async fn test_network_events_and_response_body() {
    let Some(mut session) = launch().await else {
        return;
    };

    let page = "data:text/html,<html><body><script>\
fetch('data:application/json,{\"ok\":true}', {method: 'GET'});\
</script></body></html>";

    let mut events = session.subscribe().await.expect("subscribe failed");
    session.navigate(page).await.expect("Navigation failed");

    let mut seen_sent = false;
    let finished = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            match event {
                NetworkEvent::RequestSent { .. } => seen_sent = true,
                NetworkEvent::LoadingFinished { request_id } => return Some(request_id),
                NetworkEvent::ResponseReceived { .. } => {}
            }
        }
        None
    })
    .await
    .ok()
    .flatten();

    if let Some(request_id) = finished {
        assert!(seen_sent, "loading finished before any request was reported");
        // Bodies of finished requests are readable while the page is still loaded.
        let _ = session.get_response_body(&request_id).await;
    }

    drop(events);
    session.close().await.expect("close failed");
}
