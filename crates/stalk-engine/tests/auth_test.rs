mod common;

use common::*;
use stalk_engine::auth::{AuthConfig, AuthError, AuthState, Authenticator, Credentials};
use stalk_engine::deadline::{CancelHandle, Deadline};
use std::time::Duration;

fn fast_config() -> AuthConfig {
    AuthConfig {
        poll_interval: Duration::from_millis(10),
        element_timeout: Duration::from_secs(1),
        ..AuthConfig::default()
    }
}

fn authenticator() -> Authenticator {
    Authenticator::new(Credentials::new("alice", "s3cret"), fast_config())
}

#[tokio::test]
async fn test_login_sequence_reaches_session_established() {
    let mut session = MockSession::with_state(|s| s.cookie_on_poll = Some(3));
    let mut auth = authenticator();
    assert_eq!(auth.state(), AuthState::Start);

    auth.ensure_session(&mut session, &Deadline::after(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(auth.state(), AuthState::SessionEstablished);

    let calls = session.calls();
    let cfg = AuthConfig::default();
    assert_eq!(
        &calls[..7],
        &[
            Call::Navigate(LOGIN_URL.into()),
            Call::WaitFor(cfg.username_selector.clone()),
            Call::SendKeys(cfg.username_selector.clone(), "alice".into()),
            Call::WaitFor(cfg.password_selector.clone()),
            Call::SendKeys(cfg.password_selector.clone(), "s3cret".into()),
            Call::WaitFor(cfg.submit_selector.clone()),
            Call::Evaluate(r#"document.querySelector("button#signin_btn").click()"#.into()),
        ]
    );
    assert_eq!(session.count(|c| *c == Call::GetCookies), 3);
}

#[tokio::test]
async fn test_established_session_is_not_resubmitted() {
    let mut session = MockSession::with_state(|s| s.cookie_on_poll = Some(1));
    let mut auth = authenticator();
    let deadline = Deadline::after(Duration::from_secs(5));

    auth.ensure_session(&mut session, &deadline).await.unwrap();
    let calls_after_login = session.calls().len();

    auth.ensure_session(&mut session, &deadline).await.unwrap();
    auth.ensure_session(&mut session, &deadline).await.unwrap();

    assert_eq!(session.calls().len(), calls_after_login);
    assert_eq!(
        session.count(|c| matches!(c, Call::SendKeys(_, _))),
        2,
        "credentials were submitted more than once"
    );
    assert_eq!(auth.state(), AuthState::SessionEstablished);
}

#[tokio::test]
async fn test_missing_field_fails_without_retry() {
    let mut session = MockSession::with_state(|s| {
        s.cookie_on_poll = Some(1);
        s.missing_selectors.insert(AuthConfig::default().password_selector);
    });
    let mut auth = authenticator();

    let err = auth
        .ensure_session(&mut session, &Deadline::after(Duration::from_secs(5)))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Step { step: "wait for password", .. }));
    assert_eq!(auth.state(), AuthState::Failed);
    assert_eq!(session.count(|c| matches!(c, Call::Navigate(_))), 1);
    assert_eq!(session.count(|c| *c == Call::GetCookies), 0);
}

#[tokio::test]
async fn test_cookie_poll_times_out() {
    let mut session = MockSession::new();
    let mut auth = authenticator();

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        auth.ensure_session(&mut session, &Deadline::after(Duration::from_millis(80))),
    )
    .await
    .expect("cookie poll ignored its deadline")
    .unwrap_err();

    assert!(matches!(err, AuthError::Timeout(ref name) if name == "LEETCODE_SESSION"));
    assert_eq!(auth.state(), AuthState::Failed);
    assert!(session.count(|c| *c == Call::GetCookies) >= 2);
}

#[tokio::test]
async fn test_deadline_during_form_is_not_a_cookie_timeout() {
    let mut session = MockSession::with_state(|s| {
        s.cookie_on_poll = Some(1);
        s.navigate_delay = Some(Duration::from_secs(2));
    });
    let mut auth = authenticator();

    let err = auth
        .ensure_session(&mut session, &Deadline::after(Duration::from_millis(80)))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::SubmitTimeout(ref url) if url == LOGIN_URL));
    assert!(!err.to_string().contains("cookie"));
    assert_eq!(auth.state(), AuthState::Failed);
    assert_eq!(session.count(|c| *c == Call::GetCookies), 0);
}

#[tokio::test]
async fn test_cookie_poll_is_cancellable() {
    let mut session = MockSession::new();
    let cancel = CancelHandle::new();
    let deadline = Deadline::after(Duration::from_secs(60)).with_cancel(&cancel);

    let task = tokio::spawn(async move {
        let mut auth = authenticator();
        let res = auth.ensure_session(&mut session, &deadline).await;
        (res, auth.state())
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let (res, state) = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("cancel did not stop the poll")
        .unwrap();
    assert!(matches!(res, Err(AuthError::Cancelled)));
    assert_eq!(state, AuthState::Failed);
}

#[tokio::test]
async fn test_failed_login_can_be_retried_by_caller() {
    let mut session = MockSession::new();
    let mut auth = authenticator();

    let res = auth
        .ensure_session(&mut session, &Deadline::after(Duration::from_millis(50)))
        .await;
    assert!(res.is_err());
    assert_eq!(auth.state(), AuthState::Failed);

    session.state.lock().unwrap().cookie_on_poll = Some(1);
    auth.ensure_session(&mut session, &Deadline::after(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(auth.state(), AuthState::SessionEstablished);
    assert_eq!(session.count(|c| matches!(c, Call::Navigate(_))), 2);
}
