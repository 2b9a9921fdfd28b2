#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use stalk_engine::protocol::{Cookie, NetworkEvent, RequestId};
use stalk_engine::session::{BrowserSession, NavigationResult, NetworkEventStream, SessionError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Navigate(String),
    WaitFor(String),
    SendKeys(String, String),
    Evaluate(String),
    GetCookies,
    Subscribe,
    GetResponseBody(String),
}

#[derive(Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    pub subscribers: Vec<mpsc::UnboundedSender<NetworkEvent>>,
    /// Events emitted synchronously when the given URL is navigated to.
    pub scripts: HashMap<String, Vec<NetworkEvent>>,
    pub bodies: HashMap<String, Vec<u8>>,
    /// The session cookie appears on this poll (1-based); `None` means never.
    pub cookie_on_poll: Option<usize>,
    pub cookie_polls: usize,
    pub missing_selectors: HashSet<String>,
    pub failing_urls: HashSet<String>,
    /// `(needle, value)`: scripts containing `needle` evaluate to `value`.
    pub evaluations: Vec<(String, Value)>,
    /// Navigation takes this long before returning.
    pub navigate_delay: Option<Duration>,
}

/// Scripted in-memory browser session. Clones share state, so a test can keep
/// a handle after boxing the session into a `Fetcher`.
#[derive(Clone, Default)]
pub struct MockSession {
    pub state: Arc<Mutex<MockState>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(f: impl FnOnce(&mut MockState)) -> Self {
        let session = Self::new();
        f(&mut session.state.lock().unwrap());
        session
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    /// Push an event to every live subscriber.
    pub fn emit(&self, event: NetworkEvent) {
        let mut state = self.state.lock().unwrap();
        state
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn close_streams(&self) {
        self.state.lock().unwrap().subscribers.clear();
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn launch(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.close_streams();
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        true
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, SessionError> {
        let delay = self.state.lock().unwrap().navigate_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let events = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Navigate(url.to_string()));
            if state.failing_urls.contains(url) {
                return Err(SessionError::Navigation(format!("net::ERR_FAILED {}", url)));
            }
            state.scripts.get(url).cloned().unwrap_or_default()
        };
        for event in events {
            self.emit(event);
        }
        Ok(NavigationResult {
            url: url.to_string(),
            title: String::new(),
            status: 200,
        })
    }

    async fn wait_until_interactable(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::WaitFor(selector.to_string()));
        if state.missing_selectors.contains(selector) {
            return Err(SessionError::Timeout {
                operation: format!("wait for {}", selector),
            });
        }
        Ok(())
    }

    async fn send_keys(&mut self, selector: &str, text: &str) -> Result<(), SessionError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(Call::SendKeys(selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, SessionError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Evaluate(script.to_string()));
        Ok(state
            .evaluations
            .iter()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Null))
    }

    async fn get_cookies(&mut self) -> Result<Vec<Cookie>, SessionError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::GetCookies);
        state.cookie_polls += 1;
        match state.cookie_on_poll {
            Some(n) if state.cookie_polls >= n => Ok(vec![
                Cookie::new("csrftoken", "x"),
                Cookie::new("LEETCODE_SESSION", "session-token"),
            ]),
            _ => Ok(vec![Cookie::new("csrftoken", "x")]),
        }
    }

    async fn subscribe(&mut self) -> Result<NetworkEventStream, SessionError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Subscribe);
        state.subscribers.push(tx);
        Ok(rx)
    }

    async fn get_response_body(
        &mut self,
        request_id: &RequestId,
    ) -> Result<Vec<u8>, SessionError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::GetResponseBody(request_id.to_string()));
        state
            .bodies
            .get(request_id.as_str())
            .cloned()
            .ok_or_else(|| SessionError::ResponseBody {
                request_id: request_id.to_string(),
                reason: "No resource with given identifier found".into(),
            })
    }
}

// ============================================================
// Event & Payload Fixtures
// ============================================================

pub fn sent(id: &str, payload: &str) -> NetworkEvent {
    NetworkEvent::RequestSent {
        request_id: RequestId::new(id),
        url: "https://leetcode.com/graphql/".into(),
        payload: Some(payload.into()),
    }
}

pub fn received(id: &str) -> NetworkEvent {
    NetworkEvent::ResponseReceived {
        request_id: RequestId::new(id),
    }
}

pub fn finished(id: &str) -> NetworkEvent {
    NetworkEvent::LoadingFinished {
        request_id: RequestId::new(id),
    }
}

pub const SUBMISSIONS_QUERY: &str =
    r#"{"query":"query recentAcSubmissions($username: String!, $limit: Int!) { ... }","variables":{"username":"alice","limit":15},"operationName":"recentAcSubmissions"}"#;
pub const CONTEST_QUERY: &str =
    r#"{"query":"query userContestRankingInfo($username: String!) { ... }","variables":{"username":"alice"},"operationName":"userContestRankingInfo"}"#;
pub const OTHER_QUERY: &str =
    r#"{"query":"query userProfileCalendar($username: String!) { ... }","operationName":"userProfileCalendar"}"#;

pub fn submissions_body() -> Vec<u8> {
    json!({
        "data": {
            "recentAcSubmissionList": [
                { "id": "764090438", "title": "Two Sum", "titleSlug": "two-sum", "timestamp": "1660000000" },
                { "id": "764000001", "title": "Add Two Numbers", "titleSlug": "add-two-numbers", "timestamp": "1659990000" }
            ]
        }
    })
    .to_string()
    .into_bytes()
}

pub fn contests_body() -> Vec<u8> {
    json!({
        "data": {
            "userContestRanking": {
                "attendedContestsCount": 2,
                "rating": 1612.4,
                "globalRanking": 51234,
                "totalParticipants": 400000,
                "topPercentage": 12.8,
                "badge": null
            },
            "userContestRankingHistory": [
                {
                    "attended": true, "trendDirection": "UP", "problemsSolved": 3, "totalProblems": 4,
                    "finishTimeInSeconds": 4200, "rating": 1580.2, "ranking": 3021,
                    "contest": { "title": "Weekly Contest 300", "startTime": 1656815400 }
                },
                {
                    "attended": false, "trendDirection": "NONE", "problemsSolved": 0, "totalProblems": 4,
                    "finishTimeInSeconds": 0, "rating": 1580.2, "ranking": 0,
                    "contest": { "title": "Weekly Contest 301", "startTime": 1657420200 }
                },
                {
                    "attended": true, "trendDirection": "DOWN", "problemsSolved": 2, "totalProblems": 4,
                    "finishTimeInSeconds": 5400, "rating": 1612.4, "ranking": 8120,
                    "contest": { "title": "Biweekly Contest 83", "startTime": 1658025000 }
                }
            ]
        }
    })
    .to_string()
    .into_bytes()
}

pub const PROFILE_URL: &str = "https://leetcode.com/alice/";
pub const LOGIN_URL: &str = "https://leetcode.com/accounts/login/";

/// A session whose login succeeds on the first cookie poll and whose profile
/// page issues both tracked requests.
pub fn scripted_profile_session() -> MockSession {
    MockSession::with_state(|state| {
        state.cookie_on_poll = Some(1);
        state.scripts.insert(
            PROFILE_URL.into(),
            vec![
                sent("1000.1", OTHER_QUERY),
                sent("1000.2", SUBMISSIONS_QUERY),
                sent("1000.3", CONTEST_QUERY),
                received("1000.2"),
                finished("1000.1"),
                received("1000.3"),
                finished("1000.3"),
                finished("1000.2"),
            ],
        );
        state.bodies.insert("1000.2".into(), submissions_body());
        state.bodies.insert("1000.3".into(), contests_body());
    })
}
