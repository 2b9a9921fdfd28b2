//! Network-response correlation.
//!
//! A page issues its data requests in the background after navigation, with
//! request ids that are only known once the browser reports them. The
//! correlator watches the session's network events, binds each
//! [`TrackedRequest`] to the first outgoing request whose payload it matches,
//! waits until every bound request has finished loading, and then pulls the
//! response bodies out of the session.
//!
//! The event-driven part lives in [`CorrelationState`], which is plain
//! synchronous code. [`arm`] runs it on a listener task and hands the result
//! back through a single-slot readiness signal (`oneshot`), so readiness is
//! delivered exactly once and the waiting side never touches shared counters.
//!
//! Matcher precedence: when a payload satisfies more than one unbound tracked
//! request, the one listed first by the caller wins.

use crate::deadline::{Deadline, Interrupted};
use crate::session::{BrowserSession, SessionError};
use stalk_common::protocol::{NetworkEvent, RequestId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub type PayloadMatcher = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Debug, Error)]
pub enum CorrelationError {
    #[error("Failed to subscribe to network events: {0}")]
    Subscribe(#[source] SessionError),

    #[error("Navigation that should trigger the tracked requests failed: {0}")]
    Trigger(#[source] SessionError),

    #[error("Tracked requests did not complete before the deadline: {pending:?}")]
    Timeout { pending: Vec<String> },

    #[error("Correlation cancelled")]
    Cancelled,

    #[error(
        "Tracked request '{name}' already bound to {bound}, saw another matching request {duplicate}"
    )]
    DuplicateRequest {
        name: String,
        bound: RequestId,
        duplicate: RequestId,
    },

    #[error("Network event stream closed before the tracked requests completed")]
    StreamClosed,

    #[error("Failed to retrieve response body for '{name}': {source}")]
    Retrieval {
        name: String,
        #[source]
        source: SessionError,
    },
}

/// A logical request of interest, identified by the content of its payload.
#[derive(Clone)]
pub struct TrackedRequest {
    name: String,
    matcher: PayloadMatcher,
}

impl TrackedRequest {
    pub fn new(
        name: impl Into<String>,
        matcher: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            matcher: Arc::new(matcher),
        }
    }

    /// Matches payloads containing `needle`.
    pub fn containing(name: impl Into<String>, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        Self::new(name, move |payload: &str| payload.contains(needle.as_str()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, payload: &str) -> bool {
        (self.matcher)(payload)
    }
}

impl fmt::Debug for TrackedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedRequest")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A tracked request together with the request id it was bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub request_id: RequestId,
}

/// What a single event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing relevant to the tracked requests.
    Ignored,
    /// A tracked request was bound to a request id.
    Bound { name: String, request_id: RequestId },
    /// A bound request finished; others are still outstanding.
    Finished { name: String },
    /// The last outstanding request finished. Reported exactly once.
    Ready,
}

/// Binding and completion bookkeeping for one fetch.
#[derive(Debug)]
pub struct CorrelationState {
    tracked: Vec<TrackedRequest>,
    bindings: Vec<Option<RequestId>>,
    /// Indices into `tracked` still awaiting `LoadingFinished`.
    outstanding: HashSet<usize>,
    signalled: bool,
}

impl CorrelationState {
    pub fn new(tracked: Vec<TrackedRequest>) -> Self {
        let outstanding = (0..tracked.len()).collect();
        let bindings = vec![None; tracked.len()];
        Self {
            tracked,
            bindings,
            outstanding,
            signalled: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outstanding.is_empty()
    }

    pub fn pending(&self) -> Vec<String> {
        let mut pending: Vec<usize> = self.outstanding.iter().copied().collect();
        pending.sort_unstable();
        pending
            .into_iter()
            .map(|idx| self.tracked[idx].name.clone())
            .collect()
    }

    pub fn binding(&self, name: &str) -> Option<&RequestId> {
        self.tracked
            .iter()
            .position(|t| t.name == name)
            .and_then(|idx| self.bindings[idx].as_ref())
    }

    /// Bound requests in caller order.
    pub fn bindings(&self) -> Vec<Binding> {
        self.tracked
            .iter()
            .zip(&self.bindings)
            .filter_map(|(tracked, id)| {
                id.as_ref().map(|request_id| Binding {
                    name: tracked.name.clone(),
                    request_id: request_id.clone(),
                })
            })
            .collect()
    }

    pub fn observe(&mut self, event: &NetworkEvent) -> Result<Transition, CorrelationError> {
        if self.signalled {
            return Ok(Transition::Ignored);
        }

        match event {
            NetworkEvent::RequestSent {
                request_id,
                payload: Some(payload),
                ..
            } => self.on_request_sent(request_id, payload),
            NetworkEvent::LoadingFinished { request_id } => {
                Ok(self.on_loading_finished(request_id))
            }
            _ => Ok(Transition::Ignored),
        }
    }

    fn on_request_sent(
        &mut self,
        request_id: &RequestId,
        payload: &str,
    ) -> Result<Transition, CorrelationError> {
        // A request id binds at most one tracked request; repeats are redirect hops.
        if self.bindings.iter().flatten().any(|bound| bound == request_id) {
            return Ok(Transition::Ignored);
        }

        let unbound = (0..self.tracked.len())
            .filter(|&idx| self.bindings[idx].is_none())
            .find(|&idx| self.tracked[idx].matches(payload));

        if let Some(idx) = unbound {
            self.bindings[idx] = Some(request_id.clone());
            return Ok(Transition::Bound {
                name: self.tracked[idx].name.clone(),
                request_id: request_id.clone(),
            });
        }

        // Bindings are write-once: a second logical request for an already
        // bound name fails the fetch.
        for (tracked, bound) in self.tracked.iter().zip(&self.bindings) {
            if let Some(bound) = bound
                && tracked.matches(payload)
            {
                return Err(CorrelationError::DuplicateRequest {
                    name: tracked.name.clone(),
                    bound: bound.clone(),
                    duplicate: request_id.clone(),
                });
            }
        }

        Ok(Transition::Ignored)
    }

    fn on_loading_finished(&mut self, request_id: &RequestId) -> Transition {
        let finished = self
            .outstanding
            .iter()
            .copied()
            .find(|&idx| self.bindings[idx].as_ref() == Some(request_id));

        let Some(idx) = finished else {
            return Transition::Ignored;
        };

        self.outstanding.remove(&idx);
        if self.outstanding.is_empty() {
            self.signalled = true;
            Transition::Ready
        } else {
            Transition::Finished {
                name: self.tracked[idx].name.clone(),
            }
        }
    }
}

type Readiness = Result<Vec<Binding>, CorrelationError>;

/// A correlator whose listener is subscribed and running.
pub struct ArmedCorrelator {
    ready: oneshot::Receiver<Readiness>,
    listener: JoinHandle<()>,
    /// Names still awaiting `LoadingFinished`, as last seen by the listener.
    pending: watch::Receiver<Vec<String>>,
}

/// Subscribe to `session` and start correlating `tracked`.
///
/// Must be called before the navigation that triggers the tracked requests;
/// events emitted before the subscription exists are lost.
pub async fn arm<S: BrowserSession + ?Sized>(
    session: &mut S,
    tracked: Vec<TrackedRequest>,
) -> Result<ArmedCorrelator, CorrelationError> {
    let mut events = session
        .subscribe()
        .await
        .map_err(CorrelationError::Subscribe)?;

    let mut state = CorrelationState::new(tracked);
    let (pending_tx, pending_rx) = watch::channel(state.pending());
    let (ready_tx, ready_rx) = oneshot::channel::<Readiness>();

    let listener = tokio::spawn(async move {
        if state.is_complete() {
            let _ = ready_tx.send(Ok(state.bindings()));
            return;
        }

        while let Some(event) = events.recv().await {
            match state.observe(&event) {
                Ok(Transition::Ready) => {
                    debug!("All tracked requests finished loading");
                    let _ = ready_tx.send(Ok(state.bindings()));
                    return;
                }
                Ok(Transition::Bound { name, request_id }) => {
                    debug!("Bound tracked request '{}' to {}", name, request_id);
                }
                Ok(Transition::Finished { name }) => {
                    let pending = state.pending();
                    debug!("Tracked request '{}' finished, waiting for {:?}", name, pending);
                    pending_tx.send_replace(pending);
                }
                Ok(Transition::Ignored) => {}
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            }
        }

        let _ = ready_tx.send(Err(CorrelationError::StreamClosed));
    });

    Ok(ArmedCorrelator {
        ready: ready_rx,
        listener,
        pending: pending_rx,
    })
}

impl ArmedCorrelator {
    /// Tracked requests that have not finished loading yet.
    pub fn pending(&self) -> Vec<String> {
        self.pending.borrow().clone()
    }

    /// Block until the readiness signal fires, the deadline passes or the
    /// operation is cancelled.
    pub async fn wait(mut self, deadline: &Deadline) -> Result<ReadyCorrelation, CorrelationError> {
        let outcome = deadline.run(&mut self.ready).await;
        self.listener.abort();

        match outcome {
            Ok(Ok(Ok(bindings))) => Ok(ReadyCorrelation { bindings }),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(CorrelationError::StreamClosed),
            Err(Interrupted::TimedOut) => Err(CorrelationError::Timeout {
                pending: self.pending(),
            }),
            Err(Interrupted::Cancelled) => Err(CorrelationError::Cancelled),
        }
    }
}

impl Drop for ArmedCorrelator {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// All tracked requests are bound and have finished loading.
#[derive(Debug, Clone)]
pub struct ReadyCorrelation {
    bindings: Vec<Binding>,
}

impl ReadyCorrelation {
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Fetch every bound response body, in caller order.
    pub async fn retrieve<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
    ) -> Result<CorrelatedPayloads, CorrelationError> {
        let mut payloads = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            let body = session
                .get_response_body(&binding.request_id)
                .await
                .map_err(|source| CorrelationError::Retrieval {
                    name: binding.name.clone(),
                    source,
                })?;
            debug!(
                "Retrieved {} bytes for '{}' ({})",
                body.len(),
                binding.name,
                binding.request_id
            );
            payloads.push((binding.name.clone(), body));
        }
        Ok(CorrelatedPayloads { payloads })
    }
}

/// Response bodies keyed by tracked-request name, in caller order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelatedPayloads {
    payloads: Vec<(String, Vec<u8>)>,
}

impl CorrelatedPayloads {
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.payloads
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, body)| body.as_slice())
    }

    pub fn take(&mut self, name: &str) -> Option<Vec<u8>> {
        let idx = self.payloads.iter().position(|(n, _)| n == name)?;
        Some(self.payloads.remove(idx).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.payloads.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

/// Arm a correlator, navigate to `url` to trigger the tracked requests, wait
/// for them and retrieve their bodies.
pub async fn correlate<S: BrowserSession + ?Sized>(
    session: &mut S,
    tracked: Vec<TrackedRequest>,
    url: &str,
    deadline: &Deadline,
) -> Result<CorrelatedPayloads, CorrelationError> {
    let armed = arm(session, tracked).await?;

    info!("Navigating to {}", url);
    match deadline.run(session.navigate(url)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(CorrelationError::Trigger(e)),
        Err(Interrupted::TimedOut) => {
            return Err(CorrelationError::Timeout {
                pending: armed.pending(),
            });
        }
        Err(Interrupted::Cancelled) => return Err(CorrelationError::Cancelled),
    }

    info!("Waiting for tracked responses...");
    let ready = armed.wait(deadline).await?;
    info!("Tracked responses received");

    match deadline.run(ready.retrieve(session)).await {
        Ok(result) => result,
        Err(Interrupted::TimedOut) => Err(CorrelationError::Timeout {
            pending: ready.bindings().iter().map(|b| b.name.clone()).collect(),
        }),
        Err(Interrupted::Cancelled) => Err(CorrelationError::Cancelled),
    }
}
