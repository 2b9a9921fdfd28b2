//! Deadlines and cooperative cancellation for suspension points.
//!
//! Every wait in the engine (cookie polling, the correlator's readiness
//! signal, queueing for the browser) goes through [`Deadline::run`], which
//! resolves as soon as the deadline passes or the linked [`CancelHandle`] fires.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("deadline exceeded")]
    TimedOut,
    #[error("operation cancelled")]
    Cancelled,
}

/// Cancels every [`Deadline`] linked to it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    cancel: Option<watch::Receiver<bool>>,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    pub fn at(at: Instant) -> Self {
        Self { at, cancel: None }
    }

    pub fn with_cancel(mut self, handle: &CancelHandle) -> Self {
        self.cancel = Some(handle.subscribe());
        self
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Drive `fut` until it completes, the deadline passes or cancellation fires.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        let mut cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => Err(Interrupted::Cancelled),
            res = tokio::time::timeout_at(self.at, fut) => res.map_err(|_| Interrupted::TimedOut),
        }
    }
}

async fn cancelled(rx: &mut Option<watch::Receiver<bool>>) {
    match rx {
        Some(rx) => {
            // A dropped handle can no longer cancel.
            if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}
