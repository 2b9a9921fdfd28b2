//! Fetch orchestration: login, profile navigation, correlation, normalization.
//!
//! One browser session backs every fetch. The session and the login state sit
//! behind a single `tokio::sync::Mutex`, so concurrent fetches queue in arrival
//! order and each one drives the page exclusively from login to the last
//! retrieved byte. A queued fetch's deadline already runs while it waits.

use crate::auth::{AuthError, Authenticator};
use crate::correlator::{self, CorrelationError};
use crate::deadline::{CancelHandle, Deadline, Interrupted};
use crate::details::{self, DetailSelectors};
use crate::normalizer::{self, NormalizeError};
use crate::session::BrowserSession;
use crate::site::{self, SiteError, SiteProfile};
use chrono::{DateTime, Utc};
use stalk_common::error::ErrorCode;
use stalk_common::protocol::{ContestRecord, ContestSummary, ServiceResponse, SubmissionRecord};
use stalk_common::timestamp;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid request: {0}")]
    Site(#[from] SiteError),

    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error("Correlation failed: {0}")]
    Correlation(#[from] CorrelationError),

    #[error("No payload was retrieved for '{0}'")]
    MissingPayload(&'static str),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("Fetch interrupted: {0}")]
    Interrupted(#[from] Interrupted),
}

impl FetchError {
    /// Client-visible code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            FetchError::Site(_) => ErrorCode::InvalidRequest,
            FetchError::Authentication(AuthError::Cancelled) => ErrorCode::Cancelled,
            FetchError::Authentication(_) => ErrorCode::AuthenticationFailed,
            FetchError::Correlation(e) => match e {
                CorrelationError::Timeout { .. } => ErrorCode::CorrelationTimeout,
                CorrelationError::Cancelled => ErrorCode::Cancelled,
                CorrelationError::Retrieval { .. } => ErrorCode::RetrievalFailed,
                CorrelationError::DuplicateRequest { .. } => ErrorCode::RetrievalFailed,
                CorrelationError::Subscribe(_)
                | CorrelationError::Trigger(_)
                | CorrelationError::StreamClosed => ErrorCode::SessionError,
            },
            FetchError::MissingPayload(_) => ErrorCode::RetrievalFailed,
            FetchError::Normalize(NormalizeError::Schema { .. }) => ErrorCode::SchemaMismatch,
            FetchError::Normalize(NormalizeError::Timestamp(_)) => ErrorCode::TimestampParse,
            FetchError::Interrupted(Interrupted::TimedOut) => ErrorCode::DeadlineExceeded,
            FetchError::Interrupted(Interrupted::Cancelled) => ErrorCode::Cancelled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Budget for one whole fetch, including time spent queued.
    pub timeout: Duration,
    /// Visit each code page for its language; failures leave the record as is.
    pub submission_details: bool,
    pub detail_selectors: DetailSelectors,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            submission_details: true,
            detail_selectors: DetailSelectors::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub user_handle: String,
    pub submissions: Vec<SubmissionRecord>,
    pub contests: Vec<ContestRecord>,
    pub summary: Option<ContestSummary>,
    pub fetched_at: DateTime<Utc>,
}

impl FetchOutcome {
    pub fn into_response(self, id: Option<String>) -> ServiceResponse {
        ServiceResponse::Ok {
            id,
            user_handle: self.user_handle,
            submissions: self.submissions,
            contests: self.contests,
            summary: self.summary,
            fetched_at: timestamp::to_iso8601(self.fetched_at),
        }
    }
}

struct Driver {
    session: Box<dyn BrowserSession>,
    auth: Authenticator,
}

#[derive(Clone)]
pub struct Fetcher {
    driver: Arc<Mutex<Driver>>,
    site: SiteProfile,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(
        session: Box<dyn BrowserSession>,
        auth: Authenticator,
        site: SiteProfile,
        config: FetchConfig,
    ) -> Self {
        Self {
            driver: Arc::new(Mutex::new(Driver { session, auth })),
            site,
            config,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub async fn fetch(&self, handle: &str) -> Result<FetchOutcome, FetchError> {
        self.run(handle, Deadline::after(self.config.timeout)).await
    }

    pub async fn fetch_with_cancel(
        &self,
        handle: &str,
        cancel: &CancelHandle,
    ) -> Result<FetchOutcome, FetchError> {
        let deadline = Deadline::after(self.config.timeout).with_cancel(cancel);
        self.run(handle, deadline).await
    }

    /// Close the underlying browser session once no fetch holds it.
    pub async fn shutdown(&self) -> Result<(), crate::session::SessionError> {
        let mut driver = self.driver.lock().await;
        driver.session.close().await
    }

    async fn run(&self, handle: &str, deadline: Deadline) -> Result<FetchOutcome, FetchError> {
        let profile_url = self.site.profile_url(handle)?;

        let mut guard = deadline.run(self.driver.lock()).await?;
        let Driver { session, auth } = &mut *guard;
        let session: &mut dyn BrowserSession = &mut **session;

        auth.ensure_session(&mut *session, &deadline).await?;

        info!("Fetching profile data for {}", handle);
        let tracked = self.site.tracked_requests();
        let mut payloads =
            correlator::correlate(&mut *session, tracked, &profile_url, &deadline).await?;

        let raw_submissions = payloads
            .take(site::RECENT_SUBMISSIONS)
            .ok_or(FetchError::MissingPayload(site::RECENT_SUBMISSIONS))?;
        let raw_contests = payloads
            .take(site::CONTEST_HISTORY)
            .ok_or(FetchError::MissingPayload(site::CONTEST_HISTORY))?;

        let fetched_at = Utc::now();
        let mut normalized =
            normalizer::normalize(&raw_submissions, &raw_contests, &self.site, fetched_at)?;
        info!(
            "Normalized {} submissions and {} contests",
            normalized.submissions.len(),
            normalized.contests.len()
        );

        if self.config.submission_details {
            details::enrich_submissions(
                &mut *session,
                &mut normalized.submissions,
                &self.config.detail_selectors,
                &deadline,
            )
            .await?;
        }

        Ok(FetchOutcome {
            user_handle: handle.to_string(),
            submissions: normalized.submissions,
            contests: normalized.contests,
            summary: normalized.summary,
            fetched_at,
        })
    }
}
