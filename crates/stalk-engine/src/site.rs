//! Everything specific to the practice site: URLs and how its background
//! data requests are recognised.

use crate::correlator::TrackedRequest;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://leetcode.com";

/// Tracked-request name of the recent accepted submissions query.
pub const RECENT_SUBMISSIONS: &str = "recent_submissions";
/// Tracked-request name of the contest history query.
pub const CONTEST_HISTORY: &str = "contest_history";

const RECENT_SUBMISSIONS_MARKER: &str = "recentAcSubmissions";
const CONTEST_HISTORY_MARKER: &str = "userContestRankingInfo";

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("Invalid base URL {url}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid user handle: {0:?}")]
    InvalidHandle(String),
}

#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Absolute base URL, always ending in `/`.
    base: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            base: format!("{}/", DEFAULT_BASE_URL),
        }
    }
}

impl SiteProfile {
    pub fn new(base_url: &str) -> Result<Self, SiteError> {
        let mut base = Url::parse(base_url).map_err(|source| SiteError::BaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base: base.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Profile page whose load issues both tracked requests.
    pub fn profile_url(&self, handle: &str) -> Result<String, SiteError> {
        validate_handle(handle)?;
        Ok(format!("{}{}/", self.base, handle))
    }

    pub fn code_url(&self, submission_id: &str) -> String {
        format!("{}submissions/detail/{}/", self.base, submission_id)
    }

    pub fn problem_url(&self, slug: &str) -> String {
        format!("{}problems/{}/", self.base, slug)
    }

    /// The two background queries of the profile page, in matching precedence order.
    pub fn tracked_requests(&self) -> Vec<TrackedRequest> {
        vec![
            TrackedRequest::containing(RECENT_SUBMISSIONS, RECENT_SUBMISSIONS_MARKER),
            TrackedRequest::containing(CONTEST_HISTORY, CONTEST_HISTORY_MARKER),
        ]
    }
}

/// Handles become a URL path segment, so only the site's handle alphabet is allowed.
pub fn validate_handle(handle: &str) -> Result<(), SiteError> {
    let valid = !handle.is_empty()
        && handle.len() <= 64
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !handle.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(SiteError::InvalidHandle(handle.to_string()))
    }
}
