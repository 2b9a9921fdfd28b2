//! Best-effort enrichment of submissions from their code pages.

use crate::deadline::{Deadline, Interrupted};
use crate::session::{BrowserSession, SessionError};
use stalk_common::protocol::SubmissionRecord;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct DetailSelectors {
    pub language: String,
    pub problem_link: String,
    pub element_timeout: Duration,
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            language: "span#result_language".into(),
            problem_link: "a.inline-wrap".into(),
            element_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionDetail {
    pub language: String,
    pub problem_url: Option<String>,
}

/// Visit each submission's code page and fill in its language and problem link.
///
/// A page that cannot be read leaves its submission untouched; only running
/// out of time or being cancelled stops the pass.
pub async fn enrich_submissions<S: BrowserSession + ?Sized>(
    session: &mut S,
    submissions: &mut [SubmissionRecord],
    selectors: &DetailSelectors,
    deadline: &Deadline,
) -> Result<(), Interrupted> {
    info!("Fetching details for {} submissions", submissions.len());
    for submission in submissions.iter_mut() {
        match deadline
            .run(fetch_detail(session, &submission.code_url, selectors))
            .await?
        {
            Ok(detail) => {
                submission.language = Some(detail.language);
                if let Some(url) = detail.problem_url {
                    submission.problem_url = url;
                }
            }
            Err(e) => warn!("Could not read details of {}: {}", submission.code_url, e),
        }
    }
    Ok(())
}

pub async fn fetch_detail<S: BrowserSession + ?Sized>(
    session: &mut S,
    code_url: &str,
    selectors: &DetailSelectors,
) -> Result<SubmissionDetail, SessionError> {
    session.navigate(code_url).await?;
    session
        .wait_until_interactable(&selectors.language, selectors.element_timeout)
        .await?;

    let language = session
        .evaluate(&query_script(&selectors.language, "textContent"))
        .await?
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SessionError::ElementNotFound {
            selector: selectors.language.clone(),
        })?;

    let problem_url = session
        .evaluate(&query_script(&selectors.problem_link, "href"))
        .await?
        .as_str()
        .map(str::to_string);

    Ok(SubmissionDetail {
        language,
        problem_url,
    })
}

fn query_script(selector: &str, property: &str) -> String {
    let quoted = serde_json::Value::String(selector.to_string()).to_string();
    format!(
        "(() => {{ const el = document.querySelector({}); return el ? el.{} : null; }})()",
        quoted, property
    )
}
