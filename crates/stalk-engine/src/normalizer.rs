//! Raw profile payloads and their mapping into domain records.

use crate::site::SiteProfile;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use stalk_common::protocol::{ContestRecord, ContestSummary, SubmissionRecord, SubmissionStatus};
use stalk_common::timestamp::{self, TimestampError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("{payload} payload does not match the expected schema: {source}")]
    Schema {
        payload: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid submission timestamp: {0}")]
    Timestamp(#[from] TimestampError),
}

// ============================================================
// Raw Schemas
// ============================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RecentAcSubmissionsResponse {
    pub data: RecentAcSubmissionsData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentAcSubmissionsData {
    pub recent_ac_submission_list: Vec<RawSubmission>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubmission {
    pub id: String,
    pub title: String,
    pub title_slug: String,
    /// Epoch seconds as a string, or a relative display string on older pages.
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserContestHistoryResponse {
    pub data: ContestHistoryData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestHistoryData {
    #[serde(default)]
    pub user_contest_ranking: Option<RawContestRanking>,
    /// `null` for users who never entered a contest.
    #[serde(default)]
    pub user_contest_ranking_history: Option<Vec<RawContestEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContestRanking {
    pub attended_contests_count: i64,
    pub rating: f64,
    pub global_ranking: i64,
    pub total_participants: i64,
    pub top_percentage: f64,
    #[serde(default)]
    pub badge: Option<RawBadge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBadge {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContestEntry {
    pub attended: bool,
    #[serde(default)]
    pub trend_direction: Option<TrendDirection>,
    pub problems_solved: u32,
    pub total_problems: u32,
    pub finish_time_in_seconds: i64,
    pub rating: f64,
    pub ranking: i64,
    pub contest: RawContest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendDirection {
    Up,
    Down,
    None,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContest {
    pub title: String,
    pub start_time: i64,
}

// ============================================================
// Mapping
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub submissions: Vec<SubmissionRecord>,
    pub contests: Vec<ContestRecord>,
    pub summary: Option<ContestSummary>,
}

/// Map both raw payloads into domain records. Any failure rejects the whole
/// fetch; nothing is salvaged from a partially valid payload.
pub fn normalize(
    raw_submissions: &[u8],
    raw_contests: &[u8],
    site: &SiteProfile,
    now: DateTime<Utc>,
) -> Result<Normalized, NormalizeError> {
    let submissions: RecentAcSubmissionsResponse =
        serde_json::from_slice(raw_submissions).map_err(|source| NormalizeError::Schema {
            payload: "recent submissions",
            source,
        })?;
    let history: UserContestHistoryResponse =
        serde_json::from_slice(raw_contests).map_err(|source| NormalizeError::Schema {
            payload: "contest history",
            source,
        })?;

    let submissions = submissions
        .data
        .recent_ac_submission_list
        .iter()
        .map(|raw| submission_record(raw, site, now))
        .collect::<Result<Vec<_>, _>>()?;

    let contests = history
        .data
        .user_contest_ranking_history
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|entry| entry.attended)
        .map(contest_record)
        .collect();

    let summary = history.data.user_contest_ranking.map(|r| ContestSummary {
        attended_contests: r.attended_contests_count,
        rating: r.rating,
        global_ranking: r.global_ranking,
        total_participants: r.total_participants,
        top_percentage: r.top_percentage,
        badge: r.badge.map(|b| b.name),
    });

    Ok(Normalized {
        submissions,
        contests,
        summary,
    })
}

fn submission_record(
    raw: &RawSubmission,
    site: &SiteProfile,
    now: DateTime<Utc>,
) -> Result<SubmissionRecord, TimestampError> {
    Ok(SubmissionRecord {
        problem_name: raw.title.clone(),
        problem_slug: raw.title_slug.clone(),
        submission_date: timestamp::to_iso8601(submission_instant(&raw.timestamp, now)?),
        status: SubmissionStatus::Accepted,
        code_url: site.code_url(&raw.id),
        problem_url: site.problem_url(&raw.title_slug),
        language: None,
    })
}

fn submission_instant(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimestampError> {
    match raw.trim().parse::<i64>() {
        Ok(seconds) => timestamp::from_epoch_seconds(seconds),
        Err(_) => timestamp::normalize_relative(raw, now),
    }
}

fn contest_record(raw: &RawContestEntry) -> ContestRecord {
    ContestRecord {
        contest_name: raw.contest.title.clone(),
        rank: raw.ranking,
        rating: raw.rating,
        problems_solved: raw.problems_solved,
        // The history feed exposes no numeric id; the title is unique per contest.
        contest_id: raw.contest.title.clone(),
        start_time: timestamp::from_epoch_seconds(raw.contest.start_time)
            .ok()
            .map(timestamp::to_iso8601),
    }
}
