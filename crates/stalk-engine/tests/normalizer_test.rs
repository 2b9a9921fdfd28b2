mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::*;
use serde_json::json;
use stalk_engine::normalizer::{NormalizeError, Normalized, normalize};
use stalk_engine::protocol::SubmissionStatus;
use stalk_engine::site::SiteProfile;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn run(submissions: &[u8], contests: &[u8]) -> Result<Normalized, NormalizeError> {
    normalize(submissions, contests, &SiteProfile::default(), now())
}

#[test]
fn test_submissions_are_accepted_with_code_urls() {
    let out = run(&submissions_body(), &contests_body()).unwrap();

    assert_eq!(out.submissions.len(), 2);
    let first = &out.submissions[0];
    assert_eq!(first.problem_name, "Two Sum");
    assert_eq!(first.problem_slug, "two-sum");
    assert_eq!(first.status, SubmissionStatus::Accepted);
    assert_eq!(first.submission_date, "2022-08-08T23:06:40Z");
    assert_eq!(first.code_url, "https://leetcode.com/submissions/detail/764090438/");
    assert_eq!(first.problem_url, "https://leetcode.com/problems/two-sum/");
    assert_eq!(first.language, None);
    assert_eq!(out.submissions[1].problem_name, "Add Two Numbers");
}

#[test]
fn test_non_attended_contests_are_dropped_in_order() {
    let out = run(&submissions_body(), &contests_body()).unwrap();

    assert_eq!(out.contests.len(), 2);
    assert_eq!(out.contests[0].contest_name, "Weekly Contest 300");
    assert_eq!(out.contests[0].rank, 3021);
    assert_eq!(out.contests[0].problems_solved, 3);
    assert_eq!(out.contests[0].rating, 1580.2);
    assert_eq!(out.contests[0].contest_id, "Weekly Contest 300");
    assert_eq!(out.contests[0].start_time.as_deref(), Some("2022-07-03T02:30:00Z"));
    assert_eq!(out.contests[1].contest_name, "Biweekly Contest 83");
    assert_eq!(out.contests[1].rank, 8120);
}

#[test]
fn test_contest_summary() {
    let out = run(&submissions_body(), &contests_body()).unwrap();
    let summary = out.summary.unwrap();
    assert_eq!(summary.attended_contests, 2);
    assert_eq!(summary.global_ranking, 51234);
    assert_eq!(summary.badge, None);
}

#[test]
fn test_user_without_contests() {
    let contests = json!({
        "data": { "userContestRanking": null, "userContestRankingHistory": null }
    })
    .to_string();
    let out = run(&submissions_body(), contests.as_bytes()).unwrap();
    assert!(out.contests.is_empty());
    assert!(out.summary.is_none());
    assert_eq!(out.submissions.len(), 2);
}

#[test]
fn test_relative_display_timestamp() {
    let submissions = json!({
        "data": { "recentAcSubmissionList": [
            { "id": "1", "title": "Two Sum", "titleSlug": "two-sum", "timestamp": "3 days ago" },
            { "id": "2", "title": "3Sum", "titleSlug": "3sum", "timestamp": "a few seconds ago" }
        ]}
    })
    .to_string();
    let out = run(submissions.as_bytes(), &contests_body()).unwrap();
    assert_eq!(out.submissions[0].submission_date, "2024-05-29T12:00:00Z");
    assert_eq!(out.submissions[1].submission_date, "2024-06-01T12:00:00Z");
}

#[test]
fn test_malformed_relative_timestamp_fails_whole_fetch() {
    let submissions = json!({
        "data": { "recentAcSubmissionList": [
            { "id": "1", "title": "Two Sum", "titleSlug": "two-sum", "timestamp": "1660000000" },
            { "id": "2", "title": "3Sum", "titleSlug": "3sum", "timestamp": "several days ago" }
        ]}
    })
    .to_string();
    let err = run(submissions.as_bytes(), &contests_body()).unwrap_err();
    assert!(matches!(err, NormalizeError::Timestamp(_)));
}

#[test]
fn test_schema_mismatch() {
    let err = run(b"{\"errors\":[{\"message\":\"rate limited\"}]}", &contests_body()).unwrap_err();
    assert!(matches!(err, NormalizeError::Schema { payload: "recent submissions", .. }));

    let err = run(&submissions_body(), b"<html>Just a moment...</html>").unwrap_err();
    assert!(matches!(err, NormalizeError::Schema { payload: "contest history", .. }));
}

#[test]
fn test_contest_entry_with_wrong_types_rejected() {
    let contests = json!({
        "data": { "userContestRankingHistory": [
            { "attended": "yes", "problemsSolved": 1, "totalProblems": 4, "finishTimeInSeconds": 0,
              "rating": 1500.0, "ranking": 1, "contest": { "title": "Weekly Contest 1", "startTime": 0 } }
        ]}
    })
    .to_string();
    let err = run(&submissions_body(), contests.as_bytes()).unwrap_err();
    assert!(matches!(err, NormalizeError::Schema { .. }));
}
