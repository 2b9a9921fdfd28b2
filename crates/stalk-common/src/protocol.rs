use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================
// Browser Network Events
// ============================================================

/// Opaque, session-scoped identifier of a network request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Network activity observed on the page driven by a browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NetworkEvent {
    RequestSent {
        request_id: RequestId,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
    },
    ResponseReceived {
        request_id: RequestId,
    },
    LoadingFinished {
        request_id: RequestId,
    },
}

impl NetworkEvent {
    pub fn request_id(&self) -> &RequestId {
        match self {
            NetworkEvent::RequestSent { request_id, .. }
            | NetworkEvent::ResponseReceived { request_id }
            | NetworkEvent::LoadingFinished { request_id } => request_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
            http_only: None,
            secure: None,
        }
    }
}

// ============================================================
// Domain Records
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Accepted,
}

/// One accepted submission of the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub problem_name: String,
    pub problem_slug: String,
    /// RFC 3339, UTC.
    pub submission_date: String,
    pub status: SubmissionStatus,
    pub code_url: String,
    pub problem_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// One contest the user actually took part in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestRecord {
    pub contest_name: String,
    pub rank: i64,
    pub rating: f64,
    pub problems_solved: u32,
    pub contest_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

/// Aggregate contest standing shown on the profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestSummary {
    pub attended_contests: i64,
    pub rating: f64,
    pub global_ranking: i64,
    pub total_participants: i64,
    pub top_percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
}

// ============================================================
// Service Wire Protocol
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ServiceOperation {
    GetUserSubmissions { user_handle: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub operation: ServiceOperation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServiceResponse {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        user_handle: String,
        submissions: Vec<SubmissionRecord>,
        contests: Vec<ContestRecord>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<ContestSummary>,
        fetched_at: String,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        code: ErrorCode,
        message: String,
    },
}

impl ServiceResponse {
    pub fn error(id: Option<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        ServiceResponse::Error {
            id,
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ServiceResponse::Ok { .. })
    }
}
