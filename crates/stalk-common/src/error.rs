use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a browser session primitive.
#[derive(Debug, Error)]
pub enum SessionError {
    // ============================================================
    // Lifecycle Errors
    // ============================================================
    #[error("Browser session not ready")]
    NotReady,

    #[error("Connection to browser lost")]
    ConnectionLost,

    // ============================================================
    // Navigation Errors
    // ============================================================
    #[error("Navigation failed: {0}")]
    Navigation(String),

    // ============================================================
    // Element Errors
    // ============================================================
    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Element {selector} is not interactable: {reason}")]
    ElementNotInteractable { selector: String, reason: String },

    // ============================================================
    // Execution Errors
    // ============================================================
    #[error("Script execution error: {0}")]
    Script(String),

    #[error("Timeout: {operation}")]
    Timeout { operation: String },

    // ============================================================
    // Network Errors
    // ============================================================
    #[error("Response body for request {request_id} unavailable: {reason}")]
    ResponseBody { request_id: String, reason: String },

    #[error("Network event subscription failed: {0}")]
    Subscription(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session error: {0}")]
    Other(String),
}

/// Client-visible error codes reported by the service facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthenticationFailed,
    CorrelationTimeout,
    RetrievalFailed,
    SchemaMismatch,
    TimestampParse,
    SessionError,
    DeadlineExceeded,
    Cancelled,
    InvalidRequest,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthenticationFailed => "AUTHENTICATION_FAILED",
            ErrorCode::CorrelationTimeout => "CORRELATION_TIMEOUT",
            ErrorCode::RetrievalFailed => "RETRIEVAL_FAILED",
            ErrorCode::SchemaMismatch => "SCHEMA_MISMATCH",
            ErrorCode::TimestampParse => "TIMESTAMP_PARSE",
            ErrorCode::SessionError => "SESSION_ERROR",
            ErrorCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
