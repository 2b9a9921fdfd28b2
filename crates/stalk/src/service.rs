//! Request dispatch shared by the WebSocket facade and the one-shot CLI.

use async_trait::async_trait;
use stalk_engine::deadline::CancelHandle;
use stalk_engine::error::ErrorCode;
use stalk_engine::fetcher::{FetchError, FetchOutcome, Fetcher};
use stalk_engine::protocol::{ServiceOperation, ServiceRequest, ServiceResponse};
use tracing::{info, warn};

/// Anything that can answer a submissions request.
#[async_trait]
pub trait SubmissionService: Send + Sync {
    async fn get_user_submissions(
        &self,
        user_handle: &str,
        cancel: &CancelHandle,
    ) -> Result<FetchOutcome, FetchError>;
}

#[async_trait]
impl SubmissionService for Fetcher {
    async fn get_user_submissions(
        &self,
        user_handle: &str,
        cancel: &CancelHandle,
    ) -> Result<FetchOutcome, FetchError> {
        self.fetch_with_cancel(user_handle, cancel).await
    }
}

pub async fn handle_request<S: SubmissionService + ?Sized>(
    service: &S,
    request: ServiceRequest,
    cancel: &CancelHandle,
) -> ServiceResponse {
    let ServiceRequest { id, operation } = request;
    match operation {
        ServiceOperation::GetUserSubmissions { user_handle } => {
            info!("get_user_submissions for {}", user_handle);
            match service.get_user_submissions(&user_handle, cancel).await {
                Ok(outcome) => outcome.into_response(id),
                Err(e) => {
                    warn!("Fetch for {} failed: {}", user_handle, e);
                    ServiceResponse::error(id, e.code(), e.to_string())
                }
            }
        }
    }
}

/// Parse one text frame and answer it. Frames that are not a valid request
/// get an `INVALID_REQUEST` error carrying whatever `id` could be recovered.
pub async fn handle_text<S: SubmissionService + ?Sized>(
    service: &S,
    text: &str,
    cancel: &CancelHandle,
) -> ServiceResponse {
    match serde_json::from_str::<ServiceRequest>(text) {
        Ok(request) => handle_request(service, request, cancel).await,
        Err(e) => {
            let id = serde_json::from_str::<serde_json::Value>(text)
                .ok()
                .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string));
            ServiceResponse::error(id, ErrorCode::InvalidRequest, format!("Invalid request: {}", e))
        }
    }
}
