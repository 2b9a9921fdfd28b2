use chromiumoxide::Page;
use stalk_engine::session::SessionError;
use std::time::Duration;

/// Default timeout for JavaScript evaluation (10 seconds).
/// This prevents hanging when a dialog blocks the JS thread.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum retries for context errors during page navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

/// Delay between retries when context is not found (page navigating).
const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Check if an error indicates the page context is unavailable (e.g., during navigation).
fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

enum EvalError {
    Timeout,
    Context(String),
    Other(String),
}

/// Evaluate `expression`, retrying while the page is between documents.
///
/// Scripts that produce no value (`undefined`) yield `Value::Null`.
pub async fn evaluate(page: &Page, expression: &str) -> Result<serde_json::Value, SessionError> {
    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        match evaluate_with_timeout(page, expression).await {
            Ok(value) => return Ok(value),
            Err(EvalError::Timeout) => {
                return Err(SessionError::Timeout {
                    operation: "script evaluation (possibly blocked by a dialog)".into(),
                });
            }
            Err(EvalError::Context(err_str)) => {
                tracing::debug!(
                    "Context error during evaluation (attempt {}/{}), retrying...",
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err_str);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(EvalError::Other(err_str)) => return Err(SessionError::Script(err_str)),
        }
    }

    Err(SessionError::Script(last_error.unwrap_or_else(|| {
        "Evaluation failed after retries".to_string()
    })))
}

async fn evaluate_with_timeout(
    page: &Page,
    expression: &str,
) -> Result<serde_json::Value, EvalError> {
    match tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let err_str = e.to_string();
            if is_context_error(&err_str) {
                Err(EvalError::Context(err_str))
            } else {
                Err(EvalError::Other(err_str))
            }
        }
        Ok(Ok(result)) => Ok(result.value().cloned().unwrap_or(serde_json::Value::Null)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_errors_are_recognized() {
        assert!(is_context_error("Cannot find context with specified id"));
        assert!(is_context_error(
            "Execution context was destroyed, most likely because of a navigation."
        ));
        assert!(!is_context_error("ReferenceError: foo is not defined"));
    }
}
