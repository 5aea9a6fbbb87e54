//! Webhook endpoint handler
//!
//! Every delivery goes through [`webhook_handler`], which is the single
//! place where handler failures are logged and turned into status codes.
//! The dispatch itself runs in its own task so a client that hangs up does
//! not cancel a half-finished git sequence.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::AppState;
use relbot_core::Outcome;

/// Header name for GitHub event type
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID
const HEADER_DELIVERY: &str = "x-github-delivery";

/// Errors that can occur when processing a webhook
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing required header
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// Body is not JSON
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The event handler failed
    #[error(transparent)]
    Handler(#[from] relbot_core::Error),

    /// The event handler panicked or was aborted
    #[error("event handler did not complete: {0}")]
    Aborted(String),
}

impl WebhookError {
    /// Status code this error is reported with
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::MissingHeader(_) | WebhookError::InvalidJson(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::Handler(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            WebhookError::Handler(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            WebhookError::Handler(_) | WebhookError::Aborted(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Body of a successful delivery
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// `handled` or `ignored`
    pub outcome: &'static str,
    /// Why the event was ignored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<Outcome> for WebhookResponse {
    fn from(outcome: Outcome) -> Self {
        let label = outcome.as_str();
        let reason = match outcome {
            Outcome::Handled => None,
            Outcome::Ignored(reason) => Some(reason),
        };
        Self {
            outcome: label,
            reason,
        }
    }
}

/// `POST /postreceive`
///
/// - 200: handled, or nothing to do
/// - 400: missing `X-GitHub-Event`, body not JSON, or malformed payload
/// - 503: a repository lock could not be taken in time
/// - 500: git, GitHub or release failure
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookError> {
    let event = get_header(&headers, HEADER_EVENT)?;
    let delivery = get_header(&headers, HEADER_DELIVERY).ok();

    debug!(
        event = %event,
        delivery = delivery.as_deref().unwrap_or("-"),
        "Received webhook"
    );

    let payload: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        warn!(event = %event, delivery = delivery.as_deref().unwrap_or("-"), error = %e, "Webhook body is not JSON");
        WebhookError::InvalidJson(e)
    })?;

    let task = {
        let state = app_state.clone();
        let event = event.clone();
        let delivery = delivery.clone();
        tokio::spawn(async move {
            state
                .router()
                .dispatch(state.context(), &event, delivery.as_deref(), &payload)
                .await
        })
    };

    let delivery = delivery.as_deref().unwrap_or("-");
    let err = match task.await {
        Ok(Ok(outcome)) => {
            info!(event = %event, delivery = %delivery, outcome = %outcome, "Webhook processed");
            return Ok(Json(outcome.into()));
        }
        Ok(Err(e)) => WebhookError::Handler(e),
        Err(e) => WebhookError::Aborted(e.to_string()),
    };

    let status = err.status();
    if status.is_server_error() {
        error!(event = %event, delivery = %delivery, status = status.as_u16(), error = %err, "Webhook failed");
    } else {
        warn!(event = %event, delivery = %delivery, status = status.as_u16(), error = %err, "Webhook rejected");
    }
    Err(err)
}

/// Extracts a required header value as a string
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn status_mapping() {
        assert_eq!(
            WebhookError::MissingHeader(HEADER_EVENT).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::Handler(relbot_core::Error::malformed("create", "no ref")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::Handler(relbot_core::Error::LockTimeout {
                name: "org/meta".to_string(),
                waited: Duration::from_secs(1),
            })
            .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            WebhookError::Handler(relbot_core::Error::Remote("502".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WebhookError::Aborted("panicked".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn get_header_reads_value() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_EVENT, "create".parse().unwrap());
        assert_eq!(get_header(&headers, HEADER_EVENT).unwrap(), "create");
        assert!(matches!(
            get_header(&headers, HEADER_DELIVERY),
            Err(WebhookError::MissingHeader(HEADER_DELIVERY))
        ));
    }

    #[test]
    fn response_body_carries_reason() {
        let body = serde_json::to_value(WebhookResponse::from(Outcome::ignored("nothing"))).unwrap();
        assert_eq!(body, serde_json::json!({"outcome": "ignored", "reason": "nothing"}));

        let body = serde_json::to_value(WebhookResponse::from(Outcome::Handled)).unwrap();
        assert_eq!(body, serde_json::json!({"outcome": "handled"}));
    }
}
