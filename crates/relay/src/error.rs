//! Relay error surface and HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chain_client::RpcClientError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("missing or invalid field: {0}")]
    BadRequest(String),
    #[error("action {0} out of range")]
    InvalidAction(u8),
    #[error("deadline expired")]
    DeadlineExpired,
    #[error("signature does not match user address")]
    BadSignature,
    #[error("user not delegated and no authorization supplied")]
    MissingAuthorization,
    #[error("execution rejected: {0}")]
    Rejected(String),
    #[error("relay wallet underfunded")]
    Underfunded,
    #[error("nonce conflict, retry shortly")]
    NonceConflict,
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::BadRequest(_)
            | RelayError::InvalidAction(_)
            | RelayError::DeadlineExpired
            | RelayError::BadSignature
            | RelayError::MissingAuthorization
            | RelayError::Rejected(_) => StatusCode::BAD_REQUEST,
            RelayError::Underfunded => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::NonceConflict => StatusCode::TOO_MANY_REQUESTS,
            RelayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RpcClientError> for RelayError {
    fn from(error: RpcClientError) -> Self {
        RelayError::Upstream(error.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Map a node-side submission failure onto the relay's HTTP surface.
pub fn classify_submit_error(message: &str) -> RelayError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("insufficient funds") {
        RelayError::Underfunded
    } else if lower.contains("nonce too low")
        || lower.contains("replacement transaction")
        || lower.contains("already known")
    {
        RelayError::NonceConflict
    } else if lower.contains("revert")
        || lower.contains("signature")
        || lower.contains("deadline")
        || lower.contains("expired")
    {
        RelayError::Rejected(message.to_string())
    } else {
        RelayError::Upstream(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(RelayError::DeadlineExpired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::Underfunded.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(RelayError::NonceConflict.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            RelayError::Upstream("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_classification_of_node_errors() {
        assert!(matches!(
            classify_submit_error("insufficient funds for gas * price + value"),
            RelayError::Underfunded
        ));
        assert!(matches!(
            classify_submit_error("nonce too low"),
            RelayError::NonceConflict
        ));
        assert!(matches!(
            classify_submit_error("execution reverted: InvalidSignature()"),
            RelayError::Rejected(_)
        ));
        assert!(matches!(
            classify_submit_error("connection refused"),
            RelayError::Upstream(_)
        ));
    }
}
