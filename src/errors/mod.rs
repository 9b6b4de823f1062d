//! Error handling module for the recipe client.
//!
//! Provides a single typed error for every failure the consistency layer can surface,
//! with stable codes and a classification that drives how views react.

use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const CONFLICT: &str = "CONFLICT";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const SERVER_ERROR: &str = "SERVER_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const DECODE_ERROR: &str = "DECODE_ERROR";
    pub const UNSUPPORTED: &str = "UNSUPPORTED";
    pub const MEMBERSHIP_UNKNOWN: &str = "MEMBERSHIP_UNKNOWN";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Result alias used across the crate.
pub type ClientResult<T> = Result<T, ClientError>;

/// Client error type.
///
/// Every variant is cheap to clone: a single fetch result is broadcast to all
/// readers coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Entity absent on the service
    NotFound(String),
    /// Request rejected before or by the service
    Validation(String),
    /// Service refused a write that conflicts with current state
    Conflict(String),
    /// Transport failure (connect, timeout, broken body)
    Network(String),
    /// Non-success status without a more specific mapping
    Server { status: u16, message: String },
    /// Local store error
    Database(String),
    /// Payload could not be decoded
    Decode(String),
    /// Operation only available on the remote service
    Unsupported(String),
    /// Membership toggle issued before the recipe's tab list was loaded
    MembershipUnknown { recipe_id: String },
    /// Internal error
    Internal(String),
}

impl ClientError {
    /// Map a non-success HTTP status and its body to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = detail_message(body);
        match status {
            404 => ClientError::NotFound(message),
            400 | 422 => ClientError::Validation(message),
            409 => ClientError::Conflict(message),
            _ => ClientError::Server { status, message },
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::NotFound(_) => codes::NOT_FOUND,
            ClientError::Validation(_) => codes::VALIDATION_ERROR,
            ClientError::Conflict(_) => codes::CONFLICT,
            ClientError::Network(_) => codes::NETWORK_ERROR,
            ClientError::Server { .. } => codes::SERVER_ERROR,
            ClientError::Database(_) => codes::DATABASE_ERROR,
            ClientError::Decode(_) => codes::DECODE_ERROR,
            ClientError::Unsupported(_) => codes::UNSUPPORTED,
            ClientError::MembershipUnknown { .. } => codes::MEMBERSHIP_UNKNOWN,
            ClientError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            ClientError::NotFound(msg) => msg.clone(),
            ClientError::Validation(msg) => msg.clone(),
            ClientError::Conflict(msg) => msg.clone(),
            ClientError::Network(msg) => msg.clone(),
            ClientError::Server { status, message } => format!("{} (HTTP {})", message, status),
            ClientError::Database(msg) => msg.clone(),
            ClientError::Decode(msg) => msg.clone(),
            ClientError::Unsupported(msg) => msg.clone(),
            ClientError::MembershipUnknown { recipe_id } => format!(
                "Collections for recipe {} have not been loaded yet",
                recipe_id
            ),
            ClientError::Internal(msg) => msg.clone(),
        }
    }

    /// Whether the entity the request targeted does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    /// Whether the failure is scoped to one attempt and may succeed when the
    /// user repeats the action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Validation(_)
                | ClientError::Conflict(_)
                | ClientError::Network(_)
                | ClientError::Server { .. }
                | ClientError::Database(_)
                | ClientError::Decode(_)
        )
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for ClientError {}

impl From<sqlx::Error> for ClientError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        match err {
            sqlx::Error::RowNotFound => ClientError::NotFound("Row not found".to_string()),
            other => ClientError::Database(format!("Database error: {}", other)),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        tracing::warn!("HTTP error: {:?}", err);
        if err.is_decode() {
            ClientError::Decode(format!("Invalid response body: {}", err))
        } else if let Some(status) = err.status() {
            ClientError::from_status(status.as_u16(), &err.to_string())
        } else {
            ClientError::Network(format!("Request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        tracing::warn!("JSON error: {:?}", err);
        ClientError::Decode(format!("JSON error: {}", err))
    }
}

impl From<tokio::task::JoinError> for ClientError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!("Task error: {:?}", err);
        ClientError::Internal(format!("Background task failed: {}", err))
    }
}

/// Error body returned by the recipe service (`{"detail": "..."}`).
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

/// Pull a human readable message out of an error body, falling back to the raw text.
fn detail_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "Request failed".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(ClientError::from_status(404, "").is_not_found());
        assert_eq!(
            ClientError::from_status(400, r#"{"detail":"Rating must be between 1 and 5"}"#),
            ClientError::Validation("Rating must be between 1 and 5".to_string())
        );
        assert_eq!(
            ClientError::from_status(409, r#"{"detail":"Recipe already saved"}"#).error_code(),
            codes::CONFLICT
        );
        assert_eq!(
            ClientError::from_status(502, "bad gateway"),
            ClientError::Server {
                status: 502,
                message: "bad gateway".to_string()
            }
        );
    }

    #[test]
    fn test_structured_detail_is_stringified() {
        let err = ClientError::from_status(422, r#"{"detail":[{"loc":["body","name"]}]}"#);
        assert!(err.message().contains("loc"));
    }

    #[test]
    fn test_classification() {
        assert!(ClientError::Network("timeout".into()).is_transient());
        assert!(!ClientError::NotFound("gone".into()).is_transient());
        assert!(!ClientError::MembershipUnknown {
            recipe_id: "r1".into()
        }
        .is_transient());
    }

    #[test]
    fn test_display_includes_code() {
        let err = ClientError::Validation("Tab name is required".to_string());
        assert_eq!(err.to_string(), "VALIDATION_ERROR: Tab name is required");
    }
}
