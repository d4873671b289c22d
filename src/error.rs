//! Error types.
//!
//! Plumbing (config files, the cache file, the CLI) uses `anyhow` through the crate-level `Result`
//! alias. Anything that talks to the backend reports failures as a `SyncError` instead so callers
//! can tell a missing field from a dead network from a confused server.

use serde::{Deserialize, Serialize};

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The failure taxonomy of the synchronization layer. None of these is fatal; the worst outcome
/// of any of them is an empty or zeroed result for the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Required fields were missing. No request was sent.
    #[error("Missing required field(s): {}", fields.join(", "))]
    Validation { fields: Vec<&'static str> },

    /// There is no auth token in the session. No request was sent.
    #[error("You are not logged in: no auth token is available")]
    AuthMissing,

    /// The request never produced an HTTP response.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The server answered with a structured failure.
    #[error("Server responded with status {status}: {message}")]
    Server {
        status: u16,
        message: String,
        body: String,
    },

    /// The server answered 2xx but the body was not what the operation expects.
    #[error("Unexpected response (status {status}): expected {expected}")]
    ShapeMismatch {
        status: u16,
        expected: &'static str,
        body: String,
    },
}

impl SyncError {
    pub(crate) fn network(message: impl Into<String>) -> Self {
        SyncError::Network {
            message: message.into(),
        }
    }

    /// True when the failure happened below HTTP, i.e. when trying another transport makes sense.
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Network { .. })
    }

    /// The `{status, body, message}` triple for failures that reached the wire.
    pub fn details(&self) -> Option<ErrorDetails> {
        match self {
            SyncError::Validation { .. } | SyncError::AuthMissing => None,
            SyncError::Network { message } => Some(ErrorDetails {
                status: None,
                body: None,
                message: message.clone(),
            }),
            SyncError::Server {
                status,
                message,
                body,
            } => Some(ErrorDetails {
                status: Some(*status),
                body: Some(body.clone()),
                message: message.clone(),
            }),
            SyncError::ShapeMismatch { status, body, .. } => Some(ErrorDetails {
                status: Some(*status),
                body: Some(body.clone()),
                message: self.to_string(),
            }),
        }
    }
}

/// Diagnostic detail attached to a failed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_fields() {
        let e = SyncError::Validation {
            fields: vec!["valor", "data"],
        };
        assert_eq!(e.to_string(), "Missing required field(s): valor, data");
        assert!(e.details().is_none());
        assert!(!e.is_network());
    }

    #[test]
    fn test_server_details() {
        let e = SyncError::Server {
            status: 500,
            message: "boom".to_string(),
            body: r#"{"message":"boom"}"#.to_string(),
        };
        let details = e.details().unwrap();
        assert_eq!(details.status, Some(500));
        assert_eq!(details.message, "boom");
    }

    #[test]
    fn test_network_is_network() {
        assert!(SyncError::network("connection refused").is_network());
        assert!(!SyncError::AuthMissing.is_network());
    }
}
