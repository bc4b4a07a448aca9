//! Error normalization for API responses.

use reqwest::StatusCode;
use serde_json::Value;

/// Page the caller is sent to once the session is gone
pub const LOGIN_PATH: &str = "/login";

pub const NETWORK_MESSAGE: &str = "Unable to reach the server. Please check your connection.";

/// A failed API call, reduced to what a user needs to see.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (HTTP {status})")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    /// Set when the session ended and the user must sign in again
    pub redirect_to: Option<String>,
}

impl ApiError {
    /// Build from a status and the raw response body.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = extract_message(body).unwrap_or_else(|| default_message(status).to_string());
        let redirect_to = (status == StatusCode::UNAUTHORIZED).then(|| LOGIN_PATH.to_string());
        Self {
            status: status.as_u16(),
            message,
            redirect_to,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED.as_u16()
    }

    pub fn is_conflict(&self) -> bool {
        self.status == StatusCode::CONFLICT.as_u16()
    }
}

/// Fixed message for a status when the body carries none
pub fn default_message(status: StatusCode) -> &'static str {
    match status.as_u16() {
        401 => "Your session has expired. Please log in again.",
        403 => "You do not have permission to perform this action.",
        404 => "The requested resource was not found.",
        500 => "An internal server error occurred.",
        502..=504 => "The server is temporarily unavailable. Please try again later.",
        _ => "An unexpected error occurred.",
    }
}

/// Best-effort message from a JSON error body: `detail`, then `message`,
/// then `error`. A `detail` list takes the first entry's `msg`.
pub fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["detail", "message", "error"].iter().find_map(|key| match value.get(*key)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Array(items) => items
            .first()
            .and_then(|item| item.get("msg").or_else(|| item.get("message")))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    })
}

/// Everything a client call can fail with
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{}", NETWORK_MESSAGE)]
    Network(#[source] reqwest::Error),
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Client storage failed: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Not signed in")]
    NotSignedIn,
}

impl ClientError {
    /// HTTP status of an API failure, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api(err) => Some(err.status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err)
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
