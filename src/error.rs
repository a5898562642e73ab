//! Error types for the broker

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file not found. Run 'courier-broker init' first.")]
    ConfigNotFound,

    /// Channel name fails validation (§4.1).
    #[error("Invalid channel name '{0}': {1}")]
    ChannelNameInvalid(String, String),

    /// Referenced channel absent and auto-creation does not apply.
    #[error("Channel '{0}' not found")]
    ChannelNotFound(String),

    /// JWT signature valid but `exp` has passed.
    #[error("Token expired")]
    TokenExpired,

    /// JWT malformed, signature mismatch, or missing a required claim.
    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    /// Authenticated user lacks access to the requested channel.
    #[error("Not authorized for channel '{0}'")]
    AuthorizationDenied(String),

    /// Channel's subscriber count already equals its configured limit.
    #[error("Channel full")]
    ChannelAtCapacity,

    /// Publish body is not a JSON object, or is missing required fields.
    #[error("{0}")]
    PayloadInvalid(String),

    /// A registered shutdown callback did not complete within the timeout.
    #[error("Shutdown timed out waiting on cleanup callbacks")]
    ShutdownTimeout,

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl Error {
    /// HTTP status code for this error when surfaced from a producer-facing endpoint.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::ChannelNameInvalid(..) => StatusCode::BAD_REQUEST,
            Error::ChannelNotFound(_) => StatusCode::NOT_FOUND,
            Error::TokenExpired | Error::TokenInvalid(_) => StatusCode::UNAUTHORIZED,
            Error::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
            Error::PayloadInvalid(_) => StatusCode::BAD_REQUEST,
            Error::ChannelAtCapacity => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// WebSocket close code + reason for this error when it aborts a subscribe
    /// attempt, per the state machine in spec §4.5.
    pub fn ws_close(&self) -> (u16, &'static str) {
        match self {
            Error::ChannelNameInvalid(..) => (1008, "invalid channel"),
            Error::TokenExpired | Error::TokenInvalid(_) | Error::AuthorizationDenied(_) => {
                (1008, "unauthorized")
            }
            Error::ChannelAtCapacity => (1008, "Channel full"),
            _ => (1008, "policy violation"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
