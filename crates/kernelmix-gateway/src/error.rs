//! Gateway errors and mapping of HTTP / WebSocket failures to [`BackendError`].

use std::time::Duration;

use kernelmix_core::BackendError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors setting up a gateway backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("invalid gateway URL {0}")]
    InvalidUrl(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Map an HTTP status code from the gateway to a [`BackendError`].
pub(crate) fn map_http_status(status: u16, body: &str) -> BackendError {
    match status {
        404 => BackendError::NotFound(body.to_string()),
        401 | 403 => BackendError::Unauthorized(format!("HTTP {status}: {body}")),
        500..=599 => BackendError::Unavailable(format!("HTTP {status}: {body}")),
        _ => BackendError::Failed(format!("HTTP {status}: {body}")),
    }
}

/// Map a [`reqwest::Error`] to a [`BackendError`].
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(err.to_string())
    } else if err.is_connect() {
        BackendError::Unavailable(err.to_string())
    } else if err.is_decode() {
        BackendError::Protocol(err.to_string())
    } else {
        BackendError::Transport(err.to_string())
    }
}

/// Map a WebSocket handshake or stream failure to a [`BackendError`].
pub(crate) fn map_ws_error(err: tungstenite::Error) -> BackendError {
    match err {
        tungstenite::Error::Http(response) => {
            map_http_status(response.status().as_u16(), "websocket handshake rejected")
        }
        tungstenite::Error::Io(e) => BackendError::Unavailable(e.to_string()),
        other => BackendError::Transport(other.to_string()),
    }
}

/// The connect deadline elapsed.
pub(crate) fn connect_timeout(after: Duration) -> BackendError {
    BackendError::Timeout(format!("no connection after {}s", after.as_secs()))
}
