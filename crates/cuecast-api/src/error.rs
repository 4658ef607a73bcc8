use thiserror::Error;

/// Close code obs-websocket sends when the Identify authentication string
/// does not match.
pub const CLOSE_AUTHENTICATION_FAILED: u16 = 4009;

/// Top-level error type for the `cuecast-api` crate.
///
/// Covers every failure mode across both wire clients: handshake and
/// authentication, transport, request correlation, and payload decoding.
/// `cuecast-core` maps these into user-facing diagnostics.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The remote side rejected our credentials (close code 4009 or a
    /// password-protected server with no password configured).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request or handshake timed out.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed while a request was pending or the session was live.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// The session task is gone; no further requests can be sent.
    #[error("Session is no longer running")]
    SessionClosed,

    // ── Protocol ────────────────────────────────────────────────────
    /// The peer sent something the handshake did not expect.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// obs-websocket answered a request with `requestStatus.result == false`.
    #[error("{request_type} failed (code {code}){}", comment_suffix(.comment))]
    RequestFailed {
        request_type: String,
        code: u16,
        comment: Option<String>,
    },

    /// Streamer.bot answered a request with `"status": "error"`.
    #[error("Streamer.bot request {request} failed: {message}")]
    AutomationRequest { request: String, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON (de)serialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the credentials were rejected.
    /// These must never be retried automatically.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Authentication { .. } => true,
            Self::WebSocketClosed { code, .. } => *code == CLOSE_AUTHENTICATION_FAILED,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::WebSocketConnect(_) | Self::SessionClosed => true,
            Self::WebSocketClosed { code, .. } => *code != CLOSE_AUTHENTICATION_FAILED,
            _ => false,
        }
    }

    /// Build a [`Error::Deserialization`] from a serde failure and the raw text.
    pub(crate) fn decode(err: &serde_json::Error, body: &str) -> Self {
        Self::Deserialization {
            message: err.to_string(),
            body: body.to_owned(),
        }
    }
}

fn comment_suffix(comment: &Option<String>) -> String {
    comment.as_deref().map(|c| format!(": {c}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_close_code_is_not_transient() {
        let err = Error::WebSocketClosed {
            code: CLOSE_AUTHENTICATION_FAILED,
            reason: "Authentication failed.".into(),
        };
        assert!(err.is_auth_failure());
        assert!(!err.is_transient());
    }

    #[test]
    fn generic_close_is_transient() {
        let err = Error::WebSocketClosed {
            code: 1006,
            reason: String::new(),
        };
        assert!(!err.is_auth_failure());
        assert!(err.is_transient());
    }

    #[test]
    fn request_failed_renders_comment() {
        let err = Error::RequestFailed {
            request_type: "SetCurrentProgramScene".into(),
            code: 600,
            comment: Some("No source was found".into()),
        };
        assert_eq!(
            err.to_string(),
            "SetCurrentProgramScene failed (code 600): No source was found"
        );
    }
}
