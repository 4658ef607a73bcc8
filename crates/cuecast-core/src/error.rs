// ── Core error types ──
//
// User-facing errors from cuecast-core. Consumers never see raw WebSocket
// frames or JSON parse failures; the `From<cuecast_api::Error>` impl
// translates transport-layer errors into domain variants.

use thiserror::Error;

use crate::validator::ValidationIssue;

/// Unified error type for the core crate.
///
/// `Clone` so one failure can be delivered to every waiter of a shared
/// connect attempt and to every queued call rejected at once.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Not connected to OBS (state: {state})")]
    NotConnected { state: String },

    #[error("Cannot connect to OBS at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("OBS rejected the credentials: {message}")]
    AuthenticationRejected { message: String },

    #[error("Gave up reconnecting after {attempts} attempts")]
    MaxReconnectAttempts { attempts: u32 },

    #[error("Connection manually closed")]
    ManuallyClosed,

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Call {method} expired in the offline queue after {waited_ms}ms")]
    QueueTimeout { method: String, waited_ms: u64 },

    // ── Remote errors ────────────────────────────────────────────────
    #[error("OBS rejected {request_type} (code {code}): {message}")]
    Remote {
        request_type: String,
        code: u16,
        message: String,
    },

    #[error("{service} request failed: {message}")]
    Automation { service: String, message: String },

    #[error("{service} is unavailable")]
    ServiceUnavailable { service: String },

    // ── Validation errors ────────────────────────────────────────────
    #[error("{0}")]
    Validation(ValidationIssue),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Terminal connection errors that must not trigger a reconnect.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRejected { .. } | Self::MaxReconnectAttempts { .. }
        )
    }

    pub(crate) fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<ValidationIssue> for CoreError {
    fn from(issue: ValidationIssue) -> Self {
        Self::Validation(issue)
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<cuecast_api::Error> for CoreError {
    fn from(err: cuecast_api::Error) -> Self {
        match err {
            cuecast_api::Error::Authentication { message } => {
                CoreError::AuthenticationRejected { message }
            }
            cuecast_api::Error::WebSocketClosed { code, reason }
                if code == cuecast_api::error::CLOSE_AUTHENTICATION_FAILED =>
            {
                CoreError::AuthenticationRejected { message: reason }
            }
            cuecast_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            cuecast_api::Error::Timeout {
                operation,
                timeout_ms,
            } => CoreError::Timeout {
                operation,
                timeout_ms,
            },
            cuecast_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            cuecast_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("socket closed (code {code}): {reason}"),
            },
            cuecast_api::Error::SessionClosed => CoreError::ConnectionFailed {
                url: String::new(),
                reason: "session closed".into(),
            },
            cuecast_api::Error::Protocol(message) => {
                CoreError::Internal(format!("Protocol error: {message}"))
            }
            cuecast_api::Error::RequestFailed {
                request_type,
                code,
                comment,
            } => CoreError::Remote {
                request_type,
                code,
                message: comment.unwrap_or_else(|| "no comment".into()),
            },
            cuecast_api::Error::AutomationRequest { request, message } => CoreError::Automation {
                service: "Streamer.bot".into(),
                message: format!("{request}: {message}"),
            },
            cuecast_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_close_maps_to_terminal_rejection() {
        let err = CoreError::from(cuecast_api::Error::WebSocketClosed {
            code: 4009,
            reason: "Authentication failed.".into(),
        });
        assert!(matches!(err, CoreError::AuthenticationRejected { .. }));
        assert!(err.is_terminal());
    }

    #[test]
    fn request_failure_keeps_code_and_comment() {
        let err = CoreError::from(cuecast_api::Error::RequestFailed {
            request_type: "CreateScene".into(),
            code: 601,
            comment: Some("A scene with that name already exists".into()),
        });
        assert_eq!(
            err.to_string(),
            "OBS rejected CreateScene (code 601): A scene with that name already exists"
        );
        assert!(!err.is_terminal());
    }
}
