//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and stable exit codes.

use cuecast_config::ConfigError;
use cuecast_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 5;
    pub const UNAVAILABLE: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to OBS at {url}")]
    #[diagnostic(
        code(cuecast::connection_failed),
        help(
            "Check that OBS is running and the WebSocket server is enabled\n\
             (Tools > WebSocket Server Settings).\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Lost the connection to OBS ({state})")]
    #[diagnostic(code(cuecast::not_connected))]
    NotConnected { state: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("OBS rejected the password")]
    #[diagnostic(
        code(cuecast::auth_failed),
        help(
            "Check the password in OBS under Tools > WebSocket Server Settings.\n\
             Store it with: cuecast config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    // ── Remote ───────────────────────────────────────────────────────
    #[error("OBS rejected {request_type} (code {code}): {message}")]
    #[diagnostic(code(cuecast::remote))]
    Remote {
        request_type: String,
        code: u16,
        message: String,
    },

    #[error("{service} is unavailable")]
    #[diagnostic(
        code(cuecast::unavailable),
        help("Check that {service} is running and its WebSocket server is enabled.")
    )]
    ServiceUnavailable { service: String },

    #[error("{message}")]
    #[diagnostic(code(cuecast::action_failed))]
    ActionFailed { message: String },

    #[error("Batch failed: {message}")]
    #[diagnostic(
        code(cuecast::batch_failed),
        help("Completed steps were rolled back where possible; see the report above.")
    )]
    BatchFailed { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(cuecast::validation))]
    Validation { field: String, reason: String },

    #[error("Validation failed:\n{summary}")]
    #[diagnostic(
        code(cuecast::invalid_actions),
        help("Run: cuecast status to see scenes and sources OBS currently has")
    )]
    InvalidActions { summary: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(cuecast::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: cuecast config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(cuecast::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("{operation} timed out after {millis}ms")]
    #[diagnostic(
        code(cuecast::timeout),
        help("Increase the timeout with --timeout or check that OBS is responsive.")
    )]
    Timeout { operation: String, millis: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(cuecast::json), help("Check the JSON contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    #[diagnostic(code(cuecast::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Remote { .. } | Self::ActionFailed { .. } | Self::BatchFailed { .. } => {
                exit_code::REJECTED
            }
            Self::ServiceUnavailable { .. } => exit_code::UNAVAILABLE,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::InvalidActions { .. } | Self::Json(_) => {
                exit_code::USAGE
            }
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: String::new(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::AuthenticationRejected { message: _ } => CliError::AuthFailed {
                profile: "current".into(),
            },

            CoreError::NotConnected { state } => CliError::NotConnected { state },

            CoreError::MaxReconnectAttempts { attempts } => CliError::NotConnected {
                state: format!("gave up after {attempts} reconnect attempts"),
            },

            CoreError::ManuallyClosed => CliError::NotConnected {
                state: "closed".into(),
            },

            CoreError::Timeout {
                operation,
                timeout_ms,
            } => CliError::Timeout {
                operation,
                millis: timeout_ms,
            },

            CoreError::QueueTimeout { method, waited_ms } => CliError::Timeout {
                operation: format!("{method} (waiting for connection)"),
                millis: waited_ms,
            },

            CoreError::Remote {
                request_type,
                code,
                message,
            } => CliError::Remote {
                request_type,
                code,
                message,
            },

            CoreError::Automation { service, message } => CliError::ActionFailed {
                message: format!("{service}: {message}"),
            },

            CoreError::ServiceUnavailable { service } => CliError::ServiceUnavailable { service },

            CoreError::Validation(issue) => CliError::InvalidActions {
                summary: issue.to_string(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
