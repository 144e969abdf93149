//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use ocstream_config::ConfigError;
use ocstream_core::{CoreError, StoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const CONFIG: i32 = 78;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Fatal session errors ─────────────────────────────────────────
    #[error("TLS setup failed for device {device}: {message}")]
    #[diagnostic(
        code(ocstream::tls),
        help(
            "Check the ca, client_crt and client_key paths stored for the device.\n\
             Run: ocstream devices list"
        )
    )]
    Tls { device: String, message: String },

    #[error("Device {device} rejected the telemetry subscription: {message}")]
    #[diagnostic(
        code(ocstream::subscription_rejected),
        help("Check the subscribed sensor paths and the device's telemetry configuration.")
    )]
    SubscriptionRejected { device: String, message: String },

    #[error("Could not reach {endpoint}: {reason}")]
    #[diagnostic(code(ocstream::connection_failed))]
    ConnectionFailed { endpoint: String, reason: String },

    // ── Sink ─────────────────────────────────────────────────────────
    #[error("InfluxDB write failed: {message}")]
    #[diagnostic(
        code(ocstream::sink),
        help("Check [sink] url, database and credentials in the configuration.")
    )]
    Sink { message: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Device '{identifier}' not found")]
    #[diagnostic(code(ocstream::not_found), help("Run: ocstream devices list"))]
    NotFound { identifier: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ocstream::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(ocstream::store))]
    Store(#[from] StoreError),

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(ocstream::config),
        help("Show the effective configuration with: ocstream config show")
    )]
    Config(#[from] ConfigError),

    #[error("Configuration file already exists: {path}")]
    #[diagnostic(code(ocstream::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(ocstream::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(ocstream::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. }
            | Self::Tls { .. }
            | Self::SubscriptionRejected { .. } => exit_code::CONNECTION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Config(_) | Self::ConfigExists { .. } => exit_code::CONFIG,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TlsSetup { device, message } => CliError::Tls { device, message },

            CoreError::SubscriptionRejected { device, message } => {
                CliError::SubscriptionRejected { device, message }
            }

            CoreError::ConnectionFailed { endpoint, reason } => {
                CliError::ConnectionFailed { endpoint, reason }
            }

            CoreError::AuthenticationFailed { message } | CoreError::Stream { message } => {
                CliError::ConnectionFailed {
                    endpoint: "(device)".into(),
                    reason: message,
                }
            }

            CoreError::Sink { message, .. } => CliError::Sink { message },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "device".into(),
                reason: message,
            },

            CoreError::Store(e) => CliError::Store(e),

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
