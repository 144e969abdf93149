// ── Core error types ──
//
// Errors surfaced by sessions, the fleet, the sink and the device store.
// The `From<ocstream_api::Error>` impl translates wire-layer failures
// into collector-level variants; parse-local conditions never get here.

use thiserror::Error;

use crate::store::StoreError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Fatal ────────────────────────────────────────────────────────
    #[error("TLS setup failed for {device}: {message}")]
    TlsSetup { device: String, message: String },

    #[error("Subscription rejected by {device}: {message}")]
    SubscriptionRejected { device: String, message: String },

    // ── Session-retryable ────────────────────────────────────────────
    #[error("Cannot connect to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Authentication call failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Stream ───────────────────────────────────────────────────────
    #[error("Stream error: {message}")]
    Stream { message: String },

    // ── Sink ─────────────────────────────────────────────────────────
    #[error("Sink write failed: {message}")]
    Sink {
        message: String,
        /// HTTP status code, when the database answered.
        status: Option<u16>,
        /// A later retry of the same batch may succeed.
        transient: bool,
    },

    // ── Device definitions ───────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Errors that terminate the whole collector: retrying cannot fix
    /// broken TLS material, a rejected subscription or a bad endpoint.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TlsSetup { .. } | Self::SubscriptionRejected { .. } | Self::Config { .. }
        )
    }

    /// Sink failures a later retry of the same batch may clear.
    pub fn is_transient_sink_failure(&self) -> bool {
        matches!(self, Self::Sink { transient: true, .. })
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<ocstream_api::Error> for CoreError {
    fn from(err: ocstream_api::Error) -> Self {
        use ocstream_api::Error as Api;

        let transient = err.is_transient();
        match err {
            Api::TlsRead { what, path, source } => CoreError::TlsSetup {
                device: String::new(),
                message: format!("cannot read {what} {path}: {source}"),
            },
            Api::Tls(message) => CoreError::TlsSetup {
                device: String::new(),
                message,
            },
            Api::InvalidEndpoint { endpoint, reason } => CoreError::Config {
                message: format!("invalid endpoint {endpoint}: {reason}"),
            },
            Api::Connect { endpoint, source } => CoreError::ConnectionFailed {
                endpoint,
                reason: source.to_string(),
            },
            Api::Rpc { call, status } => CoreError::Stream {
                message: format!("{call}: {}", status.message()),
            },
            Api::InvalidMetadata { key } => CoreError::ValidationFailed {
                message: format!("{key} cannot be sent as request metadata"),
            },
            Api::Transport(e) => CoreError::Sink {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
                transient,
            },
            Api::SinkRejected { status, body } => CoreError::Sink {
                message: body,
                status: Some(status),
                transient,
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_errors_carry_wire_classification() {
        let busy = CoreError::from(ocstream_api::Error::SinkRejected {
            status: 503,
            body: "busy".into(),
        });
        assert!(busy.is_transient_sink_failure());

        let bad = CoreError::from(ocstream_api::Error::SinkRejected {
            status: 400,
            body: "unable to parse".into(),
        });
        assert!(!bad.is_transient_sink_failure());
        assert!(matches!(bad, CoreError::Sink { status: Some(400), .. }));
    }
}
