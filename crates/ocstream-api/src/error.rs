use thiserror::Error;

/// Top-level error type for the `ocstream-api` crate.
///
/// Covers every failure mode of the wire layer: dialing a device,
/// loading TLS material, gRPC calls on an open channel, and writes to
/// the time-series sink. `ocstream-core` decides which of these are
/// retried and which stop the process.
#[derive(Debug, Error)]
pub enum Error {
    // ── TLS material ────────────────────────────────────────────────
    /// A certificate, key or CA file could not be read from disk.
    #[error("failed to read {what} from {path}: {source}")]
    TlsRead {
        what: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// PEM material was read but is not usable (no certificate found,
    /// unparsable key, CA rejected by the trust pool).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Transport ───────────────────────────────────────────────────
    /// The device endpoint string could not be turned into a URI.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Dialing the device failed (refused, DNS, handshake, timeout).
    #[error("could not connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    // ── gRPC ────────────────────────────────────────────────────────
    /// A gRPC call on an established channel returned a non-OK status.
    #[error("gRPC call {call} failed: {status}")]
    Rpc {
        call: &'static str,
        #[source]
        status: tonic::Status,
    },

    /// A credential could not be encoded as ASCII request metadata.
    #[error("invalid request metadata for {key}")]
    InvalidMetadata { key: &'static str },

    // ── Sink ────────────────────────────────────────────────────────
    /// HTTP transport error talking to the time-series database.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The time-series database answered the write with a non-2xx status.
    #[error("sink rejected write (HTTP {status}): {body}")]
    SinkRejected { status: u16, body: String },

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` for failures that no amount of retrying will fix:
    /// broken TLS material and malformed endpoints.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TlsRead { .. } | Self::Tls(_) | Self::InvalidEndpoint { .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connect { .. } => true,
            Self::Rpc { status, .. } => matches!(
                status.code(),
                tonic::Code::Unavailable
                    | tonic::Code::DeadlineExceeded
                    | tonic::Code::ResourceExhausted
                    | tonic::Code::Aborted
                    | tonic::Code::Unknown
            ),
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::SinkRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The gRPC status code, if this error came from a call.
    pub fn rpc_code(&self) -> Option<tonic::Code> {
        match self {
            Self::Rpc { status, .. } => Some(status.code()),
            _ => None,
        }
    }
}
