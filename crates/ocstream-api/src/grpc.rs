// gRPC clients for the device RPC surface.
//
// Thin wrappers over `tonic::client::Grpc` bound to a `Channel`, one per
// device service. Request metadata and compression are applied here;
// retry policy lives in `ocstream-core`.

use tonic::codec::{ProstCodec, Streaming};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tonic::transport::Channel;
use tonic::{Request, Status};
use tracing::debug;

use crate::error::Error;
use crate::proto::{LoginReply, LoginRequest, OpenConfigData, SubscriptionRequest};
use crate::transport::Compression;

const LOGIN_CHECK: &str = "/authentication.Login/LoginCheck";
const TELEMETRY_SUBSCRIBE: &str = "/telemetry.OpenConfigTelemetry/telemetrySubscribe";

fn not_ready(e: impl std::fmt::Display) -> Status {
    Status::unknown(format!("service was not ready: {e}"))
}

// ── Login ───────────────────────────────────────────────────────────

/// Client for `authentication.Login`.
#[derive(Debug, Clone)]
pub struct LoginClient {
    inner: tonic::client::Grpc<Channel>,
}

impl LoginClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    /// Check credentials. `Ok(false)` means the device answered but did
    /// not accept them.
    pub async fn login_check(&mut self, request: LoginRequest) -> Result<bool, Error> {
        let call = |status| Error::Rpc {
            call: "LoginCheck",
            status,
        };

        self.inner.ready().await.map_err(|e| call(not_ready(e)))?;
        let codec: ProstCodec<LoginRequest, LoginReply> = ProstCodec::default();
        let reply = self
            .inner
            .unary(
                Request::new(request),
                PathAndQuery::from_static(LOGIN_CHECK),
                codec,
            )
            .await
            .map_err(call)?;

        Ok(reply.into_inner().result)
    }
}

// ── Telemetry ───────────────────────────────────────────────────────

/// Client for `telemetry.OpenConfigTelemetry`.
#[derive(Debug, Clone)]
pub struct OpenConfigTelemetryClient {
    inner: tonic::client::Grpc<Channel>,
}

/// Credentials attached as request metadata instead of a login call.
#[derive(Debug, Clone)]
pub struct MetadataCredentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl OpenConfigTelemetryClient {
    pub fn new(channel: Channel, compression: Compression) -> Self {
        let mut inner = tonic::client::Grpc::new(channel);
        if let Some(encoding) = compression.encoding() {
            inner = inner.accept_compressed(encoding);
        }
        Self { inner }
    }

    /// Open the telemetry stream.
    ///
    /// Returns the response headers alongside the message stream so the
    /// caller can log and account for them.
    pub async fn subscribe(
        &mut self,
        request: SubscriptionRequest,
        credentials: Option<MetadataCredentials<'_>>,
    ) -> Result<(MetadataMap, Streaming<OpenConfigData>), Error> {
        let call = |status| Error::Rpc {
            call: "telemetrySubscribe",
            status,
        };

        let mut request = Request::new(request);
        if let Some(creds) = credentials {
            let md = request.metadata_mut();
            md.insert("username", ascii_value("username", creds.username)?);
            md.insert("password", ascii_value("password", creds.password)?);
            debug!("attached metadata credentials");
        }

        self.inner.ready().await.map_err(|e| call(not_ready(e)))?;
        let codec: ProstCodec<SubscriptionRequest, OpenConfigData> = ProstCodec::default();
        let response = self
            .inner
            .server_streaming(request, PathAndQuery::from_static(TELEMETRY_SUBSCRIBE), codec)
            .await
            .map_err(call)?;

        let (headers, stream, _) = response.into_parts();
        Ok((headers, stream))
    }
}

fn ascii_value(key: &'static str, value: &str) -> Result<AsciiMetadataValue, Error> {
    value.parse().map_err(|_| Error::InvalidMetadata { key })
}

/// Approximate wire size of a header map: key and value bytes.
pub fn header_bytes(headers: &MetadataMap) -> u64 {
    headers
        .clone()
        .into_headers()
        .iter()
        .map(|(k, v)| k.as_str().len() + v.len())
        .sum::<usize>()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn non_ascii_metadata_is_rejected() {
        let err = ascii_value("password", "pässwörd\n").unwrap_err();
        assert!(matches!(err, Error::InvalidMetadata { key: "password" }));
    }

    #[test]
    fn header_bytes_counts_keys_and_values() {
        let mut headers = MetadataMap::new();
        headers.insert("content-type", "application/grpc".parse().unwrap());
        assert_eq!(header_bytes(&headers), 12 + 16);
    }
}
