// Seams between the session state machine and the wire.
//
// `ocstream-core` drives sessions through these traits so the connect,
// login, subscribe and receive steps can be scripted in tests without a
// device on the other end. `GrpcDialer` is the production implementation.

use std::future::Future;

use tonic::codec::Streaming;
use tonic::metadata::MetadataMap;

use crate::error::Error;
use crate::grpc::{LoginClient, MetadataCredentials, OpenConfigTelemetryClient};
use crate::proto::{LoginRequest, OpenConfigData, SubscriptionRequest};
use crate::transport::ChannelConfig;

/// Opens connections to devices.
pub trait Dialer: Send + Sync + 'static {
    type Link: DeviceLink;

    /// Dial one device. Errors for which [`Error::is_fatal`] holds are
    /// not retried by callers.
    fn dial(
        &self,
        config: &ChannelConfig,
    ) -> impl Future<Output = Result<Self::Link, Error>> + Send;
}

/// An established connection to one device.
pub trait DeviceLink: Send {
    type Stream: TelemetryStream;

    /// `authentication.Login/LoginCheck`.
    fn login(&mut self, request: LoginRequest) -> impl Future<Output = Result<bool, Error>> + Send;

    /// `telemetry.OpenConfigTelemetry/telemetrySubscribe`.
    fn subscribe(
        &mut self,
        request: SubscriptionRequest,
        credentials: Option<MetadataCredentials<'_>>,
    ) -> impl Future<Output = Result<Self::Stream, Error>> + Send;
}

/// Server-streamed telemetry messages.
pub trait TelemetryStream: Send {
    /// Response headers received when the stream opened.
    fn headers(&self) -> &MetadataMap;

    /// Next message; `Ok(None)` on clean end-of-stream.
    fn next_message(
        &mut self,
    ) -> impl Future<Output = Result<Option<OpenConfigData>, Error>> + Send;
}

// ── gRPC implementation ─────────────────────────────────────────────

/// Dials devices over `tonic` channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcDialer;

/// A live `tonic` channel with both service clients.
#[derive(Debug, Clone)]
pub struct GrpcLink {
    login: LoginClient,
    telemetry: OpenConfigTelemetryClient,
}

/// A live telemetry subscription.
pub struct GrpcTelemetryStream {
    headers: MetadataMap,
    inner: Streaming<OpenConfigData>,
}

impl Dialer for GrpcDialer {
    type Link = GrpcLink;

    async fn dial(&self, config: &ChannelConfig) -> Result<GrpcLink, Error> {
        let channel = config.connect().await?;
        Ok(GrpcLink {
            login: LoginClient::new(channel.clone()),
            telemetry: OpenConfigTelemetryClient::new(channel, config.compression),
        })
    }
}

impl DeviceLink for GrpcLink {
    type Stream = GrpcTelemetryStream;

    async fn login(&mut self, request: LoginRequest) -> Result<bool, Error> {
        self.login.login_check(request).await
    }

    async fn subscribe(
        &mut self,
        request: SubscriptionRequest,
        credentials: Option<MetadataCredentials<'_>>,
    ) -> Result<GrpcTelemetryStream, Error> {
        let (headers, inner) = self.telemetry.subscribe(request, credentials).await?;
        Ok(GrpcTelemetryStream { headers, inner })
    }
}

impl TelemetryStream for GrpcTelemetryStream {
    fn headers(&self) -> &MetadataMap {
        &self.headers
    }

    async fn next_message(&mut self) -> Result<Option<OpenConfigData>, Error> {
        self.inner.message().await.map_err(|status| Error::Rpc {
            call: "telemetrySubscribe",
            status,
        })
    }
}
