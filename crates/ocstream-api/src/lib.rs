// ocstream-api: wire layer for the telemetry collector.
//
// Device-facing gRPC (login, telemetry subscription) and the InfluxDB
// line-protocol writer. No retry or lifecycle policy lives here.

pub mod error;
pub mod grpc;
pub mod influx;
pub mod link;
pub mod proto;
pub mod transport;

pub use error::Error;
pub use grpc::MetadataCredentials;
pub use influx::{FieldValue, InfluxClient, InfluxConfig, Point, Precision};
pub use link::{DeviceLink, Dialer, GrpcDialer, TelemetryStream};
pub use transport::{ChannelConfig, Compression, TlsFiles};
