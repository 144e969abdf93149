//! Collector logic between `ocstream-api` and the `ocstream` binary.
//!
//! - **[`StreamReassembler`]** — folds the flat key/value stream of one
//!   device into per-interface records, using `__prefix__` markers as
//!   group boundaries and merging the counters and state passes.
//!
//! - **[`DeviceSession`]** — dial, optional login, subscribe and receive
//!   for one device, with fixed-delay reconnects and prompt removal
//!   through a [`DeviceLifecycle`] cell.
//!
//! - **[`FleetManager`]** — one session per device; follows an add/remove
//!   event feed and stops everything on a fatal session error.
//!
//! - **[`MetricSink`]** — batches [`Record`]s from every session into
//!   InfluxDB points.
//!
//! - **[`DeviceStore`]** — durable device definitions ([`FileStore`]).

pub mod config;
pub mod error;
pub mod fleet;
pub mod model;
pub mod reassembly;
pub mod session;
pub mod sink;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DeviceConfig, DeviceLifecycle, SessionTiming, SubscriptionPath, TlsMaterial};
pub use error::CoreError;
pub use fleet::{FleetEvent, FleetManager, SessionInfo};
pub use model::{Dataset, PhyInterface, Record, SessionStats, TelemetryUpdate, TelemetryValue};
pub use reassembly::{ReassemblyError, StreamReassembler};
pub use session::{DeviceSession, SessionOutcome, SessionState};
pub use sink::{DEFAULT_BATCH_SIZE, MetricSink, PointWriter};
pub use store::{DeviceStore, FileStore, MemoryStore, StoreError};

// Wire types callers need alongside the core API.
pub use ocstream_api::{Compression, GrpcDialer, InfluxClient, InfluxConfig, Precision};
