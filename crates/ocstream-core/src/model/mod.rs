// ── Telemetry domain model ──
//
// Updates as they come off the wire, the per-interface entity the
// reassembler builds from them, and the closed set of records handed to
// the metric sink.

pub mod interface;
pub mod record;
pub mod stats;
pub mod update;

pub use interface::{
    InterfaceState, LinecardCounters, PhyInterface, QUEUE_SLOTS, QueueSlot, QueueTable,
};
pub use record::{QueueStats, Record};
pub use stats::{SessionCounters, SessionStats};
pub use update::{Dataset, TelemetryUpdate, TelemetryValue};
