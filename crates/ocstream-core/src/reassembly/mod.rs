// ── Stream reassembly ──
//
// Devices flatten each interface into key/value pairs and interleave
// interfaces inside one stream. A `__prefix__` marker names the
// interface whose pairs follow and closes the group before it. Counters
// and state attributes arrive on separate sensors, so one interface is
// assembled from (at least) one pass of each, joined by name.

pub mod keys;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::model::{
    Dataset, InterfaceState, LinecardCounters, PhyInterface, QUEUE_SLOTS, QueueStats, QueueTable,
    Record, TelemetryUpdate, TelemetryValue,
};

use keys::{PREFIX_KEY, QUEUE_KEY_PREFIX, parse_prefix_name, parse_queue_key};

/// A single update the reassembler could not use. Never fatal; the
/// update is dropped and in-progress state is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReassemblyError {
    #[error("boundary marker without name='...'] token: {value}")]
    MalformedPrefix { value: String },

    #[error("malformed queue key {key}: {reason}")]
    MalformedQueueKey { key: String, reason: &'static str },

    #[error("unrecognized field {key} for {dataset} path")]
    UnrecognizedField { dataset: Dataset, key: String },

    #[error("{key}: expected {expected} value, got {got}")]
    ValueType {
        key: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("{key} arrived before any boundary marker on {dataset} path")]
    MissingPrefix { dataset: Dataset, key: String },
}

// ── Working groups ──────────────────────────────────────────────────

/// Pairs collected since the last boundary marker on one sensor.
#[derive(Debug, Default)]
struct Group<T> {
    /// Name from the opening marker; `None` until the first marker.
    name: Option<String>,
    opened_at: Option<DateTime<Utc>>,
    /// At least one field was routed into `data`.
    touched: bool,
    data: T,
}

impl<T: Default> Group<T> {
    /// Close the current group and open a new one for `name`.
    fn reopen(&mut self, name: &str, at: DateTime<Utc>) -> Option<(String, DateTime<Utc>, T)> {
        let prev = std::mem::take(self);
        self.name = Some(name.to_owned());
        self.opened_at = Some(at);

        match prev {
            Group {
                name: Some(name),
                opened_at: Some(opened_at),
                touched: true,
                data,
            } => Some((name, opened_at, data)),
            _ => None,
        }
    }

    fn is_open(&self) -> bool {
        self.name.is_some()
    }
}

#[derive(Debug, Default)]
struct CountersPass {
    counters: LinecardCounters,
    /// At least one interface counter was routed, as opposed to queue
    /// metrics only.
    carried_counters: bool,
    queues: QueueTable,
    buffer_sizes: [bool; QUEUE_SLOTS],
}

// ── Reassembler ─────────────────────────────────────────────────────

/// Per-device reassembly state.
///
/// Owned by exactly one session. The entity map survives boundary
/// markers; the two working groups are reset by them.
#[derive(Debug)]
pub struct StreamReassembler {
    host: String,
    entities: HashMap<String, PhyInterface>,
    counters: Group<CountersPass>,
    state: Group<InterfaceState>,
}

impl StreamReassembler {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            entities: HashMap::new(),
            counters: Group::default(),
            state: Group::default(),
        }
    }

    /// Current view of one interface.
    pub fn entity(&self, name: &str) -> Option<&PhyInterface> {
        self.entities.get(name)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Feed all updates of one message, logging per-update problems.
    pub fn ingest(&mut self, dataset: Dataset, updates: &[TelemetryUpdate]) -> Vec<Record> {
        let mut out = Vec::new();
        for update in updates {
            match self.feed(dataset, update) {
                Ok(records) => out.extend(records),
                Err(e @ ReassemblyError::UnrecognizedField { .. }) => {
                    debug!(host = %self.host, error = %e, "skipping field");
                }
                Err(e) => {
                    warn!(host = %self.host, error = %e, "dropping update");
                }
            }
        }
        out
    }

    /// Route one update to the entry point for its dataset.
    pub fn feed(
        &mut self,
        dataset: Dataset,
        update: &TelemetryUpdate,
    ) -> Result<Vec<Record>, ReassemblyError> {
        match dataset {
            Dataset::Counters => self.feed_counters(update),
            Dataset::State => self.feed_state(update),
            Dataset::Logical | Dataset::Unknown => Ok(Vec::new()),
        }
    }

    /// Entry point for the linecard interface sensor.
    pub fn feed_counters(
        &mut self,
        update: &TelemetryUpdate,
    ) -> Result<Vec<Record>, ReassemblyError> {
        if update.key == PREFIX_KEY {
            let name = prefix_name(update)?;
            let Some((name, at, pass)) = self.counters.reopen(name, update.timestamp) else {
                return Ok(Vec::new());
            };
            return Ok(self.finish_counters(name, at, pass));
        }

        if is_internal(&update.key) {
            return Ok(Vec::new());
        }
        if !self.counters.is_open() {
            return Err(missing_prefix(Dataset::Counters, update));
        }
        route_counter(&mut self.counters.data, update)?;
        self.counters.touched = true;
        Ok(Vec::new())
    }

    /// Entry point for the interfaces state sensor.
    pub fn feed_state(&mut self, update: &TelemetryUpdate) -> Result<Vec<Record>, ReassemblyError> {
        if update.key == PREFIX_KEY {
            let name = prefix_name(update)?;
            let Some((name, at, state)) = self.state.reopen(name, update.timestamp) else {
                return Ok(Vec::new());
            };
            return Ok(self.finish_state(name, at, state));
        }

        if is_internal(&update.key) {
            return Ok(Vec::new());
        }
        if !self.state.is_open() {
            return Err(missing_prefix(Dataset::State, update));
        }
        if route_state(&mut self.state.data, update)? {
            self.state.touched = true;
        }
        Ok(Vec::new())
    }

    // ── Merge and emit ──────────────────────────────────────────────

    fn entity_mut(&mut self, name: &str, at: DateTime<Utc>) -> &mut PhyInterface {
        self.entities
            .entry(name.to_owned())
            .or_insert_with(|| PhyInterface::new(name, self.host.clone(), at))
    }

    fn finish_counters(
        &mut self,
        name: String,
        at: DateTime<Utc>,
        pass: CountersPass,
    ) -> Vec<Record> {
        let queue_records: Vec<QueueStats> = pass
            .queues
            .active()
            .map(|(queue, slot)| QueueStats {
                name: name.clone(),
                host: self.host.clone(),
                queue,
                slot: slot.clone(),
                at,
            })
            .collect();

        let entity = self.entity_mut(&name, at);
        entity.queues.merge(pass.queues, pass.buffer_sizes);
        entity.updated_at = at;
        if pass.carried_counters {
            entity.merge_counters(pass.counters, at);
        }
        trace!(interface = %name, counters = pass.carried_counters, "merged counters pass");
        if !entity.is_complete() {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(queue_records.len() + 1);
        if pass.carried_counters {
            out.push(Record::PhyInterface(Box::new(entity.clone())));
        }
        out.extend(queue_records.into_iter().map(Record::QueueStats));
        out
    }

    fn finish_state(
        &mut self,
        name: String,
        at: DateTime<Utc>,
        state: InterfaceState,
    ) -> Vec<Record> {
        let entity = self.entity_mut(&name, at);
        entity.merge_state(state, at);
        trace!(interface = %name, "merged state pass");
        if entity.is_complete() {
            vec![Record::PhyInterface(Box::new(entity.clone()))]
        } else {
            Vec::new()
        }
    }
}

// ── Field routing ───────────────────────────────────────────────────

fn prefix_name(update: &TelemetryUpdate) -> Result<&str, ReassemblyError> {
    let value = update
        .value
        .as_str()
        .ok_or_else(|| value_type(update, "string"))?;
    parse_prefix_name(value)
}

fn missing_prefix(dataset: Dataset, update: &TelemetryUpdate) -> ReassemblyError {
    ReassemblyError::MissingPrefix {
        dataset,
        key: update.key.clone(),
    }
}

fn value_type(update: &TelemetryUpdate, expected: &'static str) -> ReassemblyError {
    ReassemblyError::ValueType {
        key: update.key.clone(),
        expected,
        got: update.value.kind(),
    }
}

fn int(update: &TelemetryUpdate) -> Result<i64, ReassemblyError> {
    update.value.as_i64().ok_or_else(|| value_type(update, "integer"))
}

fn string(update: &TelemetryUpdate) -> Result<String, ReassemblyError> {
    update
        .value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| value_type(update, "string"))
}

fn boolean(update: &TelemetryUpdate) -> Result<bool, ReassemblyError> {
    update.value.as_bool().ok_or_else(|| value_type(update, "boolean"))
}

/// Keys the device uses for its own bookkeeping.
fn is_internal(key: &str) -> bool {
    key.starts_with("__") || key.starts_with('/')
}

fn unrecognized(dataset: Dataset, update: &TelemetryUpdate) -> ReassemblyError {
    ReassemblyError::UnrecognizedField {
        dataset,
        key: update.key.clone(),
    }
}

fn route_counter(pass: &mut CountersPass, update: &TelemetryUpdate) -> Result<(), ReassemblyError> {
    if update.key.starts_with(QUEUE_KEY_PREFIX) {
        return route_queue(pass, update);
    }

    let c = &mut pass.counters;
    match update.key.as_str() {
        "init_time" => c.init_time = int(update)?,
        "parent_ae_name" => c.parent_ae_name = string(update)?,
        "oper-status" => c.oper_status = string(update)?,
        "carrier-transitions" => c.carrier_transitions = int(update)?,
        "last-change" => c.last_change = int(update)?,
        "high-speed" => c.high_speed = int(update)?,
        "counters/out-octets" => c.out_octets = int(update)?,
        "counters/out-unicast-pkts" => c.out_unicast_pkts = int(update)?,
        "counters/out-multicast-pkts" => c.out_multicast_pkts = int(update)?,
        "counters/out-broadcast-pkts" => c.out_broadcast_pkts = int(update)?,
        "counters/in-octets" => c.in_octets = int(update)?,
        "counters/in-unicast-pkts" => c.in_unicast_pkts = int(update)?,
        "counters/in-multicast-pkts" => c.in_multicast_pkts = int(update)?,
        "counters/in-broadcast-pkts" => c.in_broadcast_pkts = int(update)?,
        "counters/in-errors" => c.in_errors = int(update)?,
        _ => return Err(unrecognized(Dataset::Counters, update)),
    }
    pass.carried_counters = true;
    Ok(())
}

fn route_queue(pass: &mut CountersPass, update: &TelemetryUpdate) -> Result<(), ReassemblyError> {
    let (queue, metric) = parse_queue_key(&update.key)?;
    let value = int(update)?;
    let (Some(slot), Some(sized)) =
        (pass.queues.get_mut(queue), pass.buffer_sizes.get_mut(queue))
    else {
        return Err(ReassemblyError::MalformedQueueKey {
            key: update.key.clone(),
            reason: "queue number out of range",
        });
    };

    match metric {
        "allocated-buffer-size" => {
            slot.allocated_buffer_size = value;
            *sized = true;
            return Ok(());
        }
        "pkts" => slot.pkts = value,
        "bytes" => slot.bytes = value,
        "avg-buffer-occupancy" => slot.avg_buffer_occupancy = value,
        "peak-buffer-occupancy" => slot.peak_buffer_occupancy = value,
        "red-drop-pkts" => slot.red_drop_pkts = value,
        "red-drop-bytes" => slot.red_drop_bytes = value,
        _ => return Err(unrecognized(Dataset::Counters, update)),
    }
    slot.has_traffic = true;
    Ok(())
}

/// Returns whether a state field was written.
fn route_state(
    state: &mut InterfaceState,
    update: &TelemetryUpdate,
) -> Result<bool, ReassemblyError> {
    match update.key.as_str() {
        "state/type" => state.if_type = string(update)?,
        "state/mtu" => state.mtu = int(update)?,
        "state/name" => state.name = string(update)?,
        "state/description" => state.description = string(update)?,
        "state/enabled" => state.enabled = boolean(update)?,
        "state/ifindex" => state.ifindex = int(update)?,
        "state/admin-status" => state.admin_status = string(update)?,
        "state/oper-status" => state.oper_status = string(update)?,
        "state/last-change" => state.last_change = int(update)?,
        // Repeats the name carried by the marker.
        "name" => return Ok(false),
        _ => return Err(unrecognized(Dataset::State, update)),
    }
    Ok(true)
}

impl TelemetryUpdate {
    /// Boundary marker for `name`, as a device would send it.
    pub fn prefix(name: &str, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            PREFIX_KEY,
            TelemetryValue::Str(format!("/interfaces/interface[name='{name}']/")),
            timestamp,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn int_kv(key: &str, v: i64) -> TelemetryUpdate {
        TelemetryUpdate::new(key, TelemetryValue::Int(v), at(1))
    }

    fn str_kv(key: &str, v: &str) -> TelemetryUpdate {
        TelemetryUpdate::new(key, TelemetryValue::Str(v.into()), at(1))
    }

    fn prefix(name: &str) -> TelemetryUpdate {
        TelemetryUpdate::prefix(name, at(1))
    }

    fn feed_all(
        r: &mut StreamReassembler,
        dataset: Dataset,
        updates: &[TelemetryUpdate],
    ) -> Vec<Record> {
        updates
            .iter()
            .flat_map(|u| r.feed(dataset, u).unwrap())
            .collect()
    }

    fn interfaces(records: &[Record]) -> Vec<&PhyInterface> {
        records
            .iter()
            .filter_map(|r| match r {
                Record::PhyInterface(p) => Some(p.as_ref()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn two_pass_example_merges_counters_and_state() {
        let mut r = StreamReassembler::new("mx1");

        let counters = feed_all(
            &mut r,
            Dataset::Counters,
            &[
                prefix("ge-0/0/0"),
                int_kv("counters/in-octets", 100),
                int_kv("counters/out-octets", 200),
                prefix("ge-0/0/1"),
            ],
        );
        assert!(counters.is_empty(), "state not seen yet");

        let state = feed_all(
            &mut r,
            Dataset::State,
            &[
                prefix("ge-0/0/0"),
                int_kv("state/mtu", 1500),
                str_kv("state/admin-status", "up"),
                prefix("ge-0/0/1"),
            ],
        );

        let emitted = interfaces(&state);
        assert_eq!(emitted.len(), 1);
        let pif = emitted[0];
        assert_eq!(pif.name, "ge-0/0/0");
        assert_eq!(pif.host, "mx1");
        assert_eq!(pif.counters.in_octets, 100);
        assert_eq!(pif.counters.out_octets, 200);
        assert_eq!(pif.state.mtu, 1500);
        assert_eq!(pif.state.admin_status, "up");
        assert!(pif.counters_seen && pif.state_seen);
    }

    #[test]
    fn pass_order_does_not_matter() {
        let mut r = StreamReassembler::new("mx1");

        feed_all(
            &mut r,
            Dataset::State,
            &[prefix("xe-1/0/0"), int_kv("state/mtu", 9192), prefix("lo0")],
        );
        let out = feed_all(
            &mut r,
            Dataset::Counters,
            &[prefix("xe-1/0/0"), int_kv("counters/in-errors", 3), prefix("lo0")],
        );

        let emitted = interfaces(&out);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].state.mtu, 9192);
        assert_eq!(emitted[0].counters.in_errors, 3);
    }

    #[test]
    fn boundary_finalizes_only_the_previous_group() {
        let mut r = StreamReassembler::new("mx1");
        feed_all(
            &mut r,
            Dataset::Counters,
            &[
                prefix("a"),
                int_kv("counters/in-octets", 1),
                prefix("b"),
                int_kv("counters/in-octets", 2),
            ],
        );

        assert_eq!(r.entity("a").unwrap().counters.in_octets, 1);
        assert!(r.entity("b").is_none(), "open tail is never finalized");
    }

    #[test]
    fn later_passes_overwrite_and_emit_again() {
        let mut r = StreamReassembler::new("mx1");
        feed_all(
            &mut r,
            Dataset::State,
            &[prefix("a"), str_kv("state/admin-status", "up"), prefix("z")],
        );
        let first = feed_all(
            &mut r,
            Dataset::Counters,
            &[prefix("a"), int_kv("counters/in-octets", 10), prefix("z")],
        );
        let second = feed_all(
            &mut r,
            Dataset::Counters,
            &[
                int_kv("counters/in-octets", 99),
                prefix("a"),
                int_kv("counters/in-octets", 20),
                prefix("z"),
            ],
        );

        assert_eq!(interfaces(&first)[0].counters.in_octets, 10);
        assert_eq!(interfaces(&second)[0].counters.in_octets, 20);
        assert_eq!(interfaces(&first)[0].counters.in_octets, 10, "snapshots are independent");
    }

    #[test]
    fn queue_update_sets_only_its_slot() {
        let mut r = StreamReassembler::new("mx1");
        feed_all(&mut r, Dataset::State, &[prefix("a"), int_kv("state/mtu", 1), prefix("z")]);
        let out = feed_all(
            &mut r,
            Dataset::Counters,
            &[
                prefix("a"),
                int_kv("counters/in-octets", 1),
                int_kv("out-queue[queue-number=3]/pkts", 42),
                int_kv("out-queue[queue-number=5]/allocated-buffer-size", 4096),
                prefix("z"),
            ],
        );

        let pif = interfaces(&out)[0];
        for q in 0..crate::model::QUEUE_SLOTS {
            let slot = pif.queues.get(q).unwrap();
            if q == 3 {
                assert_eq!(slot.pkts, 42);
            } else {
                assert_eq!(slot.pkts, 0);
            }
        }
        assert_eq!(pif.queues.get(5).unwrap().allocated_buffer_size, 4096);

        let queues: Vec<_> = out
            .iter()
            .filter_map(|r| match r {
                Record::QueueStats(q) => Some(q.queue),
                _ => None,
            })
            .collect();
        assert_eq!(queues, vec![3], "buffer size alone is not traffic");
    }

    #[test]
    fn queue_only_pass_keeps_interface_counters() {
        let mut r = StreamReassembler::new("mx1");
        feed_all(&mut r, Dataset::State, &[prefix("a"), int_kv("state/mtu", 1500), prefix("z")]);
        let first = feed_all(
            &mut r,
            Dataset::Counters,
            &[
                prefix("a"),
                int_kv("counters/in-octets", 100),
                int_kv("counters/out-octets", 200),
                int_kv("out-queue[queue-number=1]/allocated-buffer-size", 512),
                prefix("z"),
            ],
        );
        assert_eq!(interfaces(&first)[0].counters.in_octets, 100);

        let second = feed_all(
            &mut r,
            Dataset::Counters,
            &[prefix("a"), int_kv("out-queue[queue-number=0]/pkts", 5), prefix("z")],
        );
        assert!(interfaces(&second).is_empty());
        let queues: Vec<_> = second
            .iter()
            .filter_map(|r| match r {
                Record::QueueStats(q) => Some((q.queue, q.slot.pkts)),
                _ => None,
            })
            .collect();
        assert_eq!(queues, vec![(0, 5)]);

        let third = feed_all(
            &mut r,
            Dataset::Counters,
            &[
                prefix("a"),
                int_kv("out-queue[queue-number=1]/allocated-buffer-size", 1024),
                prefix("z"),
            ],
        );
        assert!(third.is_empty());

        let pif = r.entity("a").unwrap();
        assert_eq!(pif.counters.in_octets, 100);
        assert_eq!(pif.counters.out_octets, 200);
        assert_eq!(pif.queues.get(0).unwrap().pkts, 5);
        assert_eq!(pif.queues.get(1).unwrap().allocated_buffer_size, 1024);
    }

    #[test]
    fn internal_only_group_is_discarded() {
        let mut r = StreamReassembler::new("mx1");
        feed_all(&mut r, Dataset::State, &[prefix("a"), int_kv("state/mtu", 1500), prefix("z")]);
        let out = feed_all(
            &mut r,
            Dataset::Counters,
            &[
                prefix("a"),
                int_kv("__junos_re_stream_creation_timestamp__", 1),
                str_kv("/junos/system/linecard/interface/", "x"),
                prefix("z"),
            ],
        );
        assert!(out.is_empty());
        assert!(!r.entity("a").unwrap().counters_seen);
    }

    #[test]
    fn internal_keys_before_first_marker_are_skipped() {
        let mut r = StreamReassembler::new("mx1");
        assert_eq!(r.feed(Dataset::Counters, &int_kv("__timestamp__", 1)), Ok(Vec::new()));
        assert_eq!(r.feed(Dataset::State, &int_kv("__timestamp__", 1)), Ok(Vec::new()));
        assert!(matches!(
            r.feed(Dataset::Counters, &int_kv("counters/in-octets", 1)),
            Err(ReassemblyError::MissingPrefix { .. })
        ));
    }

    #[test]
    fn red_drop_bytes_lands_in_its_own_field() {
        let mut r = StreamReassembler::new("mx1");
        feed_all(
            &mut r,
            Dataset::Counters,
            &[
                prefix("a"),
                int_kv("out-queue[queue-number=1]/red-drop-pkts", 5),
                int_kv("out-queue[queue-number=1]/red-drop-bytes", 700),
                prefix("z"),
            ],
        );
        let slot = r.entity("a").unwrap().queues.get(1).unwrap().clone();
        assert_eq!(slot.red_drop_pkts, 5);
        assert_eq!(slot.red_drop_bytes, 700);
    }

    #[test]
    fn malformed_prefix_leaves_group_intact() {
        let mut r = StreamReassembler::new("mx1");
        r.feed_counters(&prefix("a")).unwrap();
        r.feed_counters(&int_kv("counters/in-octets", 7)).unwrap();

        let err = r
            .feed_counters(&str_kv(PREFIX_KEY, "/interfaces/interface/"))
            .unwrap_err();
        assert!(matches!(err, ReassemblyError::MalformedPrefix { .. }));
        assert!(r.entity("a").is_none(), "malformed marker finalizes nothing");

        r.feed_counters(&prefix("b")).unwrap();
        assert_eq!(r.entity("a").unwrap().counters.in_octets, 7);
    }

    #[test]
    fn malformed_queue_key_is_dropped() {
        let mut r = StreamReassembler::new("mx1");
        r.feed_counters(&prefix("a")).unwrap();
        let err = r
            .feed_counters(&int_kv("out-queue[queue-number=x]/pkts", 1))
            .unwrap_err();
        assert!(matches!(err, ReassemblyError::MalformedQueueKey { .. }));

        let err = r
            .feed_counters(&int_kv("out-queue[queue-number=9]/pkts", 1))
            .unwrap_err();
        assert!(matches!(err, ReassemblyError::MalformedQueueKey { .. }));

        r.feed_counters(&int_kv("counters/in-octets", 1)).unwrap();
        r.feed_counters(&prefix("z")).unwrap();
        assert_eq!(r.entity("a").unwrap().queues.active().count(), 0);
    }

    #[test]
    fn unknown_and_internal_keys() {
        let mut r = StreamReassembler::new("mx1");
        r.feed_state(&prefix("a")).unwrap();

        let err = r.feed_state(&int_kv("state/counters/in-pkts", 1)).unwrap_err();
        assert_eq!(
            err,
            ReassemblyError::UnrecognizedField {
                dataset: Dataset::State,
                key: "state/counters/in-pkts".into()
            }
        );
        assert!(r.feed_state(&int_kv("__timestamp__", 1)).unwrap().is_empty());
        assert!(r.feed_state(&str_kv("/junos/ignored", "x")).unwrap().is_empty());

        let err = r
            .feed_counters(&int_kv("out-queue[queue-number=1]/tail-drop", 1))
            .unwrap_err();
        assert!(matches!(err, ReassemblyError::MissingPrefix { .. }));
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let mut r = StreamReassembler::new("mx1");
        r.feed_counters(&prefix("a")).unwrap();
        let err = r.feed_counters(&str_kv("counters/in-octets", "lots")).unwrap_err();
        assert_eq!(
            err,
            ReassemblyError::ValueType {
                key: "counters/in-octets".into(),
                expected: "integer",
                got: "string"
            }
        );
    }

    #[test]
    fn group_without_fields_is_discarded() {
        let mut r = StreamReassembler::new("mx1");
        feed_all(
            &mut r,
            Dataset::Counters,
            &[prefix("a"), prefix("b"), int_kv("counters/in-octets", 1), prefix("c")],
        );
        assert!(r.entity("a").is_none());
        assert!(r.entity("b").is_some());
        assert_eq!(r.entity_count(), 1);
    }

    #[test]
    fn malformed_input_does_not_corrupt_other_entities() {
        let mut r = StreamReassembler::new("mx1");
        let updates = vec![
            prefix("a"),
            int_kv("counters/in-octets", 11),
            str_kv(PREFIX_KEY, "garbage"),
            int_kv("out-queue[queue-number=]/pkts", 3),
            str_kv("counters/out-octets", "nan"),
            prefix("b"),
            int_kv("counters/in-octets", 22),
            prefix("c"),
        ];
        let out = r.ingest(Dataset::Counters, &updates);
        assert!(out.is_empty());
        assert_eq!(r.entity("a").unwrap().counters.in_octets, 11);
        assert_eq!(r.entity("a").unwrap().counters.out_octets, 0);
        assert_eq!(r.entity("b").unwrap().counters.in_octets, 22);
    }

    #[test]
    fn logical_and_unknown_datasets_are_ignored() {
        let mut r = StreamReassembler::new("mx1");
        assert!(r.feed(Dataset::Logical, &prefix("a")).unwrap().is_empty());
        assert!(r.feed(Dataset::Unknown, &int_kv("x", 1)).unwrap().is_empty());
        assert_eq!(r.entity_count(), 0);
    }
}
