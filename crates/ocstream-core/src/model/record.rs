// ── Emittable records ──
//
// Everything the collector writes is one of these. Each kind maps to a
// single sink point through a pure function.

use chrono::{DateTime, Utc};
use serde::Serialize;

use ocstream_api::Point;

use super::interface::{PhyInterface, QueueSlot};
use super::stats::SessionStats;

pub const PHY_INTERFACE_MEASUREMENT: &str = "phy_interface";
pub const QUEUE_MEASUREMENT: &str = "phy_interface_queue";
pub const SESSION_STATS_MEASUREMENT: &str = "grpc_stats";

/// One output queue of one interface, as of a counters pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub name: String,
    pub host: String,
    pub queue: usize,
    pub slot: QueueSlot,
    pub at: DateTime<Utc>,
}

/// A completed record ready for the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    PhyInterface(Box<PhyInterface>),
    QueueStats(QueueStats),
    SessionStats(SessionStats),
}

impl Record {
    pub fn to_point(&self) -> Point {
        match self {
            Self::PhyInterface(pif) => phy_interface_point(pif),
            Self::QueueStats(q) => queue_point(q),
            Self::SessionStats(s) => session_stats_point(s),
        }
    }
}

fn phy_interface_point(pif: &PhyInterface) -> Point {
    let c = &pif.counters;
    Point::new(PHY_INTERFACE_MEASUREMENT, pif.updated_at)
        .tag("name", pif.name.as_str())
        .tag("host", pif.host.as_str())
        .tag("desc", pif.state.description.as_str())
        .tag("ae_name", c.parent_ae_name.as_str())
        .tag("oper_state", pif.oper_status())
        .tag("admin_state", pif.state.admin_status.as_str())
        .field("carrier_transitions", c.carrier_transitions)
        .field("last_change", c.last_change)
        .field("counters_out_octets", c.out_octets)
        .field("counters_out_unicast_pkts", c.out_unicast_pkts)
        .field("counters_out_multicast_pkts", c.out_multicast_pkts)
        .field("counters_out_broadcast_pkts", c.out_broadcast_pkts)
        .field("counters_in_octets", c.in_octets)
        .field("counters_in_unicast_pkts", c.in_unicast_pkts)
        .field("counters_in_multicast_pkts", c.in_multicast_pkts)
        .field("counters_in_broadcast_pkts", c.in_broadcast_pkts)
        .field("counters_in_errors", c.in_errors)
        .field("mtu", pif.state.mtu)
}

fn queue_point(q: &QueueStats) -> Point {
    let s = &q.slot;
    Point::new(QUEUE_MEASUREMENT, q.at)
        .tag("name", q.name.as_str())
        .tag("host", q.host.as_str())
        .tag("queue", q.queue.to_string())
        .field("pkts", s.pkts)
        .field("bytes", s.bytes)
        .field("red_drop_pkts", s.red_drop_pkts)
        .field("red_drop_bytes", s.red_drop_bytes)
        .field("peak_buffer_occupancy", s.peak_buffer_occupancy)
        .field("avg_buffer_occupancy", s.avg_buffer_occupancy)
        .field("allocated_buffer_size", s.allocated_buffer_size)
}

fn session_stats_point(s: &SessionStats) -> Point {
    Point::new(SESSION_STATS_MEASUREMENT, s.at)
        .tag("host", s.host.as_str())
        .tag("device_id", s.device_id.as_str())
        .field("connect_attempts", s.connect_attempts)
        .field("messages_in", s.messages_in)
        .field("kv_in", s.kv_in)
        .field("payload_bytes", s.payload_bytes)
        .field("header_bytes", s.header_bytes)
        .field("sync_responses", s.sync_responses)
        .field("recv_errors", s.recv_errors)
        .field("records_emitted", s.records_emitted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ocstream_api::FieldValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn phy_interface_point_tags_and_fields() {
        let mut pif = PhyInterface::new("ge-0/0/0", "mx1", Utc::now());
        pif.counters.in_octets = 100;
        pif.counters.out_octets = 200;
        pif.counters.parent_ae_name = "ae0".into();
        pif.state.mtu = 1500;
        pif.state.admin_status = "UP".into();
        pif.state.description = "core uplink".into();

        let point = Record::PhyInterface(Box::new(pif)).to_point();

        assert_eq!(point.measurement, "phy_interface");
        assert_eq!(point.tags["ae_name"], "ae0");
        assert_eq!(point.tags["admin_state"], "UP");
        assert_eq!(point.tags["desc"], "core uplink");
        assert_eq!(point.fields["counters_in_octets"], FieldValue::Int(100));
        assert_eq!(point.fields["counters_out_octets"], FieldValue::Int(200));
        assert_eq!(point.fields["mtu"], FieldValue::Int(1500));
        assert_eq!(point.fields.len(), 12);
    }

    #[test]
    fn queue_point_is_tagged_with_queue_number() {
        let record = Record::QueueStats(QueueStats {
            name: "xe-0/0/1".into(),
            host: "mx1".into(),
            queue: 3,
            slot: QueueSlot {
                pkts: 42,
                has_traffic: true,
                ..Default::default()
            },
            at: Utc::now(),
        });

        let point = record.to_point();
        assert_eq!(point.measurement, "phy_interface_queue");
        assert_eq!(point.tags["queue"], "3");
        assert_eq!(point.fields["pkts"], FieldValue::Int(42));
    }

    #[test]
    fn session_stats_point_has_device_tags() {
        let stats = crate::model::SessionCounters::default().snapshot(
            "edge-1",
            "10.1.1.1",
            Utc::now(),
        );
        let point = Record::SessionStats(stats).to_point();
        assert_eq!(point.measurement, "grpc_stats");
        assert_eq!(point.tags["device_id"], "edge-1");
        assert_eq!(point.fields["messages_in"], FieldValue::Int(0));
    }
}
