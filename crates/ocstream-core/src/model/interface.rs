use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of output queues tracked per interface.
pub const QUEUE_SLOTS: usize = 8;

/// Operational counters from the linecard interface sensor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinecardCounters {
    pub init_time: i64,
    pub parent_ae_name: String,
    pub oper_status: String,
    pub carrier_transitions: i64,
    pub last_change: i64,
    pub high_speed: i64,
    pub out_octets: i64,
    pub out_unicast_pkts: i64,
    pub out_multicast_pkts: i64,
    pub out_broadcast_pkts: i64,
    pub in_octets: i64,
    pub in_unicast_pkts: i64,
    pub in_multicast_pkts: i64,
    pub in_broadcast_pkts: i64,
    pub in_errors: i64,
}

/// Attributes from the interfaces state sensor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterfaceState {
    pub if_type: String,
    pub mtu: i64,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub ifindex: i64,
    pub admin_status: String,
    pub oper_status: String,
    pub last_change: i64,
}

/// Statistics for one output queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueSlot {
    pub pkts: i64,
    pub bytes: i64,
    pub red_drop_pkts: i64,
    pub red_drop_bytes: i64,
    pub peak_buffer_occupancy: i64,
    pub avg_buffer_occupancy: i64,
    pub allocated_buffer_size: i64,
    /// Set once any metric other than the allocated buffer size arrived.
    pub has_traffic: bool,
}

/// Fixed table of output queues, indexed by queue number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueTable([QueueSlot; QUEUE_SLOTS]);

impl QueueTable {
    pub fn get(&self, queue: usize) -> Option<&QueueSlot> {
        self.0.get(queue)
    }

    pub fn get_mut(&mut self, queue: usize) -> Option<&mut QueueSlot> {
        self.0.get_mut(queue)
    }

    /// Slots that carried traffic metrics, with their queue numbers.
    pub fn active(&self) -> impl Iterator<Item = (usize, &QueueSlot)> {
        self.0.iter().enumerate().filter(|(_, slot)| slot.has_traffic)
    }

    /// Fold the slots collected in one pass into this table.
    ///
    /// A slot with traffic replaces the stored one. The allocated buffer
    /// size is only taken where `buffer_sizes` marks it as sent.
    pub fn merge(&mut self, pass: QueueTable, buffer_sizes: [bool; QUEUE_SLOTS]) {
        for ((slot, incoming), sized) in self.0.iter_mut().zip(pass.0).zip(buffer_sizes) {
            let allocated = if sized {
                incoming.allocated_buffer_size
            } else {
                slot.allocated_buffer_size
            };
            if incoming.has_traffic {
                *slot = incoming;
            }
            slot.allocated_buffer_size = allocated;
        }
    }
}

/// One physical interface, merged from the counters and state passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhyInterface {
    pub name: String,
    pub host: String,
    pub counters: LinecardCounters,
    pub queues: QueueTable,
    pub state: InterfaceState,
    pub counters_seen: bool,
    pub state_seen: bool,
    /// Stream timestamp of the most recent merged pass.
    pub updated_at: DateTime<Utc>,
}

impl PhyInterface {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            counters: LinecardCounters::default(),
            queues: QueueTable::default(),
            state: InterfaceState::default(),
            counters_seen: false,
            state_seen: false,
            updated_at,
        }
    }

    /// Both datasets have been merged at least once.
    pub fn is_complete(&self) -> bool {
        self.counters_seen && self.state_seen
    }

    /// Overwrite counters with a finished counters pass.
    pub fn merge_counters(&mut self, counters: LinecardCounters, at: DateTime<Utc>) {
        self.counters = counters;
        self.counters_seen = true;
        self.updated_at = at;
    }

    /// Overwrite state attributes with a finished state pass.
    pub fn merge_state(&mut self, state: InterfaceState, at: DateTime<Utc>) {
        self.state = state;
        self.state_seen = true;
        self.updated_at = at;
    }

    /// Operational status, preferring the state sensor's view.
    pub fn oper_status(&self) -> &str {
        if self.state.oper_status.is_empty() {
            &self.counters.oper_status
        } else {
            &self.state.oper_status
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_only_after_both_passes() {
        let now = Utc::now();
        let mut pif = PhyInterface::new("ge-0/0/0", "mx1", now);
        assert!(!pif.is_complete());

        pif.merge_state(InterfaceState::default(), now);
        assert!(!pif.is_complete());

        pif.merge_counters(LinecardCounters::default(), now);
        assert!(pif.is_complete());
    }

    #[test]
    fn oper_status_falls_back_to_counters() {
        let mut pif = PhyInterface::new("ge-0/0/0", "mx1", Utc::now());
        pif.counters.oper_status = "UP".into();
        assert_eq!(pif.oper_status(), "UP");

        pif.state.oper_status = "DOWN".into();
        assert_eq!(pif.oper_status(), "DOWN");
    }

    #[test]
    fn queue_table_rejects_out_of_range_slots() {
        let mut table = QueueTable::default();
        assert!(table.get_mut(QUEUE_SLOTS).is_none());
        if let Some(slot) = table.get_mut(3) {
            slot.has_traffic = true;
        }
        assert_eq!(table.active().map(|(q, _)| q).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn merge_keeps_slots_the_pass_did_not_carry() {
        let mut stored = QueueTable::default();
        for q in [1, 2] {
            if let Some(slot) = stored.get_mut(q) {
                slot.pkts = 10;
                slot.allocated_buffer_size = 512;
                slot.has_traffic = true;
            }
        }

        let mut pass = QueueTable::default();
        if let Some(slot) = pass.get_mut(1) {
            slot.pkts = 11;
            slot.has_traffic = true;
        }
        if let Some(slot) = pass.get_mut(2) {
            slot.allocated_buffer_size = 1024;
        }
        let mut sized = [false; QUEUE_SLOTS];
        sized[2] = true;

        stored.merge(pass, sized);
        let one = stored.get(1).map(|s| (s.pkts, s.allocated_buffer_size));
        let two = stored.get(2).map(|s| (s.pkts, s.allocated_buffer_size));
        assert_eq!(one, Some((11, 512)));
        assert_eq!(two, Some((10, 1024)));
    }
}
