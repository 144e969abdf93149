use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

fn widen(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Live per-session counters, updated from the receive loop.
///
/// Cumulative over the life of the session, across reconnects.
#[derive(Debug, Default)]
pub struct SessionCounters {
    connect_attempts: AtomicU64,
    messages_in: AtomicU64,
    kv_in: AtomicU64,
    payload_bytes: AtomicU64,
    header_bytes: AtomicU64,
    sync_responses: AtomicU64,
    recv_errors: AtomicU64,
    records_emitted: AtomicU64,
}

impl SessionCounters {
    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message(&self, kv_pairs: usize, payload_bytes: usize) {
        self.messages_in.fetch_add(1, Ordering::Relaxed);
        self.kv_in.fetch_add(widen(kv_pairs), Ordering::Relaxed);
        self.payload_bytes
            .fetch_add(widen(payload_bytes), Ordering::Relaxed);
    }

    pub fn record_headers(&self, bytes: u64) {
        self.header_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_sync_response(&self) {
        self.sync_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recv_error(&self) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emitted(&self, records: usize) {
        self.records_emitted
            .fetch_add(widen(records), Ordering::Relaxed);
    }

    pub fn snapshot(&self, device_id: &str, host: &str, at: DateTime<Utc>) -> SessionStats {
        SessionStats {
            device_id: device_id.to_owned(),
            host: host.to_owned(),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            messages_in: self.messages_in.load(Ordering::Relaxed),
            kv_in: self.kv_in.load(Ordering::Relaxed),
            payload_bytes: self.payload_bytes.load(Ordering::Relaxed),
            header_bytes: self.header_bytes.load(Ordering::Relaxed),
            sync_responses: self.sync_responses.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            at,
        }
    }
}

/// Point-in-time copy of [`SessionCounters`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub device_id: String,
    pub host: String,
    pub connect_attempts: u64,
    pub messages_in: u64,
    pub kv_in: u64,
    pub payload_bytes: u64,
    pub header_bytes: u64,
    pub sync_responses: u64,
    pub recv_errors: u64,
    pub records_emitted: u64,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_activity() {
        let counters = SessionCounters::default();
        counters.record_connect_attempt();
        counters.record_connect_attempt();
        counters.record_message(3, 120);
        counters.record_message(1, 30);
        counters.record_headers(64);
        counters.record_recv_error();
        counters.record_emitted(2);

        let snap = counters.snapshot("mx1", "10.0.0.1", Utc::now());
        assert_eq!(snap.connect_attempts, 2);
        assert_eq!(snap.messages_in, 2);
        assert_eq!(snap.kv_in, 4);
        assert_eq!(snap.payload_bytes, 150);
        assert_eq!(snap.header_bytes, 64);
        assert_eq!(snap.recv_errors, 1);
        assert_eq!(snap.records_emitted, 2);
        assert_eq!(snap.sync_responses, 0);
    }
}
