// ── Fleet manager ──
//
// Owns one DeviceSession per configured device. Sessions are added and
// removed from an event feed; a fatal session error stops everything
// and is handed back to the caller.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ocstream_api::Dialer;

use crate::config::{DeviceConfig, DeviceLifecycle, SessionTiming};
use crate::error::CoreError;
use crate::model::{Record, SessionCounters, SessionStats};
use crate::session::{DeviceSession, SessionOutcome, SessionState};

/// Membership change for the fleet.
#[derive(Debug, Clone)]
pub enum FleetEvent {
    Added(DeviceConfig),
    Removed(String),
}

/// Point-in-time view of one running session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub host: String,
    pub port: u16,
    #[serde(flatten)]
    pub state: SessionState,
    pub stats: SessionStats,
}

struct SessionHandle {
    config: Arc<DeviceConfig>,
    lifecycle: DeviceLifecycle,
    state: watch::Receiver<SessionState>,
    counters: Arc<SessionCounters>,
    generation: u64,
}

/// Cheaply cloneable handle to the running fleet.
pub struct FleetManager<D: Dialer> {
    inner: Arc<FleetInner<D>>,
}

impl<D: Dialer> Clone for FleetManager<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct FleetInner<D: Dialer> {
    dialer: Arc<D>,
    timing: SessionTiming,
    records: mpsc::Sender<Record>,
    sessions: DashMap<String, SessionHandle>,
    cancel: CancellationToken,
    generation: std::sync::atomic::AtomicU64,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    fatal_tx: mpsc::UnboundedSender<CoreError>,
    fatal_rx: Mutex<Option<mpsc::UnboundedReceiver<CoreError>>>,
}

impl<D: Dialer> FleetManager<D> {
    /// A fleet whose sessions stop when `cancel` fires.
    pub fn new(
        dialer: D,
        timing: SessionTiming,
        records: mpsc::Sender<Record>,
        cancel: CancellationToken,
    ) -> Self {
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(FleetInner {
                dialer: Arc::new(dialer),
                timing,
                records,
                sessions: DashMap::new(),
                cancel,
                generation: std::sync::atomic::AtomicU64::new(0),
                task_handles: Mutex::new(Vec::new()),
                fatal_tx,
                fatal_rx: Mutex::new(Some(fatal_rx)),
            }),
        }
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Snapshot of all sessions, ordered by device id.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let now = chrono::Utc::now();
        let mut out: Vec<SessionInfo> = self
            .inner
            .sessions
            .iter()
            .map(|entry| {
                let h = entry.value();
                SessionInfo {
                    id: h.config.id.clone(),
                    host: h.config.host.clone(),
                    port: h.config.port,
                    state: *h.state.borrow(),
                    stats: h.counters.snapshot(&h.config.id, &h.config.host, now),
                }
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Start a session for `config`, replacing any session with the same id.
    pub async fn add(&self, config: DeviceConfig) -> Result<(), CoreError> {
        let config = config.normalized();
        config.validate()?;
        let config = Arc::new(config);
        let id = config.id.clone();

        let lifecycle = DeviceLifecycle::new(&self.inner.cancel);
        let session = DeviceSession::new(
            Arc::clone(&config),
            Arc::clone(&self.inner.dialer),
            lifecycle.clone(),
            self.inner.timing,
            self.inner.records.clone(),
        );
        let generation = self
            .inner
            .generation
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let handle = SessionHandle {
            config: Arc::clone(&config),
            lifecycle,
            state: session.state(),
            counters: session.counters(),
            generation,
        };
        if let Some(previous) = self.inner.sessions.insert(id.clone(), handle) {
            info!(device = %id, "replacing running session");
            previous.lifecycle.mark_removed();
        } else {
            info!(device = %id, endpoint = %config.endpoint(), "starting session");
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = session.run().await;
            inner
                .sessions
                .remove_if(&id, |_, h| h.generation == generation);
            match result {
                Ok(SessionOutcome::Removed) => debug!(device = %id, "session removed"),
                Ok(SessionOutcome::Closed) => debug!(device = %id, "session closed"),
                Err(e) => {
                    let _ = inner.fatal_tx.send(e);
                }
            }
        });

        let mut handles = self.inner.task_handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(task);
        Ok(())
    }

    /// Flag a device as removed. Returns whether a session existed.
    pub fn remove(&self, id: &str) -> bool {
        match self.inner.sessions.remove(id) {
            Some((_, handle)) => {
                info!(device = %id, "removing session");
                handle.lifecycle.mark_removed();
                true
            }
            None => {
                debug!(device = %id, "remove for unknown device");
                false
            }
        }
    }

    /// Start the initial devices, then follow the event feed until the
    /// root token fires or a session fails fatally.
    pub async fn run(
        &self,
        initial: Vec<DeviceConfig>,
        mut events: mpsc::UnboundedReceiver<FleetEvent>,
    ) -> Result<(), CoreError> {
        let Some(mut fatal_rx) = self.inner.fatal_rx.lock().await.take() else {
            return Err(CoreError::Internal("fleet is already running".into()));
        };

        info!(devices = initial.len(), "starting fleet");
        for config in initial {
            let host = config.host.clone();
            if let Err(e) = self.add(config).await {
                warn!(host = %host, error = %e, "skipping invalid device");
            }
        }

        let mut feed_open = true;
        let result = loop {
            tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => break Ok(()),
                Some(err) = fatal_rx.recv() => {
                    error!(error = %err, "fatal session error, stopping fleet");
                    break Err(err);
                }
                event = events.recv(), if feed_open => match event {
                    Some(FleetEvent::Added(config)) => {
                        let host = config.host.clone();
                        if let Err(e) = self.add(config).await {
                            warn!(host = %host, error = %e, "rejected device");
                        }
                    }
                    Some(FleetEvent::Removed(id)) => {
                        self.remove(&id);
                    }
                    None => {
                        debug!("device event feed closed");
                        feed_open = false;
                    }
                },
            }
        };

        self.shutdown().await;
        result
    }

    /// Cancel every session and wait for them to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        let count = handles.len();
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        self.inner.sessions.clear();
        debug!(tasks = count, "fleet stopped");
    }
}
