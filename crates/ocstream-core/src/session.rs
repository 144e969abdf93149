// ── Device session ──
//
// One long-lived telemetry subscription: dial, optional login,
// subscribe, then feed every received message through a reassembler and
// hand completed records to the sink. Dial and login failures loop back
// to a new connect cycle after a fixed delay; TLS and subscription
// failures end the process.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use prost::Message as _;
use serde::Serialize;
use strum::Display;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use ocstream_api::grpc::header_bytes;
use ocstream_api::proto::OpenConfigData;
use ocstream_api::{DeviceLink, Dialer, TelemetryStream};

use crate::config::{DeviceConfig, DeviceLifecycle, SessionTiming};
use crate::error::CoreError;
use crate::model::{Dataset, Record, SessionCounters, TelemetryUpdate};
use crate::reassembly::StreamReassembler;

// ── SessionState ────────────────────────────────────────────────────

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Authenticating,
    Subscribing,
    Streaming,
    Reconnecting { attempt: u32 },
    Removed,
    Closed,
    Failed,
}

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The device was deleted.
    Removed,
    /// The collector is shutting down.
    Closed,
}

/// Result of one connect cycle.
enum Cycle {
    /// Removal or shutdown observed.
    Stopped,
    /// The device closed the stream cleanly.
    EndOfStream,
}

enum CycleError {
    Retry(CoreError),
    Fatal(CoreError),
}

// ── DeviceSession ───────────────────────────────────────────────────

/// A supervised subscription to one device.
pub struct DeviceSession<D: Dialer> {
    config: Arc<DeviceConfig>,
    dialer: Arc<D>,
    lifecycle: DeviceLifecycle,
    timing: SessionTiming,
    records: mpsc::Sender<Record>,
    state: watch::Sender<SessionState>,
    counters: Arc<SessionCounters>,
}

impl<D: Dialer> DeviceSession<D> {
    pub fn new(
        config: Arc<DeviceConfig>,
        dialer: Arc<D>,
        lifecycle: DeviceLifecycle,
        timing: SessionTiming,
        records: mpsc::Sender<Record>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            config,
            dialer,
            lifecycle,
            timing,
            records,
            state,
            counters: Arc::new(SessionCounters::default()),
        }
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn counters(&self) -> Arc<SessionCounters> {
        Arc::clone(&self.counters)
    }

    /// Drive the session until removal, shutdown or a fatal error.
    pub async fn run(self) -> Result<SessionOutcome, CoreError> {
        let span = info_span!("session", device = %self.config.id, host = %self.config.host);
        self.supervise().instrument(span).await
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    fn finish(&self) -> SessionOutcome {
        if self.lifecycle.is_removed() {
            info!("device removed, session exiting");
            self.set_state(SessionState::Removed);
            SessionOutcome::Removed
        } else {
            info!("session closed");
            self.set_state(SessionState::Closed);
            SessionOutcome::Closed
        }
    }

    // ── Reconnect loop ──────────────────────────────────────────────

    async fn supervise(&self) -> Result<SessionOutcome, CoreError> {
        let mut attempt: u32 = 0;

        loop {
            if self.lifecycle.is_stopped() {
                return Ok(self.finish());
            }

            self.set_state(SessionState::Connecting);
            self.counters.record_connect_attempt();

            match self.connect_and_stream().await {
                Ok(Cycle::Stopped) => return Ok(self.finish()),
                Ok(Cycle::EndOfStream) => {
                    info!("stream ended by device, reconnecting");
                    attempt = 0;
                }
                Err(CycleError::Fatal(e)) => {
                    error!(error = %e, "fatal session error");
                    self.set_state(SessionState::Failed);
                    return Err(e);
                }
                Err(CycleError::Retry(e)) => {
                    attempt = attempt.saturating_add(1);
                    warn!(error = %e, attempt, "connect cycle failed");
                }
            }

            self.set_state(SessionState::Reconnecting { attempt });
            let delay = self.timing.retry_delay;
            debug!(delay_ms = millis(delay), attempt, "waiting before reconnect");
            if !self.pause(delay).await {
                return Ok(self.finish());
            }
        }
    }

    /// Sleep unless stopped first. Returns `false` when stopped.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.lifecycle.stopped() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }

    // ── One connect cycle ───────────────────────────────────────────

    async fn connect_and_stream(&self) -> Result<Cycle, CycleError> {
        let config = &self.config;
        let channel = config.channel_config(self.timing.connect_timeout);
        info!(endpoint = %config.endpoint(), tls = channel.tls.is_some(), "connecting");

        let dialed = tokio::select! {
            biased;
            () = self.lifecycle.stopped() => return Ok(Cycle::Stopped),
            r = self.dialer.dial(&channel) => r,
        };
        let mut link = dialed.map_err(|e| self.classify_dial_error(e))?;

        if let Some(request) = config.login_request() {
            if self.lifecycle.is_removed() {
                return Ok(Cycle::Stopped);
            }
            self.set_state(SessionState::Authenticating);

            let login = tokio::select! {
                biased;
                () = self.lifecycle.stopped() => return Ok(Cycle::Stopped),
                r = link.login(request) => r,
            };
            match login {
                Ok(true) => info!(user = %config.username, "authenticated"),
                Ok(false) => warn!(
                    user = %config.username,
                    "login rejected by device, continuing unauthenticated"
                ),
                Err(e) => {
                    return Err(CycleError::Retry(CoreError::AuthenticationFailed {
                        message: e.to_string(),
                    }));
                }
            }
        }

        self.set_state(SessionState::Subscribing);
        let subscribed = tokio::select! {
            biased;
            () = self.lifecycle.stopped() => return Ok(Cycle::Stopped),
            r = link.subscribe(config.subscription_request(), config.metadata_credentials()) => r,
        };
        let mut stream = subscribed.map_err(|e| {
            CycleError::Fatal(CoreError::SubscriptionRejected {
                device: config.id.clone(),
                message: e.to_string(),
            })
        })?;

        let headers = stream.headers();
        self.counters.record_headers(header_bytes(headers));
        info!(
            headers = %format_headers(headers),
            paths = config.paths.len(),
            "subscribed, waiting for data"
        );

        self.set_state(SessionState::Streaming);
        self.receive(&mut stream).await
    }

    fn classify_dial_error(&self, e: ocstream_api::Error) -> CycleError {
        if e.is_fatal() {
            let err = match CoreError::from(e) {
                CoreError::TlsSetup { message, .. } => CoreError::TlsSetup {
                    device: self.config.id.clone(),
                    message,
                },
                other => other,
            };
            CycleError::Fatal(err)
        } else {
            CycleError::Retry(e.into())
        }
    }

    // ── Receive loop ────────────────────────────────────────────────

    async fn receive<S: TelemetryStream>(&self, stream: &mut S) -> Result<Cycle, CycleError> {
        let mut reassembler = StreamReassembler::new(self.config.host.clone());
        let mut ticker = stats_ticker(self.timing.stats_interval);

        loop {
            tokio::select! {
                biased;
                () = self.lifecycle.stopped() => return Ok(Cycle::Stopped),
                () = next_tick(&mut ticker) => {
                    let stats =
                        self.counters
                            .snapshot(&self.config.id, &self.config.host, Utc::now());
                    if !self.deliver(vec![Record::SessionStats(stats)]).await {
                        return Ok(Cycle::Stopped);
                    }
                }
                received = stream.next_message() => match received {
                    Ok(Some(message)) => {
                        if !self.handle_message(&mut reassembler, message).await {
                            return Ok(Cycle::Stopped);
                        }
                    }
                    Ok(None) => return Ok(Cycle::EndOfStream),
                    Err(e) => {
                        self.counters.record_recv_error();
                        warn!(
                            error = %e,
                            code = ?e.rpc_code(),
                            cooldown_ms = millis(self.timing.recv_error_cooldown),
                            "receive error"
                        );
                        if !self.pause(self.timing.recv_error_cooldown).await {
                            return Ok(Cycle::Stopped);
                        }
                    }
                },
            }
        }
    }

    /// Returns `false` when the session should stop.
    async fn handle_message(
        &self,
        reassembler: &mut StreamReassembler,
        message: OpenConfigData,
    ) -> bool {
        self.counters
            .record_message(message.kv.len(), message.encoded_len());

        if message.sync_response {
            self.counters.record_sync_response();
            info!("received sync response");
            return true;
        }

        let dataset = Dataset::from_path(&message.path);
        if dataset == Dataset::Unknown {
            trace!(path = %message.path, "message for unhandled path");
            return true;
        }

        let updates = TelemetryUpdate::from_message(message);
        let records = reassembler.ingest(dataset, &updates);
        if records.is_empty() {
            return true;
        }
        self.counters.record_emitted(records.len());
        self.deliver(records).await
    }

    /// Hand records to the sink, waiting for queue space.
    async fn deliver(&self, records: Vec<Record>) -> bool {
        for record in records {
            let sent = tokio::select! {
                biased;
                () = self.lifecycle.stopped() => return false,
                r = self.records.send(record) => r,
            };
            if sent.is_err() {
                warn!("metric sink is gone, stopping session");
                return false;
            }
        }
        true
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn stats_ticker(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn format_headers(headers: &tonic::metadata::MetadataMap) -> String {
    let mut out = String::new();
    for (key, value) in headers.clone().into_headers().iter() {
        if !out.is_empty() {
            out.push_str(", ");
        }
        let _ = write!(out, "{key}: {}", value.to_str().unwrap_or("<binary>"));
    }
    out
}
