// ── Metric sink ──
//
// Single consumer of every session's records. Points accumulate in one
// open batch that is written once it grows past the configured size; a
// failed write keeps the batch so its points go out with the next one.

use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ocstream_api::{InfluxClient, Point};

use crate::error::CoreError;
use crate::model::Record;

/// Default number of points buffered before a write.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Destination for batches of points.
pub trait PointWriter: Send + Sync + 'static {
    fn write_points(&self, points: &[Point]) -> impl Future<Output = Result<(), CoreError>> + Send;
}

impl PointWriter for InfluxClient {
    async fn write_points(&self, points: &[Point]) -> Result<(), CoreError> {
        self.write(points).await.map_err(CoreError::from)
    }
}

/// Batches records into points and writes them out.
pub struct MetricSink<W> {
    writer: W,
    batch_size: usize,
    batch: Vec<Point>,
    written: u64,
}

impl<W: PointWriter> MetricSink<W> {
    pub fn new(writer: W, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            writer,
            batch_size,
            batch: Vec::with_capacity(batch_size + 1),
            written: 0,
        }
    }

    /// Points waiting in the open batch.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Points successfully written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Add one record, writing the batch once it exceeds the threshold.
    ///
    /// A write failure is logged and the batch kept for the next attempt.
    pub async fn push(&mut self, record: &Record) {
        self.batch.push(record.to_point());
        if self.batch.len() > self.batch_size {
            match self.flush().await {
                Ok(()) => {}
                Err(e) if e.is_transient_sink_failure() => {
                    warn!(
                        error = %e,
                        pending = self.batch.len(),
                        "batch write failed, keeping points"
                    );
                }
                Err(e) => {
                    error!(
                        error = %e,
                        pending = self.batch.len(),
                        "database rejected batch, keeping points"
                    );
                }
            }
        }
    }

    /// Write whatever is buffered.
    pub async fn flush(&mut self) -> Result<(), CoreError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.writer.write_points(&self.batch).await?;
        let count = self.batch.len();
        self.written += u64::try_from(count).unwrap_or(u64::MAX);
        self.batch.clear();
        debug!(points = count, "batch written");
        Ok(())
    }

    /// Consume records until the channel closes or `cancel` fires, then
    /// drain what is already queued and write a final batch.
    pub async fn run(
        mut self,
        mut records: mpsc::Receiver<Record>,
        cancel: CancellationToken,
    ) -> Self {
        info!(batch_size = self.batch_size, "metric sink started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = records.recv() => match next {
                    Some(record) => self.push(&record).await,
                    None => break,
                },
            }
        }

        records.close();
        while let Ok(record) = records.try_recv() {
            self.batch.push(record.to_point());
        }
        if let Err(e) = self.flush().await {
            warn!(error = %e, dropped = self.batch.len(), "final batch write failed");
        }
        info!(written = self.written, "metric sink stopped");
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::SessionStats;

    #[derive(Default)]
    struct RecordingWriter {
        batches: Mutex<Vec<usize>>,
        failing: AtomicBool,
    }

    impl PointWriter for RecordingWriter {
        async fn write_points(&self, points: &[Point]) -> Result<(), CoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(CoreError::Sink {
                    message: "database unavailable".into(),
                    status: Some(503),
                    transient: true,
                });
            }
            self.batches.lock().unwrap().push(points.len());
            Ok(())
        }
    }

    fn record(n: u64) -> Record {
        Record::SessionStats(SessionStats {
            device_id: "mx1".into(),
            host: "mx1".into(),
            connect_attempts: 1,
            messages_in: n,
            kv_in: 0,
            payload_bytes: 0,
            header_bytes: 0,
            sync_responses: 0,
            recv_errors: 0,
            records_emitted: 0,
            at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        })
    }

    #[tokio::test]
    async fn writes_once_threshold_is_exceeded() {
        let mut sink = MetricSink::new(RecordingWriter::default(), 3);
        for n in 0..3 {
            sink.push(&record(n)).await;
        }
        assert_eq!(sink.pending(), 3);
        assert!(sink.writer().batches.lock().unwrap().is_empty());

        sink.push(&record(3)).await;
        assert_eq!(sink.pending(), 0);
        assert_eq!(*sink.writer().batches.lock().unwrap(), vec![4]);
        assert_eq!(sink.written(), 4);
    }

    #[tokio::test]
    async fn failed_write_keeps_the_batch() {
        let writer = RecordingWriter::default();
        writer.failing.store(true, Ordering::SeqCst);
        let mut sink = MetricSink::new(writer, 1);

        sink.push(&record(0)).await;
        sink.push(&record(1)).await;
        assert_eq!(sink.pending(), 2);

        sink.writer().failing.store(false, Ordering::SeqCst);
        sink.push(&record(2)).await;
        assert_eq!(sink.pending(), 0);
        assert_eq!(*sink.writer().batches.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn run_drains_and_flushes_on_close() {
        let (tx, rx) = mpsc::channel(8);
        for n in 0..5 {
            tx.send(record(n)).await.unwrap();
        }
        drop(tx);

        let sink = MetricSink::new(RecordingWriter::default(), 10)
            .run(rx, CancellationToken::new())
            .await;
        assert_eq!(sink.pending(), 0);
        assert_eq!(*sink.writer().batches.lock().unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn run_stops_on_cancel_and_writes_queued_records() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(record(0)).await.unwrap();
        tx.send(record(1)).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let sink = MetricSink::new(RecordingWriter::default(), 10)
            .run(rx, cancel)
            .await;
        assert_eq!(sink.written(), 2);
    }
}
