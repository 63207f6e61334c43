use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::FutureExt;
use tokio::sync::{Mutex, watch};
use typed_builder::TypedBuilder;

use crate::batch::{Destination, FrozenBatch};
use crate::batch_buffer::{AppendOutcome, BatchBuffer, BatchBufferConfig, DEFAULT_THRESHOLD_BYTES, Phase};
use crate::error::SinkError;
use crate::observer::{FlushObserver, FlushReport, TracingObserver};
use crate::record::{Clock, Record, SystemClock};
use crate::sink::{BulkSink, FlushResult};
use crate::size::{JsonSizeEstimator, SizeEstimator};

pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a [`FlushCoordinator`] is built from.
#[derive(TypedBuilder)]
pub struct CoordinatorOptions {
    destination: Destination,

    sink: Arc<dyn BulkSink>,

    /// estimated size at which a batch is flushed
    #[builder(default = DEFAULT_THRESHOLD_BYTES)]
    threshold: usize,

    /// upper bound for one sink call; exceeding it is a transport error
    #[builder(default = DEFAULT_FLUSH_TIMEOUT)]
    flush_timeout: Duration,

    #[builder(default = Arc::new(JsonSizeEstimator) as Arc<dyn SizeEstimator>)]
    estimator: Arc<dyn SizeEstimator>,

    #[builder(default = Arc::new(TracingObserver) as Arc<dyn FlushObserver>)]
    observer: Arc<dyn FlushObserver>,

    #[builder(default = Arc::new(SystemClock) as Arc<dyn Clock>)]
    clock: Arc<dyn Clock>,
}

/// Point-in-time view of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub phase: Phase,
    pub active_records: usize,
    pub active_size: usize,
    pub overflow_records: usize,
    pub records_appended: u64,
    pub batches_flushed: u64,
    pub batches_partial: u64,
    pub batches_failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    appended: AtomicU64,
    flushed: AtomicU64,
    partial: AtomicU64,
    failed: AtomicU64,
}

///
/// # Batching engine
///
/// Accepts records from the ingress side, hands full batches to the sink on a
/// spawned task and keeps accepting records while that write is in flight.
///
/// At most one flush runs at a time. The buffer and its phase sit behind a single
/// lock; the decision to flush, the switch to `Flushing`, the completion and the
/// threshold recheck that follows it each happen inside one critical section.
/// Cloning is cheap and every clone drives the same buffer.
///
#[derive(Clone)]
pub struct FlushCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    buffer: Mutex<BatchBuffer>,
    sink: Arc<dyn BulkSink>,
    observer: Arc<dyn FlushObserver>,
    clock: Arc<dyn Clock>,
    flush_timeout: Duration,
    /// `true` while no flush is in flight
    idle: watch::Sender<bool>,
    counters: Counters,
}

impl FlushCoordinator {
    pub fn new(options: CoordinatorOptions) -> Self {
        let buffer = BatchBuffer::new(
            options.destination,
            options.estimator,
            BatchBufferConfig {
                threshold: options.threshold,
            },
        );
        let (idle, _) = watch::channel(true);

        Self {
            inner: Arc::new(Inner {
                buffer: Mutex::new(buffer),
                sink: options.sink,
                observer: options.observer,
                clock: options.clock,
                flush_timeout: options.flush_timeout,
                idle,
                counters: Counters::default(),
            }),
        }
    }

    pub fn sink_name(&self) -> String {
        self.inner.sink.name()
    }

    /// Ingress entry point: stamp the message and buffer it.
    ///
    /// Never waits for a flush and never fails.
    pub async fn append(&self, topic: &str, payload: impl Into<Bytes>) {
        let record = Record::new(topic, payload, self.inner.clock.as_ref());
        self.append_record(record).await
    }

    pub async fn append_record(&self, record: Record) {
        let outcome = {
            let mut buffer = self.inner.buffer.lock().await;
            let outcome = buffer.append(record);
            self.inner.counters.appended.fetch_add(1, Ordering::Relaxed);
            if let AppendOutcome::FlushTriggered(_) = outcome {
                self.inner.idle.send_replace(false);
            }
            outcome
        };

        match outcome {
            AppendOutcome::Buffered(level) => self.inner.observer.on_fill(level),
            AppendOutcome::Overflowed { overflow_len } => {
                tracing::trace!(overflow_len, "flush in flight, record held in overflow");
            }
            AppendOutcome::FlushTriggered(batch) => {
                tracing::debug!(
                    seq = batch.seq(),
                    records = batch.len(),
                    estimated_size = batch.estimated_size(),
                    "threshold reached, flushing batch"
                );
                let inner = self.inner.clone();
                tokio::spawn(async move { inner.run_flushes(batch).await });
            }
        }
    }

    /// Resolves once no flush is in flight.
    pub async fn wait_idle(&self) {
        let mut idle = self.inner.idle.subscribe();
        // the sender lives as long as `self`, so this cannot observe a closed channel
        let _ = idle.wait_for(|idle| *idle).await;
    }

    /// Wait for the in-flight flush, then flush whatever is still buffered.
    ///
    /// Ingress should be stopped first; records appended concurrently are flushed
    /// too, but only as long as this call is still running.
    pub async fn close(&self) {
        loop {
            self.wait_idle().await;

            let batch = {
                let mut buffer = self.inner.buffer.lock().await;
                match buffer.drain() {
                    Some(batch) => {
                        self.inner.idle.send_replace(false);
                        batch
                    }
                    // an append started a flush after we saw idle
                    None if buffer.is_flushing() => continue,
                    None => break,
                }
            };

            tracing::info!(
                seq = batch.seq(),
                records = batch.len(),
                "flushing remaining records before shutdown"
            );
            self.inner.run_flushes(batch).await;
        }

        let snapshot = self.snapshot().await;
        tracing::info!(
            appended = snapshot.records_appended,
            flushed = snapshot.batches_flushed,
            partial = snapshot.batches_partial,
            failed = snapshot.batches_failed,
            "flush coordinator closed"
        );
    }

    pub async fn snapshot(&self) -> Snapshot {
        let buffer = self.inner.buffer.lock().await;
        let counters = &self.inner.counters;
        let fill = buffer.fill_level();

        Snapshot {
            phase: buffer.phase(),
            active_records: fill.records,
            active_size: fill.estimated_size,
            overflow_records: buffer.overflow_len(),
            records_appended: counters.appended.load(Ordering::Relaxed),
            batches_flushed: counters.flushed.load(Ordering::Relaxed),
            batches_partial: counters.partial.load(Ordering::Relaxed),
            batches_failed: counters.failed.load(Ordering::Relaxed),
        }
    }
}

impl Inner {
    /// Flush `batch`, then keep going for as long as the overflow left behind
    /// by each completion is already over the threshold.
    async fn run_flushes(&self, mut batch: FrozenBatch) {
        loop {
            let report = self.flush_one(batch).await;
            self.observer.on_flush_complete(&report);

            let next = {
                let mut buffer = self.buffer.lock().await;
                let next = buffer.complete_flush(report.seq);
                if next.is_none() {
                    self.idle.send_replace(true);
                }
                next
            };

            match next {
                Some(overflow) => batch = overflow,
                None => return,
            }
        }
    }

    /// The batch is consumed whatever the result: failed batches are not retried.
    async fn flush_one(&self, batch: FrozenBatch) -> FlushReport {
        let started = Instant::now();

        let write = AssertUnwindSafe(self.sink.flush(&batch)).catch_unwind();
        let result = match tokio::time::timeout(self.flush_timeout, write).await {
            Ok(Ok(result)) => result,
            // the phase must still be released, so a panic is a failed write
            Ok(Err(panic)) => FlushResult::TransportError(SinkError::Unavailable(format!(
                "sink panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Err(_) => FlushResult::TransportError(SinkError::Timeout(self.flush_timeout)),
        };

        let counter = match result {
            FlushResult::Success => &self.counters.flushed,
            FlushResult::PartialFailure(_) => &self.counters.partial,
            FlushResult::TransportError(_) => &self.counters.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        FlushReport {
            seq: batch.seq(),
            record_count: batch.len(),
            estimated_size: batch.estimated_size(),
            elapsed: started.elapsed(),
            result,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod coordinator_test;
