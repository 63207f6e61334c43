use std::mem;
use std::sync::Arc;

use crate::batch::{Batch, Destination, FrozenBatch};
use crate::record::Record;
use crate::size::SizeEstimator;

/// 300 KiB, measured by [`crate::size::JsonSizeEstimator`].
pub const DEFAULT_THRESHOLD_BYTES: usize = 300 * 1024;

/// Configuration for the batch buffer
#[derive(Debug, Clone)]
pub struct BatchBufferConfig {
    /// Estimated size at which the active batch is frozen and flushed
    pub threshold: usize,
}

impl Default for BatchBufferConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No flush in flight.
    Idle,
    /// Batch `seq` is being written; the active batch accumulates overflow.
    Flushing { seq: u64 },
}

/// How full the active batch is relative to the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillLevel {
    pub records: usize,
    pub estimated_size: usize,
    pub threshold: usize,
}

impl FillLevel {
    pub fn ratio(&self) -> f64 {
        if self.threshold == 0 {
            return 1.0;
        }
        self.estimated_size as f64 / self.threshold as f64
    }
}

#[derive(Debug)]
pub enum AppendOutcome {
    /// Record joined the active batch, which is still below the threshold.
    Buffered(FillLevel),
    /// Record joined the overflow while a flush is in flight.
    Overflowed { overflow_len: usize },
    /// Record filled the active batch; the frozen batch must be flushed.
    FlushTriggered(FrozenBatch),
}

/// Buffer state of the batching engine.
///
/// Holds the active batch and the flush phase. While a flush is in flight the
/// active batch plays the role of the overflow batch: it keeps accepting records
/// but is never frozen until the in-flight flush completes. All transitions are
/// plain `&mut self` methods; callers guard the buffer with one lock so that a
/// decision to flush and the phase change are a single step.
#[derive(Debug)]
pub struct BatchBuffer {
    config: BatchBufferConfig,
    destination: Arc<Destination>,
    estimator: Arc<dyn SizeEstimator>,
    active: Batch,
    phase: Phase,
    next_seq: u64,
    overflow_warned: bool,
}

impl BatchBuffer {
    /// Create a new batch buffer for the given destination and configuration
    pub fn new(
        destination: Destination,
        estimator: Arc<dyn SizeEstimator>,
        config: BatchBufferConfig,
    ) -> Self {
        let destination = Arc::new(destination);
        Self {
            config,
            active: Batch::new(destination.clone()),
            destination,
            estimator,
            phase: Phase::Idle,
            next_seq: 0,
            overflow_warned: false,
        }
    }

    /// Add a record to the active batch.
    ///
    /// The threshold is checked once, after the record is added, and only when no
    /// flush is in flight.
    pub fn append(&mut self, record: Record) -> AppendOutcome {
        self.active.push(record, self.estimator.as_ref());

        match self.phase {
            Phase::Flushing { .. } => {
                self.warn_on_overflow();
                AppendOutcome::Overflowed {
                    overflow_len: self.active.len(),
                }
            }
            Phase::Idle if self.is_full() => AppendOutcome::FlushTriggered(self.begin_flush()),
            Phase::Idle => AppendOutcome::Buffered(self.fill_level()),
        }
    }

    /// Mark flush `seq` as finished, whatever its result.
    ///
    /// The overflow becomes the active batch. If it already meets the threshold it
    /// is frozen straight away and returned; the buffer then stays `Flushing`.
    pub fn complete_flush(&mut self, seq: u64) -> Option<FrozenBatch> {
        match self.phase {
            Phase::Flushing { seq: in_flight } if in_flight == seq => {}
            phase => {
                tracing::warn!(seq, ?phase, "ignoring completion for a flush that is not in flight");
                return None;
            }
        }

        self.phase = Phase::Idle;
        self.overflow_warned = false;

        if self.is_full() {
            tracing::debug!(
                records = self.active.len(),
                estimated_size = self.active.estimated_size(),
                "overflow already over threshold, flushing again"
            );
            Some(self.begin_flush())
        } else {
            None
        }
    }

    /// Freeze the active batch regardless of the threshold.
    ///
    /// Returns `None` while a flush is in flight or when there is nothing buffered.
    pub fn drain(&mut self) -> Option<FrozenBatch> {
        match self.phase {
            Phase::Idle if !self.active.is_empty() => Some(self.begin_flush()),
            _ => None,
        }
    }

    fn begin_flush(&mut self) -> FrozenBatch {
        let seq = self.next_seq;
        self.next_seq += 1;

        let full = mem::replace(&mut self.active, Batch::new(self.destination.clone()));
        self.phase = Phase::Flushing { seq };
        full.freeze(seq)
    }

    fn is_full(&self) -> bool {
        !self.active.is_empty() && self.active.estimated_size() >= self.config.threshold
    }

    fn warn_on_overflow(&mut self) {
        if !self.overflow_warned
            && self.active.estimated_size() >= self.config.threshold.saturating_mul(2)
        {
            self.overflow_warned = true;
            tracing::warn!(
                records = self.active.len(),
                estimated_size = self.active.estimated_size(),
                threshold = self.config.threshold,
                "overflow grew past twice the threshold while a flush is in flight"
            );
        }
    }

    /// Whether the overflow warning already fired in the current flush cycle.
    pub(crate) fn overflow_warned(&self) -> bool {
        self.overflow_warned
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_flushing(&self) -> bool {
        matches!(self.phase, Phase::Flushing { .. })
    }

    /// Get the current number of records in the active batch
    pub fn current_size(&self) -> usize {
        self.active.len()
    }

    /// Records accumulated since the in-flight flush started; zero when idle.
    pub fn overflow_len(&self) -> usize {
        if self.is_flushing() { self.active.len() } else { 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn fill_level(&self) -> FillLevel {
        FillLevel {
            records: self.active.len(),
            estimated_size: self.active.estimated_size(),
            threshold: self.config.threshold,
        }
    }

    pub fn threshold(&self) -> usize {
        self.config.threshold
    }
}

#[cfg(test)]
#[path = "batch_buffer_test.rs"]
mod batch_buffer_test;
