use std::time::Duration;

use crate::batch_buffer::FillLevel;
use crate::sink::FlushResult;

/// What happened to one flushed batch.
#[derive(Debug)]
pub struct FlushReport {
    pub seq: u64,
    pub record_count: usize,
    pub estimated_size: usize,
    pub elapsed: Duration,
    pub result: FlushResult,
}

/// Receives progress from the batching engine.
///
/// Callbacks run on the ingestion path (`on_fill`) or the flush task
/// (`on_flush_complete`) and must return quickly.
pub trait FlushObserver: Send + Sync {
    /// Called on every append that did not trigger a flush and was not overflow.
    fn on_fill(&self, _level: FillLevel) {}

    fn on_flush_complete(&self, report: &FlushReport);
}

/// Reports progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl FlushObserver for TracingObserver {
    fn on_fill(&self, level: FillLevel) {
        tracing::trace!(
            records = level.records,
            kilobytes = level.estimated_size as f64 / 1024.0,
            percent = (level.ratio() * 100.0).round() as u64,
            "buffer fill"
        );
    }

    fn on_flush_complete(&self, report: &FlushReport) {
        let kilobytes = report.estimated_size as f64 / 1024.0;
        match &report.result {
            FlushResult::Success => tracing::info!(
                seq = report.seq,
                records = report.record_count,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "flushed {:.2} Kilobytes",
                kilobytes
            ),
            FlushResult::PartialFailure(errors) => {
                tracing::warn!(
                    seq = report.seq,
                    records = report.record_count,
                    rejected = errors.len(),
                    "flushed {:.2} Kilobytes with errors",
                    kilobytes
                );
                for error in errors.iter().take(5) {
                    tracing::debug!(
                        seq = report.seq,
                        position = error.position,
                        status = error.status,
                        "document rejected: {}",
                        error.reason
                    );
                }
            }
            FlushResult::TransportError(e) => tracing::error!(
                seq = report.seq,
                records = report.record_count,
                "flush of {:.2} Kilobytes failed, batch discarded: {}",
                kilobytes,
                e
            ),
        }
    }
}

/// Ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FlushObserver for NoopObserver {
    fn on_flush_complete(&self, _report: &FlushReport) {}
}
