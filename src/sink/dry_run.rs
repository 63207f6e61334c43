use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{BulkSink, FlushResult};
use crate::batch::FrozenBatch;

/// Logs every batch and drops it. Only totals are kept.
#[derive(Debug, Default)]
pub struct DryRunSink {
    batches: AtomicU64,
    records: AtomicU64,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(batches, records)` seen so far.
    pub fn totals(&self) -> (u64, u64) {
        (
            self.batches.load(Ordering::Relaxed),
            self.records.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl BulkSink for DryRunSink {
    async fn flush(&self, batch: &FrozenBatch) -> FlushResult {
        let batches = self.batches.fetch_add(1, Ordering::Relaxed) + 1;
        let records = self.records.fetch_add(batch.len() as u64, Ordering::Relaxed) + batch.len() as u64;
        tracing::info!(
            seq = batch.seq(),
            index = %batch.destination().index(),
            records = batch.len(),
            estimated_size = batch.estimated_size(),
            total_batches = batches,
            total_records = records,
            "dry run, batch not written"
        );
        FlushResult::Success
    }

    fn name(&self) -> String {
        "DryRun".to_string()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::batch::Destination;
    use crate::batch_buffer::{AppendOutcome, BatchBuffer, BatchBufferConfig};
    use crate::record::Record;
    use crate::record::test_clock::FixedClock;
    use crate::size::RecordCountEstimator;

    #[tokio::test]
    async fn counts_and_drops_batches() {
        let mut buffer = BatchBuffer::new(
            Destination::new("nats"),
            Arc::new(RecordCountEstimator),
            BatchBufferConfig { threshold: 2 },
        );
        let sink = DryRunSink::new();

        for _ in 0..3 {
            buffer.append(Record::new("a", "x", &FixedClock::default()));
            let batch = match buffer.append(Record::new("b", "y", &FixedClock::default())) {
                AppendOutcome::FlushTriggered(batch) => batch,
                other => panic!("unexpected {:?}", other),
            };
            assert!(sink.flush(&batch).await.is_success());
            buffer.complete_flush(batch.seq());
        }

        assert_eq!((3, 6), sink.totals());
    }
}
