//! Size estimation used to decide when a batch is full.
//!
//! Estimates are a threshold signal only. They must never shrink as records are
//! appended, but they do not have to match the bytes put on the wire.

use std::io;

use serde::Serialize;

use crate::batch::{Batch, Destination};
use crate::record::Record;

pub trait SizeEstimator: Send + Sync + std::fmt::Debug {
    /// Cost one record adds to a batch bound for `destination`.
    fn record_cost(&self, record: &Record, destination: &Destination) -> usize;

    /// Fixed cost paid once a batch holds at least one record.
    fn batch_overhead(&self) -> usize {
        0
    }

    fn estimate(&self, batch: &Batch) -> usize {
        if batch.is_empty() {
            return 0;
        }
        batch
            .records()
            .iter()
            .map(|record| self.record_cost(record, batch.destination()))
            .sum::<usize>()
            + self.batch_overhead()
    }
}

/// Byte length of the batch rendered as a JSON array of
/// `[action, document, action, document, ...]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSizeEstimator;

impl SizeEstimator for JsonSizeEstimator {
    fn record_cost(&self, record: &Record, destination: &Destination) -> usize {
        // two array separators per record pair
        json_len(&destination.action()) + json_len(&record.document()) + 2
    }

    fn batch_overhead(&self) -> usize {
        // brackets, minus the separator the last element does not have
        1
    }
}

/// Every record costs one unit.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordCountEstimator;

impl SizeEstimator for RecordCountEstimator {
    fn record_cost(&self, _record: &Record, _destination: &Destination) -> usize {
        1
    }
}

#[derive(Default)]
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn json_len<T: Serialize>(value: &T) -> usize {
    let mut counter = ByteCounter::default();
    match serde_json::to_writer(&mut counter, value) {
        Ok(()) => counter.0,
        Err(e) => {
            tracing::debug!("size estimate fell back to zero: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::record::test_clock::FixedClock;

    fn sample_batch(estimator: &dyn SizeEstimator, payloads: &[&'static str]) -> Batch {
        let clock = FixedClock::default();
        let mut batch = Batch::new(Arc::new(Destination::new("mqtt").with_doc_type("eclipse")));
        for payload in payloads {
            batch.push(Record::new("home/temp", *payload, &clock), estimator);
        }
        batch
    }

    #[test]
    fn json_estimate_matches_serialized_array() {
        let batch = sample_batch(&JsonSizeEstimator, &["21.5", "{\"on\":true}", "x"]);

        let mut array = Vec::new();
        for record in batch.records() {
            array.push(serde_json::to_value(batch.destination().action()).unwrap());
            array.push(serde_json::to_value(record.document()).unwrap());
        }
        let rendered = serde_json::to_vec(&array).unwrap();

        assert_eq!(rendered.len(), batch.estimated_size());
        assert_eq!(rendered.len(), JsonSizeEstimator.estimate(&batch));
    }

    #[test]
    fn estimate_is_monotonic() {
        let clock = FixedClock::default();
        let mut batch = Batch::new(Arc::new(Destination::new("nats")));
        let mut previous = JsonSizeEstimator.estimate(&batch);
        assert_eq!(0, previous);

        for payload in ["", "a", "", "a much longer payload than the others"] {
            batch.push(Record::new("t", payload, &clock), &JsonSizeEstimator);
            let current = JsonSizeEstimator.estimate(&batch);
            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn record_count_estimate() {
        let batch = sample_batch(&RecordCountEstimator, &["a", "b"]);
        assert_eq!(2, batch.estimated_size());
        assert_eq!(2, RecordCountEstimator.estimate(&batch));
    }
}
