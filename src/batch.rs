use std::sync::Arc;

use serde::Serialize;

use crate::record::Record;
use crate::size::SizeEstimator;

/// Index and optional document type every record of a batch is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    index: String,
    doc_type: Option<String>,
}

/// `_bulk` action line preceding each document.
#[derive(Debug, Serialize)]
pub struct BulkAction<'a> {
    create: ActionMeta<'a>,
}

#[derive(Debug, Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    doc_type: Option<&'a str>,
}

impl Destination {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: None,
        }
    }

    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.doc_type.as_deref()
    }

    pub fn action(&self) -> BulkAction<'_> {
        BulkAction {
            create: ActionMeta {
                index: &self.index,
                doc_type: self.doc_type.as_deref(),
            },
        }
    }
}

/// The batch currently accepting records.
///
/// Append-only. The estimated size is maintained incrementally: each record is
/// costed once, when it is pushed.
#[derive(Debug, Clone)]
pub struct Batch {
    destination: Arc<Destination>,
    records: Vec<Record>,
    estimated_size: usize,
}

impl Batch {
    pub fn new(destination: Arc<Destination>) -> Self {
        Self {
            destination,
            records: Vec::new(),
            estimated_size: 0,
        }
    }

    pub fn push(&mut self, record: Record, estimator: &dyn SizeEstimator) {
        if self.records.is_empty() {
            self.estimated_size += estimator.batch_overhead();
        }
        self.estimated_size += estimator.record_cost(&record, &self.destination);
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Seal the batch for flushing. There is no way back to a mutable batch.
    pub(crate) fn freeze(self, seq: u64) -> FrozenBatch {
        FrozenBatch {
            seq,
            destination: self.destination,
            records: self.records,
            estimated_size: self.estimated_size,
        }
    }
}

/// A batch selected for flushing. Read-only.
///
/// `seq` increases by one for every batch a buffer freezes, so flushed batches
/// can be ordered and matched to their completion.
#[derive(Debug, Clone)]
pub struct FrozenBatch {
    seq: u64,
    destination: Arc<Destination>,
    records: Vec<Record>,
    estimated_size: usize,
}

impl FrozenBatch {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::test_clock::FixedClock;
    use crate::size::RecordCountEstimator;

    #[test]
    fn action_line_omits_missing_doc_type() {
        let destination = Destination::new("nats");
        assert_eq!(
            r#"{"create":{"_index":"nats"}}"#,
            serde_json::to_string(&destination.action()).unwrap()
        );

        let destination = Destination::new("mqtt").with_doc_type("eclipse");
        assert_eq!(
            r#"{"create":{"_index":"mqtt","_type":"eclipse"}}"#,
            serde_json::to_string(&destination.action()).unwrap()
        );
    }

    #[test]
    fn freeze_keeps_order_and_size() {
        let clock = FixedClock::default();
        let mut batch = Batch::new(Arc::new(Destination::new("nats")));
        for topic in ["a", "b", "c"] {
            batch.push(Record::new(topic, "x", &clock), &RecordCountEstimator);
        }

        let frozen = batch.freeze(7);
        assert_eq!(7, frozen.seq());
        assert_eq!(3, frozen.estimated_size());
        let topics: Vec<_> = frozen.records().iter().map(Record::topic).collect();
        assert_eq!(vec!["a", "b", "c"], topics);
    }
}
