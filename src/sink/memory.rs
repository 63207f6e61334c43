use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{BulkSink, FlushResult};
use crate::batch::FrozenBatch;
use crate::record::Record;

/// Keeps every batch it is given, for tests and embedding code that inspects
/// what was flushed. Memory grows with every batch.
///
/// Results can be scripted with [`InMemorySink::push_result`]; once the script is
/// exhausted every flush succeeds.
#[derive(Debug, Default)]
pub struct InMemorySink {
    batches: Mutex<Vec<FrozenBatch>>,
    scripted: Mutex<VecDeque<FlushResult>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result returned by the next unscripted flush.
    pub async fn push_result(&self, result: FlushResult) {
        self.scripted.lock().await.push_back(result);
    }

    /// Batches received so far, in flush order.
    pub async fn batches(&self) -> Vec<FrozenBatch> {
        self.batches.lock().await.clone()
    }

    /// Every record received so far, in flush order.
    pub async fn records(&self) -> Vec<Record> {
        self.batches
            .lock()
            .await
            .iter()
            .flat_map(|batch| batch.records().iter().cloned())
            .collect()
    }
}

#[async_trait]
impl BulkSink for InMemorySink {
    async fn flush(&self, batch: &FrozenBatch) -> FlushResult {
        self.batches.lock().await.push(batch.clone());
        tracing::debug!(seq = batch.seq(), records = batch.len(), "batch kept in memory");
        self.scripted
            .lock()
            .await
            .pop_front()
            .unwrap_or(FlushResult::Success)
    }

    fn name(&self) -> String {
        "InMemory".to_string()
    }
}
