//! Bulk-write sinks. A sink receives one frozen batch per call and reports how
//! the write went; it does not buffer, retry or reorder.

pub mod dry_run;
pub mod elasticsearch;
pub mod memory;

use async_trait::async_trait;

use crate::batch::FrozenBatch;
use crate::error::SinkError;

pub use dry_run::DryRunSink;
pub use elasticsearch::ElasticsearchSink;
pub use memory::InMemorySink;

#[async_trait]
pub trait BulkSink: Send + Sync {
    /// Write every record of `batch` in one request.
    async fn flush(&self, batch: &FrozenBatch) -> FlushResult;

    fn name(&self) -> String;
}

/// Outcome of one bulk write.
#[derive(Debug)]
pub enum FlushResult {
    Success,
    /// The request was accepted but some documents were rejected.
    PartialFailure(Vec<DocumentError>),
    /// Nothing is known to have been written.
    TransportError(SinkError),
}

impl FlushResult {
    pub fn is_success(&self) -> bool {
        matches!(self, FlushResult::Success)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FlushResult::Success => "success",
            FlushResult::PartialFailure(_) => "partial_failure",
            FlushResult::TransportError(_) => "transport_error",
        }
    }
}

/// A document the store refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentError {
    /// Position of the record inside its batch.
    pub position: usize,
    pub status: u16,
    pub reason: String,
}
