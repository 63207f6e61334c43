use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{BulkSink, DocumentError, FlushResult};
use crate::batch::FrozenBatch;
use crate::error::{BridgeError, Result, SinkError};

const NDJSON: &str = "application/x-ndjson";

/// Writes batches through the Elasticsearch `_bulk` endpoint.
#[derive(Debug, Clone)]
pub struct ElasticsearchSink {
    client: reqwest::Client,
    bulk_url: Url,
}

impl ElasticsearchSink {
    /// `base_url` is the cluster address, e.g. `http://localhost:9200`.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            bulk_url: bulk_endpoint(base_url)?,
        })
    }

    pub fn bulk_url(&self) -> &Url {
        &self.bulk_url
    }

    async fn write(&self, batch: &FrozenBatch) -> std::result::Result<BulkOutcome, SinkError> {
        let body = render_bulk_body(batch)?;

        let response = self
            .client
            .post(self.bulk_url.clone())
            .header(CONTENT_TYPE, NDJSON)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(SinkError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(decode_bulk_response(&bytes)?)
    }
}

#[async_trait]
impl BulkSink for ElasticsearchSink {
    async fn flush(&self, batch: &FrozenBatch) -> FlushResult {
        match self.write(batch).await {
            Ok(outcome) if outcome.is_clean() => FlushResult::Success,
            Ok(outcome) => FlushResult::PartialFailure(outcome.failures),
            Err(e) => FlushResult::TransportError(e),
        }
    }

    fn name(&self) -> String {
        format!("Elasticsearch({})", self.bulk_url)
    }
}

fn bulk_endpoint(base_url: &Url) -> Result<Url> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|_| BridgeError::Config(format!("store url cannot be a base: {}", base_url)))?
        .pop_if_empty()
        .push("_bulk");
    Ok(url)
}

/// Render the NDJSON body: an action line and a document line per record.
pub fn render_bulk_body(batch: &FrozenBatch) -> std::result::Result<Vec<u8>, serde_json::Error> {
    let mut body = Vec::with_capacity(batch.estimated_size());
    let action = batch.destination().action();

    for record in batch.records() {
        serde_json::to_writer(&mut body, &action)?;
        body.push(b'\n');
        serde_json::to_writer(&mut body, &record.document())?;
        body.push(b'\n');
    }

    Ok(body)
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// The store's own `errors` flag.
    pub errors: bool,
    pub failures: Vec<DocumentError>,
}

impl BulkOutcome {
    pub fn is_clean(&self) -> bool {
        !self.errors && self.failures.is_empty()
    }
}

/// Decode a `_bulk` response body into per-document failures.
pub fn decode_bulk_response(body: &[u8]) -> std::result::Result<BulkOutcome, serde_json::Error> {
    let response: BulkResponse = serde_json::from_slice(body)?;

    let failures = response
        .items
        .into_iter()
        .enumerate()
        .filter_map(|(position, mut item)| {
            // each item is keyed by its action name
            let (_, item) = item.drain().next()?;
            let error = item.error?;
            Some(DocumentError {
                position,
                status: item.status,
                reason: error_reason(&error),
            })
        })
        .collect();

    Ok(BulkOutcome {
        errors: response.errors,
        failures,
    })
}

fn error_reason(error: &Value) -> String {
    match error {
        Value::String(reason) => reason.clone(),
        Value::Object(fields) => {
            let kind = fields.get("type").and_then(Value::as_str);
            let reason = fields.get("reason").and_then(Value::as_str);
            match (kind, reason) {
                (Some(kind), Some(reason)) => format!("{}: {}", kind, reason),
                (None, Some(reason)) => reason.to_string(),
                _ => error.to_string(),
            }
        }
        other => other.to_string(),
    }
}
