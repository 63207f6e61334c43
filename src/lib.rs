//! # nats-es-bridge
//!
//! `nats-es-bridge` subscribes to NATS subjects and writes every message it
//! receives to Elasticsearch, grouped into size-bounded `_bulk` requests.
//!
//! ## Features
//!
//! - Subscribes to a subject (every subject by default) on a NATS server.
//! - Stamps each message with its arrival time and keeps the payload as is.
//! - Flushes a batch once its estimated JSON size reaches a threshold.
//! - Keeps accepting messages while a flush is in flight; at most one flush runs
//!   at a time and no record is lost, duplicated or reordered across batches.
//! - Reports fill level and flush results to a pluggable observer.
//!
//! ## Usage
//!
//! 1. Build a sink (the Elasticsearch sink, or the dry-run one that only logs).
//! 2. Create a `FlushCoordinator` with a destination index and a threshold.
//! 3. Feed messages to it, e.g. with `ingress::pump` over a NATS subscription.
//! 4. Call `close` on shutdown to flush what is still buffered.
//!
//! ### Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use nats_es_bridge::batch::Destination;
//! use nats_es_bridge::coordinator::{CoordinatorOptions, FlushCoordinator};
//! use nats_es_bridge::sink::ElasticsearchSink;
//! use nats_es_bridge::{ingress, nats_connection};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = nats_connection::connect("nats://localhost:4222").await?;
//!     let subscriber = nats_connection::subscribe(&client, ">").await?;
//!
//!     let store = Url::parse("http://localhost:9200")?;
//!     let sink = Arc::new(ElasticsearchSink::new(&store, Duration::from_secs(30))?);
//!
//!     let coordinator = FlushCoordinator::new(
//!         CoordinatorOptions::builder()
//!             .destination(Destination::new("nats"))
//!             .sink(sink)
//!             .build(),
//!     );
//!
//!     let shutdown = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     ingress::pump(ingress::from_subscriber(subscriber), &coordinator, shutdown).await;
//!     coordinator.close().await;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - `record`, `batch`, `size`: data model and size estimation.
//! - `batch_buffer`: the active/overflow state machine.
//! - `coordinator`: single-flight flushing on top of the buffer.
//! - `sink`: bulk-write targets.
//! - `ingress`, `nats_connection`: the NATS side.
//! - `config`: command line and file configuration.

pub mod batch;
pub mod batch_buffer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ingress;
pub mod nats_connection;
pub mod observer;
pub mod record;
pub mod sink;
pub mod size;
pub mod trace_message;

pub use error::{BridgeError, Result, SinkError};
