//! Custom error types for the NATS to Elasticsearch bridge.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while starting the bridge: configuration, bus connection, sink setup.
///
/// Nothing on the ingestion path returns this type; flush failures are reported
/// through [`crate::sink::FlushResult`] instead.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// NATS connection error.
    #[error("NATS connect error: {0}")]
    Connect(#[from] async_nats::ConnectError),

    /// NATS subscription error.
    #[error("NATS subscribe error: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    /// Config error.
    #[error("Config error: {0}")]
    Config(String),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP client construction error.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Why a bulk write did not reach the store.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("bulk request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bulk request rejected with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("bulk request timed out after {0:?}")]
    Timeout(Duration),

    #[error("bulk payload or response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// A specialized `Result` type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
