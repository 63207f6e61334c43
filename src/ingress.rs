use std::future::Future;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::coordinator::FlushCoordinator;
use crate::trace_message::TraceMessage;

/// One message as delivered by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

impl From<async_nats::Message> for InboundMessage {
    fn from(message: async_nats::Message) -> Self {
        Self {
            topic: message.subject.to_string(),
            payload: message.payload,
        }
    }
}

/// Why [`pump`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The bus stream ended.
    StreamClosed,
    /// The shutdown future resolved.
    Shutdown,
}

///
/// # Message processing loop
///
/// Feeds every message of `messages` into the coordinator, in arrival order,
/// until the stream ends or `shutdown` resolves. Returns how many messages were
/// handed over. Buffered records are left for the caller to drain with
/// [`FlushCoordinator::close`].
///
pub async fn pump<S, F>(messages: S, coordinator: &FlushCoordinator, shutdown: F) -> (u64, PumpExit)
where
    S: Stream<Item = InboundMessage>,
    F: Future<Output = ()>,
{
    tokio::pin!(messages);
    tokio::pin!(shutdown);
    let mut received = 0u64;

    loop {
        tokio::select! {
            // a busy stream must not starve shutdown
            biased;

            _ = &mut shutdown => {
                tracing::info!(received, "shutdown requested, stopping ingestion");
                return (received, PumpExit::Shutdown);
            }
            message = messages.next() => match message {
                Some(message) => {
                    tracing::trace!(
                        topic = %message.topic,
                        payload = %message.payload.trace(),
                        "received message"
                    );
                    coordinator.append(&message.topic, message.payload).await;
                    received += 1;
                }
                None => {
                    tracing::info!(received, "bus stream closed");
                    return (received, PumpExit::StreamClosed);
                }
            },
        }
    }
}

/// Adapt a NATS subscription to the stream [`pump`] consumes.
pub fn from_subscriber(subscriber: async_nats::Subscriber) -> impl Stream<Item = InboundMessage> {
    subscriber.map(InboundMessage::from)
}
