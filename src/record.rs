use std::borrow::Cow;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::trace_message::TraceMessage;

/// Source of arrival timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// One inbound bus message, stamped with its arrival time.
///
/// Records are immutable once built. The payload is kept exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    timestamp: DateTime<Utc>,
    payload: Bytes,
    topic: String,
}

/// Document body written to the store for one record.
#[derive(Debug, Serialize)]
pub struct Document<'a> {
    pub date: String,
    pub message: Cow<'a, str>,
    pub topic: &'a str,
}

impl Record {
    /// Build a record from a raw bus message. Never fails.
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>, clock: &dyn Clock) -> Self {
        Self {
            timestamp: clock.now(),
            payload: payload.into(),
            topic: topic.into(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn document(&self) -> Document<'_> {
        Document {
            date: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            message: self.payload.trace(),
            topic: &self.topic,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_clock {
    use chrono::{DateTime, TimeZone, Utc};

    use super::Clock;

    /// Always returns the same instant.
    #[derive(Debug, Clone, Copy)]
    pub struct FixedClock(pub DateTime<Utc>);

    impl Default for FixedClock {
        fn default() -> Self {
            Self(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }
}
