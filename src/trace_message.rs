use std::borrow::Cow;

use bytes::Bytes;

/// Render an opaque bus payload as text.
///
/// Payloads are never validated; invalid UTF-8 sequences are replaced
/// rather than rejected, so every message yields a document.
pub trait TraceMessage {
    fn trace(&self) -> Cow<'_, str>;
}

impl TraceMessage for [u8] {
    fn trace(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self)
    }
}

impl TraceMessage for Bytes {
    fn trace(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self)
    }
}
