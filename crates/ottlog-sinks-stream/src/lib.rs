//! Unbuffered streaming sink.
//!
//! Every event is serialized and handed to a [`StreamTransport`] with the
//! user id as partition key, so one user's logs land on one shard. The
//! production Kinesis client sits behind the trait; a stdout transport
//! covers local runs and an in-memory one covers tests.

use ottlog_core::event::LogEvent;
use ottlog_core::traits::{EventSink, SinkError};
use std::io::Write;
use tracing::debug;

/// Minimal streaming-transport surface (Kinesis `put_record` shape).
pub trait StreamTransport {
    fn send(&mut self, partition_key: &str, data: &[u8]) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Sink that publishes each event immediately, no buffering.
pub struct StreamSink<T: StreamTransport> {
    transport: T,
    sent: u64,
}

impl<T: StreamTransport> StreamSink<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, sent: 0 }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

impl<T: StreamTransport> EventSink for StreamSink<T> {
    fn write(&mut self, event: &LogEvent) -> Result<u64, SinkError> {
        let data = serde_json::to_vec(event)?;
        let partition_key = event.user_id.to_string();
        self.transport.send(&partition_key, &data)?;
        self.sent += 1;
        Ok(data.len() as u64)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.transport.flush()?;
        debug!(sent = self.sent, "stream sink closed");
        Ok(())
    }
}

/// Captures records for assertions.
#[derive(Default)]
pub struct InMemoryTransport {
    pub records: Vec<(String, Vec<u8>)>,
}

impl StreamTransport for InMemoryTransport {
    fn send(&mut self, partition_key: &str, data: &[u8]) -> Result<(), SinkError> {
        self.records.push((partition_key.to_string(), data.to_vec()));
        Ok(())
    }
}

/// Local stand-in for a live transport: one JSON record per stdout line.
pub struct StdoutTransport {
    out: std::io::Stdout,
}

impl StdoutTransport {
    pub fn new() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl Default for StdoutTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTransport for StdoutTransport {
    fn send(&mut self, _partition_key: &str, data: &[u8]) -> Result<(), SinkError> {
        let mut handle = self.out.lock();
        handle.write_all(data)?;
        handle.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.out.lock().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ottlog_core::event::{
        AccessDetail, EventCategory, EventDetail, EventType, Platform,
    };

    fn event(user_id: i64) -> LogEvent {
        LogEvent {
            timestamp: chrono_tz::UTC
                .with_ymd_and_hms(2025, 6, 15, 9, 0, 0)
                .unwrap(),
            user_id,
            event_category: EventCategory::Access,
            event_type: EventType::In,
            detail: EventDetail::Access(AccessDetail {
                platform: Platform::Ios,
            }),
        }
    }

    #[test]
    fn partition_key_is_the_decimal_user_id() {
        let mut sink = StreamSink::new(InMemoryTransport::default());
        sink.write(&event(4711)).unwrap();
        sink.write(&event(12)).unwrap();
        sink.close().unwrap();

        let transport = sink.into_transport();
        let keys: Vec<&str> = transport
            .records
            .iter()
            .map(|(key, _)| key.as_str())
            .collect();
        assert_eq!(keys, vec!["4711", "12"]);
    }

    #[test]
    fn records_are_single_json_objects() {
        let mut sink = StreamSink::new(InMemoryTransport::default());
        sink.write(&event(7)).unwrap();
        assert_eq!(sink.sent(), 1);

        let transport = sink.into_transport();
        let value: serde_json::Value = serde_json::from_slice(&transport.records[0].1).unwrap();
        assert_eq!(value["user_id"], 7);
        assert_eq!(value["event_category"], 1);
    }
}
