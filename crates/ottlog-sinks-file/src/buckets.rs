use chrono::{DateTime, Datelike, Timelike};
use chrono_tz::Tz;
use ottlog_core::event::LogEvent;
use ottlog_core::traits::SinkError;
use std::collections::HashMap;

/// Partition key of one sink file: calendar hour in the sink timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl HourKey {
    pub fn of(timestamp: DateTime<Tz>, tz: Tz) -> Self {
        let local = timestamp.with_timezone(&tz);
        Self {
            year: local.year(),
            month: local.month(),
            day: local.day(),
            hour: local.hour(),
        }
    }
}

struct Bucket {
    key: HourKey,
    lines: Vec<(DateTime<Tz>, Vec<u8>)>,
}

impl Bucket {
    fn start(key: HourKey, line: (DateTime<Tz>, Vec<u8>)) -> Self {
        Self {
            key,
            lines: vec![line],
        }
    }
}

/// A sorted, ready-to-write batch for one hour key.
#[derive(Debug)]
pub struct FlushBatch {
    pub key: HourKey,
    /// Monotone per-hour-key counter, starting at 0.
    pub offset: u64,
    /// NDJSON body, one event per line.
    pub body: Vec<u8>,
    pub events: usize,
}

pub struct Pushed {
    pub bytes: u64,
    pub flush: Option<FlushBatch>,
}

/// Two-bucket event buffer with per-hour offset accounting.
///
/// Input is expected in non-decreasing timestamp order. Events for an hour
/// older than the current bucket are counted and dropped; a flushed hour is
/// never re-opened.
pub struct HourBuckets {
    tz: Tz,
    current: Option<Bucket>,
    next: Option<Bucket>,
    offsets: HashMap<HourKey, u64>,
    late_dropped: u64,
}

impl HourBuckets {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            current: None,
            next: None,
            offsets: HashMap::new(),
            late_dropped: 0,
        }
    }

    pub fn late_dropped(&self) -> u64 {
        self.late_dropped
    }

    /// Buffers one event. Returns the batch to persist when the write
    /// promoted the next bucket.
    pub fn push(&mut self, event: &LogEvent) -> Result<Pushed, SinkError> {
        let line = serde_json::to_vec(event)?;
        let bytes = line.len() as u64 + 1;
        let key = HourKey::of(event.timestamp, self.tz);
        let entry = (event.timestamp, line);

        let current = match self.current.as_mut() {
            None => {
                self.current = Some(Bucket::start(key, entry));
                return Ok(Pushed { bytes, flush: None });
            }
            Some(current) => current,
        };

        if key == current.key {
            current.lines.push(entry);
            return Ok(Pushed { bytes, flush: None });
        }
        if key < current.key {
            self.late_dropped += 1;
            return Ok(Pushed { bytes, flush: None });
        }

        match self.next.as_mut() {
            None => {
                self.next = Some(Bucket::start(key, entry));
                Ok(Pushed { bytes, flush: None })
            }
            Some(next) if key == next.key => {
                next.lines.push(entry);
                Ok(Pushed { bytes, flush: None })
            }
            Some(next) if key < next.key => {
                // out-of-order arrival between the two open buckets
                self.late_dropped += 1;
                Ok(Pushed { bytes, flush: None })
            }
            Some(_) => {
                let finished = self.current.take();
                self.current = self.next.take();
                self.next = Some(Bucket::start(key, entry));
                Ok(Pushed {
                    bytes,
                    flush: finished.map(|bucket| self.seal(bucket)),
                })
            }
        }
    }

    /// Flushes both open buckets, current first.
    pub fn drain(&mut self) -> Vec<FlushBatch> {
        let mut batches = Vec::new();
        if let Some(bucket) = self.current.take() {
            batches.push(self.seal(bucket));
        }
        if let Some(bucket) = self.next.take() {
            batches.push(self.seal(bucket));
        }
        batches
    }

    fn seal(&mut self, mut bucket: Bucket) -> FlushBatch {
        bucket.lines.sort_by(|a, b| a.0.cmp(&b.0));

        let events = bucket.lines.len();
        let mut body = Vec::new();
        for (_, line) in bucket.lines {
            body.extend_from_slice(&line);
            body.push(b'\n');
        }

        let offset = self.offsets.entry(bucket.key).or_insert(0);
        let batch = FlushBatch {
            key: bucket.key,
            offset: *offset,
            body,
            events,
        };
        *offset += 1;
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ottlog_core::event::{AccessDetail, EventCategory, EventDetail, EventType, Platform};

    fn event(hour: u32, minute: u32) -> LogEvent {
        LogEvent {
            timestamp: chrono_tz::UTC
                .with_ymd_and_hms(2025, 6, 15, hour, minute, 0)
                .unwrap(),
            user_id: 1,
            event_category: EventCategory::Access,
            event_type: EventType::In,
            detail: EventDetail::Access(AccessDetail {
                platform: Platform::Pc,
            }),
        }
    }

    fn buckets() -> HourBuckets {
        HourBuckets::new(chrono_tz::UTC)
    }

    #[test]
    fn promotion_flushes_the_oldest_hour() {
        let mut buckets = buckets();
        assert!(buckets.push(&event(10, 30)).unwrap().flush.is_none());
        assert!(buckets.push(&event(10, 59)).unwrap().flush.is_none());
        assert!(buckets.push(&event(11, 5)).unwrap().flush.is_none());
        assert!(buckets.push(&event(11, 45)).unwrap().flush.is_none());

        let flushed = buckets.push(&event(12, 10)).unwrap().flush.unwrap();
        assert_eq!(flushed.key.hour, 10);
        assert_eq!(flushed.offset, 0);
        assert_eq!(flushed.events, 2);

        let rest = buckets.drain();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].key.hour, 11);
        assert_eq!(rest[1].key.hour, 12);
        assert_eq!(rest[0].offset, 0);
        assert_eq!(rest[1].offset, 0);
    }

    #[test]
    fn bodies_are_sorted_ndjson() {
        let mut buckets = buckets();
        buckets.push(&event(10, 45)).unwrap();
        buckets.push(&event(10, 5)).unwrap();
        buckets.push(&event(10, 30)).unwrap();

        let batch = buckets.drain().remove(0);
        let lines: Vec<serde_json::Value> = batch
            .body
            .split(|byte| *byte == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        let times: Vec<&str> = lines
            .iter()
            .map(|line| line["timestamp"].as_str().unwrap())
            .collect();
        assert_eq!(
            times,
            vec![
                "2025-06-15 10:05:00",
                "2025-06-15 10:30:00",
                "2025-06-15 10:45:00"
            ]
        );
    }

    #[test]
    fn late_events_never_reopen_a_flushed_hour() {
        let mut buckets = buckets();
        buckets.push(&event(10, 0)).unwrap();
        buckets.push(&event(11, 0)).unwrap();
        buckets.push(&event(12, 0)).unwrap(); // hour 10 flushed here

        buckets.push(&event(9, 59)).unwrap();
        assert_eq!(buckets.late_dropped(), 1);

        let rest = buckets.drain();
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|batch| batch.key.hour >= 11));
    }

    #[test]
    fn offsets_increase_per_hour_key() {
        let mut buckets = buckets();
        buckets.push(&event(10, 0)).unwrap();
        assert_eq!(buckets.drain()[0].offset, 0);

        buckets.push(&event(10, 30)).unwrap();
        assert_eq!(buckets.drain()[0].offset, 1);

        buckets.push(&event(11, 0)).unwrap();
        assert_eq!(buckets.drain()[0].offset, 0);
    }

    #[test]
    fn distant_next_bucket_is_allowed() {
        let mut buckets = buckets();
        buckets.push(&event(3, 0)).unwrap();
        assert!(buckets.push(&event(9, 0)).unwrap().flush.is_none());

        let rest = buckets.drain();
        assert_eq!(rest[0].key.hour, 3);
        assert_eq!(rest[1].key.hour, 9);
    }
}
