use crate::buckets::{FlushBatch, HourBuckets};
use crate::layout;
use chrono_tz::Tz;
use ottlog_core::event::LogEvent;
use ottlog_core::traits::{EventSink, SinkError};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::debug;

/// Local-disk NDJSON sink.
///
/// Files land under `{output_dir}/{topic}/year=.../hour=HH/` and each file
/// handle lives only for the duration of one flush.
pub struct FileSink {
    root: PathBuf,
    topic: String,
    buckets: HourBuckets,
}

impl FileSink {
    pub fn new(output_dir: impl Into<PathBuf>, topic: impl Into<String>, tz: Tz) -> io::Result<Self> {
        let root = output_dir.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            topic: topic.into(),
            buckets: HourBuckets::new(tz),
        })
    }

    pub fn late_dropped(&self) -> u64 {
        self.buckets.late_dropped()
    }

    fn persist(&self, batch: FlushBatch) -> Result<(), SinkError> {
        let dir = self
            .root
            .join(&self.topic)
            .join(layout::partition_path(&batch.key));
        fs::create_dir_all(&dir)?;

        let name = layout::file_name(&self.topic, batch.offset);
        let path = dir.join(&name);
        let mut file = File::create(&path)?;
        file.write_all(&batch.body)?;
        debug!(events = batch.events, path = %path.display(), "flushed hour bucket");
        Ok(())
    }
}

impl EventSink for FileSink {
    fn write(&mut self, event: &LogEvent) -> Result<u64, SinkError> {
        let pushed = self.buckets.push(event)?;
        if let Some(batch) = pushed.flush {
            self.persist(batch)?;
        }
        Ok(pushed.bytes)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        for batch in self.buckets.drain() {
            self.persist(batch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ottlog_core::event::{AccessDetail, EventCategory, EventDetail, EventType, Platform};
    use std::path::Path;

    fn event(hour: u32, minute: u32) -> LogEvent {
        LogEvent {
            timestamp: chrono_tz::UTC
                .with_ymd_and_hms(2025, 6, 15, hour, minute, 0)
                .unwrap(),
            user_id: 3,
            event_category: EventCategory::Access,
            event_type: EventType::In,
            detail: EventDetail::Access(AccessDetail {
                platform: Platform::Android,
            }),
        }
    }

    fn hour_files(root: &Path, hour: u32) -> Vec<PathBuf> {
        let dir = root.join(format!(
            "user-logs/year=2025/month=06/day=15/hour={hour:02}"
        ));
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map(|entries| entries.map(|entry| entry.unwrap().path()).collect())
            .unwrap_or_default();
        files.sort();
        files
    }

    #[test]
    fn hour_promotion_writes_one_sorted_file_per_hour() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path(), "user-logs", chrono_tz::UTC).unwrap();

        for (hour, minute) in [(10, 30), (10, 59), (11, 5), (11, 45), (12, 10)] {
            sink.write(&event(hour, minute)).unwrap();
        }
        sink.close().unwrap();

        for hour in [10, 11, 12] {
            let files = hour_files(dir.path(), hour);
            assert_eq!(files.len(), 1, "hour {hour} should have exactly one file");

            let name = files[0].file_name().unwrap().to_str().unwrap();
            let (topic, offset, _) = layout::parse_file_name(name).unwrap();
            assert_eq!(topic, "user-logs");
            assert_eq!(offset, 0);

            let body = fs::read_to_string(&files[0]).unwrap();
            let mut timestamps = Vec::new();
            for line in body.lines() {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                timestamps.push(value["timestamp"].as_str().unwrap().to_string());
            }
            let mut sorted = timestamps.clone();
            sorted.sort();
            assert_eq!(timestamps, sorted);
        }
    }

    #[test]
    fn close_flushes_both_open_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path(), "user-logs", chrono_tz::UTC).unwrap();

        sink.write(&event(8, 0)).unwrap();
        sink.write(&event(9, 0)).unwrap();
        assert!(hour_files(dir.path(), 8).is_empty());

        sink.close().unwrap();
        assert_eq!(hour_files(dir.path(), 8).len(), 1);
        assert_eq!(hour_files(dir.path(), 9).len(), 1);
    }

    #[test]
    fn late_events_are_dropped_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path(), "user-logs", chrono_tz::UTC).unwrap();

        sink.write(&event(10, 0)).unwrap();
        sink.write(&event(11, 0)).unwrap();
        sink.write(&event(12, 0)).unwrap();
        sink.write(&event(9, 30)).unwrap();
        sink.close().unwrap();

        assert_eq!(sink.late_dropped(), 1);
        assert!(hour_files(dir.path(), 9).is_empty());
    }
}
