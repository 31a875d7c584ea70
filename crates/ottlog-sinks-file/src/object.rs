use crate::buckets::{FlushBatch, HourBuckets};
use crate::layout;
use chrono_tz::Tz;
use ottlog_core::event::LogEvent;
use ottlog_core::traits::{EventSink, SinkError};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Minimal object-storage surface; the production S3 client lives behind
/// this trait.
pub trait ObjectStore {
    fn put(&mut self, key: &str, body: &[u8]) -> Result<(), SinkError>;
}

/// Directory-backed store for tests and offline runs: object keys become
/// relative paths under a root.
// TODO: wire an S3-backed ObjectStore so sink_type = "s3" uploads directly.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&mut self, key: &str, body: &[u8]) -> Result<(), SinkError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, body)?;
        Ok(())
    }
}

/// Same bucketing and layout as [`crate::FileSink`], but each flush becomes
/// one `put` under `{prefix}/{topic}/year=.../hour=HH/`.
pub struct ObjectStorageSink<O: ObjectStore> {
    store: O,
    prefix: String,
    topic: String,
    buckets: HourBuckets,
}

impl<O: ObjectStore> ObjectStorageSink<O> {
    pub fn new(store: O, prefix: impl Into<String>, topic: impl Into<String>, tz: Tz) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            topic: topic.into(),
            buckets: HourBuckets::new(tz),
        }
    }

    pub fn into_store(self) -> O {
        self.store
    }

    fn upload(&mut self, batch: FlushBatch) -> Result<(), SinkError> {
        let key = format!(
            "{}/{}/{}/{}",
            self.prefix,
            self.topic,
            layout::partition_path(&batch.key),
            layout::file_name(&self.topic, batch.offset),
        );
        self.store.put(&key, &batch.body)?;
        debug!(events = batch.events, key = %key, "uploaded hour bucket");
        Ok(())
    }
}

impl<O: ObjectStore> EventSink for ObjectStorageSink<O> {
    fn write(&mut self, event: &LogEvent) -> Result<u64, SinkError> {
        let pushed = self.buckets.push(event)?;
        if let Some(batch) = pushed.flush {
            self.upload(batch)?;
        }
        Ok(pushed.bytes)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        for batch in self.buckets.drain() {
            self.upload(batch)?;
        }
        Ok(())
    }
}
