//! Hour-bucketed NDJSON sinks.
//!
//! Events buffer into at most two hour buckets (current and next) and flush
//! as sorted NDJSON files under a Hive-style partition path, either to the
//! local filesystem or through an [`object::ObjectStore`].

pub mod buckets;
pub mod file;
pub mod layout;
pub mod object;

pub use buckets::{FlushBatch, HourBuckets, HourKey};
pub use file::FileSink;
pub use object::{LocalObjectStore, ObjectStorageSink, ObjectStore};
