//! Partition paths and file names compatible with the downstream
//! partitioned-object-storage convention.

use crate::buckets::HourKey;
use uuid::Uuid;

/// `year=YYYY/month=MM/day=DD/hour=HH`
pub fn partition_path(key: &HourKey) -> String {
    format!(
        "year={:04}/month={:02}/day={:02}/hour={:02}",
        key.year, key.month, key.day, key.hour
    )
}

/// `{topic}-{offset:06}-{uuid6}.json`
pub fn file_name(topic: &str, offset: u64) -> String {
    let unique = Uuid::new_v4().simple().to_string();
    format!("{topic}-{offset:06}-{}.json", &unique[..6])
}

/// Recovers (topic, offset, uuid) from a sink file name.
pub fn parse_file_name(name: &str) -> Option<(String, u64, String)> {
    let stem = name.strip_suffix(".json")?;
    let mut parts = stem.rsplitn(3, '-');
    let unique = parts.next()?;
    let offset = parts.next()?;
    let topic = parts.next()?;
    if unique.len() != 6 || offset.len() != 6 {
        return None;
    }
    let offset: u64 = offset.parse().ok()?;
    Some((topic.to_string(), offset, unique.to_string()))
}

/// Recovers the hour key from a `year=../month=../day=../hour=..` path.
pub fn parse_partition_path(path: &str) -> Option<HourKey> {
    let mut year = None;
    let mut month = None;
    let mut day = None;
    let mut hour = None;
    for segment in path.split('/') {
        let (name, value) = segment.split_once('=')?;
        match name {
            "year" => year = value.parse().ok(),
            "month" => month = value.parse().ok(),
            "day" => day = value.parse().ok(),
            "hour" => hour = value.parse().ok(),
            _ => return None,
        }
    }
    Some(HourKey {
        year: year?,
        month: month?,
        day: day?,
        hour: hour?,
    })
}
