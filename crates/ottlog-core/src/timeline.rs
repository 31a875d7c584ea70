use crate::config::{parse_target_month, ConfigError, GlobalConfig, TimelineConfig};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Weighted timestamp source.
///
/// Batch mode samples a whole month of (day, hour) cells proportionally to
/// `day_of_week_ratio[weekday] * hour_weight[hour]` and returns them sorted;
/// streaming mode just reads the wall clock in the configured timezone.
pub struct Timeline {
    tz: Tz,
    day_weights: [f64; 7],
    hour_weights: [f64; 24],
}

impl Timeline {
    pub fn from_config(global: &GlobalConfig, timeline: &TimelineConfig) -> Result<Self, ConfigError> {
        let tz = Tz::from_str(&global.timezone).map_err(|_| ConfigError::Invalid {
            field: "global.timezone",
            reason: format!("unknown timezone {:?}", global.timezone),
        })?;
        Ok(Self {
            tz,
            day_weights: timeline.day_of_week_ratio.weights(),
            hour_weights: hour_weights(&timeline.hour_distribution)?,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Current instant in the configured timezone (streaming mode).
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// Target log count for a month: dau * logs_per_user_per_day * days.
    pub fn monthly_total(
        &self,
        target_month: &str,
        dau: usize,
        logs_per_user_per_day: u32,
    ) -> Result<u64, ConfigError> {
        let (year, month) = parse_target_month(target_month)?;
        let days = days_in_month(year, month) as u64;
        Ok(dau as u64 * logs_per_user_per_day as u64 * days)
    }

    /// Sorted, tz-aware timestamps for one month.
    ///
    /// Cells with zero combined weight are unreachable; local datetimes
    /// skipped by a DST transition are excluded up front.
    pub fn monthly(
        &self,
        target_month: &str,
        total: u64,
        rng: &mut impl Rng,
    ) -> Result<MonthTimestamps, ConfigError> {
        let (year, month) = parse_target_month(target_month)?;
        let days = days_in_month(year, month);

        let mut cells = Vec::new();
        let mut weights = Vec::new();
        for day in 1..=days {
            let date = match NaiveDate::from_ymd_opt(year, month, day) {
                Some(date) => date,
                None => continue,
            };
            let day_weight = self.day_weights[date.weekday().num_days_from_monday() as usize];
            for hour in 0..24u32 {
                let weight = day_weight * self.hour_weights[hour as usize];
                if weight <= 0.0 {
                    continue;
                }
                if self
                    .tz
                    .with_ymd_and_hms(year, month, day, hour, 0, 0)
                    .earliest()
                    .is_none()
                {
                    continue;
                }
                cells.push((day, hour));
                weights.push(weight);
            }
        }

        let index = WeightedIndex::new(&weights).map_err(|_| ConfigError::Invalid {
            field: "timeline",
            reason: format!("no reachable (day, hour) cells in {target_month}"),
        })?;

        let mut timestamps = Vec::with_capacity(total as usize);
        for _ in 0..total {
            let (day, hour) = cells[index.sample(rng)];
            let minute = rng.gen_range(0..60);
            let second = rng.gen_range(0..60);
            if let Some(ts) = self
                .tz
                .with_ymd_and_hms(year, month, day, hour, minute, second)
                .earliest()
            {
                timestamps.push(ts);
            }
        }
        timestamps.sort();

        Ok(MonthTimestamps {
            inner: timestamps.into_iter(),
        })
    }
}

/// Owning sorted iterator over one month of timestamps.
pub struct MonthTimestamps {
    inner: std::vec::IntoIter<DateTime<Tz>>,
}

impl Iterator for MonthTimestamps {
    type Item = DateTime<Tz>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for MonthTimestamps {}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.map(|next| (next - first).num_days() as u32).unwrap_or(30)
}

/// Expands `"start-end"` ranges into 24 per-hour weights, splitting each
/// range's weight evenly across its hours. An empty map means uniform.
fn hour_weights(ranges: &BTreeMap<String, f64>) -> Result<[f64; 24], ConfigError> {
    if ranges.is_empty() {
        return Ok([1.0 / 24.0; 24]);
    }

    crate::config::validate_hour_ranges(ranges)?;
    let mut weights = [0.0; 24];
    for (range, weight) in ranges {
        // validated above, the range is well formed
        let (start, end) = range.split_once('-').unwrap_or(("0", "0"));
        let start: u32 = start.parse().unwrap_or(0);
        let end: u32 = end.parse().unwrap_or(0);
        let per_hour = weight / (end - start) as f64;
        for hour in start..end {
            weights[hour as usize] = per_hour;
        }
    }

    if weights.iter().sum::<f64>() <= 0.0 {
        return Err(ConfigError::Invalid {
            field: "timeline.hour_distribution",
            reason: "total hour weight must be > 0".to_string(),
        });
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DayOfWeekRatio;
    use chrono::Timelike;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn global(tz: &str) -> GlobalConfig {
        GlobalConfig {
            generation_mode: crate::config::GenerationMode::Batch,
            target_months: vec!["2025-03".to_string()],
            target_mps: 0.0,
            timezone: tz.to_string(),
        }
    }

    fn timeline_config(hours: &[(&str, f64)]) -> TimelineConfig {
        TimelineConfig {
            dau: 10,
            logs_per_user_per_day: 5,
            day_of_week_ratio: DayOfWeekRatio::default(),
            hour_distribution: hours
                .iter()
                .map(|(range, weight)| (range.to_string(), *weight))
                .collect(),
        }
    }

    #[test]
    fn monthly_total_multiplies_days() {
        let timeline =
            Timeline::from_config(&global("UTC"), &timeline_config(&[])).unwrap();
        assert_eq!(timeline.monthly_total("2025-03", 100, 20).unwrap(), 62_000);
        assert_eq!(timeline.monthly_total("2024-02", 10, 1).unwrap(), 290);
    }

    #[test]
    fn monthly_is_sorted_and_within_month() {
        let timeline =
            Timeline::from_config(&global("Asia/Seoul"), &timeline_config(&[])).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let timestamps: Vec<_> = timeline.monthly("2025-06", 5_000, &mut rng).unwrap().collect();

        assert_eq!(timestamps.len(), 5_000);
        for pair in timestamps.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        for ts in &timestamps {
            assert_eq!(ts.year(), 2025);
            assert_eq!(ts.month(), 6);
        }
    }

    #[test]
    fn hour_band_fractions_track_weights() {
        let timeline = Timeline::from_config(
            &global("UTC"),
            &timeline_config(&[("0-12", 0.25), ("12-24", 0.75)]),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let timestamps: Vec<_> =
            timeline.monthly("2025-03", 100_000, &mut rng).unwrap().collect();

        let evening = timestamps.iter().filter(|ts| ts.hour() >= 12).count();
        let fraction = evening as f64 / timestamps.len() as f64;
        assert!(
            (fraction - 0.75).abs() < 0.02,
            "evening fraction {fraction} drifted from 0.75"
        );
    }

    #[test]
    fn zero_weight_hours_are_unreachable() {
        let timeline =
            Timeline::from_config(&global("UTC"), &timeline_config(&[("9-10", 1.0)])).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let timestamps: Vec<_> = timeline.monthly("2025-03", 2_000, &mut rng).unwrap().collect();
        assert!(timestamps.iter().all(|ts| ts.hour() == 9));
    }

    #[test]
    fn all_zero_weights_fail() {
        let timeline =
            Timeline::from_config(&global("UTC"), &timeline_config(&[("0-24", 0.0)]));
        assert!(timeline.is_err());
    }

    #[test]
    fn malformed_month_fails() {
        let timeline =
            Timeline::from_config(&global("UTC"), &timeline_config(&[])).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(timeline.monthly("March", 10, &mut rng).is_err());
        assert!(timeline.monthly("2025-13", 10, &mut rng).is_err());
    }
}
