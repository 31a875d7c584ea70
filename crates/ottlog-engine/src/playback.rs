use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use ottlog_core::config::WatchTimeConfig;
use ottlog_core::event::{
    ContentType, ContentsDetail, EventCategory, EventDetail, EventType, LogEvent, Platform,
};
use ottlog_core::users::ActivityLevel;
use rand::Rng;

/// The four canonical playback shapes a contents-start decision expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPattern {
    PlayStop,
    PlayPauseStop,
    PlayPauseResumeStop,
    PlayPauseResumePauseStop,
}

/// Declared order of `watch_pattern_probability`.
pub const WATCH_PATTERNS: [WatchPattern; 4] = [
    WatchPattern::PlayStop,
    WatchPattern::PlayPauseStop,
    WatchPattern::PlayPauseResumeStop,
    WatchPattern::PlayPauseResumePauseStop,
];

/// A fully sampled playback run: pattern plus every random quantity the
/// expansion needs. Tests pin the fields directly.
#[derive(Debug, Clone)]
pub struct PlaybackPlan {
    pub pattern: WatchPattern,
    /// Total watch duration D, >= 1.
    pub duration_minutes: u32,
    /// Fraction of D watched before the first pause.
    pub first_pause_fraction: f64,
    /// Minutes spent paused before resuming.
    pub resume_wait_minutes: f64,
    /// Fraction of D watched between resume and the second pause (P4 only).
    pub second_pause_fraction: f64,
}

impl PlaybackPlan {
    pub fn sample(
        pattern: WatchPattern,
        watch: &WatchTimeConfig,
        level: ActivityLevel,
        rng: &mut impl Rng,
    ) -> Self {
        let duration_minutes = sample_duration(watch, level, rng);
        let (first_pause_fraction, resume_wait_minutes, second_pause_fraction) = match pattern {
            WatchPattern::PlayStop => (0.0, 0.0, 0.0),
            WatchPattern::PlayPauseStop => (rng.gen_range(0.3..0.7), 0.0, 0.0),
            WatchPattern::PlayPauseResumeStop => {
                (rng.gen_range(0.2..0.4), rng.gen_range(1.0..5.0), 0.0)
            }
            WatchPattern::PlayPauseResumePauseStop => (
                rng.gen_range(0.15..0.25),
                rng.gen_range(1.0..3.0),
                rng.gen_range(0.2..0.35),
            ),
        };
        Self {
            pattern,
            duration_minutes,
            first_pause_fraction,
            resume_wait_minutes,
            second_pause_fraction,
        }
    }

    /// Expands the plan into start/pause/resume/stop logs with strictly
    /// increasing timestamps beginning at `t0`.
    pub fn expand(
        &self,
        t0: DateTime<Tz>,
        user_id: i64,
        platform: Platform,
        contents_id: &str,
        contents_type: ContentType,
        episode_id: Option<&str>,
    ) -> Vec<LogEvent> {
        let duration = self.duration_minutes as f64 * 60.0;
        let first_pause = self.first_pause_fraction * duration;
        let wait = self.resume_wait_minutes * 60.0;
        let second_leg = self.second_pause_fraction * duration;

        let mut marks: Vec<(EventType, f64)> = vec![(EventType::Start, 0.0)];
        match self.pattern {
            WatchPattern::PlayStop => {
                marks.push((EventType::Stop, duration));
            }
            WatchPattern::PlayPauseStop => {
                marks.push((EventType::Pause, first_pause));
                marks.push((EventType::Stop, duration));
            }
            WatchPattern::PlayPauseResumeStop => {
                let resume = first_pause + wait;
                marks.push((EventType::Pause, first_pause));
                marks.push((EventType::Resume, resume));
                marks.push((EventType::Stop, resume + (duration - first_pause)));
            }
            WatchPattern::PlayPauseResumePauseStop => {
                let resume = first_pause + wait;
                let second_pause = resume + second_leg;
                marks.push((EventType::Pause, first_pause));
                marks.push((EventType::Resume, resume));
                marks.push((EventType::Pause, second_pause));
                marks.push((EventType::Stop, second_pause + (duration - first_pause - second_leg)));
            }
        }

        marks
            .into_iter()
            .map(|(event_type, offset)| LogEvent {
                timestamp: t0 + Duration::seconds(offset.round() as i64),
                user_id,
                event_category: EventCategory::Contents,
                event_type,
                detail: EventDetail::Contents(ContentsDetail {
                    platform: Some(platform),
                    contents_id: contents_id.to_string(),
                    contents_type,
                    episode_id: episode_id.map(str::to_string),
                }),
            })
            .collect()
    }
}

fn sample_duration(watch: &WatchTimeConfig, level: ActivityLevel, rng: &mut impl Rng) -> u32 {
    let (avg, noise) = match level {
        ActivityLevel::High => (watch.high_avg_minutes, watch.high_noise),
        ActivityLevel::Medium => (watch.medium_avg_minutes, watch.medium_noise),
        ActivityLevel::Low => (watch.low_avg_minutes, watch.low_noise),
    };
    let jitter = rng.gen_range(-(noise as i64)..=noise as i64);
    (avg as i64 + jitter).max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn t0() -> DateTime<Tz> {
        chrono_tz::UTC
            .with_ymd_and_hms(2025, 6, 15, 20, 0, 0)
            .unwrap()
    }

    fn times(events: &[LogEvent]) -> Vec<String> {
        events
            .iter()
            .map(|event| event.timestamp.format("%H:%M:%S").to_string())
            .collect()
    }

    #[test]
    fn pause_resume_expansion_hits_exact_offsets() {
        let plan = PlaybackPlan {
            pattern: WatchPattern::PlayPauseResumeStop,
            duration_minutes: 20,
            first_pause_fraction: 0.3,
            resume_wait_minutes: 2.0,
            second_pause_fraction: 0.0,
        };
        let events = plan.expand(
            t0(),
            7,
            Platform::Tv,
            "movie_3",
            ContentType::Single,
            None,
        );

        let types: Vec<u8> = events.iter().map(|event| event.event_type.code()).collect();
        assert_eq!(types, vec![4, 6, 7, 5]);
        assert_eq!(
            times(&events),
            vec!["20:00:00", "20:06:00", "20:08:00", "20:22:00"]
        );
    }

    #[test]
    fn play_stop_is_two_events_spanning_the_duration() {
        let plan = PlaybackPlan {
            pattern: WatchPattern::PlayStop,
            duration_minutes: 45,
            first_pause_fraction: 0.0,
            resume_wait_minutes: 0.0,
            second_pause_fraction: 0.0,
        };
        let events = plan.expand(t0(), 1, Platform::Pc, "movie_1", ContentType::Single, None);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].timestamp, t0());
        assert_eq!(events[1].timestamp, t0() + Duration::minutes(45));
    }

    #[test]
    fn sampled_plans_expand_strictly_increasing() {
        let watch = WatchTimeConfig::default();
        let mut rng = StdRng::seed_from_u64(42);

        for pattern in WATCH_PATTERNS {
            for _ in 0..100 {
                let plan = PlaybackPlan::sample(pattern, &watch, ActivityLevel::Low, &mut rng);
                let events = plan.expand(
                    t0(),
                    5,
                    Platform::Android,
                    "tv_9",
                    ContentType::Series,
                    Some("ep_03"),
                );
                for pair in events.windows(2) {
                    assert!(
                        pair[0].timestamp < pair[1].timestamp,
                        "{pattern:?} produced non-increasing timestamps"
                    );
                }
                // within (t0, t0 + D + pause wait]
                let max_span = Duration::seconds(
                    (plan.duration_minutes as f64 * 60.0 + plan.resume_wait_minutes * 60.0).ceil()
                        as i64,
                ) + Duration::seconds(1);
                let last = events.last().unwrap().timestamp;
                assert!(last - t0() <= max_span);
            }
        }
    }

    #[test]
    fn series_playback_carries_the_episode_everywhere() {
        let plan = PlaybackPlan {
            pattern: WatchPattern::PlayPauseResumePauseStop,
            duration_minutes: 30,
            first_pause_fraction: 0.2,
            resume_wait_minutes: 1.0,
            second_pause_fraction: 0.25,
        };
        let events = plan.expand(
            t0(),
            2,
            Platform::Ios,
            "tv_4",
            ContentType::Series,
            Some("ep_11"),
        );
        assert_eq!(events.len(), 5);
        for event in &events {
            match &event.detail {
                EventDetail::Contents(detail) => {
                    assert_eq!(detail.episode_id.as_deref(), Some("ep_11"));
                    assert_eq!(detail.platform, Some(Platform::Ios));
                }
                other => panic!("unexpected detail: {other:?}"),
            }
        }
    }

    #[test]
    fn duration_jitter_never_drops_below_one_minute() {
        let watch = WatchTimeConfig {
            low_avg_minutes: 2,
            low_noise: 10,
            ..WatchTimeConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let plan =
                PlaybackPlan::sample(WatchPattern::PlayStop, &watch, ActivityLevel::Low, &mut rng);
            assert!(plan.duration_minutes >= 1);
        }
    }
}
