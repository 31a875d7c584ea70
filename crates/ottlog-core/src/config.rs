use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "config io error: {err}"),
            ConfigError::Parse(err) => write!(f, "config parse error: {err}"),
            ConfigError::Invalid { field, reason } => {
                write!(f, "invalid config value for {field}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub seed: Option<u64>,
    pub global: GlobalConfig,
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub users: UsersConfig,
    #[serde(default)]
    pub user_activity: ActivityConfig,
    #[serde(default)]
    pub watch_time: WatchTimeConfig,
    #[serde(default)]
    pub user_event_transitions: TransitionsConfig,
    #[serde(default)]
    pub log_detail: DetailConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    pub sink: SinkConfig,
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Startup validation of everything that would otherwise fail mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if chrono_tz::Tz::from_str(&self.global.timezone).is_err() {
            return Err(ConfigError::Invalid {
                field: "global.timezone",
                reason: format!("unknown timezone {:?}", self.global.timezone),
            });
        }
        if !self.global.target_mps.is_finite() || self.global.target_mps < 0.0 {
            return Err(ConfigError::Invalid {
                field: "global.target_mps",
                reason: format!("{} (must be >= 0)", self.global.target_mps),
            });
        }
        if self.global.generation_mode == GenerationMode::Batch
            && self.global.target_months.is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "global.target_months",
                reason: "batch mode requires at least one YYYY-MM entry".to_string(),
            });
        }
        for month in &self.global.target_months {
            parse_target_month(month)?;
        }

        if self.timeline.dau == 0 {
            return Err(ConfigError::Invalid {
                field: "timeline.dau",
                reason: "must be >= 1".to_string(),
            });
        }
        if self.timeline.logs_per_user_per_day == 0 {
            return Err(ConfigError::Invalid {
                field: "timeline.logs_per_user_per_day",
                reason: "must be >= 1".to_string(),
            });
        }
        self.timeline.day_of_week_ratio.validate()?;
        validate_hour_ranges(&self.timeline.hour_distribution)?;

        probability("users.new_user_ratio", self.users.new_user_ratio)?;
        probability("log_detail.review_detail_ratio", self.log_detail.review_detail_ratio)?;
        probability(
            "log_detail.register_out_detail_ratio",
            self.log_detail.register_out_detail_ratio,
        )?;

        weight_cell(
            "user_activity",
            &[
                self.user_activity.high_ratio,
                self.user_activity.medium_ratio,
                self.user_activity.low_ratio,
            ],
        )?;
        weight_cell("log_detail.platform_ratio", &self.log_detail.platform_ratio.weights())?;
        weight_cell(
            "log_detail.watch_pattern_probability",
            &self.log_detail.watch_pattern_probability.weights(),
        )?;
        weight_cell(
            "log_detail.subscription_type_ratio",
            &self.log_detail.subscription_type_ratio.weights(),
        )?;

        let transitions = &self.user_event_transitions;
        weight_cell(
            "user_event_transitions.main_page.subscribed",
            &transitions.main_page.subscribed.weights(),
        )?;
        weight_cell(
            "user_event_transitions.main_page.not_subscribed",
            &transitions.main_page.not_subscribed.weights(),
        )?;
        weight_cell(
            "user_event_transitions.content_page.subscribed",
            &transitions.content_page.subscribed.weights(),
        )?;
        weight_cell(
            "user_event_transitions.content_page.not_subscribed",
            &transitions.content_page.not_subscribed.weights(),
        )?;

        Ok(())
    }
}

/// Checks that a weight cell has only finite non-negative entries and a
/// positive total, so cumulative-weight sampling is always well defined.
fn weight_cell(field: &'static str, weights: &[f64]) -> Result<(), ConfigError> {
    let mut total = 0.0;
    for weight in weights {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(ConfigError::Invalid {
                field,
                reason: format!("weight {weight} is not a finite non-negative number"),
            });
        }
        total += weight;
    }
    if total <= 0.0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "weights must sum to > 0".to_string(),
        });
    }
    Ok(())
}

fn probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{value} is not within [0, 1]"),
        });
    }
    Ok(())
}

/// Parses a `"YYYY-MM"` target month into (year, month).
pub fn parse_target_month(spec: &str) -> Result<(i32, u32), ConfigError> {
    let invalid = || ConfigError::Invalid {
        field: "global.target_months",
        reason: format!("{spec:?} is not a YYYY-MM month"),
    };
    let (year, month) = spec.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) || !(1970..=9999).contains(&year) {
        return Err(invalid());
    }
    Ok((year, month))
}

/// Validates the half-open `"start-end"` hour ranges of an hour distribution.
pub fn validate_hour_ranges(ranges: &BTreeMap<String, f64>) -> Result<(), ConfigError> {
    for (range, weight) in ranges {
        let invalid = |reason: String| ConfigError::Invalid {
            field: "timeline.hour_distribution",
            reason,
        };
        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| invalid(format!("{range:?} is not a start-end range")))?;
        let start: u32 = start
            .parse()
            .map_err(|_| invalid(format!("{range:?} has a malformed start hour")))?;
        let end: u32 = end
            .parse()
            .map_err(|_| invalid(format!("{range:?} has a malformed end hour")))?;
        if start >= end || end > 24 {
            return Err(invalid(format!(
                "{range:?} must satisfy 0 <= start < end <= 24"
            )));
        }
        if !weight.is_finite() || *weight < 0.0 {
            return Err(invalid(format!("range {range:?} has invalid weight {weight}")));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub generation_mode: GenerationMode,
    #[serde(default)]
    pub target_months: Vec<String>,
    #[serde(default)]
    pub target_mps: f64,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Batch,
    Streaming,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    pub dau: usize,
    pub logs_per_user_per_day: u32,
    #[serde(default)]
    pub day_of_week_ratio: DayOfWeekRatio,
    /// Half-open hour ranges, e.g. `"18-22" = 0.35`. Empty means uniform.
    #[serde(default)]
    pub hour_distribution: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayOfWeekRatio {
    #[serde(default = "seventh")]
    pub monday: f64,
    #[serde(default = "seventh")]
    pub tuesday: f64,
    #[serde(default = "seventh")]
    pub wednesday: f64,
    #[serde(default = "seventh")]
    pub thursday: f64,
    #[serde(default = "seventh")]
    pub friday: f64,
    #[serde(default = "seventh")]
    pub saturday: f64,
    #[serde(default = "seventh")]
    pub sunday: f64,
}

fn seventh() -> f64 {
    1.0 / 7.0
}

impl Default for DayOfWeekRatio {
    fn default() -> Self {
        Self {
            monday: seventh(),
            tuesday: seventh(),
            wednesday: seventh(),
            thursday: seventh(),
            friday: seventh(),
            saturday: seventh(),
            sunday: seventh(),
        }
    }
}

impl DayOfWeekRatio {
    /// Monday-first weights, matching `chrono::Weekday::num_days_from_monday`.
    pub fn weights(&self) -> [f64; 7] {
        [
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
            self.saturday,
            self.sunday,
        ]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        weight_cell("timeline.day_of_week_ratio", &self.weights())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersConfig {
    #[serde(default = "default_new_user_ratio")]
    pub new_user_ratio: f64,
}

fn default_new_user_ratio() -> f64 {
    0.03
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            new_user_ratio: default_new_user_ratio(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    #[serde(default = "default_high_ratio")]
    pub high_ratio: f64,
    #[serde(default = "default_medium_ratio")]
    pub medium_ratio: f64,
    #[serde(default = "default_low_ratio")]
    pub low_ratio: f64,
}

fn default_high_ratio() -> f64 {
    0.20
}

fn default_medium_ratio() -> f64 {
    0.50
}

fn default_low_ratio() -> f64 {
    0.30
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            high_ratio: default_high_ratio(),
            medium_ratio: default_medium_ratio(),
            low_ratio: default_low_ratio(),
        }
    }
}

/// Average playback duration and jitter per activity level, in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchTimeConfig {
    #[serde(default = "default_high_avg")]
    pub high_avg_minutes: u32,
    #[serde(default = "default_high_noise")]
    pub high_noise: u32,
    #[serde(default = "default_medium_avg")]
    pub medium_avg_minutes: u32,
    #[serde(default = "default_medium_noise")]
    pub medium_noise: u32,
    #[serde(default = "default_low_avg")]
    pub low_avg_minutes: u32,
    #[serde(default = "default_low_noise")]
    pub low_noise: u32,
}

fn default_high_avg() -> u32 {
    45
}

fn default_high_noise() -> u32 {
    10
}

fn default_medium_avg() -> u32 {
    25
}

fn default_medium_noise() -> u32 {
    8
}

fn default_low_avg() -> u32 {
    10
}

fn default_low_noise() -> u32 {
    5
}

impl Default for WatchTimeConfig {
    fn default() -> Self {
        Self {
            high_avg_minutes: default_high_avg(),
            high_noise: default_high_noise(),
            medium_avg_minutes: default_medium_avg(),
            medium_noise: default_medium_noise(),
            low_avg_minutes: default_low_avg(),
            low_noise: default_low_noise(),
        }
    }
}

/// State-conditional event weights. Field order is the declared sampling
/// order; weights need not sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransitionsConfig {
    #[serde(default)]
    pub main_page: MainPageTransitions,
    #[serde(default)]
    pub content_page: ContentPageTransitions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainPageTransitions {
    #[serde(default = "MainPageWeights::subscribed_default")]
    pub subscribed: MainPageWeights,
    #[serde(default = "MainPageWeights::not_subscribed_default")]
    pub not_subscribed: MainPageWeights,
}

impl Default for MainPageTransitions {
    fn default() -> Self {
        Self {
            subscribed: MainPageWeights::subscribed_default(),
            not_subscribed: MainPageWeights::not_subscribed_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MainPageWeights {
    #[serde(default)]
    pub access_out: f64,
    #[serde(default)]
    pub contents_click: f64,
    #[serde(default)]
    pub subscription_start: f64,
    #[serde(default)]
    pub subscription_stop: f64,
    #[serde(default)]
    pub register_out: f64,
    #[serde(default)]
    pub search_search: f64,
    #[serde(default)]
    pub support_inquiry: f64,
}

impl MainPageWeights {
    pub fn subscribed_default() -> Self {
        Self {
            access_out: 0.10,
            contents_click: 0.50,
            subscription_start: 0.0,
            subscription_stop: 0.05,
            register_out: 0.02,
            search_search: 0.25,
            support_inquiry: 0.08,
        }
    }

    pub fn not_subscribed_default() -> Self {
        Self {
            access_out: 0.0,
            contents_click: 0.40,
            subscription_start: 0.30,
            subscription_stop: 0.0,
            register_out: 0.02,
            search_search: 0.20,
            support_inquiry: 0.08,
        }
    }

    pub fn weights(&self) -> [f64; 7] {
        [
            self.access_out,
            self.contents_click,
            self.subscription_start,
            self.subscription_stop,
            self.register_out,
            self.search_search,
            self.support_inquiry,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPageTransitions {
    #[serde(default = "ContentPageWeights::subscribed_default")]
    pub subscribed: ContentPageWeights,
    #[serde(default = "ContentPageWeights::not_subscribed_default")]
    pub not_subscribed: ContentPageWeights,
}

impl Default for ContentPageTransitions {
    fn default() -> Self {
        Self {
            subscribed: ContentPageWeights::subscribed_default(),
            not_subscribed: ContentPageWeights::not_subscribed_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContentPageWeights {
    #[serde(default)]
    pub contents_start: f64,
    #[serde(default)]
    pub contents_like_on: f64,
    #[serde(default)]
    pub contents_like_off: f64,
    #[serde(default)]
    pub review_review: f64,
}

impl ContentPageWeights {
    pub fn subscribed_default() -> Self {
        Self {
            contents_start: 0.67,
            contents_like_on: 0.16,
            contents_like_off: 0.06,
            review_review: 0.11,
        }
    }

    pub fn not_subscribed_default() -> Self {
        Self {
            contents_start: 0.0,
            contents_like_on: 0.75,
            contents_like_off: 0.25,
            review_review: 0.0,
        }
    }

    pub fn weights(&self) -> [f64; 4] {
        [
            self.contents_start,
            self.contents_like_on,
            self.contents_like_off,
            self.review_review,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailConfig {
    #[serde(default)]
    pub platform_ratio: PlatformRatio,
    #[serde(default)]
    pub watch_pattern_probability: WatchPatternRatio,
    #[serde(default = "default_review_detail_ratio")]
    pub review_detail_ratio: f64,
    #[serde(default = "default_register_out_detail_ratio")]
    pub register_out_detail_ratio: f64,
    #[serde(default)]
    pub subscription_type_ratio: SubscriptionTypeRatio,
    #[serde(default = "default_search_terms")]
    pub search_terms: Vec<String>,
    #[serde(default = "default_review_samples")]
    pub review_samples: Vec<String>,
    #[serde(default = "default_register_out_reasons")]
    pub register_out_reasons: Vec<String>,
    #[serde(default = "default_inquiry_samples")]
    pub inquiry_samples: Vec<String>,
}

fn default_review_detail_ratio() -> f64 {
    0.70
}

fn default_register_out_detail_ratio() -> f64 {
    0.50
}

fn default_search_terms() -> Vec<String> {
    [
        "space opera",
        "crime thriller",
        "romance",
        "animated movie",
        "zombie series",
        "baseball documentary",
    ]
    .map(String::from)
    .to_vec()
}

fn default_review_samples() -> Vec<String> {
    [
        "Loved it, watched the whole thing in one night",
        "Great pacing",
        "Not my taste",
        "The ending felt rushed",
        "Would watch again",
    ]
    .map(String::from)
    .to_vec()
}

fn default_register_out_reasons() -> Vec<String> {
    [
        "Not enough content",
        "Too expensive",
        "Switching to another service",
        "Rarely used it",
    ]
    .map(String::from)
    .to_vec()
}

fn default_inquiry_samples() -> Vec<String> {
    [
        "My payment failed",
        "Video keeps buffering",
        "How do I change my plan?",
        "I want a refund",
        "Subtitles are out of sync",
    ]
    .map(String::from)
    .to_vec()
}

impl Default for DetailConfig {
    fn default() -> Self {
        Self {
            platform_ratio: PlatformRatio::default(),
            watch_pattern_probability: WatchPatternRatio::default(),
            review_detail_ratio: default_review_detail_ratio(),
            register_out_detail_ratio: default_register_out_detail_ratio(),
            subscription_type_ratio: SubscriptionTypeRatio::default(),
            search_terms: default_search_terms(),
            review_samples: default_review_samples(),
            register_out_reasons: default_register_out_reasons(),
            inquiry_samples: default_inquiry_samples(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRatio {
    #[serde(default = "default_android_ratio")]
    pub android: f64,
    #[serde(default = "default_ios_ratio")]
    pub ios: f64,
    #[serde(default = "default_pc_ratio")]
    pub pc: f64,
    #[serde(default = "default_tv_ratio")]
    pub tv: f64,
}

fn default_android_ratio() -> f64 {
    0.35
}

fn default_ios_ratio() -> f64 {
    0.30
}

fn default_pc_ratio() -> f64 {
    0.25
}

fn default_tv_ratio() -> f64 {
    0.10
}

impl Default for PlatformRatio {
    fn default() -> Self {
        Self {
            android: default_android_ratio(),
            ios: default_ios_ratio(),
            pc: default_pc_ratio(),
            tv: default_tv_ratio(),
        }
    }
}

impl PlatformRatio {
    pub fn weights(&self) -> [f64; 4] {
        [self.android, self.ios, self.pc, self.tv]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchPatternRatio {
    #[serde(default = "default_play_stop")]
    pub play_stop: f64,
    #[serde(default = "default_play_pause_stop")]
    pub play_pause_stop: f64,
    #[serde(default = "default_play_pause_resume_stop")]
    pub play_pause_resume_stop: f64,
    #[serde(default = "default_play_pause_resume_pause_stop")]
    pub play_pause_resume_pause_stop: f64,
}

fn default_play_stop() -> f64 {
    0.15
}

fn default_play_pause_stop() -> f64 {
    0.25
}

fn default_play_pause_resume_stop() -> f64 {
    0.50
}

fn default_play_pause_resume_pause_stop() -> f64 {
    0.10
}

impl Default for WatchPatternRatio {
    fn default() -> Self {
        Self {
            play_stop: default_play_stop(),
            play_pause_stop: default_play_pause_stop(),
            play_pause_resume_stop: default_play_pause_resume_stop(),
            play_pause_resume_pause_stop: default_play_pause_resume_pause_stop(),
        }
    }
}

impl WatchPatternRatio {
    pub fn weights(&self) -> [f64; 4] {
        [
            self.play_stop,
            self.play_pause_stop,
            self.play_pause_resume_stop,
            self.play_pause_resume_pause_stop,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionTypeRatio {
    #[serde(default = "default_standard_ratio")]
    pub standard: f64,
    #[serde(default = "default_premium_ratio")]
    pub premium: f64,
    #[serde(default = "default_family_ratio")]
    pub family: f64,
    #[serde(default = "default_mobile_only_ratio")]
    pub mobile_only: f64,
}

fn default_standard_ratio() -> f64 {
    0.40
}

fn default_premium_ratio() -> f64 {
    0.25
}

fn default_family_ratio() -> f64 {
    0.20
}

fn default_mobile_only_ratio() -> f64 {
    0.15
}

impl Default for SubscriptionTypeRatio {
    fn default() -> Self {
        Self {
            standard: default_standard_ratio(),
            premium: default_premium_ratio(),
            family: default_family_ratio(),
            mobile_only: default_mobile_only_ratio(),
        }
    }
}

impl SubscriptionTypeRatio {
    pub fn weights(&self) -> [f64; 4] {
        [self.standard, self.premium, self.family, self.mobile_only]
    }
}

/// Seeding knobs for the in-memory catalog stand-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_user_count")]
    pub user_count: usize,
    #[serde(default = "default_content_count")]
    pub content_count: usize,
    #[serde(default = "default_subscribed_ratio")]
    pub subscribed_ratio: f64,
    #[serde(default = "default_series_ratio")]
    pub series_ratio: f64,
    /// When set, the catalog loads this JSON fixture instead of reseeding.
    pub fixture_path: Option<String>,
}

fn default_user_count() -> usize {
    5_000
}

fn default_content_count() -> usize {
    500
}

fn default_subscribed_ratio() -> f64 {
    0.45
}

fn default_series_ratio() -> f64 {
    0.40
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            user_count: default_user_count(),
            content_count: default_content_count(),
            subscribed_ratio: default_subscribed_ratio(),
            series_ratio: default_series_ratio(),
            fixture_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "sink_type", rename_all = "snake_case")]
pub enum SinkConfig {
    File(FileSinkConfig),
    S3(ObjectSinkConfig),
    Kinesis(StreamSinkConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSinkConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub partition: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSinkConfig {
    pub s3_bucket: String,
    #[serde(default = "default_s3_prefix")]
    pub s3_prefix: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Local staging root used until a remote client is wired in.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    pub aws_profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSinkConfig {
    #[serde(default = "default_stream_name")]
    pub kinesis_stream_name: String,
    #[serde(default = "default_stream_region")]
    pub kinesis_region: String,
    pub aws_profile: Option<String>,
}

fn default_output_dir() -> String {
    "./output".to_string()
}

fn default_topic() -> String {
    "user-logs".to_string()
}

fn default_s3_prefix() -> String {
    "raw-userlog".to_string()
}

fn default_stream_name() -> String {
    "user-logs-stream".to_string()
}

fn default_stream_region() -> String {
    "ap-northeast-2".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [global]
        generation_mode = "batch"
        target_months = ["2025-06"]
        timezone = "Asia/Seoul"

        [timeline]
        dau = 100
        logs_per_user_per_day = 10

        [timeline.hour_distribution]
        "0-12" = 0.25
        "12-24" = 0.75

        [sink]
        sink_type = "file"
        output_dir = "./out"
        topic = "user-logs"
    "#;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.timeline.dau, 100);
        assert!((config.users.new_user_ratio - 0.03).abs() < 1e-9);
        assert!(config.seed.is_none());
        let main = &config.user_event_transitions.main_page.subscribed;
        assert!(main.contents_click > 0.0);
        match &config.sink {
            SinkConfig::File(file) => assert_eq!(file.topic, "user-logs"),
            other => panic!("unexpected sink config: {other:?}"),
        }
    }

    #[test]
    fn unknown_sink_type_is_rejected() {
        let raw = MINIMAL.replace("sink_type = \"file\"", "sink_type = \"ftp\"");
        assert!(toml::from_str::<Config>(&raw).is_err());
    }

    #[test]
    fn malformed_month_is_rejected() {
        let raw = MINIMAL.replace("2025-06", "June 2025");
        let config: Config = toml::from_str(&raw).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "global.target_months", .. })
        ));
    }

    #[test]
    fn reversed_hour_range_is_rejected() {
        let raw = MINIMAL.replace("\"0-12\" = 0.25", "\"12-0\" = 0.25");
        let config: Config = toml::from_str(&raw).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "timeline.hour_distribution", .. })
        ));
    }

    #[test]
    fn zeroed_transition_cell_is_rejected() {
        let raw = format!(
            "{MINIMAL}\n[user_event_transitions.content_page.not_subscribed]\ncontents_like_on = 0.0\ncontents_like_off = 0.0\n"
        );
        let config: Config = toml::from_str(&raw).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "user_event_transitions.content_page.not_subscribed",
                ..
            })
        ));
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let raw = MINIMAL.replace("Asia/Seoul", "Mars/Olympus");
        let config: Config = toml::from_str(&raw).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "global.timezone", .. })
        ));
    }
}
