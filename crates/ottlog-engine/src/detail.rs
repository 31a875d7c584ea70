use crate::decider::EventKind;
use crate::playback::{PlaybackPlan, WATCH_PATTERNS};
use chrono::DateTime;
use chrono_tz::Tz;
use ottlog_core::config::{ConfigError, DetailConfig, WatchTimeConfig};
use ottlog_core::event::{
    AccessDetail, ContentType, ContentsDetail, EventDetail, InquiryType, LogEvent, Platform,
    ReasonType, RegisterDetail, ReviewDetail, SearchDetail, SubscriptionDetail, SupportDetail,
    TrafficSource,
};
use ottlog_core::traits::{Catalog, CatalogError};
use ottlog_core::users::User;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Why a decided event produced no logs for this timestamp.
#[derive(Debug)]
pub enum DetailError {
    /// The decision references data the user does not hold.
    Unavailable(&'static str),
    Catalog(CatalogError),
}

impl std::fmt::Display for DetailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetailError::Unavailable(reason) => write!(f, "detail unavailable: {reason}"),
            DetailError::Catalog(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for DetailError {}

impl From<CatalogError> for DetailError {
    fn from(err: CatalogError) -> Self {
        DetailError::Catalog(err)
    }
}

const PLATFORMS: [Platform; 4] = [Platform::Android, Platform::Ios, Platform::Pc, Platform::Tv];

const TRAFFIC_SOURCES: [TrafficSource; 6] = [
    TrafficSource::Search,
    TrafficSource::Social,
    TrafficSource::AdSearch,
    TrafficSource::AdSocial,
    TrafficSource::Referral,
    TrafficSource::Misc,
];

const REASON_TYPES: [ReasonType; 3] =
    [ReasonType::Contents, ReasonType::Charge, ReasonType::Misc];

const INQUIRY_TYPES: [InquiryType; 4] = [
    InquiryType::Contents,
    InquiryType::Refund,
    InquiryType::Subscription,
    InquiryType::Information,
];

/// Plan-id ranges per subscription family, in `subscription_type_ratio`
/// declared order: standard, premium, family, mobile_only.
const PLAN_FAMILIES: [(u32, u32); 4] = [(1, 4), (5, 8), (9, 12), (13, 16)];

/// Fills event payloads and expands contents-start into playback patterns.
pub struct DetailGenerator {
    platform_index: WeightedIndex<f64>,
    pattern_index: WeightedIndex<f64>,
    plan_family_index: WeightedIndex<f64>,
    review_detail_ratio: f64,
    register_out_detail_ratio: f64,
    search_terms: Vec<String>,
    review_samples: Vec<String>,
    register_out_reasons: Vec<String>,
    inquiry_samples: Vec<String>,
    watch_time: WatchTimeConfig,
}

impl DetailGenerator {
    pub fn from_config(
        detail: &DetailConfig,
        watch_time: &WatchTimeConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            platform_index: weighted("log_detail.platform_ratio", &detail.platform_ratio.weights())?,
            pattern_index: weighted(
                "log_detail.watch_pattern_probability",
                &detail.watch_pattern_probability.weights(),
            )?,
            plan_family_index: weighted(
                "log_detail.subscription_type_ratio",
                &detail.subscription_type_ratio.weights(),
            )?,
            review_detail_ratio: detail.review_detail_ratio,
            register_out_detail_ratio: detail.register_out_detail_ratio,
            search_terms: detail.search_terms.clone(),
            review_samples: detail.review_samples.clone(),
            register_out_reasons: detail.register_out_reasons.clone(),
            inquiry_samples: detail.inquiry_samples.clone(),
            watch_time: watch_time.clone(),
        })
    }

    /// Produces the log(s) for a decided event, updating the user's current
    /// content/episode/plan bookkeeping along the way.
    pub fn generate<C: Catalog>(
        &self,
        kind: EventKind,
        user: &mut User,
        ts: DateTime<Tz>,
        catalog: &mut C,
        rng: &mut impl Rng,
    ) -> Result<Vec<LogEvent>, DetailError> {
        if kind == EventKind::ContentsStart {
            return self.expand_playback(user, ts, catalog, rng);
        }

        let detail = match kind {
            EventKind::AccessIn | EventKind::AccessOut => EventDetail::Access(AccessDetail {
                platform: self.sample_platform(rng),
            }),
            EventKind::ContentsClick => {
                let content = catalog.random_content()?;
                user.current_content_id = Some(content.contents_id.clone());
                user.current_episode_id = None;
                EventDetail::Contents(ContentsDetail {
                    platform: Some(self.sample_platform(rng)),
                    contents_id: content.contents_id,
                    contents_type: content.contents_type.content_type(),
                    episode_id: None,
                })
            }
            EventKind::ContentsLikeOn | EventKind::ContentsLikeOff => {
                let contents_id = user
                    .current_content_id
                    .clone()
                    .ok_or(DetailError::Unavailable("like without a current content"))?;
                let record = catalog
                    .content_by_id(&contents_id)?
                    .ok_or(DetailError::Unavailable("current content missing from catalog"))?;
                EventDetail::Contents(ContentsDetail {
                    platform: None,
                    contents_id,
                    contents_type: record.contents_type.content_type(),
                    episode_id: None,
                })
            }
            EventKind::ReviewReview => {
                let contents_id = user
                    .current_content_id
                    .clone()
                    .ok_or(DetailError::Unavailable("review without a current content"))?;
                EventDetail::Review(ReviewDetail {
                    contents_id,
                    rating: rng.gen_range(1..=10) as f64 / 2.0,
                    detail: self.optional_sample(&self.review_samples, self.review_detail_ratio, rng),
                })
            }
            EventKind::SubscriptionStart => {
                let (low, high) = PLAN_FAMILIES[self.plan_family_index.sample(rng)];
                let subscription_id = format!("s_{}", rng.gen_range(low..=high));
                user.current_plan_id = Some(subscription_id.clone());
                EventDetail::Subscription(SubscriptionDetail { subscription_id })
            }
            EventKind::SubscriptionStop => {
                let subscription_id = match user.current_plan_id.take() {
                    Some(plan) => plan,
                    None => {
                        let plans = catalog.subscription_plans()?;
                        plans[rng.gen_range(0..plans.len())].clone()
                    }
                };
                EventDetail::Subscription(SubscriptionDetail { subscription_id })
            }
            EventKind::RegisterIn => EventDetail::Register(RegisterDetail {
                traffic_source: Some(TRAFFIC_SOURCES[rng.gen_range(0..TRAFFIC_SOURCES.len())]),
                reason_type: None,
                reason_detail: None,
            }),
            EventKind::RegisterOut => EventDetail::Register(RegisterDetail {
                traffic_source: None,
                reason_type: Some(REASON_TYPES[rng.gen_range(0..REASON_TYPES.len())]),
                reason_detail: self.optional_sample(
                    &self.register_out_reasons,
                    self.register_out_detail_ratio,
                    rng,
                ),
            }),
            EventKind::SearchSearch => {
                let term = sample(&self.search_terms, rng)
                    .ok_or(DetailError::Unavailable("no search terms configured"))?;
                EventDetail::Search(SearchDetail {
                    term: term.to_string(),
                })
            }
            EventKind::SupportInquiry => {
                let inquiry_detail = sample(&self.inquiry_samples, rng)
                    .ok_or(DetailError::Unavailable("no inquiry samples configured"))?;
                EventDetail::Support(SupportDetail {
                    inquiry_type: INQUIRY_TYPES[rng.gen_range(0..INQUIRY_TYPES.len())],
                    inquiry_detail: inquiry_detail.to_string(),
                })
            }
            EventKind::ContentsStart => unreachable!("expanded above"),
        };

        Ok(vec![LogEvent {
            timestamp: ts,
            user_id: user.user_id,
            event_category: kind.category(),
            event_type: kind.event_type(),
            detail,
        }])
    }

    fn expand_playback<C: Catalog>(
        &self,
        user: &mut User,
        ts: DateTime<Tz>,
        catalog: &mut C,
        rng: &mut impl Rng,
    ) -> Result<Vec<LogEvent>, DetailError> {
        let contents_id = match user.current_content_id.clone() {
            Some(id) => id,
            None => {
                let content = catalog.random_content()?;
                user.current_content_id = Some(content.contents_id.clone());
                content.contents_id
            }
        };
        let record = catalog
            .content_by_id(&contents_id)?
            .ok_or(DetailError::Unavailable("current content missing from catalog"))?;
        let contents_type = record.contents_type.content_type();

        let episode_id = match record.number_of_episodes {
            Some(count) if contents_type == ContentType::Series => {
                Some(format!("ep_{:02}", rng.gen_range(1..=count.max(1))))
            }
            _ => None,
        };
        user.current_episode_id = episode_id.clone();

        let platform = self.sample_platform(rng);
        let pattern = WATCH_PATTERNS[self.pattern_index.sample(rng)];
        let plan = PlaybackPlan::sample(pattern, &self.watch_time, user.activity_level, rng);
        let events = plan.expand(
            ts,
            user.user_id,
            platform,
            &contents_id,
            contents_type,
            episode_id.as_deref(),
        );

        // the user is occupied until the pattern plays out
        if let Some(last) = events.last() {
            user.blocked_until = Some(last.timestamp);
        }
        Ok(events)
    }

    fn sample_platform(&self, rng: &mut impl Rng) -> Platform {
        PLATFORMS[self.platform_index.sample(rng)]
    }

    fn optional_sample(
        &self,
        list: &[String],
        ratio: f64,
        rng: &mut impl Rng,
    ) -> Option<String> {
        if ratio > 0.0 && rng.gen_bool(ratio.clamp(0.0, 1.0)) {
            sample(list, rng).map(str::to_string)
        } else {
            None
        }
    }
}

fn weighted(field: &'static str, weights: &[f64]) -> Result<WeightedIndex<f64>, ConfigError> {
    WeightedIndex::new(weights).map_err(|err| ConfigError::Invalid {
        field,
        reason: err.to_string(),
    })
}

fn sample<'a>(list: &'a [String], rng: &mut impl Rng) -> Option<&'a str> {
    if list.is_empty() {
        return None;
    }
    Some(list[rng.gen_range(0..list.len())].as_str())
}
