use ottlog_core::config::{
    ConfigError, ContentPageWeights, MainPageWeights, TransitionsConfig,
};
use ottlog_core::event::{EventCategory, EventType};
use ottlog_core::users::{User, UserState};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Everything the state machine can decide to emit.
///
/// Pause/resume/stop are deliberately absent: they only ever appear inside
/// a playback pattern expanded from [`EventKind::ContentsStart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    AccessIn,
    AccessOut,
    ContentsClick,
    ContentsStart,
    ContentsLikeOn,
    ContentsLikeOff,
    ReviewReview,
    SubscriptionStart,
    SubscriptionStop,
    RegisterIn,
    RegisterOut,
    SearchSearch,
    SupportInquiry,
}

impl EventKind {
    pub fn category(self) -> EventCategory {
        match self {
            EventKind::AccessIn | EventKind::AccessOut => EventCategory::Access,
            EventKind::ContentsClick
            | EventKind::ContentsStart
            | EventKind::ContentsLikeOn
            | EventKind::ContentsLikeOff => EventCategory::Contents,
            EventKind::ReviewReview => EventCategory::Review,
            EventKind::SubscriptionStart | EventKind::SubscriptionStop => {
                EventCategory::Subscription
            }
            EventKind::RegisterIn | EventKind::RegisterOut => EventCategory::Register,
            EventKind::SearchSearch => EventCategory::Search,
            EventKind::SupportInquiry => EventCategory::Support,
        }
    }

    pub fn event_type(self) -> EventType {
        match self {
            EventKind::AccessIn | EventKind::RegisterIn => EventType::In,
            EventKind::AccessOut | EventKind::RegisterOut => EventType::Out,
            EventKind::ContentsClick => EventType::Click,
            EventKind::ContentsStart | EventKind::SubscriptionStart => EventType::Start,
            EventKind::SubscriptionStop => EventType::Stop,
            EventKind::ContentsLikeOn => EventType::LikeOn,
            EventKind::ContentsLikeOff => EventType::LikeOff,
            EventKind::ReviewReview => EventType::Review,
            EventKind::SearchSearch => EventType::Search,
            EventKind::SupportInquiry => EventType::Inquiry,
        }
    }
}

/// Pool/catalog mutation the pipeline must apply alongside the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    None,
    ResetLogin,
    Subscribe,
    Unsubscribe,
    SoftDelete,
}

#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub kind: EventKind,
    pub next_state: UserState,
    pub effect: SideEffect,
    /// A register-in log follows this event: first login of an account
    /// that signed up earlier the same day.
    pub follow_up_registration: bool,
}

impl Decision {
    fn event(kind: EventKind, next_state: UserState, effect: SideEffect) -> Self {
        Self {
            kind,
            next_state,
            effect,
            follow_up_registration: false,
        }
    }
}

/// Event kinds in declared order with cumulative-weight selection.
struct WeightedEvents {
    kinds: Vec<EventKind>,
    index: WeightedIndex<f64>,
}

impl WeightedEvents {
    fn new(field: &'static str, pairs: Vec<(EventKind, f64)>) -> Result<Self, ConfigError> {
        let kinds = pairs.iter().map(|(kind, _)| *kind).collect();
        let index = WeightedIndex::new(pairs.iter().map(|(_, weight)| *weight)).map_err(|err| {
            ConfigError::Invalid {
                field,
                reason: err.to_string(),
            }
        })?;
        Ok(Self { kinds, index })
    }

    fn sample(&self, rng: &mut impl Rng) -> EventKind {
        self.kinds[self.index.sample(rng)]
    }
}

fn main_page_events(weights: &MainPageWeights) -> Vec<(EventKind, f64)> {
    vec![
        (EventKind::AccessOut, weights.access_out),
        (EventKind::ContentsClick, weights.contents_click),
        (EventKind::SubscriptionStart, weights.subscription_start),
        (EventKind::SubscriptionStop, weights.subscription_stop),
        (EventKind::RegisterOut, weights.register_out),
        (EventKind::SearchSearch, weights.search_search),
        (EventKind::SupportInquiry, weights.support_inquiry),
    ]
}

fn content_page_events(weights: &ContentPageWeights) -> Vec<(EventKind, f64)> {
    vec![
        (EventKind::ContentsStart, weights.contents_start),
        (EventKind::ContentsLikeOn, weights.contents_like_on),
        (EventKind::ContentsLikeOff, weights.contents_like_off),
        (EventKind::ReviewReview, weights.review_review),
    ]
}

/// State-conditional next-event sampler.
pub struct EventDecider {
    main_subscribed: WeightedEvents,
    main_not_subscribed: WeightedEvents,
    content_subscribed: WeightedEvents,
    content_not_subscribed: WeightedEvents,
}

impl EventDecider {
    pub fn from_config(transitions: &TransitionsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            main_subscribed: WeightedEvents::new(
                "user_event_transitions.main_page.subscribed",
                main_page_events(&transitions.main_page.subscribed),
            )?,
            main_not_subscribed: WeightedEvents::new(
                "user_event_transitions.main_page.not_subscribed",
                main_page_events(&transitions.main_page.not_subscribed),
            )?,
            content_subscribed: WeightedEvents::new(
                "user_event_transitions.content_page.subscribed",
                content_page_events(&transitions.content_page.subscribed),
            )?,
            content_not_subscribed: WeightedEvents::new(
                "user_event_transitions.content_page.not_subscribed",
                content_page_events(&transitions.content_page.not_subscribed),
            )?,
        })
    }

    /// Decides the next event for the user, mutating the login-day flags.
    ///
    /// Returns `None` only for terminal users, which the pool should have
    /// evicted already.
    pub fn decide(&self, user: &mut User, rng: &mut impl Rng) -> Option<Decision> {
        if !user.has_logged_in_today || user.state == UserState::NotLoggedIn {
            user.has_logged_in_today = true;
            let follow_up_registration = user.signed_up_today;
            user.signed_up_today = false;
            return Some(Decision {
                kind: EventKind::AccessIn,
                next_state: UserState::MainPage,
                effect: SideEffect::None,
                follow_up_registration,
            });
        }

        match user.state {
            UserState::MainPage => {
                let table = if user.is_subscribed {
                    &self.main_subscribed
                } else {
                    &self.main_not_subscribed
                };
                Some(main_page_decision(table.sample(rng)))
            }
            UserState::ContentPage => {
                let table = if user.is_subscribed {
                    &self.content_subscribed
                } else {
                    &self.content_not_subscribed
                };
                Some(content_page_decision(table.sample(rng)))
            }
            UserState::UserOut => None,
            UserState::NotLoggedIn => unreachable!("handled by the forced login branch"),
        }
    }
}

fn main_page_decision(kind: EventKind) -> Decision {
    match kind {
        EventKind::AccessOut => {
            Decision::event(kind, UserState::UserOut, SideEffect::ResetLogin)
        }
        EventKind::ContentsClick => {
            Decision::event(kind, UserState::ContentPage, SideEffect::None)
        }
        EventKind::SubscriptionStart => {
            Decision::event(kind, UserState::MainPage, SideEffect::Subscribe)
        }
        EventKind::SubscriptionStop => {
            Decision::event(kind, UserState::MainPage, SideEffect::Unsubscribe)
        }
        EventKind::RegisterOut => {
            Decision::event(kind, UserState::UserOut, SideEffect::SoftDelete)
        }
        _ => Decision::event(kind, UserState::MainPage, SideEffect::None),
    }
}

fn content_page_decision(kind: EventKind) -> Decision {
    // every content-page action returns the user to the main page; the
    // playback expansion itself is handled by the detail generator
    Decision::event(kind, UserState::MainPage, SideEffect::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ottlog_core::config::{ContentPageTransitions, MainPageTransitions};
    use ottlog_core::users::ActivityLevel;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn user(state: UserState, is_subscribed: bool) -> User {
        let mut user = User {
            user_id: 1,
            is_subscribed,
            activity_level: ActivityLevel::Medium,
            state,
            current_content_id: None,
            current_episode_id: None,
            current_plan_id: None,
            has_logged_in_today: true,
            signed_up_today: false,
            blocked_until: None,
        };
        if state == UserState::NotLoggedIn {
            user.has_logged_in_today = false;
        }
        user
    }

    fn decider() -> EventDecider {
        EventDecider::from_config(&TransitionsConfig::default()).unwrap()
    }

    #[test]
    fn first_selection_of_the_day_forces_access_in() {
        let decider = decider();
        let mut rng = StdRng::seed_from_u64(1);
        let mut user = user(UserState::NotLoggedIn, true);

        let decision = decider.decide(&mut user, &mut rng).unwrap();
        assert_eq!(decision.kind, EventKind::AccessIn);
        assert_eq!(decision.next_state, UserState::MainPage);
        assert!(!decision.follow_up_registration);
        assert!(user.has_logged_in_today);
    }

    #[test]
    fn injected_users_get_a_registration_follow_up() {
        let decider = decider();
        let mut rng = StdRng::seed_from_u64(1);
        let mut user = user(UserState::NotLoggedIn, false);
        user.signed_up_today = true;

        let decision = decider.decide(&mut user, &mut rng).unwrap();
        assert_eq!(decision.kind, EventKind::AccessIn);
        assert!(decision.follow_up_registration);
        assert!(!user.signed_up_today);

        // only once: the next forced login would not repeat it
        user.has_logged_in_today = false;
        user.state = UserState::NotLoggedIn;
        let decision = decider.decide(&mut user, &mut rng).unwrap();
        assert!(!decision.follow_up_registration);
    }

    #[test]
    fn subscription_state_selects_the_table() {
        let transitions = TransitionsConfig {
            main_page: MainPageTransitions {
                subscribed: MainPageWeights {
                    subscription_stop: 1.0,
                    ..MainPageWeights::default()
                },
                not_subscribed: MainPageWeights {
                    search_search: 1.0,
                    ..MainPageWeights::default()
                },
            },
            content_page: ContentPageTransitions::default(),
        };
        let decider = EventDecider::from_config(&transitions).unwrap();
        let mut rng = StdRng::seed_from_u64(2);

        let mut subscribed = user(UserState::MainPage, true);
        let decision = decider.decide(&mut subscribed, &mut rng).unwrap();
        assert_eq!(decision.kind, EventKind::SubscriptionStop);
        assert_eq!(decision.effect, SideEffect::Unsubscribe);
        assert_eq!(decision.next_state, UserState::MainPage);

        let mut free = user(UserState::MainPage, false);
        let decision = decider.decide(&mut free, &mut rng).unwrap();
        assert_eq!(decision.kind, EventKind::SearchSearch);
        assert_eq!(decision.effect, SideEffect::None);
    }

    #[test]
    fn zero_weight_events_are_never_sampled() {
        let decider = decider();
        let mut rng = StdRng::seed_from_u64(3);

        // default not-subscribed content page only likes on/off
        for _ in 0..200 {
            let mut free = user(UserState::ContentPage, false);
            let decision = decider.decide(&mut free, &mut rng).unwrap();
            assert!(matches!(
                decision.kind,
                EventKind::ContentsLikeOn | EventKind::ContentsLikeOff
            ));
            assert_eq!(decision.next_state, UserState::MainPage);
        }
    }

    #[test]
    fn exit_events_carry_their_side_effects() {
        let decision = main_page_decision(EventKind::AccessOut);
        assert_eq!(decision.next_state, UserState::UserOut);
        assert_eq!(decision.effect, SideEffect::ResetLogin);

        let decision = main_page_decision(EventKind::RegisterOut);
        assert_eq!(decision.next_state, UserState::UserOut);
        assert_eq!(decision.effect, SideEffect::SoftDelete);
    }

    #[test]
    fn terminal_users_yield_nothing() {
        let decider = decider();
        let mut rng = StdRng::seed_from_u64(4);
        let mut gone = user(UserState::UserOut, true);
        assert!(decider.decide(&mut gone, &mut rng).is_none());
    }
}
