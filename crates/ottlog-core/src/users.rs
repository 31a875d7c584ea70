use crate::config::{ActivityConfig, ConfigError, UsersConfig};
use crate::traits::{Catalog, CatalogError, UserRecord};
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::collections::HashMap;

/// Engagement tier; fixed for the lifetime of a pooled user and used to
/// scale playback durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserState {
    NotLoggedIn,
    MainPage,
    ContentPage,
    UserOut,
}

/// Mutable per-user runtime state, owned by the pool.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: i64,
    pub is_subscribed: bool,
    pub activity_level: ActivityLevel,
    pub state: UserState,
    pub current_content_id: Option<String>,
    pub current_episode_id: Option<String>,
    /// Plan chosen at the latest subscription-start, reported on stop.
    pub current_plan_id: Option<String>,
    pub has_logged_in_today: bool,
    /// Set for users injected mid-day; cleared once their sign-up is logged.
    pub signed_up_today: bool,
    /// While set, the user is occupied by a playback pattern and must not
    /// be selected before this instant.
    pub blocked_until: Option<DateTime<Tz>>,
}

impl User {
    fn from_record(record: &UserRecord, activity_level: ActivityLevel) -> Self {
        Self {
            user_id: record.user_id,
            is_subscribed: record.is_subscribed,
            activity_level,
            state: UserState::NotLoggedIn,
            current_content_id: None,
            current_episode_id: None,
            current_plan_id: None,
            has_logged_in_today: false,
            signed_up_today: false,
            blocked_until: None,
        }
    }

    fn new_signup(user_id: i64, activity_level: ActivityLevel) -> Self {
        Self {
            user_id,
            is_subscribed: false,
            activity_level,
            state: UserState::NotLoggedIn,
            current_content_id: None,
            current_episode_id: None,
            current_plan_id: None,
            has_logged_in_today: false,
            signed_up_today: true,
            blocked_until: None,
        }
    }

    /// Whether the user may be selected at `ts`.
    pub fn is_available(&self, ts: DateTime<Tz>) -> bool {
        self.blocked_until.map_or(true, |until| until <= ts)
    }
}

/// Daily-active population of at most DAU catalog users plus the new users
/// injected during the day.
///
/// The pool reloads itself whenever the selection timestamp crosses a date
/// boundary and evicts users that reach the terminal state.
pub struct UserPool {
    dau: usize,
    new_user_ratio: f64,
    activity_index: WeightedIndex<f64>,
    users: HashMap<i64, User>,
    current_date: Option<NaiveDate>,
    injected_today: usize,
}

impl UserPool {
    pub fn new(
        timeline_dau: usize,
        users: &UsersConfig,
        activity: &ActivityConfig,
    ) -> Result<Self, ConfigError> {
        let activity_index = WeightedIndex::new([
            activity.high_ratio,
            activity.medium_ratio,
            activity.low_ratio,
        ])
        .map_err(|err| ConfigError::Invalid {
            field: "user_activity",
            reason: err.to_string(),
        })?;

        Ok(Self {
            dau: timeline_dau,
            new_user_ratio: users.new_user_ratio,
            activity_index,
            users: HashMap::new(),
            current_date: None,
            injected_today: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn injected_today(&self) -> usize {
        self.injected_today
    }

    pub fn get(&self, user_id: i64) -> Option<&User> {
        self.users.get(&user_id)
    }

    pub fn get_mut(&mut self, user_id: i64) -> Option<&mut User> {
        self.users.get_mut(&user_id)
    }

    /// Picks the user that acts at `ts`, reloading the pool on date change
    /// and injecting a brand-new account with probability `new_user_ratio`.
    pub fn select<C: Catalog>(
        &mut self,
        ts: DateTime<Tz>,
        catalog: &mut C,
        rng: &mut impl Rng,
    ) -> Result<i64, CatalogError> {
        let date = ts.date_naive();
        if self.current_date != Some(date) {
            self.reload(catalog, rng)?;
            self.current_date = Some(date);
            self.injected_today = 0;
        }

        if self.new_user_ratio > 0.0 && rng.gen_bool(self.new_user_ratio) {
            return self.inject_new_user(date, catalog, rng);
        }

        let available: Vec<i64> = self
            .users
            .values()
            .filter(|user| user.is_available(ts))
            .map(|user| user.user_id)
            .collect();
        if available.is_empty() {
            return self.inject_new_user(date, catalog, rng);
        }
        Ok(available[rng.gen_range(0..available.len())])
    }

    /// Applies the decided next state; terminal users leave the pool and
    /// never come back the same day.
    pub fn update_state(&mut self, user_id: i64, next_state: UserState) {
        if next_state == UserState::UserOut {
            self.users.remove(&user_id);
            return;
        }
        if let Some(user) = self.users.get_mut(&user_id) {
            user.state = next_state;
        }
    }

    fn reload<C: Catalog>(&mut self, catalog: &mut C, rng: &mut impl Rng) -> Result<(), CatalogError> {
        self.users.clear();
        let records = catalog.random_users(self.dau)?;
        for record in records {
            let activity = self.sample_activity(rng);
            self.users
                .insert(record.user_id, User::from_record(&record, activity));
        }
        Ok(())
    }

    fn inject_new_user<C: Catalog>(
        &mut self,
        date: NaiveDate,
        catalog: &mut C,
        rng: &mut impl Rng,
    ) -> Result<i64, CatalogError> {
        let user_id = catalog.create_user(date)?;
        let activity = self.sample_activity(rng);
        self.users.insert(user_id, User::new_signup(user_id, activity));
        self.injected_today += 1;
        Ok(user_id)
    }

    fn sample_activity(&self, rng: &mut impl Rng) -> ActivityLevel {
        match self.activity_index.sample(rng) {
            0 => ActivityLevel::High,
            1 => ActivityLevel::Medium,
            _ => ActivityLevel::Low,
        }
    }
}
