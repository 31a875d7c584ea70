//! In-memory stand-in for the relational user/content/subscription store.
//!
//! The generator only talks to the [`Catalog`] trait; this crate provides a
//! seeded implementation plus a JSON fixture snapshot so a population can be
//! reused across runs.

use chrono::NaiveDate;
use ottlog_core::config::CatalogConfig;
use ottlog_core::traits::{Catalog, CatalogError, ContentKind, ContentRecord, UserRecord};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// How many titles, by descending popularity, feed weighted content picks.
const TOP_TITLE_CACHE: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRow {
    pub user_id: i64,
    pub is_subscribed: bool,
    pub active: bool,
    pub signup_date: Option<NaiveDate>,
}

/// Serializable catalog snapshot (`ottlog catalog` writes one of these).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFixture {
    pub accounts: Vec<AccountRow>,
    pub contents: Vec<ContentRecord>,
    pub plans: Vec<String>,
}

pub struct MemoryCatalog {
    accounts: HashMap<i64, AccountRow>,
    next_user_id: i64,
    contents: Vec<ContentRecord>,
    content_index: HashMap<String, usize>,
    top_titles: Vec<usize>,
    top_selector: Option<WeightedIndex<f64>>,
    plans: Vec<String>,
    rng: StdRng,
}

impl MemoryCatalog {
    /// Seeds a fresh population from the config counts and ratios.
    pub fn seeded(config: &CatalogConfig, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let subscribed_ratio = config.subscribed_ratio.clamp(0.0, 1.0);
        let series_ratio = config.series_ratio.clamp(0.0, 1.0);

        let mut accounts = HashMap::with_capacity(config.user_count);
        for user_id in 1..=config.user_count as i64 {
            accounts.insert(
                user_id,
                AccountRow {
                    user_id,
                    is_subscribed: rng.gen_bool(subscribed_ratio),
                    active: true,
                    signup_date: None,
                },
            );
        }

        let mut contents = Vec::with_capacity(config.content_count);
        for seq in 0..config.content_count {
            // squared uniform skews popularity toward a small head of titles
            let base: f64 = rng.gen_range(0.0..1.0);
            let popularity = 0.5 + 199.5 * base * base;
            if rng.gen_bool(series_ratio) {
                contents.push(ContentRecord {
                    contents_id: format!("tv_{seq}"),
                    contents_type: ContentKind::Tv,
                    popularity,
                    number_of_episodes: Some(rng.gen_range(6..=24)),
                });
            } else {
                contents.push(ContentRecord {
                    contents_id: format!("movie_{seq}"),
                    contents_type: ContentKind::Movie,
                    popularity,
                    number_of_episodes: None,
                });
            }
        }

        let plans = (1..=16).map(|seq| format!("s_{seq}")).collect();
        Self::build(accounts, contents, plans, rng)
    }

    /// Restores a catalog from a fixture snapshot.
    pub fn from_fixture(fixture: CatalogFixture, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let accounts = fixture
            .accounts
            .into_iter()
            .map(|row| (row.user_id, row))
            .collect();
        Self::build(accounts, fixture.contents, fixture.plans, rng)
    }

    pub fn from_fixture_path(path: impl AsRef<Path>, seed: Option<u64>) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)?;
        let fixture: CatalogFixture = serde_json::from_str(&raw)?;
        Ok(Self::from_fixture(fixture, seed))
    }

    /// Loads the configured fixture when present, otherwise seeds fresh.
    pub fn from_config(config: &CatalogConfig, seed: Option<u64>) -> Result<Self, CatalogError> {
        match &config.fixture_path {
            Some(path) => Self::from_fixture_path(path, seed),
            None => Ok(Self::seeded(config, seed)),
        }
    }

    fn build(
        accounts: HashMap<i64, AccountRow>,
        contents: Vec<ContentRecord>,
        plans: Vec<String>,
        rng: StdRng,
    ) -> Self {
        let next_user_id = accounts.keys().max().copied().unwrap_or(0) + 1;
        let content_index = contents
            .iter()
            .enumerate()
            .map(|(position, record)| (record.contents_id.clone(), position))
            .collect();

        let mut catalog = Self {
            accounts,
            next_user_id,
            contents,
            content_index,
            top_titles: Vec::new(),
            top_selector: None,
            plans,
            rng,
        };
        catalog.rebuild_top_cache();
        catalog
    }

    fn rebuild_top_cache(&mut self) {
        let mut ranked: Vec<usize> = (0..self.contents.len()).collect();
        ranked.sort_by(|a, b| {
            self.contents[*b]
                .popularity
                .partial_cmp(&self.contents[*a].popularity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(TOP_TITLE_CACHE);

        let weights: Vec<f64> = ranked
            .iter()
            .map(|position| self.contents[*position].popularity.max(f64::MIN_POSITIVE))
            .collect();
        self.top_selector = WeightedIndex::new(&weights).ok();
        self.top_titles = ranked;
    }

    pub fn fixture(&self) -> CatalogFixture {
        let mut accounts: Vec<AccountRow> = self.accounts.values().cloned().collect();
        accounts.sort_by_key(|row| row.user_id);
        CatalogFixture {
            accounts,
            contents: self.contents.clone(),
            plans: self.plans.clone(),
        }
    }

    pub fn save_fixture(&self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        let body = serde_json::to_string_pretty(&self.fixture())?;
        fs::write(path, body)?;
        Ok(())
    }

    pub fn content_count(&self) -> usize {
        self.contents.len()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

impl Catalog for MemoryCatalog {
    fn random_users(&mut self, limit: usize) -> Result<Vec<UserRecord>, CatalogError> {
        let active: Vec<&AccountRow> = self
            .accounts
            .values()
            .filter(|row| row.active)
            .collect();
        if active.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let amount = limit.min(active.len());
        let picked = index::sample(&mut self.rng, active.len(), amount);
        Ok(picked
            .iter()
            .map(|position| {
                let row = active[position];
                UserRecord {
                    user_id: row.user_id,
                    is_subscribed: row.is_subscribed,
                }
            })
            .collect())
    }

    fn random_content(&mut self) -> Result<ContentRecord, CatalogError> {
        let selector = self
            .top_selector
            .as_ref()
            .ok_or(CatalogError::Empty { what: "contents" })?;
        let position = self.top_titles[selector.sample(&mut self.rng)];
        Ok(self.contents[position].clone())
    }

    fn content_by_id(&mut self, contents_id: &str) -> Result<Option<ContentRecord>, CatalogError> {
        Ok(self
            .content_index
            .get(contents_id)
            .map(|position| self.contents[*position].clone()))
    }

    fn subscription_plans(&mut self) -> Result<Vec<String>, CatalogError> {
        if self.plans.is_empty() {
            return Err(CatalogError::Empty { what: "subscription plans" });
        }
        Ok(self.plans.clone())
    }

    fn create_user(&mut self, signup_date: NaiveDate) -> Result<i64, CatalogError> {
        let user_id = self.next_user_id;
        self.next_user_id += 1;
        self.accounts.insert(
            user_id,
            AccountRow {
                user_id,
                is_subscribed: false,
                active: true,
                signup_date: Some(signup_date),
            },
        );
        Ok(user_id)
    }

    fn soft_delete_user(&mut self, user_id: i64) -> Result<(), CatalogError> {
        if let Some(row) = self.accounts.get_mut(&user_id) {
            row.active = false;
        }
        Ok(())
    }

    fn mark_subscription(&mut self, user_id: i64, active: bool) -> Result<(), CatalogError> {
        if let Some(row) = self.accounts.get_mut(&user_id) {
            row.is_subscribed = active;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config(user_count: usize, content_count: usize) -> CatalogConfig {
        CatalogConfig {
            user_count,
            content_count,
            subscribed_ratio: 0.5,
            series_ratio: 0.4,
            fixture_path: None,
        }
    }

    fn graded_fixture(count: usize) -> CatalogFixture {
        // popularity equals the sequence number, so the top cache is the tail
        let contents = (0..count)
            .map(|seq| ContentRecord {
                contents_id: format!("movie_{seq}"),
                contents_type: ContentKind::Movie,
                popularity: seq as f64 + 1.0,
                number_of_episodes: None,
            })
            .collect();
        CatalogFixture {
            accounts: vec![AccountRow {
                user_id: 1,
                is_subscribed: false,
                active: true,
                signup_date: None,
            }],
            contents,
            plans: vec!["s_1".to_string()],
        }
    }

    #[test]
    fn seeding_respects_counts() {
        let mut catalog = MemoryCatalog::seeded(&config(200, 40), Some(9));
        assert_eq!(catalog.account_count(), 200);
        assert_eq!(catalog.content_count(), 40);
        assert_eq!(catalog.subscription_plans().unwrap().len(), 16);

        let users = catalog.random_users(50).unwrap();
        assert_eq!(users.len(), 50);
        let mut ids: Vec<i64> = users.iter().map(|user| user.user_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn random_content_draws_only_from_top_cache() {
        let mut catalog = MemoryCatalog::from_fixture(graded_fixture(80), Some(9));
        for _ in 0..500 {
            let record = catalog.random_content().unwrap();
            let seq: usize = record
                .contents_id
                .trim_start_matches("movie_")
                .parse()
                .unwrap();
            assert!(seq >= 30, "{} is outside the top-50 cache", record.contents_id);
        }
    }

    #[test]
    fn created_users_are_returned_by_later_reads() {
        let mut catalog = MemoryCatalog::seeded(&config(1, 5), Some(3));
        let signup = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let user_id = catalog.create_user(signup).unwrap();
        assert_eq!(user_id, 2);

        let second = catalog.create_user(signup).unwrap();
        assert_eq!(second, 3);

        let users = catalog.random_users(10).unwrap();
        assert!(users.iter().any(|user| user.user_id == user_id));
    }

    #[test]
    fn soft_deleted_users_stop_appearing() {
        let mut catalog = MemoryCatalog::seeded(&config(5, 5), Some(4));
        catalog.soft_delete_user(3).unwrap();
        for _ in 0..20 {
            let users = catalog.random_users(5).unwrap();
            assert!(users.iter().all(|user| user.user_id != 3));
        }
    }

    #[test]
    fn mark_subscription_flips_the_flag() {
        let mut catalog = MemoryCatalog::seeded(&config(3, 3), Some(5));
        catalog.mark_subscription(2, true).unwrap();
        let users = catalog.random_users(3).unwrap();
        let row = users.iter().find(|user| user.user_id == 2).unwrap();
        assert!(row.is_subscribed);
    }

    #[test]
    fn fixture_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let catalog = MemoryCatalog::seeded(&config(25, 12), Some(6));
        catalog.save_fixture(&path).unwrap();

        let mut restored = MemoryCatalog::from_fixture_path(&path, Some(6)).unwrap();
        assert_eq!(restored.account_count(), 25);
        assert_eq!(restored.content_count(), 12);
        assert_eq!(restored.subscription_plans().unwrap().len(), 16);

        let original = catalog.fixture();
        let round_tripped = restored.fixture();
        assert_eq!(original.plans, round_tripped.plans);
        assert_eq!(original.accounts.len(), round_tripped.accounts.len());
        for (left, right) in original.contents.iter().zip(round_tripped.contents.iter()) {
            assert_eq!(left.contents_id, right.contents_id);
            assert_eq!(left.number_of_episodes, right.number_of_episodes);
        }
    }
}
