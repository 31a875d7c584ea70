//! Collaborator surfaces: the catalog read/write API and the event sink.
//!
//! The relational store behind [`Catalog`] and the object-storage/streaming
//! clients behind the sinks are external systems; the generator only ever
//! sees these traits.

use crate::event::{ContentType, LogEvent};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Fixture(serde_json::Error),
    Empty { what: &'static str },
    Unavailable(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Io(err) => write!(f, "catalog io error: {err}"),
            CatalogError::Fixture(err) => write!(f, "catalog fixture error: {err}"),
            CatalogError::Empty { what } => write!(f, "catalog has no {what}"),
            CatalogError::Unavailable(reason) => write!(f, "catalog unavailable: {reason}"),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io(err)
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Fixture(err)
    }
}

/// Active-account row as returned by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    pub is_subscribed: bool,
}

/// Whether a catalog content is an episodic show or a one-off title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Tv,
    Movie,
}

impl ContentKind {
    /// Wire code for the kind: series for tv, single for movies.
    pub fn content_type(self) -> ContentType {
        match self {
            ContentKind::Tv => ContentType::Series,
            ContentKind::Movie => ContentType::Single,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub contents_id: String,
    pub contents_type: ContentKind,
    pub popularity: f64,
    pub number_of_episodes: Option<u32>,
}

/// Narrow read/write surface over the user/content/subscription store.
pub trait Catalog {
    /// Up to `limit` random active accounts.
    fn random_users(&mut self, limit: usize) -> Result<Vec<UserRecord>, CatalogError>;

    /// One content, popularity-weighted over the cached top titles.
    fn random_content(&mut self) -> Result<ContentRecord, CatalogError>;

    fn content_by_id(&mut self, contents_id: &str) -> Result<Option<ContentRecord>, CatalogError>;

    /// All known subscription plan ids.
    fn subscription_plans(&mut self) -> Result<Vec<String>, CatalogError>;

    /// Inserts a new active account and returns its id.
    fn create_user(&mut self, signup_date: NaiveDate) -> Result<i64, CatalogError>;

    fn soft_delete_user(&mut self, user_id: i64) -> Result<(), CatalogError>;

    fn mark_subscription(&mut self, user_id: i64, active: bool) -> Result<(), CatalogError>;
}

#[derive(Debug)]
pub enum SinkError {
    Io(std::io::Error),
    Serialize(serde_json::Error),
    Transport(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(err) => write!(f, "sink io error: {err}"),
            SinkError::Serialize(err) => write!(f, "sink serialize error: {err}"),
            SinkError::Transport(reason) => write!(f, "sink transport error: {reason}"),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::Serialize(err)
    }
}

/// Destination for generated events.
pub trait EventSink {
    /// Accepts one event and returns the serialized size in bytes.
    fn write(&mut self, event: &LogEvent) -> Result<u64, SinkError>;

    /// Flushes any buffered state. Must be called before drop.
    fn close(&mut self) -> Result<(), SinkError>;
}
