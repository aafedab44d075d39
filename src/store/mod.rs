//! Storage contracts.
//!
//! Four narrow traits, one per record family. The bundled [`MemoryStore`]
//! implements all of them and backs both the binary and the tests; a
//! database-backed store plugs in behind the same traits.

mod memory;

pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ActorId, ArchivedEvent, BlacklistedUser, Event, EventTemplate};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    AlreadyExists,
    #[error("storage backend: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert(&self, event: Event) -> StoreResult<()>;
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Event>>;
    /// Full-row replace keyed by `event.id`.
    async fn update(&self, event: &Event) -> StoreResult<()>;
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Published events overlapping `[day_start, day_end]` whose end date is
    /// not older than `visibility_floor`, ordered by start date.
    async fn find_for_day(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
        visibility_floor: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>>;

    /// A submitter's published events that have not yet ended, ordered by
    /// start date.
    async fn find_active_by_submitter(
        &self,
        submitter: ActorId,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>>;

    /// Events whose end date lies before `cutoff`, regardless of status.
    async fn find_ended_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Event>>;

    /// Distinct (id, display name) of every submitter with at least one event.
    async fn distinct_submitters(&self) -> StoreResult<Vec<(ActorId, String)>>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn insert(&self, template: EventTemplate) -> StoreResult<()>;
    async fn find_by_id(&self, id: &str, owner: ActorId) -> StoreResult<Option<EventTemplate>>;
    async fn find_by_owner(&self, owner: ActorId) -> StoreResult<Vec<EventTemplate>>;
    async fn count_by_owner(&self, owner: ActorId) -> StoreResult<usize>;
    async fn update(&self, template: &EventTemplate) -> StoreResult<()>;
    async fn delete(&self, id: &str, owner: ActorId) -> StoreResult<()>;
}

#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Fails with [`StoreError::AlreadyExists`] if the actor is listed.
    async fn insert(&self, entry: BlacklistedUser) -> StoreResult<()>;
    async fn find(&self, user_id: ActorId) -> StoreResult<Option<BlacklistedUser>>;
    async fn remove(&self, user_id: ActorId) -> StoreResult<()>;
    async fn all(&self) -> StoreResult<Vec<BlacklistedUser>>;
}

#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn insert(&self, archived: ArchivedEvent) -> StoreResult<()>;
}

/// Bundle of the four stores handed around the crate.
#[derive(Clone)]
pub struct Stores {
    pub events: Arc<dyn EventStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub blacklist: Arc<dyn BlacklistStore>,
    pub archive: Arc<dyn ArchiveStore>,
}

impl Stores {
    /// All four stores backed by one in-memory instance.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            events: store.clone(),
            templates: store.clone(),
            blacklist: store.clone(),
            archive: store,
        }
    }
}
