//! In-memory store used by the binary default and the test suite.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::models::{ActorId, ArchivedEvent, BlacklistedUser, Event, EventTemplate};

use super::{
    ArchiveStore, BlacklistStore, EventStore, StoreError, StoreResult, TemplateStore,
};

#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<HashMap<String, Event>>,
    templates: RwLock<HashMap<String, EventTemplate>>,
    blacklist: RwLock<HashMap<ActorId, BlacklistedUser>>,
    archive: RwLock<Vec<ArchivedEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the archive, for tests and the `config show` diagnostics.
    pub fn archived(&self) -> Vec<ArchivedEvent> {
        self.archive.read().clone()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert(&self, event: Event) -> StoreResult<()> {
        let mut events = self.events.write();
        if events.contains_key(&event.id) {
            return Err(StoreError::AlreadyExists);
        }
        events.insert(event.id.clone(), event);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Event>> {
        Ok(self.events.read().get(id).cloned())
    }

    async fn update(&self, event: &Event) -> StoreResult<()> {
        let mut events = self.events.write();
        match events.get_mut(&event.id) {
            Some(slot) => {
                *slot = event.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        match self.events.write().remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    async fn find_for_day(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
        visibility_floor: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        let mut hits: Vec<Event> = self
            .events
            .read()
            .values()
            .filter(|e| {
                e.status.is_published()
                    && e.start_date <= day_end
                    && e.end_date >= day_start
                    && e.end_date >= visibility_floor
            })
            .cloned()
            .collect();
        hits.sort_by_key(|e| e.start_date);
        Ok(hits)
    }

    async fn find_active_by_submitter(
        &self,
        submitter: ActorId,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        let mut hits: Vec<Event> = self
            .events
            .read()
            .values()
            .filter(|e| {
                e.submitter_id == submitter && e.status.is_published() && e.end_date > now
            })
            .cloned()
            .collect();
        hits.sort_by_key(|e| e.start_date);
        Ok(hits)
    }

    async fn find_ended_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Event>> {
        let mut hits: Vec<Event> = self
            .events
            .read()
            .values()
            .filter(|e| e.end_date < cutoff)
            .cloned()
            .collect();
        hits.sort_by_key(|e| e.end_date);
        Ok(hits)
    }

    async fn distinct_submitters(&self) -> StoreResult<Vec<(ActorId, String)>> {
        let mut seen: HashMap<ActorId, String> = HashMap::new();
        for event in self.events.read().values() {
            seen.entry(event.submitter_id)
                .or_insert_with(|| event.submitter_name.clone());
        }
        let mut out: Vec<(ActorId, String)> = seen.into_iter().collect();
        out.sort_by_key(|(id, _)| *id);
        Ok(out)
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn insert(&self, template: EventTemplate) -> StoreResult<()> {
        let mut templates = self.templates.write();
        if templates.contains_key(&template.id) {
            return Err(StoreError::AlreadyExists);
        }
        templates.insert(template.id.clone(), template);
        Ok(())
    }

    async fn find_by_id(&self, id: &str, owner: ActorId) -> StoreResult<Option<EventTemplate>> {
        Ok(self
            .templates
            .read()
            .get(id)
            .filter(|t| t.owner_id == owner)
            .cloned())
    }

    async fn find_by_owner(&self, owner: ActorId) -> StoreResult<Vec<EventTemplate>> {
        let mut hits: Vec<EventTemplate> = self
            .templates
            .read()
            .values()
            .filter(|t| t.owner_id == owner)
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(hits)
    }

    async fn count_by_owner(&self, owner: ActorId) -> StoreResult<usize> {
        Ok(self
            .templates
            .read()
            .values()
            .filter(|t| t.owner_id == owner)
            .count())
    }

    async fn update(&self, template: &EventTemplate) -> StoreResult<()> {
        let mut templates = self.templates.write();
        match templates.get_mut(&template.id) {
            Some(slot) if slot.owner_id == template.owner_id => {
                *slot = template.clone();
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: &str, owner: ActorId) -> StoreResult<()> {
        let mut templates = self.templates.write();
        match templates.get(id) {
            Some(t) if t.owner_id == owner => {
                templates.remove(id);
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }
}

#[async_trait]
impl BlacklistStore for MemoryStore {
    async fn insert(&self, entry: BlacklistedUser) -> StoreResult<()> {
        let mut blacklist = self.blacklist.write();
        if blacklist.contains_key(&entry.user_id) {
            return Err(StoreError::AlreadyExists);
        }
        blacklist.insert(entry.user_id, entry);
        Ok(())
    }

    async fn find(&self, user_id: ActorId) -> StoreResult<Option<BlacklistedUser>> {
        Ok(self.blacklist.read().get(&user_id).cloned())
    }

    async fn remove(&self, user_id: ActorId) -> StoreResult<()> {
        match self.blacklist.write().remove(&user_id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    async fn all(&self) -> StoreResult<Vec<BlacklistedUser>> {
        let mut entries: Vec<BlacklistedUser> = self.blacklist.read().values().cloned().collect();
        entries.sort_by_key(|e| e.banned_at);
        Ok(entries)
    }
}

#[async_trait]
impl ArchiveStore for MemoryStore {
    async fn insert(&self, archived: ArchivedEvent) -> StoreResult<()> {
        self.archive.write().push(archived);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActorInfo, EventDraft, EventStatus};
    use chrono::Duration;

    fn event_at(start_offset_hours: i64, status: EventStatus, submitter: ActorId) -> Event {
        let now = Utc::now();
        let mut draft = EventDraft::new(&ActorInfo::new(submitter, format!("user-{submitter}")));
        draft.title = format!("event+{start_offset_hours}");
        draft.entry_date = Some(now + Duration::hours(start_offset_hours));
        draft.start_date = Some(now + Duration::hours(start_offset_hours));
        draft.end_date = Some(now + Duration::hours(start_offset_hours + 2));
        draft.build_event(status, now).unwrap()
    }

    #[tokio::test]
    async fn day_query_filters_status_and_window() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let approved = event_at(3, EventStatus::Approved, 1);
        let pending = event_at(4, EventStatus::Pending, 1);
        let edited = event_at(5, EventStatus::EditedApproved, 2);
        for e in [approved.clone(), pending, edited.clone()] {
            EventStore::insert(&store, e).await.unwrap();
        }

        let hits = store
            .find_for_day(now, now + Duration::hours(24), now - Duration::hours(2))
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![approved.id.as_str(), edited.id.as_str()]);
    }

    #[tokio::test]
    async fn recently_ended_events_stay_visible_until_the_floor() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut ended = event_at(-6, EventStatus::Approved, 1);
        ended.end_date = now - Duration::hours(1);
        EventStore::insert(&store, ended.clone()).await.unwrap();

        let floor = now - Duration::hours(2);
        let hits = store
            .find_for_day(now - Duration::hours(24), now + Duration::hours(24), floor)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let hits = store
            .find_for_day(now - Duration::hours(24), now + Duration::hours(24), now)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn blacklist_rejects_duplicates() {
        let store = MemoryStore::new();
        let entry = BlacklistedUser {
            user_id: 7,
            user_name: Some("seven".into()),
            banned_by: Some(1),
            banned_by_name: Some("admin".into()),
            reason: None,
            banned_at: Utc::now(),
        };
        BlacklistStore::insert(&store, entry.clone()).await.unwrap();
        assert!(matches!(
            BlacklistStore::insert(&store, entry).await,
            Err(StoreError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn template_access_is_owner_scoped() {
        let store = MemoryStore::new();
        let owner = ActorInfo::new(1, "owner");
        let draft = EventDraft::new(&owner);
        let template = EventTemplate::from_draft(&draft, "mine", &owner, Utc::now());
        TemplateStore::insert(&store, template.clone()).await.unwrap();

        assert!(TemplateStore::find_by_id(&store, &template.id, 1)
            .await
            .unwrap()
            .is_some());
        assert!(TemplateStore::find_by_id(&store, &template.id, 2)
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            TemplateStore::delete(&store, &template.id, 2).await,
            Err(StoreError::NotFound)
        ));
        TemplateStore::delete(&store, &template.id, 1).await.unwrap();
    }
}
