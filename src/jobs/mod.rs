//! Background maintenance.
//!
//! One periodic job: sweep ended events into the archive once their retention
//! window has passed. Each event is copied first and deleted second, so a
//! crash between the two leaves a duplicate in the archive rather than a
//! lost event.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::config::Config;
use crate::models::ArchivedEvent;
use crate::store::Stores;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub archived: usize,
    pub failed: usize,
}

/// One archival pass: move every event that ended more than the retention
/// window ago. Failures are per-event; a broken row never stops the sweep.
pub async fn archive_ended_events(stores: &Stores, config: &Config) -> SweepStats {
    let cutoff = Utc::now() - chrono::Duration::hours(config.archive_retention_hours);
    let ended = match stores.events.find_ended_before(cutoff).await {
        Ok(ended) => ended,
        Err(err) => {
            tracing::error!(error = %err, "archival sweep query failed");
            return SweepStats::default();
        }
    };

    let mut stats = SweepStats::default();
    let now = Utc::now();
    for event in ended {
        let id = event.id.clone();
        // Copy first; the live row is only removed once the copy landed.
        if let Err(err) = stores
            .archive
            .insert(ArchivedEvent::from_event(event, now))
            .await
        {
            tracing::warn!(event_id = %id, error = %err, "archive copy failed, keeping live row");
            stats.failed += 1;
            continue;
        }
        match stores.events.delete(&id).await {
            Ok(()) => {
                tracing::info!(event_id = %id, "event archived");
                stats.archived += 1;
            }
            Err(err) => {
                tracing::warn!(event_id = %id, error = %err, "archived copy exists but live delete failed");
                stats.failed += 1;
            }
        }
    }
    stats
}

/// Run the sweep on an interval until `shutdown` flips to `true`.
pub async fn run_archiver(
    stores: Stores,
    config: Arc<Config>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.archive_interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let stats = archive_ended_events(&stores, &config).await;
                if stats.archived > 0 || stats.failed > 0 {
                    tracing::info!(archived = stats.archived, failed = stats.failed, "archival sweep finished");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("archiver shutting down");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventDraft, EventStatus};
    use crate::store::MemoryStore;
    use crate::testutil::test_config;
    use chrono::Duration as ChronoDuration;

    async fn seed(stores: &Stores, title: &str, end_offset_hours: i64) -> String {
        let now = Utc::now();
        let actor = crate::models::ActorInfo::new(1, "Seeder");
        let mut draft = EventDraft::new(&actor);
        draft.title = title.into();
        draft.entry_date = Some(now + ChronoDuration::hours(end_offset_hours) - ChronoDuration::hours(2));
        draft.start_date = Some(now + ChronoDuration::hours(end_offset_hours) - ChronoDuration::hours(1));
        draft.end_date = Some(now + ChronoDuration::hours(end_offset_hours));
        let event = draft.build_event(EventStatus::Approved, now).unwrap();
        let id = event.id.clone();
        stores.events.insert(event).await.unwrap();
        id
    }

    #[tokio::test]
    async fn sweep_moves_only_expired_events() {
        let memory = std::sync::Arc::new(MemoryStore::new());
        let stores = Stores {
            events: memory.clone(),
            templates: memory.clone(),
            blacklist: memory.clone(),
            archive: memory.clone(),
        };
        let config = test_config();

        let expired = seed(&stores, "Long over", -10).await;
        let recent = seed(&stores, "Just ended", -1).await;
        let upcoming = seed(&stores, "Still ahead", 10).await;

        let stats = archive_ended_events(&stores, &config).await;
        assert_eq!(stats, SweepStats { archived: 1, failed: 0 });

        assert!(stores.events.find_by_id(&expired).await.unwrap().is_none());
        assert!(stores.events.find_by_id(&recent).await.unwrap().is_some());
        assert!(stores.events.find_by_id(&upcoming).await.unwrap().is_some());

        let archived = memory.archived();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].event.id, expired);
    }
}
