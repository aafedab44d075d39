//! Domain model types.
//!
//! `Event` is the central entity; `EventDraft` is the transient field set a
//! conversation accumulates before it is committed to a stored event.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport-level actor identifier.
pub type ActorId = i64;

/// Transport-level message destination (chat / channel / direct).
pub type VenueId = i64;

/// Transport-level message locator within a venue.
pub type MessageId = i64;

/// Identity of the actor driving a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorInfo {
    pub id: ActorId,
    pub display_name: String,
}

impl ActorInfo {
    pub fn new(id: ActorId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Moderation state of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
    EditedPending,
    EditedApproved,
}

impl EventStatus {
    /// Whether the event currently has a live public posting.
    pub fn is_published(self) -> bool {
        matches!(self, EventStatus::Approved | EventStatus::EditedApproved)
    }
}

/// Fixed category vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Dance,
    Music,
    Concert,
    Entertainment,
    Politics,
    Theatre,
    Sport,
    Education,
    EatDrink,
    Art,
    Cinema,
    Festival,
    Exhibition,
    Literature,
    Workshop,
    Lecture,
    Market,
    Other,
}

impl Category {
    pub const ALL: [Category; 18] = [
        Category::Dance,
        Category::Music,
        Category::Concert,
        Category::Entertainment,
        Category::Politics,
        Category::Theatre,
        Category::Sport,
        Category::Education,
        Category::EatDrink,
        Category::Art,
        Category::Cinema,
        Category::Festival,
        Category::Exhibition,
        Category::Literature,
        Category::Workshop,
        Category::Lecture,
        Category::Market,
        Category::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Dance => "Dance",
            Category::Music => "Music",
            Category::Concert => "Concert",
            Category::Entertainment => "Entertainment",
            Category::Politics => "Politics",
            Category::Theatre => "Theatre",
            Category::Sport => "Sport",
            Category::Education => "Education",
            Category::EatDrink => "Eat & Drink",
            Category::Art => "Art",
            Category::Cinema => "Cinema",
            Category::Festival => "Festival",
            Category::Exhibition => "Exhibition",
            Category::Literature => "Literature",
            Category::Workshop => "Workshop",
            Category::Lecture => "Lecture",
            Category::Market => "Market",
            Category::Other => "Other",
        }
    }

    pub fn from_label(label: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.label() == label)
    }
}

/// Image payload stored as base64-encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData(pub String);

impl ImageData {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.0)
    }
}

/// A community event submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub categories: Vec<Category>,
    pub links: Vec<String>,
    pub group_link: Option<String>,
    pub image: Option<ImageData>,
    /// Doors-open moment. Invariant: entry_date <= start_date < end_date.
    pub entry_date: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub submitter_id: ActorId,
    pub submitter_name: String,
    pub status: EventStatus,
    pub rejection_reason: Option<String>,
    pub updated_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Locator of the live public posting, once published.
    pub message_id: Option<MessageId>,
    /// Locator of the overflow text message when a caption had to be split.
    pub description_message_id: Option<MessageId>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub pushed_count: u32,
}

impl Event {
    /// Overwrite the content and temporal fields from a completed draft.
    ///
    /// Provenance, status, counters and message bookkeeping are untouched;
    /// callers adjust those as part of their own transition.
    pub fn apply_draft(&mut self, draft: &EventDraft) {
        self.title = draft.title.clone();
        self.description = draft.description.clone();
        self.location = draft.location.clone();
        self.categories = draft.categories.clone();
        self.links = draft.links.clone();
        self.group_link = draft.group_link.clone();
        self.image = draft.image.clone();
        if let (Some(entry), Some(start), Some(end)) =
            (draft.entry_date, draft.start_date, draft.end_date)
        {
            self.entry_date = entry;
            self.start_date = start;
            self.end_date = end;
        }
    }
}

/// In-progress field set owned by one conversation instance.
///
/// Discarded on cancellation; committed to an [`Event`] on confirmation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub location: String,
    pub categories: Vec<Category>,
    pub links: Vec<String>,
    pub group_link: Option<String>,
    pub image: Option<ImageData>,
    pub entry_date: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub submitter_id: ActorId,
    pub submitter_name: String,
}

impl EventDraft {
    pub fn new(submitter: &ActorInfo) -> Self {
        Self {
            submitter_id: submitter.id,
            submitter_name: submitter.display_name.clone(),
            ..Self::default()
        }
    }

    pub fn from_event(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            categories: event.categories.clone(),
            links: event.links.clone(),
            group_link: event.group_link.clone(),
            image: event.image.clone(),
            entry_date: Some(event.entry_date),
            start_date: Some(event.start_date),
            end_date: Some(event.end_date),
            submitter_id: event.submitter_id,
            submitter_name: event.submitter_name.clone(),
        }
    }

    /// Pre-fill a fresh submission from a template. Dates are never carried.
    pub fn from_template(template: &EventTemplate, submitter: &ActorInfo) -> Self {
        Self {
            title: template.title.clone(),
            description: template.description.clone(),
            location: template.location.clone(),
            categories: template.categories.clone(),
            links: template.links.clone(),
            group_link: template.group_link.clone(),
            image: template.image.clone(),
            entry_date: None,
            start_date: None,
            end_date: None,
            submitter_id: submitter.id,
            submitter_name: submitter.display_name.clone(),
        }
    }

    /// Commit the draft into a new event record.
    ///
    /// Returns `None` if the date triad was never completed.
    pub fn build_event(&self, status: EventStatus, now: DateTime<Utc>) -> Option<Event> {
        let entry_date = self.entry_date?;
        let start_date = self.start_date?;
        let end_date = self.end_date?;
        Some(Event {
            id: uuid::Uuid::new_v4().to_string(),
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            categories: self.categories.clone(),
            links: self.links.clone(),
            group_link: self.group_link.clone(),
            image: self.image.clone(),
            entry_date,
            start_date,
            end_date,
            submitter_id: self.submitter_id,
            submitter_name: self.submitter_name.clone(),
            status,
            rejection_reason: None,
            updated_count: 0,
            created_at: now,
            updated_at: now,
            message_id: None,
            description_message_id: None,
            pushed_at: None,
            pushed_count: 0,
        })
    }
}

/// A named, reusable subset of event content fields owned by one submitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTemplate {
    pub id: String,
    pub name: String,
    pub owner_id: ActorId,
    pub owner_name: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub categories: Vec<Category>,
    pub links: Vec<String>,
    pub group_link: Option<String>,
    pub image: Option<ImageData>,
    pub created_at: DateTime<Utc>,
}

impl EventTemplate {
    pub fn from_draft(
        draft: &EventDraft,
        name: impl Into<String>,
        owner: &ActorInfo,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            owner_id: owner.id,
            owner_name: owner.display_name.clone(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            location: draft.location.clone(),
            categories: draft.categories.clone(),
            links: draft.links.clone(),
            group_link: draft.group_link.clone(),
            image: draft.image.clone(),
            created_at: now,
        }
    }

    /// Refresh the non-date fields with the values an actor actually submitted.
    pub fn refresh_from_draft(&mut self, draft: &EventDraft) {
        self.title = draft.title.clone();
        self.description = draft.description.clone();
        self.location = draft.location.clone();
        self.categories = draft.categories.clone();
        self.links = draft.links.clone();
        self.group_link = draft.group_link.clone();
        self.image = draft.image.clone();
    }
}

/// Blacklist entry. Presence alone blocks all interaction from the actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistedUser {
    pub user_id: ActorId,
    pub user_name: Option<String>,
    pub banned_by: Option<ActorId>,
    pub banned_by_name: Option<String>,
    pub reason: Option<String>,
    pub banned_at: DateTime<Utc>,
}

/// Write-once snapshot of an event whose end date passed the retention cutoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedEvent {
    pub event: Event,
    pub archived_at: DateTime<Utc>,
}

impl ArchivedEvent {
    pub fn from_event(event: Event, archived_at: DateTime<Utc>) -> Self {
        Self { event, archived_at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn actor() -> ActorInfo {
        ActorInfo::new(42, "tester")
    }

    #[test]
    fn build_event_requires_complete_date_triad() {
        let mut draft = EventDraft::new(&actor());
        draft.title = "Jazz Night".into();
        assert!(draft.build_event(EventStatus::Pending, Utc::now()).is_none());

        let now = Utc::now();
        draft.entry_date = Some(now + Duration::hours(1));
        draft.start_date = Some(now + Duration::hours(2));
        draft.end_date = Some(now + Duration::hours(3));
        let event = draft.build_event(EventStatus::Approved, now).unwrap();
        assert_eq!(event.status, EventStatus::Approved);
        assert_eq!(event.updated_count, 0);
        assert!(event.message_id.is_none());
    }

    #[test]
    fn template_round_trip_preserves_content_fields() {
        let now = Utc::now();
        let mut draft = EventDraft::new(&actor());
        draft.title = "Open Stage".into();
        draft.description = "Bring your instrument".into();
        draft.location = "Cafe Plaza".into();
        draft.categories = vec![Category::Music, Category::Concert];
        draft.links = vec!["https://example.org".into()];
        draft.group_link = Some("https://example.org/group".into());
        draft.image = Some(ImageData::from_bytes(b"png"));
        draft.entry_date = Some(now);
        draft.start_date = Some(now);
        draft.end_date = Some(now);

        let template = EventTemplate::from_draft(&draft, "weekly", &actor(), now);
        let restored = EventDraft::from_template(&template, &actor());

        assert_eq!(restored.title, draft.title);
        assert_eq!(restored.description, draft.description);
        assert_eq!(restored.location, draft.location);
        assert_eq!(restored.categories, draft.categories);
        assert_eq!(restored.links, draft.links);
        assert_eq!(restored.group_link, draft.group_link);
        assert_eq!(restored.image, draft.image);
        // Dates are never carried by templates.
        assert!(restored.entry_date.is_none());
        assert!(restored.start_date.is_none());
        assert!(restored.end_date.is_none());
    }

    #[test]
    fn category_labels_round_trip() {
        for cat in Category::ALL {
            assert_eq!(Category::from_label(cat.label()), Some(cat));
        }
        assert_eq!(Category::from_label("Karaoke"), None);
    }
}
