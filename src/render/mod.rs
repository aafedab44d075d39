//! Venue-facing text rendering.
//!
//! Everything user-controlled that lands in outgoing markup passes through
//! [`escape`]. Formatting happens in the configured timezone; stored instants
//! stay UTC.

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::models::{Category, Event, EventDraft, EventTemplate, ImageData};

/// Platform ceiling for a photo caption. Longer renderings are split into a
/// photo with a short caption plus a follow-up text message.
pub const CAPTION_LIMIT: usize = 1024;

/// Escape MarkdownV2 control characters.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
            | '{' | '}' | '.' | '!' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Render an instant in the configured timezone and date-time format.
pub fn format_local(dt: DateTime<Utc>, config: &Config) -> String {
    dt.with_timezone(&config.timezone)
        .format(&config.date_format)
        .to_string()
}

/// Render an instant as a date only.
pub fn format_local_date(dt: DateTime<Utc>, config: &Config) -> String {
    dt.with_timezone(&config.timezone)
        .format(&config.date_only_format)
        .to_string()
}

/// Where a rendering is headed; controls header and footer lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderTarget {
    /// Public channel post.
    Channel,
    /// Admin review notice.
    Admin { is_edit: bool, is_push: bool },
    /// Summary shown to the submitting actor inside a conversation.
    Summary,
    /// One entry of a search result listing.
    Listing { index: usize, total: usize },
}

/// Borrowed view over the fields both [`Event`] and [`EventDraft`] can render.
#[derive(Clone, Copy)]
pub struct EventCard<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub location: &'a str,
    pub categories: &'a [Category],
    pub links: &'a [String],
    pub group_link: Option<&'a str>,
    pub image: Option<&'a ImageData>,
    pub entry_date: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub submitter_name: &'a str,
    pub submitter_id: i64,
}

impl<'a> From<&'a Event> for EventCard<'a> {
    fn from(event: &'a Event) -> Self {
        Self {
            title: &event.title,
            description: &event.description,
            location: &event.location,
            categories: &event.categories,
            links: &event.links,
            group_link: event.group_link.as_deref(),
            image: event.image.as_ref(),
            entry_date: Some(event.entry_date),
            start_date: Some(event.start_date),
            end_date: Some(event.end_date),
            submitter_name: &event.submitter_name,
            submitter_id: event.submitter_id,
        }
    }
}

impl<'a> From<&'a EventDraft> for EventCard<'a> {
    fn from(draft: &'a EventDraft) -> Self {
        Self {
            title: &draft.title,
            description: &draft.description,
            location: &draft.location,
            categories: &draft.categories,
            links: &draft.links,
            group_link: draft.group_link.as_deref(),
            image: draft.image.as_ref(),
            entry_date: draft.entry_date,
            start_date: draft.start_date,
            end_date: draft.end_date,
            submitter_name: &draft.submitter_name,
            submitter_id: draft.submitter_id,
        }
    }
}

fn date_line(label: &str, dt: Option<DateTime<Utc>>, config: &Config) -> String {
    match dt {
        Some(dt) => format!("{label} {}\n", escape(&format_local(dt, config))),
        None => format!("{label} —\n"),
    }
}

/// Full event rendering for a target venue.
pub fn format_event(card: &EventCard<'_>, config: &Config, target: &RenderTarget) -> String {
    let mut out = String::new();
    match target {
        RenderTarget::Admin { is_edit, is_push } => {
            let header = if *is_push {
                "📣 Push request"
            } else if *is_edit {
                "✏️ Edited event for review"
            } else {
                "🆕 New event for review"
            };
            out.push_str(&format!(
                "{header} from {} \\({}\\)\n\n",
                escape(card.submitter_name),
                card.submitter_id
            ));
        }
        RenderTarget::Summary => {
            out.push_str("📋 Your event so far:\n\n");
        }
        RenderTarget::Listing { index, total } => {
            out.push_str(&format!("📅 Event {index}/{total}\n\n", index = index, total = total));
        }
        RenderTarget::Channel => {}
    }

    out.push_str(&format!("*{}*\n\n", escape(card.title)));
    if !card.description.is_empty() {
        out.push_str(&format!("{}\n\n", escape(card.description)));
    }
    out.push_str(&format!("📍 {}\n", escape(card.location)));
    out.push_str(&date_line("🚪 Doors:", card.entry_date, config));
    out.push_str(&date_line("▶️ Start:", card.start_date, config));
    out.push_str(&date_line("⏹ End:", card.end_date, config));

    if !card.categories.is_empty() {
        let tags: Vec<String> = card
            .categories
            .iter()
            .map(|c| format!("\\#{}", escape(&c.label().replace([' ', '&'], ""))))
            .collect();
        out.push_str(&format!("\n🏷 {}\n", tags.join(" ")));
    }
    if !card.links.is_empty() {
        let links: Vec<String> = card.links.iter().map(|l| escape(l)).collect();
        out.push_str(&format!("🔗 {}\n", links.join(" ")));
    }
    if let Some(group) = card.group_link {
        out.push_str(&format!("👥 {}\n", escape(group)));
    }
    out
}

/// Short rendering used as a photo caption when the full text exceeds
/// [`CAPTION_LIMIT`]; the description and links follow in a separate message.
pub fn format_caption(card: &EventCard<'_>, config: &Config, target: &RenderTarget) -> String {
    let trimmed = EventCard {
        description: "",
        links: &[],
        ..*card
    };
    format_event(&trimmed, config, target)
}

/// The overflow body accompanying a split caption.
pub fn format_overflow(card: &EventCard<'_>) -> String {
    let mut out = String::new();
    if !card.description.is_empty() {
        out.push_str(&format!("{}\n", escape(card.description)));
    }
    if !card.links.is_empty() {
        let links: Vec<String> = card.links.iter().map(|l| escape(l)).collect();
        out.push_str(&format!("\n🔗 {}\n", links.join(" ")));
    }
    out
}

/// Detail card shown when an actor opens a template from the list.
pub fn format_template_details(template: &EventTemplate, config: &Config) -> String {
    let mut description = template.description.clone();
    if description.chars().count() > 120 {
        description = description.chars().take(120).collect::<String>() + "…";
    }
    let categories = if template.categories.is_empty() {
        "—".to_string()
    } else {
        template
            .categories
            .iter()
            .map(|c| c.label())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "📄 *{name}*\n\n\
         Title: {title}\n\
         Description: {description}\n\
         Location: {location}\n\
         Categories: {categories}\n\
         Links: {links}\n\
         Image: {image}\n\
         Created: {created}",
        name = escape(&template.name),
        title = escape(&template.title),
        description = escape(&description),
        location = escape(&template.location),
        categories = escape(&categories),
        links = template.links.len(),
        image = if template.image.is_some() { "yes" } else { "no" },
        created = escape(&format_local(template.created_at, config)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActorInfo, EventStatus};
    use chrono::Duration;

    fn sample_event() -> Event {
        let now = Utc::now();
        let mut draft = EventDraft::new(&ActorInfo::new(9, "alice_b"));
        draft.title = "Night.Market (2026)".into();
        draft.description = "Food & crafts!".into();
        draft.location = "Old-Town Hall".into();
        draft.categories = vec![Category::Market, Category::EatDrink];
        draft.links = vec!["https://example.org/a".into()];
        draft.entry_date = Some(now + Duration::hours(1));
        draft.start_date = Some(now + Duration::hours(2));
        draft.end_date = Some(now + Duration::hours(5));
        draft.build_event(EventStatus::Approved, now).unwrap()
    }

    #[test]
    fn escape_covers_all_control_characters() {
        let escaped = escape("a_b*c[d]e(f)g~h`i>j#k+l-m=n|o{p}q.r!s\\t");
        assert!(!escaped.contains("a_b"));
        for fragment in [
            "\\_", "\\*", "\\[", "\\]", "\\(", "\\)", "\\~", "\\`", "\\>", "\\#", "\\+", "\\-",
            "\\=", "\\|", "\\{", "\\}", "\\.", "\\!", "\\\\",
        ] {
            assert!(escaped.contains(fragment), "missing {fragment}");
        }
    }

    #[test]
    fn channel_rendering_escapes_interpolated_values() {
        let event = sample_event();
        let text = format_event(&(&event).into(), &Config::default(), &RenderTarget::Channel);
        assert!(text.contains("Night\\.Market \\(2026\\)"));
        assert!(text.contains("Old\\-Town Hall"));
        assert!(!text.contains("Night.Market"));
    }

    #[test]
    fn caption_omits_description_and_links() {
        let event = sample_event();
        let caption = format_caption(&(&event).into(), &Config::default(), &RenderTarget::Channel);
        assert!(!caption.contains("Food"));
        assert!(!caption.contains("example\\.org"));
        let overflow = format_overflow(&(&event).into());
        assert!(overflow.contains("Food"));
        assert!(overflow.contains("example\\.org"));
    }

    #[test]
    fn admin_header_distinguishes_new_edit_and_push() {
        let event = sample_event();
        let cfg = Config::default();
        let fresh = format_event(
            &(&event).into(),
            &cfg,
            &RenderTarget::Admin {
                is_edit: false,
                is_push: false,
            },
        );
        let edited = format_event(
            &(&event).into(),
            &cfg,
            &RenderTarget::Admin {
                is_edit: true,
                is_push: false,
            },
        );
        let pushed = format_event(
            &(&event).into(),
            &cfg,
            &RenderTarget::Admin {
                is_edit: false,
                is_push: true,
            },
        );
        assert!(fresh.contains("New event"));
        assert!(edited.contains("Edited event"));
        assert!(pushed.contains("Push request"));
    }
}
