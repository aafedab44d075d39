//! Runtime configuration.
//!
//! Everything is sourced from `EVENTDESK_*` environment variables with
//! sensible defaults, so the binary runs without a config file. Values that
//! fail to parse fall back to the default rather than aborting startup.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Timezone all wall-clock input is interpreted in.
    pub timezone: Tz,
    /// strftime pattern for date-time prompts and rendering.
    pub date_format: String,
    /// strftime pattern for date-only input (search).
    pub date_only_format: String,
    /// Upper bound on categories per event.
    pub max_categories: usize,
    /// Edits allowed per event; 0 means unlimited.
    pub max_event_edits: u32,
    /// Whether submissions go through admin approval before publication.
    pub require_approval: bool,
    /// Minimum age in days before an event becomes pushable.
    pub push_min_age_days: i64,
    /// Sliding-window length for per-actor rate limiting, in milliseconds.
    pub rate_limit_window_ms: u64,
    /// Updates allowed per actor per window.
    pub rate_limit_requests: usize,
    /// Venue where moderation happens.
    pub admin_venue: i64,
    /// Venue where approved events are published.
    pub public_venue: i64,
    /// Hours past an event's end before the archival sweep moves it.
    pub archive_retention_hours: i64,
    /// Seconds between archival sweeps.
    pub archive_interval_secs: u64,
    /// Templates each owner may keep.
    pub max_templates_per_owner: usize,
    pub support_email: Option<String>,
    pub support_handle: Option<String>,
    pub rules_text: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Berlin,
            date_format: "%d.%m.%Y %H:%M".to_string(),
            date_only_format: "%d.%m.%Y".to_string(),
            max_categories: 3,
            max_event_edits: 0,
            require_approval: true,
            push_min_age_days: 7,
            rate_limit_window_ms: 5_000,
            rate_limit_requests: 5,
            admin_venue: 0,
            public_venue: 0,
            archive_retention_hours: 2,
            archive_interval_secs: 3_600,
            max_templates_per_owner: 10,
            support_email: None,
            support_handle: None,
            rules_text: None,
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env_var(key).map(|v| v.parse::<T>()) {
        Some(Ok(v)) => v,
        Some(Err(_)) => {
            tracing::warn!(key, "unparsable value, using default");
            default
        }
        None => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            timezone: env_parse("EVENTDESK_TIMEZONE", defaults.timezone),
            date_format: env_var("EVENTDESK_DATE_FORMAT").unwrap_or(defaults.date_format),
            date_only_format: env_var("EVENTDESK_DATE_ONLY_FORMAT")
                .unwrap_or(defaults.date_only_format),
            max_categories: env_parse("EVENTDESK_MAX_CATEGORIES", defaults.max_categories),
            max_event_edits: env_parse("EVENTDESK_MAX_EVENT_EDITS", defaults.max_event_edits),
            require_approval: env_parse("EVENTDESK_REQUIRE_APPROVAL", defaults.require_approval),
            push_min_age_days: env_parse("EVENTDESK_PUSH_MIN_AGE_DAYS", defaults.push_min_age_days),
            rate_limit_window_ms: env_parse(
                "EVENTDESK_RATE_LIMIT_WINDOW_MS",
                defaults.rate_limit_window_ms,
            ),
            rate_limit_requests: env_parse(
                "EVENTDESK_RATE_LIMIT_REQUESTS",
                defaults.rate_limit_requests,
            ),
            admin_venue: env_parse("EVENTDESK_ADMIN_VENUE", defaults.admin_venue),
            public_venue: env_parse("EVENTDESK_PUBLIC_VENUE", defaults.public_venue),
            archive_retention_hours: env_parse(
                "EVENTDESK_ARCHIVE_RETENTION_HOURS",
                defaults.archive_retention_hours,
            ),
            archive_interval_secs: env_parse(
                "EVENTDESK_ARCHIVE_INTERVAL_SECS",
                defaults.archive_interval_secs,
            ),
            max_templates_per_owner: env_parse(
                "EVENTDESK_MAX_TEMPLATES_PER_OWNER",
                defaults.max_templates_per_owner,
            ),
            support_email: env_var("EVENTDESK_SUPPORT_EMAIL"),
            support_handle: env_var("EVENTDESK_SUPPORT_HANDLE"),
            rules_text: env_var("EVENTDESK_RULES"),
        }
    }

    /// Remaining-edits display for an event, honoring the unlimited sentinel.
    pub fn remaining_edits_label(&self, updated_count: u32) -> String {
        if self.max_event_edits == 0 {
            "∞".to_string()
        } else {
            self.max_event_edits.saturating_sub(updated_count).to_string()
        }
    }

    /// Whether an event with this edit count may still be edited.
    pub fn edit_allowed(&self, updated_count: u32) -> bool {
        self.max_event_edits == 0 || updated_count < self.max_event_edits
    }
}
