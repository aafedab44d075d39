//! Shared fixtures for in-module tests.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::config::Config;
use crate::flows::{FlowCx, Input};
use crate::models::ActorInfo;
use crate::moderation::Moderation;
use crate::routing::actions::CallbackAction;
use crate::staging::TemplateStaging;
use crate::store::Stores;
use crate::transport::RecordingTransport;

pub const ADMIN_VENUE: i64 = 900;
pub const PUBLIC_VENUE: i64 = 901;
pub const ACTOR_ID: i64 = 100;

pub fn test_config() -> Config {
    Config {
        admin_venue: ADMIN_VENUE,
        public_venue: PUBLIC_VENUE,
        ..Config::default()
    }
}

/// A flow context wired to an in-memory store and a recording transport.
/// The conversation venue is the actor's direct chat.
pub async fn test_cx() -> (FlowCx, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::new());
    let config = Arc::new(test_config());
    let stores = Stores::in_memory();
    let moderation = Arc::new(Moderation::new(
        transport.clone(),
        stores.clone(),
        config.clone(),
    ));
    let actor = ActorInfo::new(ACTOR_ID, "tester");
    let cx = FlowCx {
        transport: transport.clone(),
        stores,
        config,
        staging: Arc::new(TemplateStaging::new()),
        moderation,
        actor: actor.clone(),
        venue: actor.id,
    };
    (cx, transport)
}

/// A wall-clock stamp `hours_ahead` from now, in the configured input format.
pub fn stamp(cx: &FlowCx, hours_ahead: i64) -> String {
    (Utc::now() + Duration::hours(hours_ahead))
        .with_timezone(&cx.config.timezone)
        .format(&cx.config.date_format)
        .to_string()
}

pub mod drive {
    use super::*;

    pub fn press(action: CallbackAction) -> Input {
        Input::Callback {
            id: uuid::Uuid::new_v4().to_string(),
            action,
        }
    }
}
