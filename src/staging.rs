//! Per-actor staging for the save-as-template offer.
//!
//! A successful submission stages its draft here; the offer's yes/no buttons
//! resolve it. A newer submission by the same actor overwrites the staged
//! draft, and resolution always clears the slot, success or not.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::models::{ActorId, EventDraft};

#[derive(Default)]
pub struct TemplateStaging {
    slots: Mutex<HashMap<ActorId, EventDraft>>,
}

impl TemplateStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a draft, replacing any earlier one from the same actor.
    pub fn stage(&self, actor: ActorId, draft: EventDraft) {
        self.slots.lock().insert(actor, draft);
    }

    /// Remove and return the staged draft.
    pub fn take(&self, actor: ActorId) -> Option<EventDraft> {
        self.slots.lock().remove(&actor)
    }

    pub fn clear(&self, actor: ActorId) {
        self.slots.lock().remove(&actor);
    }

    pub fn peek(&self, actor: ActorId) -> Option<EventDraft> {
        self.slots.lock().get(&actor).cloned()
    }
}
