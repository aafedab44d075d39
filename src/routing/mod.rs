//! Update routing.
//!
//! One [`Router`] owns the session map and the gates. Every inbound update
//! passes the rate limiter and the blacklist first; if the actor has an
//! active flow the update is fed into it, otherwise commands and entry
//! callbacks may start a new one. Sessions are keyed by actor, so two
//! actors sharing a venue never consume each other's input, and one actor's
//! updates run strictly one at a time.

pub mod actions;
pub mod limiter;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::flows::{
    admin::{AdminDeleteFlow, BanFlow, RejectFlow, UnbanFlow},
    delete::DeleteFlow,
    edit::EditFlow,
    push::PushFlow,
    search::SearchFlow,
    submit::SubmitFlow,
    templates::{TemplateListFlow, TemplateSaveFlow},
    Flow, FlowCx, FlowError, FlowStatus, Input,
};
use crate::models::{ActorId, ActorInfo, VenueId};
use crate::moderation::Moderation;
use crate::render::{escape, format_local};
use crate::staging::TemplateStaging;
use crate::store::Stores;
use crate::transport::{Button, Incoming, IncomingKind, Keyboard, Transport};

use actions::CallbackAction;
use limiter::RateLimiter;

#[derive(Default)]
struct Session {
    active: Option<Box<dyn Flow>>,
}

pub struct Router {
    transport: Arc<dyn Transport>,
    stores: Stores,
    config: Arc<Config>,
    staging: Arc<TemplateStaging>,
    moderation: Arc<Moderation>,
    limiter: RateLimiter,
    sessions: Mutex<HashMap<ActorId, Arc<tokio::sync::Mutex<Session>>>>,
}

impl Router {
    pub fn new(transport: Arc<dyn Transport>, stores: Stores, config: Arc<Config>) -> Self {
        let moderation = Arc::new(Moderation::new(
            transport.clone(),
            stores.clone(),
            config.clone(),
        ));
        let limiter = RateLimiter::new(
            Duration::from_millis(config.rate_limit_window_ms),
            config.rate_limit_requests,
        );
        Self {
            transport,
            stores,
            config,
            staging: Arc::new(TemplateStaging::new()),
            moderation,
            limiter,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Top-level entry point. Never panics and never propagates: any fault
    /// is logged and turned into a generic notice so the next update starts
    /// from a clean state.
    pub async fn handle(&self, incoming: Incoming) {
        let venue = incoming.venue;
        let actor_id = incoming.actor.id;
        if let Err(err) = self.dispatch(incoming).await {
            tracing::error!(venue, actor_id, error = %err, "update dispatch failed");
            let _ = self
                .transport
                .send_text(venue, "⚠️ Something went wrong, please try again\\.", None)
                .await;
        }
    }

    async fn dispatch(&self, incoming: Incoming) -> Result<(), FlowError> {
        let Incoming { actor, venue, kind } = incoming;

        if !self.limiter.allow(actor.id) {
            tracing::debug!(actor_id = actor.id, "rate limited");
            if let IncomingKind::Callback { id, .. } = &kind {
                self.transport
                    .answer_callback(id, Some("Please slow down"))
                    .await?;
            } else {
                self.transport
                    .send_text(venue, "🐢 Please slow down a little\\.", None)
                    .await?;
            }
            return Ok(());
        }

        if self.stores.blacklist.find(actor.id).await?.is_some() {
            tracing::debug!(actor_id = actor.id, "blacklisted actor dropped");
            if let IncomingKind::Callback { id, .. } = &kind {
                self.transport.answer_callback(id, None).await?;
            }
            self.transport
                .send_text(venue, "🚫 You are banned from using this service\\.", None)
                .await?;
            return Ok(());
        }

        let entry = {
            let mut sessions = self.sessions.lock();
            sessions.entry(actor.id).or_default().clone()
        };
        let mut session = entry.lock().await;
        let cx = self.cx_for(actor.clone(), venue);
        let result = self.drive(&mut session, kind, &cx).await;
        let idle = session.active.is_none();
        drop(session);
        if idle {
            self.evict(actor.id, &entry);
        }
        result
    }

    async fn drive(
        &self,
        slot: &mut Session,
        kind: IncomingKind,
        cx: &FlowCx,
    ) -> Result<(), FlowError> {
        if let Some(mut flow) = slot.active.take() {
            let input = to_input(kind);
            tracing::debug!(flow = flow.name(), actor_id = cx.actor.id, "feeding active flow");
            match flow.on_input(input, cx).await? {
                FlowStatus::AwaitingInput => slot.active = Some(flow),
                FlowStatus::Finished => {}
                FlowStatus::Handoff(next) => self.start(slot, next, cx).await?,
            }
            return Ok(());
        }

        match kind {
            IncomingKind::Command(name) => self.on_command(&name, slot, cx).await,
            IncomingKind::Callback { id, data } => {
                let action = CallbackAction::parse(&data);
                self.on_entry_callback(id, action, slot, cx).await
            }
            // Loose text and media outside a conversation are ignored.
            IncomingKind::Text(_) | IncomingKind::Photo { .. } => Ok(()),
        }
    }

    /// Drop an idle session entry once nothing else holds it. Strong count 2
    /// means the map and our local clone are the only owners, so no waiter
    /// can be queued on the inner lock.
    fn evict(&self, actor: ActorId, entry: &Arc<tokio::sync::Mutex<Session>>) {
        let mut sessions = self.sessions.lock();
        let sole = sessions
            .get(&actor)
            .is_some_and(|held| Arc::ptr_eq(held, entry) && Arc::strong_count(held) == 2);
        if sole {
            sessions.remove(&actor);
        }
    }

    async fn on_command(
        &self,
        name: &str,
        slot: &mut Session,
        cx: &FlowCx,
    ) -> Result<(), FlowError> {
        match name {
            "start" | "help" => {
                cx.say(
                    "👋 Hi\\! You can:\n\
                     /submit — submit an event\n\
                     /edit — edit one of your events\n\
                     /delete — delete one of your events\n\
                     /push — push one of your events\n\
                     /search — find events by day\n\
                     /templates — manage your templates\n\
                     /support — contact the team\n\
                     /rules — read the rules",
                )
                .await?;
                Ok(())
            }
            "submit" => {
                let kb = Keyboard::new().row(vec![
                    Button::new("✅ Let's go", CallbackAction::StartSubmit.encode()),
                    Button::new("❌ Not now", CallbackAction::DeclineSubmit.encode()),
                ]);
                cx.say_kb("🆕 Submit a new event?", kb).await?;
                Ok(())
            }
            "edit" => {
                let kb = Keyboard::new().row(vec![
                    Button::new("✏️ Yes", CallbackAction::StartEdit.encode()),
                    Button::new("❌ Not now", CallbackAction::DeclineEdit.encode()),
                ]);
                cx.say_kb("✏️ Edit one of your events?", kb).await?;
                Ok(())
            }
            "search" => self.start(slot, Box::new(SearchFlow::new()), cx).await,
            "delete" => self.start(slot, Box::new(DeleteFlow::new()), cx).await,
            "push" => self.start(slot, Box::new(PushFlow::new()), cx).await,
            "templates" => self.start(slot, Box::new(TemplateListFlow::new()), cx).await,
            "support" => {
                let mut lines = Vec::new();
                if let Some(email) = &cx.config.support_email {
                    lines.push(format!("📧 {}", escape(email)));
                }
                if let Some(handle) = &cx.config.support_handle {
                    lines.push(format!("💬 {}", escape(handle)));
                }
                if lines.is_empty() {
                    cx.say("ℹ️ No support contact is configured\\.").await?;
                } else {
                    cx.say(&format!("🤝 You can reach us here:\n{}", lines.join("\n")))
                        .await?;
                }
                Ok(())
            }
            "rules" => {
                match &cx.config.rules_text {
                    Some(rules) => cx.say(&escape(rules)).await?,
                    None => cx.say("ℹ️ No rules are configured\\.").await?,
                };
                Ok(())
            }
            // Admin commands: anywhere else they are silently dropped.
            "ban" if self.is_admin_venue(cx) => {
                self.start(slot, Box::new(BanFlow::new()), cx).await
            }
            "unban" if self.is_admin_venue(cx) => {
                self.start(slot, Box::new(UnbanFlow::new()), cx).await
            }
            "banlist" if self.is_admin_venue(cx) => self.send_banlist(cx).await,
            "userlist" if self.is_admin_venue(cx) => self.send_userlist(cx).await,
            other => {
                tracing::debug!(command = other, "unhandled command");
                Ok(())
            }
        }
    }

    async fn on_entry_callback(
        &self,
        callback_id: String,
        action: CallbackAction,
        slot: &mut Session,
        cx: &FlowCx,
    ) -> Result<(), FlowError> {
        let ack = |notice: Option<&'static str>| {
            let transport = self.transport.clone();
            let id = callback_id.clone();
            async move { transport.answer_callback(&id, notice).await }
        };

        match action {
            CallbackAction::StartSubmit => {
                ack(None).await?;
                self.start(slot, Box::new(SubmitFlow::new()), cx).await
            }
            CallbackAction::StartEdit => {
                ack(None).await?;
                self.start(slot, Box::new(EditFlow::new()), cx).await
            }
            CallbackAction::StartSearch => {
                ack(None).await?;
                self.start(slot, Box::new(SearchFlow::new()), cx).await
            }
            CallbackAction::DeclineSubmit | CallbackAction::DeclineEdit => {
                ack(None).await?;
                cx.say("👍 Maybe later\\.").await?;
                Ok(())
            }
            CallbackAction::TemplateSaveYes => {
                ack(None).await?;
                self.start(slot, Box::new(TemplateSaveFlow::new()), cx).await
            }
            CallbackAction::TemplateSaveNo => {
                ack(None).await?;
                cx.staging.clear(cx.actor.id);
                cx.say("👍 Not saved\\.").await?;
                Ok(())
            }
            CallbackAction::Approve(event_id) => {
                if !self.is_admin_venue(cx) {
                    return ack(None).await.map_err(Into::into);
                }
                self.moderation
                    .approve(&event_id, &callback_id)
                    .await
                    .map_err(|err| {
                        tracing::error!(event_id = %event_id, error = %err, "approval failed");
                        err
                    })
                    .ok();
                Ok(())
            }
            CallbackAction::Reject(event_id) => {
                if !self.is_admin_venue(cx) {
                    return ack(None).await.map_err(Into::into);
                }
                ack(None).await?;
                self.start(slot, Box::new(RejectFlow::new(event_id)), cx).await
            }
            CallbackAction::AdminDelete(event_id) => {
                if !self.is_admin_venue(cx) {
                    return ack(None).await.map_err(Into::into);
                }
                ack(None).await?;
                self.start(slot, Box::new(AdminDeleteFlow::new(event_id)), cx)
                    .await
            }
            CallbackAction::AdminBanDelete(event_id) => {
                if !self.is_admin_venue(cx) {
                    return ack(None).await.map_err(Into::into);
                }
                ack(None).await?;
                if let Err(err) = self
                    .moderation
                    .ban_and_delete(&event_id, &cx.actor, cx.venue)
                    .await
                {
                    tracing::error!(event_id = %event_id, error = %err, "ban-and-delete failed");
                }
                Ok(())
            }
            CallbackAction::CancelConversation => {
                ack(None).await?;
                cx.say_cancelled().await?;
                Ok(())
            }
            // A button from a conversation that is no longer running.
            other => {
                tracing::debug!(action = ?other, "stray callback dropped");
                ack(None).await?;
                Ok(())
            }
        }
    }

    async fn send_banlist(&self, cx: &FlowCx) -> Result<(), FlowError> {
        let entries = self.stores.blacklist.all().await?;
        if entries.is_empty() {
            cx.say("ℹ️ The blacklist is empty\\.").await?;
            return Ok(());
        }
        let mut lines = vec![format!("🚫 Blacklist \\({}\\):", entries.len())];
        for entry in entries {
            let name = entry.user_name.as_deref().unwrap_or("unknown");
            let by = entry.banned_by_name.as_deref().unwrap_or("unknown");
            let reason = entry.reason.as_deref().unwrap_or("—");
            lines.push(format!(
                "• {} \\({}\\) — by {} on {} — {}",
                entry.user_id,
                escape(name),
                escape(by),
                escape(&format_local(entry.banned_at, &cx.config)),
                escape(reason)
            ));
        }
        cx.say(&lines.join("\n")).await?;
        Ok(())
    }

    async fn send_userlist(&self, cx: &FlowCx) -> Result<(), FlowError> {
        let submitters = self.stores.events.distinct_submitters().await?;
        if submitters.is_empty() {
            cx.say("ℹ️ No submitters yet\\.").await?;
            return Ok(());
        }
        let mut lines = vec![format!("👥 Submitters \\({}\\):", submitters.len())];
        for (id, name) in submitters {
            lines.push(format!("• {} \\({}\\)", id, escape(&name)));
        }
        cx.say(&lines.join("\n")).await?;
        Ok(())
    }

    async fn start(
        &self,
        slot: &mut Session,
        mut flow: Box<dyn Flow>,
        cx: &FlowCx,
    ) -> Result<(), FlowError> {
        loop {
            tracing::debug!(flow = flow.name(), actor_id = cx.actor.id, "starting flow");
            match flow.begin(cx).await? {
                FlowStatus::AwaitingInput => {
                    slot.active = Some(flow);
                    return Ok(());
                }
                FlowStatus::Finished => {
                    slot.active = None;
                    return Ok(());
                }
                FlowStatus::Handoff(next) => flow = next,
            }
        }
    }

    fn is_admin_venue(&self, cx: &FlowCx) -> bool {
        cx.venue == self.config.admin_venue
    }

    fn cx_for(&self, actor: ActorInfo, venue: VenueId) -> FlowCx {
        FlowCx {
            transport: self.transport.clone(),
            stores: self.stores.clone(),
            config: self.config.clone(),
            staging: self.staging.clone(),
            moderation: self.moderation.clone(),
            actor,
            venue,
        }
    }
}

fn to_input(kind: IncomingKind) -> Input {
    match kind {
        // A command sent mid-conversation is handed to the flow as text;
        // collectors treat it like any other unexpected input.
        IncomingKind::Command(name) => Input::Text(format!("/{name}")),
        IncomingKind::Text(text) => Input::Text(text),
        IncomingKind::Photo { file_ref } => Input::Photo { file_ref },
        IncomingKind::Callback { id, data } => Input::Callback {
            id,
            action: CallbackAction::parse(&data),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_config;
    use crate::transport::RecordingTransport;

    fn router() -> Arc<Router> {
        let transport = Arc::new(RecordingTransport::new());
        Arc::new(Router::new(
            transport,
            Stores::in_memory(),
            Arc::new(test_config()),
        ))
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let router = router();
        let actor = ActorInfo::new(1, "one");

        // A plain command leaves no conversation behind.
        router
            .handle(Incoming::command(actor.clone(), actor.id, "/help"))
            .await;
        assert!(router.sessions.lock().is_empty());

        // An open conversation keeps its session.
        router
            .handle(Incoming::callback(
                actor.clone(),
                actor.id,
                CallbackAction::StartSubmit.encode(),
            ))
            .await;
        assert_eq!(router.sessions.lock().len(), 1);

        // Cancelling the conversation releases it again.
        router
            .handle(Incoming::callback(
                actor.clone(),
                actor.id,
                CallbackAction::CancelConversation.encode(),
            ))
            .await;
        assert!(router.sessions.lock().is_empty());
    }
}
