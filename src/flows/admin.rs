//! Admin-side conversations: rejection with reason, deletion with optional
//! reason, and blacklist management. All of these run in the admin venue;
//! the router never starts them anywhere else.

use async_trait::async_trait;

use crate::models::Event;
use crate::moderation::{BanOutcome, RejectOutcome, UnbanOutcome};
use crate::render::escape;
use crate::routing::actions::CallbackAction;
use crate::transport::{Button, Keyboard};

use super::{cancel_keyboard, Flow, FlowCx, FlowError, FlowStatus, Input};

/// Collects a rejection reason, then persists the rejection.
pub struct RejectFlow {
    event_id: String,
}

impl RejectFlow {
    pub fn new(event_id: String) -> Self {
        Self { event_id }
    }
}

#[async_trait]
impl Flow for RejectFlow {
    fn name(&self) -> &'static str {
        "reject"
    }

    async fn begin(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        let Some(event) = cx.stores.events.find_by_id(&self.event_id).await? else {
            cx.say("⚠️ This event no longer exists\\.").await?;
            return Ok(FlowStatus::Finished);
        };
        cx.say_kb(
            &format!(
                "❌ Why is *{}* rejected? Send a reason\\.",
                escape(&event.title)
            ),
            cancel_keyboard(),
        )
        .await?;
        Ok(FlowStatus::AwaitingInput)
    }

    async fn on_input(&mut self, input: Input, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        if input.is_cancel() {
            cx.ack(&input).await?;
            cx.say_cancelled().await?;
            return Ok(FlowStatus::Finished);
        }
        let Input::Text(text) = &input else {
            cx.ack(&input).await?;
            return Ok(FlowStatus::AwaitingInput);
        };
        let reason = text.trim();
        if reason.is_empty() {
            cx.say("⚠️ The reason cannot be empty\\.").await?;
            return Ok(FlowStatus::AwaitingInput);
        }
        match cx.moderation.reject(&self.event_id, reason).await {
            Ok(RejectOutcome::Rejected) => {
                cx.say("❌ Rejected and the submitter was notified\\.").await?;
            }
            Ok(RejectOutcome::NotFound) => {
                cx.say("⚠️ This event no longer exists\\.").await?;
            }
            Ok(RejectOutcome::AlreadyPublished) => {
                cx.say("⚠️ This event is already published\\. Use the delete button to take it down\\.")
                    .await?;
            }
            Err(err) => {
                tracing::error!(event_id = %self.event_id, error = %err, "rejection failed");
                cx.say("⚠️ Rejection failed, please try again\\.").await?;
            }
        }
        Ok(FlowStatus::Finished)
    }
}

/// Deletes an event from the management message, with an optional reason
/// that is passed on to the submitter.
pub struct AdminDeleteFlow {
    event_id: String,
    event: Option<Event>,
}

impl AdminDeleteFlow {
    pub fn new(event_id: String) -> Self {
        Self {
            event_id,
            event: None,
        }
    }
}

impl AdminDeleteFlow {
    async fn delete(
        &self,
        event: &Event,
        reason: Option<&str>,
        cx: &FlowCx,
    ) -> Result<(), FlowError> {
        match cx.moderation.delete_event(&event.id, Some(cx.venue)).await {
            Ok(true) => {
                if let Some(reason) = reason {
                    // Best-effort: the submitter may be unreachable.
                    if let Err(err) = cx
                        .transport
                        .send_text(
                            event.submitter_id,
                            &format!(
                                "ℹ️ Your event *{}* was removed\\.\nReason: {}",
                                escape(&event.title),
                                escape(reason)
                            ),
                            None,
                        )
                        .await
                    {
                        tracing::warn!(event_id = %event.id, error = %err, "submitter notice failed");
                    }
                }
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(event_id = %event.id, error = %err, "admin deletion failed");
                cx.say("⚠️ Deletion failed, please try again\\.").await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Flow for AdminDeleteFlow {
    fn name(&self) -> &'static str {
        "admin-delete"
    }

    async fn begin(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        let Some(event) = cx.stores.events.find_by_id(&self.event_id).await? else {
            cx.say("⚠️ This event no longer exists\\.").await?;
            return Ok(FlowStatus::Finished);
        };
        let kb = Keyboard::new().row(vec![
            Button::new("🗑 Delete without reason", CallbackAction::AdminDeleteDirect.encode()),
            Button::new("↩️ Cancel", CallbackAction::AdminDeleteCancel.encode()),
        ]);
        cx.say_kb(
            &format!(
                "🗑 Deleting *{}*\\. Send a reason for the submitter, or delete right away\\.",
                escape(&event.title)
            ),
            kb,
        )
        .await?;
        self.event = Some(event);
        Ok(FlowStatus::AwaitingInput)
    }

    async fn on_input(&mut self, input: Input, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        let Some(event) = self.event.clone() else {
            return Ok(FlowStatus::Finished);
        };
        match &input {
            Input::Text(text) if !text.trim().is_empty() => {
                self.delete(&event, Some(text.trim()), cx).await?;
                Ok(FlowStatus::Finished)
            }
            _ => match input.callback_action() {
                Some(CallbackAction::AdminDeleteDirect) => {
                    cx.ack(&input).await?;
                    self.delete(&event, None, cx).await?;
                    Ok(FlowStatus::Finished)
                }
                Some(
                    CallbackAction::AdminDeleteCancel | CallbackAction::CancelConversation,
                ) => {
                    cx.ack(&input).await?;
                    cx.say("↩️ Kept the event\\.").await?;
                    Ok(FlowStatus::Finished)
                }
                _ => {
                    cx.ack(&input).await?;
                    Ok(FlowStatus::AwaitingInput)
                }
            },
        }
    }
}

/// Collects a numeric actor id plus an optional reason, then bans.
pub struct BanFlow {
    target: Option<i64>,
}

impl BanFlow {
    pub fn new() -> Self {
        Self { target: None }
    }
}

impl Default for BanFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Flow for BanFlow {
    fn name(&self) -> &'static str {
        "ban"
    }

    async fn begin(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        cx.say_kb("🚫 Send the numeric id of the user to ban\\.", cancel_keyboard())
            .await?;
        Ok(FlowStatus::AwaitingInput)
    }

    async fn on_input(&mut self, input: Input, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        if input.is_cancel() {
            cx.ack(&input).await?;
            cx.say_cancelled().await?;
            return Ok(FlowStatus::Finished);
        }
        let Input::Text(text) = &input else {
            cx.ack(&input).await?;
            return Ok(FlowStatus::AwaitingInput);
        };
        let text = text.trim();

        match self.target {
            None => match text.parse::<i64>() {
                Ok(id) => {
                    self.target = Some(id);
                    cx.say_kb("📝 Send a reason, or /skip\\.", cancel_keyboard()).await?;
                    Ok(FlowStatus::AwaitingInput)
                }
                Err(_) => {
                    cx.say("⚠️ That is not a numeric id\\. Try again\\.").await?;
                    Ok(FlowStatus::AwaitingInput)
                }
            },
            Some(target) => {
                let reason = if text.eq_ignore_ascii_case("/skip") {
                    None
                } else {
                    Some(text.to_string())
                };
                match cx.moderation.ban_user(target, None, reason, &cx.actor).await {
                    Ok(BanOutcome::Banned) => {
                        cx.say(&format!("🚫 Banned {target}\\.")).await?;
                    }
                    Ok(BanOutcome::AlreadyBanned) => {
                        cx.say("⚠️ That user is already on the blacklist\\.").await?;
                    }
                    Err(err) => {
                        tracing::error!(target, error = %err, "ban failed");
                        cx.say("⚠️ The ban failed, please try again\\.").await?;
                    }
                }
                Ok(FlowStatus::Finished)
            }
        }
    }
}

/// Collects a numeric actor id and removes it from the blacklist.
pub struct UnbanFlow;

impl UnbanFlow {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UnbanFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Flow for UnbanFlow {
    fn name(&self) -> &'static str {
        "unban"
    }

    async fn begin(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        cx.say_kb(
            "✅ Send the numeric id of the user to unban\\.",
            cancel_keyboard(),
        )
        .await?;
        Ok(FlowStatus::AwaitingInput)
    }

    async fn on_input(&mut self, input: Input, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        if input.is_cancel() {
            cx.ack(&input).await?;
            cx.say_cancelled().await?;
            return Ok(FlowStatus::Finished);
        }
        let Input::Text(text) = &input else {
            cx.ack(&input).await?;
            return Ok(FlowStatus::AwaitingInput);
        };
        match text.trim().parse::<i64>() {
            Ok(id) => {
                match cx.moderation.unban_user(id).await {
                    Ok(UnbanOutcome::Removed) => {
                        cx.say(&format!("✅ Unbanned {id}\\.")).await?;
                    }
                    Ok(UnbanOutcome::NotListed) => {
                        cx.say("ℹ️ That user is not on the blacklist\\.").await?;
                    }
                    Err(err) => {
                        tracing::error!(target = id, error = %err, "unban failed");
                        cx.say("⚠️ The unban failed, please try again\\.").await?;
                    }
                }
                Ok(FlowStatus::Finished)
            }
            Err(_) => {
                cx.say("⚠️ That is not a numeric id\\. Try again\\.").await?;
                Ok(FlowStatus::AwaitingInput)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventDraft, EventStatus};
    use crate::testutil::{drive, test_cx};
    use chrono::{Duration, Utc};

    async fn seeded(cx: &crate::flows::FlowCx) -> Event {
        let now = Utc::now();
        let mut draft = EventDraft::new(&cx.actor);
        draft.title = "Under Review".into();
        draft.entry_date = Some(now + Duration::hours(5));
        draft.start_date = Some(now + Duration::hours(6));
        draft.end_date = Some(now + Duration::hours(7));
        let event = draft.build_event(EventStatus::Pending, now).unwrap();
        cx.stores.events.insert(event.clone()).await.unwrap();
        event
    }

    #[tokio::test]
    async fn rejection_persists_reason_and_notifies_submitter() {
        let (cx, transport) = test_cx().await;
        let event = seeded(&cx).await;

        let mut flow = RejectFlow::new(event.id.clone());
        flow.begin(&cx).await.unwrap();
        let status = flow
            .on_input(Input::Text("duplicate listing".into()), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::Finished));

        let stored = cx.stores.events.find_by_id(&event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Rejected);
        assert_eq!(stored.rejection_reason.as_deref(), Some("duplicate listing"));
        assert!(transport
            .sent_to(event.submitter_id)
            .iter()
            .any(|m| m.text.contains("duplicate listing")));
    }

    #[tokio::test]
    async fn rejecting_a_published_event_bounces() {
        let (cx, transport) = test_cx().await;
        let event = seeded(&cx).await;
        cx.moderation.approve(&event.id, "cb").await.unwrap();

        let mut flow = RejectFlow::new(event.id.clone());
        flow.begin(&cx).await.unwrap();
        let status = flow
            .on_input(Input::Text("changed my mind".into()), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::Finished));

        let stored = cx.stores.events.find_by_id(&event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Approved);
        assert!(stored.message_id.is_some());
        assert!(transport
            .last_sent_to(cx.venue)
            .unwrap()
            .text
            .contains("already published"));
    }

    #[tokio::test]
    async fn ban_rejects_non_numeric_id_and_reprompts() {
        let (cx, transport) = test_cx().await;
        let mut flow = BanFlow::new();
        flow.begin(&cx).await.unwrap();

        let status = flow.on_input(Input::Text("alice".into()), &cx).await.unwrap();
        assert!(matches!(status, FlowStatus::AwaitingInput));
        assert!(transport
            .last_sent_to(cx.venue)
            .unwrap()
            .text
            .contains("not a numeric id"));

        flow.on_input(Input::Text("4242".into()), &cx).await.unwrap();
        let status = flow.on_input(Input::Text("/skip".into()), &cx).await.unwrap();
        assert!(matches!(status, FlowStatus::Finished));
        assert!(cx.stores.blacklist.find(4242).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn admin_delete_with_reason_messages_submitter() {
        let (cx, transport) = test_cx().await;
        let event = seeded(&cx).await;

        let mut flow = AdminDeleteFlow::new(event.id.clone());
        flow.begin(&cx).await.unwrap();
        let status = flow
            .on_input(Input::Text("violates the rules".into()), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::Finished));
        assert!(cx.stores.events.find_by_id(&event.id).await.unwrap().is_none());
        assert!(transport
            .last_sent_to(event.submitter_id)
            .unwrap()
            .text
            .contains("violates the rules"));
    }

    #[tokio::test]
    async fn admin_delete_direct_skips_the_reason() {
        let (cx, _transport) = test_cx().await;
        let event = seeded(&cx).await;

        let mut flow = AdminDeleteFlow::new(event.id.clone());
        flow.begin(&cx).await.unwrap();
        let status = flow
            .on_input(drive::press(CallbackAction::AdminDeleteDirect), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::Finished));
        assert!(cx.stores.events.find_by_id(&event.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unban_distinguishes_unlisted() {
        let (cx, transport) = test_cx().await;
        let mut flow = UnbanFlow::new();
        flow.begin(&cx).await.unwrap();
        flow.on_input(Input::Text("777".into()), &cx).await.unwrap();
        assert!(transport
            .last_sent_to(cx.venue)
            .unwrap()
            .text
            .contains("not on the blacklist"));
    }
}
