//! Self-service deletion of a submitter's own events.

use async_trait::async_trait;
use chrono::Utc;

use crate::render::{format_event, format_local, EventCard, RenderTarget};
use crate::routing::actions::CallbackAction;
use crate::transport::{Button, Keyboard};

use super::{Flow, FlowCx, FlowError, FlowStatus, Input};

enum Step {
    Select,
    Confirm { event_id: String },
}

pub struct DeleteFlow {
    step: Step,
}

impl DeleteFlow {
    pub fn new() -> Self {
        Self { step: Step::Select }
    }
}

impl Default for DeleteFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Flow for DeleteFlow {
    fn name(&self) -> &'static str {
        "delete"
    }

    async fn begin(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        let active = cx
            .stores
            .events
            .find_active_by_submitter(cx.actor.id, Utc::now())
            .await?;
        if active.is_empty() {
            cx.say("ℹ️ You have no published upcoming events to delete\\.").await?;
            return Ok(FlowStatus::Finished);
        }
        let mut kb = Keyboard::new();
        for event in &active {
            let label = format!(
                "{} ({})",
                event.title,
                format_local(event.start_date, &cx.config)
            );
            kb = kb.line(label, CallbackAction::DeleteEvent(event.id.clone()).encode());
        }
        kb = kb.line("❌ Cancel", CallbackAction::DeleteSelectCancel.encode());
        cx.say_kb("🗑 Which event do you want to delete?", kb).await?;
        Ok(FlowStatus::AwaitingInput)
    }

    async fn on_input(&mut self, input: Input, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        match &self.step {
            Step::Select => match input.callback_action() {
                Some(CallbackAction::DeleteEvent(id)) => {
                    let id = id.clone();
                    cx.ack(&input).await?;
                    let Some(event) = cx.stores.events.find_by_id(&id).await? else {
                        cx.say("⚠️ This event no longer exists\\.").await?;
                        return Ok(FlowStatus::Finished);
                    };
                    if event.submitter_id != cx.actor.id {
                        cx.say("⚠️ This event is not yours\\.").await?;
                        return Ok(FlowStatus::Finished);
                    }
                    let preview =
                        format_event(&EventCard::from(&event), &cx.config, &RenderTarget::Summary);
                    let kb = Keyboard::new().row(vec![
                        Button::new("🗑 Delete it", CallbackAction::DeleteConfirm.encode()),
                        Button::new("↩️ Keep it", CallbackAction::DeleteCancel.encode()),
                    ]);
                    cx.say_kb(&preview, kb).await?;
                    self.step = Step::Confirm { event_id: id };
                    Ok(FlowStatus::AwaitingInput)
                }
                Some(CallbackAction::DeleteSelectCancel | CallbackAction::CancelConversation) => {
                    cx.ack(&input).await?;
                    cx.say_cancelled().await?;
                    Ok(FlowStatus::Finished)
                }
                _ => {
                    cx.ack(&input).await?;
                    Ok(FlowStatus::AwaitingInput)
                }
            },
            Step::Confirm { event_id } => match input.callback_action() {
                Some(CallbackAction::DeleteConfirm) => {
                    let event_id = event_id.clone();
                    cx.ack(&input).await?;
                    if let Err(err) = cx
                        .moderation
                        .delete_event(&event_id, Some(cx.venue))
                        .await
                    {
                        tracing::error!(event_id = %event_id, error = %err, "deletion failed");
                        cx.say("⚠️ Deletion failed, please try again later\\.").await?;
                    }
                    Ok(FlowStatus::Finished)
                }
                Some(CallbackAction::DeleteCancel | CallbackAction::CancelConversation) => {
                    cx.ack(&input).await?;
                    cx.say_cancelled().await?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventDraft, EventStatus};
    use crate::testutil::{drive, test_cx, PUBLIC_VENUE};
    use chrono::Duration;

    #[tokio::test]
    async fn confirmed_deletion_removes_row_and_posting() {
        let (cx, transport) = test_cx().await;
        let now = Utc::now();
        let mut draft = EventDraft::new(&cx.actor);
        draft.title = "Doomed".into();
        draft.entry_date = Some(now + Duration::hours(5));
        draft.start_date = Some(now + Duration::hours(6));
        draft.end_date = Some(now + Duration::hours(7));
        let event = draft.build_event(EventStatus::Approved, now).unwrap();
        cx.stores.events.insert(event.clone()).await.unwrap();
        cx.moderation.publish(&event).await.unwrap();
        let posted = cx
            .stores
            .events
            .find_by_id(&event.id)
            .await
            .unwrap()
            .unwrap()
            .message_id
            .unwrap();

        let mut flow = DeleteFlow::new();
        flow.begin(&cx).await.unwrap();
        flow.on_input(drive::press(CallbackAction::DeleteEvent(event.id.clone())), &cx)
            .await
            .unwrap();
        let status = flow
            .on_input(drive::press(CallbackAction::DeleteConfirm), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::Finished));

        assert!(cx.stores.events.find_by_id(&event.id).await.unwrap().is_none());
        assert!(transport.deleted().contains(&(PUBLIC_VENUE, posted)));
        assert!(transport
            .last_sent_to(cx.venue)
            .unwrap()
            .text
            .contains("Deleted"));
    }

    #[tokio::test]
    async fn keep_button_aborts() {
        let (cx, _transport) = test_cx().await;
        let now = Utc::now();
        let mut draft = EventDraft::new(&cx.actor);
        draft.title = "Spared".into();
        draft.entry_date = Some(now + Duration::hours(5));
        draft.start_date = Some(now + Duration::hours(6));
        draft.end_date = Some(now + Duration::hours(7));
        let event = draft.build_event(EventStatus::Approved, now).unwrap();
        cx.stores.events.insert(event.clone()).await.unwrap();

        let mut flow = DeleteFlow::new();
        flow.begin(&cx).await.unwrap();
        flow.on_input(drive::press(CallbackAction::DeleteEvent(event.id.clone())), &cx)
            .await
            .unwrap();
        flow.on_input(drive::press(CallbackAction::DeleteCancel), &cx)
            .await
            .unwrap();
        assert!(cx.stores.events.find_by_id(&event.id).await.unwrap().is_some());
    }
}
