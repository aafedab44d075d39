//! Edit conversation for a submitter's own published events.
//!
//! Selection is limited to events that have not ended and still have edit
//! quota. A confirmed edit re-enters review as EDITED_PENDING (or goes live
//! immediately when approval is off).

use async_trait::async_trait;
use chrono::Utc;

use crate::models::{Event, EventStatus};
use crate::render::{escape, format_local};
use crate::routing::actions::CallbackAction;
use crate::transport::Keyboard;

use super::collectors::DESCRIPTION_MAX;
use super::summary::{SummaryLoop, SummaryOutcome};
use super::{cancel_button, Flow, FlowCx, FlowError, FlowStatus, Input};

enum Step {
    Select,
    Summary(SummaryLoop),
}

pub struct EditFlow {
    step: Step,
    draft: crate::models::EventDraft,
    original: Option<Event>,
}

impl EditFlow {
    pub fn new() -> Self {
        Self {
            step: Step::Select,
            draft: Default::default(),
            original: None,
        }
    }

    async fn finalize(&mut self, cx: &FlowCx) -> Result<(), FlowError> {
        let Some(original) = self.original.as_ref() else {
            return Ok(());
        };
        let Some(mut event) = cx.stores.events.find_by_id(&original.id).await? else {
            cx.say("⚠️ This event no longer exists\\.").await?;
            return Ok(());
        };
        event.apply_draft(&self.draft);
        event.status = if cx.config.require_approval {
            EventStatus::EditedPending
        } else {
            EventStatus::EditedApproved
        };
        event.updated_count += 1;
        event.updated_at = Utc::now();
        cx.stores.events.update(&event).await?;
        tracing::info!(event_id = %event.id, actor_id = cx.actor.id, "event edited");

        if event.status == EventStatus::EditedPending {
            cx.say("📝 Your changes are waiting for review\\.").await?;
            if let Err(err) = cx.moderation.notify_admins(&event, true).await {
                tracing::warn!(event_id = %event.id, error = %err, "admin notice failed");
            }
        } else {
            cx.say("📝 Your changes are live\\.").await?;
            if let Err(err) = cx.moderation.publish(&event).await {
                tracing::error!(event_id = %event.id, error = %err, "publish failed");
            }
        }
        Ok(())
    }
}

impl Default for EditFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Flow for EditFlow {
    fn name(&self) -> &'static str {
        "edit"
    }

    async fn begin(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        let active = cx
            .stores
            .events
            .find_active_by_submitter(cx.actor.id, Utc::now())
            .await?;
        if active.is_empty() {
            cx.say("ℹ️ You have no published upcoming events to edit\\.").await?;
            return Ok(FlowStatus::Finished);
        }
        let editable: Vec<&Event> = active
            .iter()
            .filter(|e| cx.config.edit_allowed(e.updated_count))
            .collect();
        if editable.is_empty() {
            cx.say("⚠️ All of your events have used up their edit allowance\\.")
                .await?;
            return Ok(FlowStatus::Finished);
        }

        let mut kb = Keyboard::new();
        for event in &editable {
            let label = format!(
                "{} ({}) — edits left: {}",
                event.title,
                format_local(event.start_date, &cx.config),
                cx.config.remaining_edits_label(event.updated_count)
            );
            kb = kb.line(label, CallbackAction::EditEvent(event.id.clone()).encode());
        }
        kb = kb.row(vec![cancel_button()]);
        cx.say_kb("✏️ Which event do you want to edit?", kb).await?;
        Ok(FlowStatus::AwaitingInput)
    }

    async fn on_input(&mut self, input: Input, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        match &mut self.step {
            Step::Select => {
                if input.is_cancel() {
                    cx.ack(&input).await?;
                    cx.say_cancelled().await?;
                    return Ok(FlowStatus::Finished);
                }
                match input.callback_action() {
                    Some(CallbackAction::EditEvent(id)) => {
                        let id = id.clone();
                        cx.ack(&input).await?;
                        let Some(event) = cx.stores.events.find_by_id(&id).await? else {
                            cx.say("⚠️ This event no longer exists\\.").await?;
                            return Ok(FlowStatus::Finished);
                        };
                        if event.submitter_id != cx.actor.id
                            || !cx.config.edit_allowed(event.updated_count)
                        {
                            cx.say("⚠️ This event cannot be edited\\.").await?;
                            return Ok(FlowStatus::Finished);
                        }
                        cx.say(&format!(
                            "Remaining edits after this one: {}",
                            escape(&cx.config.remaining_edits_label(event.updated_count + 1))
                        ))
                        .await?;
                        self.draft = crate::models::EventDraft::from_event(&event);
                        self.original = Some(event);
                        let mut summary = SummaryLoop::new(DESCRIPTION_MAX);
                        summary.begin(&self.draft, cx).await?;
                        self.step = Step::Summary(summary);
                        Ok(FlowStatus::AwaitingInput)
                    }
                    _ => {
                        cx.ack(&input).await?;
                        Ok(FlowStatus::AwaitingInput)
                    }
                }
            }
            Step::Summary(summary) => match summary.on_input(&input, &mut self.draft, cx).await? {
                SummaryOutcome::Continue => Ok(FlowStatus::AwaitingInput),
                SummaryOutcome::Cancelled => {
                    cx.say_cancelled().await?;
                    Ok(FlowStatus::Finished)
                }
                SummaryOutcome::Confirmed => {
                    self.finalize(cx).await?;
                    Ok(FlowStatus::Finished)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventDraft;
    use crate::testutil::{drive, test_cx};
    use chrono::Duration;

    async fn seeded(cx: &FlowCx, title: &str) -> Event {
        let now = Utc::now();
        let mut draft = EventDraft::new(&cx.actor);
        draft.title = title.into();
        draft.description = "desc".into();
        draft.location = "somewhere".into();
        draft.entry_date = Some(now + Duration::hours(10));
        draft.start_date = Some(now + Duration::hours(11));
        draft.end_date = Some(now + Duration::hours(12));
        let event = draft.build_event(EventStatus::Approved, now).unwrap();
        cx.stores.events.insert(event.clone()).await.unwrap();
        event
    }

    #[tokio::test]
    async fn no_events_finishes_immediately() {
        let (cx, transport) = test_cx().await;
        let mut flow = EditFlow::new();
        let status = flow.begin(&cx).await.unwrap();
        assert!(matches!(status, FlowStatus::Finished));
        assert!(transport
            .last_sent_to(cx.venue)
            .unwrap()
            .text
            .contains("no published upcoming events"));
    }

    #[tokio::test]
    async fn quota_exhausted_events_are_not_offered() {
        let (cx, transport) = test_cx().await;
        let mut cfg = crate::testutil::test_config();
        cfg.max_event_edits = 1;
        let cx = FlowCx {
            config: std::sync::Arc::new(cfg),
            ..cx
        };
        let mut event = seeded(&cx, "Maxed").await;
        event.updated_count = 1;
        cx.stores.events.update(&event).await.unwrap();

        let mut flow = EditFlow::new();
        let status = flow.begin(&cx).await.unwrap();
        assert!(matches!(status, FlowStatus::Finished));
        assert!(transport
            .last_sent_to(cx.venue)
            .unwrap()
            .text
            .contains("edit allowance"));
    }

    #[tokio::test]
    async fn keeping_a_field_does_not_abort_the_edit() {
        let (cx, transport) = test_cx().await;
        let event = seeded(&cx, "Original").await;

        let mut flow = EditFlow::new();
        flow.begin(&cx).await.unwrap();
        flow.on_input(drive::press(CallbackAction::EditEvent(event.id.clone())), &cx)
            .await
            .unwrap();
        // Open the title editor, then back out of it unchanged.
        flow.on_input(
            drive::press(CallbackAction::EditField(crate::flows::Field::Title)),
            &cx,
        )
        .await
        .unwrap();
        let status = flow
            .on_input(drive::press(CallbackAction::KeepField), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::AwaitingInput));
        assert!(transport
            .last_sent_to(cx.venue)
            .unwrap()
            .text
            .contains("Original"));

        // The conversation is still live; confirming completes the edit.
        let status = flow
            .on_input(drive::press(CallbackAction::ConfirmSubmission), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::Finished));
        let stored = cx.stores.events.find_by_id(&event.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Original");
        assert_eq!(stored.status, EventStatus::EditedPending);
    }

    #[tokio::test]
    async fn confirmed_edit_reenters_review() {
        let (cx, transport) = test_cx().await;
        let event = seeded(&cx, "Original").await;

        let mut flow = EditFlow::new();
        flow.begin(&cx).await.unwrap();
        flow.on_input(drive::press(CallbackAction::EditEvent(event.id.clone())), &cx)
            .await
            .unwrap();
        flow.on_input(
            drive::press(CallbackAction::EditField(crate::flows::Field::Title)),
            &cx,
        )
        .await
        .unwrap();
        flow.on_input(Input::Text("Updated title".into()), &cx).await.unwrap();
        let status = flow
            .on_input(drive::press(CallbackAction::ConfirmSubmission), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::Finished));

        let stored = cx.stores.events.find_by_id(&event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::EditedPending);
        assert_eq!(stored.title, "Updated title");
        assert_eq!(stored.updated_count, 1);
        assert!(transport
            .sent_to(cx.config.admin_venue)
            .iter()
            .any(|m| m.text.contains("Edited event")));
    }
}
