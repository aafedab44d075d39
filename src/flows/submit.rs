//! Event submission conversation.
//!
//! One fixed pass over all fields, then the summary-edit loop. On confirm the
//! draft becomes a stored event (pending review or immediately published,
//! depending on configuration) and the actor is offered to keep the draft as
//! a template.

use async_trait::async_trait;

use crate::models::{EventDraft, EventStatus};
use crate::routing::actions::CallbackAction;
use crate::transport::{Button, Keyboard};

use super::collectors::{CollectOutcome, DESCRIPTION_MAX};
use super::summary::{Editor, SummaryLoop, SummaryOutcome};
use super::{Field, Flow, FlowCx, FlowError, FlowStatus, Input};

const PASS: [Field; 8] = [
    Field::Title,
    Field::Description,
    Field::Location,
    Field::Dates,
    Field::Categories,
    Field::Links,
    Field::GroupLink,
    Field::Image,
];

enum Step {
    Collect { index: usize, editor: Editor },
    Summary(SummaryLoop),
}

pub struct SubmitFlow {
    step: Step,
    draft: EventDraft,
}

impl SubmitFlow {
    pub fn new() -> Self {
        Self {
            step: Step::Collect {
                index: 0,
                // Placeholder until begin() runs; Title needs no draft state.
                editor: Editor::Field(super::collectors::FieldCollector::Title),
            },
            draft: EventDraft::default(),
        }
    }

    async fn finalize(&mut self, cx: &FlowCx) -> Result<(), FlowError> {
        let status = if cx.config.require_approval {
            EventStatus::Pending
        } else {
            EventStatus::Approved
        };
        let Some(event) = self.draft.build_event(status, chrono::Utc::now()) else {
            tracing::error!(actor_id = cx.actor.id, "draft confirmed without dates");
            cx.say("⚠️ Something went wrong, please submit again\\.").await?;
            return Ok(());
        };
        cx.stores.events.insert(event.clone()).await?;
        tracing::info!(event_id = %event.id, actor_id = cx.actor.id, status = ?event.status, "event submitted");

        if status == EventStatus::Pending {
            cx.say("🎉 Thanks\\! Your event is waiting for review\\.").await?;
            if let Err(err) = cx.moderation.notify_admins(&event, false).await {
                tracing::warn!(event_id = %event.id, error = %err, "admin notice failed");
            }
        } else {
            cx.say("🎉 Your event is published\\!").await?;
            if let Err(err) = cx.moderation.publish(&event).await {
                tracing::error!(event_id = %event.id, error = %err, "publish failed");
            }
        }

        // Stage the draft so a follow-up button press can snapshot it.
        cx.staging.stage(cx.actor.id, self.draft.clone());
        let kb = Keyboard::new().row(vec![
            Button::new("💾 Save as template", CallbackAction::TemplateSaveYes.encode()),
            Button::new("🗑 No thanks", CallbackAction::TemplateSaveNo.encode()),
        ]);
        cx.say_kb("Save this event as a template for next time?", kb).await?;
        Ok(())
    }
}

impl Default for SubmitFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Flow for SubmitFlow {
    fn name(&self) -> &'static str {
        "submit"
    }

    async fn begin(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        self.draft = EventDraft::new(&cx.actor);
        let editor = Editor::for_field(PASS[0], &self.draft, DESCRIPTION_MAX);
        editor.begin(cx).await?;
        self.step = Step::Collect { index: 0, editor };
        Ok(FlowStatus::AwaitingInput)
    }

    async fn on_input(&mut self, input: Input, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        match &mut self.step {
            Step::Collect { index, editor } => {
                match editor.handle(&input, &mut self.draft, cx).await? {
                    CollectOutcome::Continue => Ok(FlowStatus::AwaitingInput),
                    CollectOutcome::Cancelled => {
                        cx.say_cancelled().await?;
                        Ok(FlowStatus::Finished)
                    }
                    CollectOutcome::Done => {
                        let next = *index + 1;
                        if next < PASS.len() {
                            let editor = Editor::for_field(PASS[next], &self.draft, DESCRIPTION_MAX);
                            editor.begin(cx).await?;
                            self.step = Step::Collect { index: next, editor };
                        } else {
                            let mut summary = SummaryLoop::new(DESCRIPTION_MAX);
                            summary.begin(&self.draft, cx).await?;
                            self.step = Step::Summary(summary);
                        }
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
    use crate::testutil::{drive, stamp, test_cx};

    #[tokio::test]
    async fn full_pass_ends_pending_with_admin_notice() {
        let (cx, transport) = test_cx().await;
        let mut flow = SubmitFlow::new();
        flow.begin(&cx).await.unwrap();

        let steps: Vec<Input> = vec![
            Input::Text("Jazz Night".into()),
            Input::Text("An evening of improvisation".into()),
            Input::Text("Blue Note Cellar".into()),
            Input::Text(stamp(&cx, 24)),
            Input::Text(stamp(&cx, 25)),
            Input::Text(stamp(&cx, 28)),
            drive::press(CallbackAction::DatesConfirm),
            drive::press(CallbackAction::Category("Music".into())),
            drive::press(CallbackAction::CategoryDone),
            Input::Text("https://jazz.example".into()),
            drive::press(CallbackAction::SkipGroupLink),
            drive::press(CallbackAction::SkipImage),
        ];
        let mut status = FlowStatus::AwaitingInput;
        for step in steps {
            status = flow.on_input(step, &cx).await.unwrap();
        }
        assert!(matches!(status, FlowStatus::AwaitingInput));

        // Summary is up; confirm it.
        status = flow
            .on_input(drive::press(CallbackAction::ConfirmSubmission), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::Finished));

        // Admin venue got the review notice with approve/reject buttons.
        let admin_msgs = transport.sent_to(cx.config.admin_venue);
        assert!(!admin_msgs.is_empty());
        let notice = admin_msgs.last().unwrap();
        assert!(notice.text.contains("Jazz Night"));
        assert!(notice.keyboard.is_some());

        // The draft is staged and the actor was offered a template save.
        assert!(cx.staging.peek(cx.actor.id).is_some());
        let last = transport.last_sent_to(cx.venue).unwrap();
        assert!(last.text.contains("template"));
    }

    #[tokio::test]
    async fn approval_off_publishes_immediately() {
        let (cx, transport) = test_cx().await;
        let mut cfg = crate::testutil::test_config();
        cfg.require_approval = false;
        let cx = FlowCx {
            config: std::sync::Arc::new(cfg),
            ..cx
        };

        let mut flow = SubmitFlow::new();
        flow.begin(&cx).await.unwrap();
        let steps: Vec<Input> = vec![
            Input::Text("Jazz Night".into()),
            Input::Text("An evening of improvisation".into()),
            Input::Text("Blue Note Cellar".into()),
            Input::Text(stamp(&cx, 24)),
            Input::Text(stamp(&cx, 25)),
            Input::Text(stamp(&cx, 28)),
            drive::press(CallbackAction::DatesConfirm),
            drive::press(CallbackAction::Category("Music".into())),
            drive::press(CallbackAction::CategoryDone),
            drive::press(CallbackAction::SkipLinks),
            drive::press(CallbackAction::SkipGroupLink),
            drive::press(CallbackAction::SkipImage),
        ];
        for step in steps {
            flow.on_input(step, &cx).await.unwrap();
        }
        let status = flow
            .on_input(drive::press(CallbackAction::ConfirmSubmission), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::Finished));

        // Stored approved with a live posting, no review round-trip.
        let active = cx
            .stores
            .events
            .find_active_by_submitter(cx.actor.id, chrono::Utc::now())
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].status, EventStatus::Approved);
        assert!(active[0].message_id.is_some());
        assert!(transport
            .sent_to(cx.config.public_venue)
            .iter()
            .any(|m| m.text.contains("Jazz Night")));
        // The admin venue only gets the management message.
        let admin_msgs = transport.sent_to(cx.config.admin_venue);
        assert!(admin_msgs.iter().any(|m| m.text.contains("Manage")));
        assert!(!admin_msgs.iter().any(|m| m.text.contains("review")));
    }

    #[tokio::test]
    async fn cancel_during_collection_saves_nothing() {
        let (cx, transport) = test_cx().await;
        let mut flow = SubmitFlow::new();
        flow.begin(&cx).await.unwrap();

        flow.on_input(Input::Text("Jazz Night".into()), &cx).await.unwrap();
        let status = flow
            .on_input(drive::press(CallbackAction::CancelConversation), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::Finished));
        assert!(transport.sent_to(cx.config.admin_venue).is_empty());
        let last = transport.last_sent_to(cx.venue).unwrap();
        assert!(last.text.contains("Cancelled"));
    }
}
