//! Self-service push: re-post one of your events to the top of the public
//! venue. Once per event, and only after the configured minimum age.

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::models::Event;
use crate::render::{format_event, format_local, EventCard, RenderTarget};
use crate::routing::actions::CallbackAction;
use crate::transport::{Button, Keyboard};

use super::{Flow, FlowCx, FlowError, FlowStatus, Input};

enum Step {
    Select,
    Confirm { event_id: String },
}

pub struct PushFlow {
    step: Step,
}

impl PushFlow {
    pub fn new() -> Self {
        Self { step: Step::Select }
    }

    fn pushable(event: &Event, cx: &FlowCx) -> bool {
        event.pushed_count == 0
            && event.created_at <= Utc::now() - Duration::days(cx.config.push_min_age_days)
    }
}

impl Default for PushFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Flow for PushFlow {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn begin(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        let active = cx
            .stores
            .events
            .find_active_by_submitter(cx.actor.id, Utc::now())
            .await?;
        let candidates: Vec<&Event> = active.iter().filter(|e| Self::pushable(e, cx)).collect();
        if candidates.is_empty() {
            cx.say(&format!(
                "ℹ️ Nothing to push right now\\. An event can be pushed once, after it is at least {} days old and before it ends\\.",
                cx.config.push_min_age_days
            ))
            .await?;
            return Ok(FlowStatus::Finished);
        }
        let mut kb = Keyboard::new();
        for event in &candidates {
            let label = format!(
                "{} ({})",
                event.title,
                format_local(event.start_date, &cx.config)
            );
            kb = kb.line(label, CallbackAction::PushEvent(event.id.clone()).encode());
        }
        kb = kb.line("❌ Cancel", CallbackAction::PushSelectCancel.encode());
        cx.say_kb("📣 Which event do you want to push?", kb).await?;
        Ok(FlowStatus::AwaitingInput)
    }

    async fn on_input(&mut self, input: Input, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        match &self.step {
            Step::Select => match input.callback_action() {
                Some(CallbackAction::PushEvent(id)) => {
                    let id = id.clone();
                    cx.ack(&input).await?;
                    let Some(event) = cx.stores.events.find_by_id(&id).await? else {
                        cx.say("⚠️ This event no longer exists\\.").await?;
                        return Ok(FlowStatus::Finished);
                    };
                    let preview =
                        format_event(&EventCard::from(&event), &cx.config, &RenderTarget::Summary);
                    let kb = Keyboard::new().row(vec![
                        Button::new("📣 Push it", CallbackAction::PushConfirm.encode()),
                        Button::new("↩️ Not now", CallbackAction::PushAbort.encode()),
                    ]);
                    cx.say_kb(&preview, kb).await?;
                    self.step = Step::Confirm { event_id: id };
                    Ok(FlowStatus::AwaitingInput)
                }
                Some(CallbackAction::PushSelectCancel | CallbackAction::CancelConversation) => {
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
                Some(CallbackAction::PushConfirm) => {
                    let event_id = event_id.clone();
                    cx.ack(&input).await?;
                    // Eligibility is re-checked inside; the outcome messages
                    // are the service's verbatim triage.
                    if let Err(err) = cx.moderation.push_event(&event_id, cx.venue).await {
                        tracing::error!(event_id = %event_id, error = %err, "push failed");
                        cx.say("⚠️ The push failed, please try again later\\.").await?;
                    }
                    Ok(FlowStatus::Finished)
                }
                Some(CallbackAction::PushAbort | CallbackAction::CancelConversation) => {
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
