//! Template management: list/inspect/delete, instantiate, and save.
//!
//! Templates carry the content fields of an event but never its dates.
//! Instantiating one collects fresh dates, runs the summary-edit loop, and
//! afterwards refreshes the template's non-date fields best-effort with what
//! was actually submitted.

use async_trait::async_trait;
use chrono::Utc;

use crate::models::{EventDraft, EventStatus, EventTemplate};
use crate::render::{escape, format_template_details};
use crate::routing::actions::CallbackAction;
use crate::transport::{Button, Keyboard};

use super::collectors::DESCRIPTION_MAX_EXTENDED;
use super::dates::{DateTriad, TriadOutcome};
use super::summary::{SummaryLoop, SummaryOutcome};
use super::{cancel_keyboard, Flow, FlowCx, FlowError, FlowStatus, Input};

pub const TEMPLATE_NAME_MAX: usize = 50;

// ---------------------------------------------------------------------------
// List / inspect / delete
// ---------------------------------------------------------------------------

enum ListStep {
    List,
    Details { template: EventTemplate },
    ConfirmDelete { template: EventTemplate },
}

pub struct TemplateListFlow {
    step: ListStep,
}

impl TemplateListFlow {
    pub fn new() -> Self {
        Self {
            step: ListStep::List,
        }
    }

    async fn show_list(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        let templates = cx.stores.templates.find_by_owner(cx.actor.id).await?;
        if templates.is_empty() {
            cx.say("ℹ️ You have no templates yet\\. Submitting an event offers to save one\\.")
                .await?;
            return Ok(FlowStatus::Finished);
        }
        let mut kb = Keyboard::new();
        for template in &templates {
            kb = kb.line(
                format!("📄 {}", template.name),
                CallbackAction::TemplateView(template.id.clone()).encode(),
            );
        }
        kb = kb.line("🚪 Close", CallbackAction::TemplateExit.encode());
        cx.say_kb(
            &format!("🗂 Your templates \\({}\\):", templates.len()),
            kb,
        )
        .await?;
        self.step = ListStep::List;
        Ok(FlowStatus::AwaitingInput)
    }

    async fn show_details(
        &mut self,
        template: EventTemplate,
        cx: &FlowCx,
    ) -> Result<(), FlowError> {
        let kb = Keyboard::new()
            .row(vec![
                Button::new("▶️ Use", CallbackAction::TemplateUse(template.id.clone()).encode()),
                Button::new(
                    "🗑 Delete",
                    CallbackAction::TemplateDelete(template.id.clone()).encode(),
                ),
            ])
            .line("⬅️ Back", CallbackAction::TemplateBack.encode());
        cx.say_kb(&format_template_details(&template, &cx.config), kb)
            .await?;
        self.step = ListStep::Details { template };
        Ok(())
    }
}

impl Default for TemplateListFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Flow for TemplateListFlow {
    fn name(&self) -> &'static str {
        "template-list"
    }

    async fn begin(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        self.show_list(cx).await
    }

    async fn on_input(&mut self, input: Input, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        if input.is_cancel()
            || input.callback_action() == Some(&CallbackAction::TemplateExit)
        {
            cx.ack(&input).await?;
            cx.say("👋 Closed the template list\\.").await?;
            return Ok(FlowStatus::Finished);
        }

        match &self.step {
            ListStep::List => match input.callback_action() {
                Some(CallbackAction::TemplateView(id)) => {
                    let id = id.clone();
                    cx.ack(&input).await?;
                    match cx.stores.templates.find_by_id(&id, cx.actor.id).await? {
                        Some(template) => {
                            self.show_details(template, cx).await?;
                            Ok(FlowStatus::AwaitingInput)
                        }
                        None => {
                            cx.say("⚠️ That template no longer exists\\.").await?;
                            self.show_list(cx).await
                        }
                    }
                }
                _ => {
                    cx.ack(&input).await?;
                    Ok(FlowStatus::AwaitingInput)
                }
            },
            ListStep::Details { template } => match input.callback_action() {
                Some(CallbackAction::TemplateUse(id)) => {
                    let id = id.clone();
                    cx.ack(&input).await?;
                    Ok(FlowStatus::Handoff(Box::new(TemplateUseFlow::new(id))))
                }
                Some(CallbackAction::TemplateDelete(_)) => {
                    let template = template.clone();
                    cx.ack(&input).await?;
                    let kb = Keyboard::new().row(vec![
                        Button::new("🗑 Delete it", CallbackAction::TemplateDeleteConfirm.encode()),
                        Button::new("↩️ Keep it", CallbackAction::TemplateDeleteCancel.encode()),
                    ]);
                    cx.say_kb(
                        &format!("Really delete *{}*?", escape(&template.name)),
                        kb,
                    )
                    .await?;
                    self.step = ListStep::ConfirmDelete { template };
                    Ok(FlowStatus::AwaitingInput)
                }
                Some(CallbackAction::TemplateBack) => {
                    cx.ack(&input).await?;
                    self.show_list(cx).await
                }
                _ => {
                    cx.ack(&input).await?;
                    Ok(FlowStatus::AwaitingInput)
                }
            },
            ListStep::ConfirmDelete { template } => match input.callback_action() {
                Some(CallbackAction::TemplateDeleteConfirm) => {
                    let template = template.clone();
                    cx.ack(&input).await?;
                    match cx.stores.templates.delete(&template.id, cx.actor.id).await {
                        Ok(()) => {
                            cx.say(&format!("🗑 Deleted *{}*\\.", escape(&template.name)))
                                .await?;
                        }
                        Err(err) => {
                            tracing::warn!(template_id = %template.id, error = %err, "template deletion failed");
                            cx.say("⚠️ That template could not be deleted\\.").await?;
                        }
                    }
                    self.show_list(cx).await
                }
                Some(CallbackAction::TemplateDeleteCancel) => {
                    cx.ack(&input).await?;
                    self.show_list(cx).await
                }
                _ => {
                    cx.ack(&input).await?;
                    Ok(FlowStatus::AwaitingInput)
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Instantiate
// ---------------------------------------------------------------------------

enum UseStep {
    Dates(DateTriad),
    Summary(SummaryLoop),
    /// Cancellation-confirmation gate; `prior` is resumed on veto.
    Gate { prior: Box<UseStep> },
}

pub struct TemplateUseFlow {
    template_id: String,
    draft: EventDraft,
    step: UseStep,
}

impl TemplateUseFlow {
    pub fn new(template_id: String) -> Self {
        Self {
            template_id,
            draft: EventDraft::default(),
            step: UseStep::Dates(DateTriad::new()),
        }
    }

    async fn open_gate(&mut self, prior: UseStep, cx: &FlowCx) -> Result<(), FlowError> {
        let kb = Keyboard::new().row(vec![
            Button::new("✔️ Yes, cancel", CallbackAction::CancelGateYes.encode()),
            Button::new("↩️ Keep going", CallbackAction::CancelGateNo.encode()),
        ]);
        cx.say_kb("Really cancel? Nothing will be saved\\.", kb).await?;
        self.step = UseStep::Gate {
            prior: Box::new(prior),
        };
        Ok(())
    }

    async fn finalize(&mut self, cx: &FlowCx) -> Result<(), FlowError> {
        let status = if cx.config.require_approval {
            EventStatus::Pending
        } else {
            EventStatus::Approved
        };
        let Some(event) = self.draft.build_event(status, Utc::now()) else {
            tracing::error!(actor_id = cx.actor.id, "template draft confirmed without dates");
            cx.say("⚠️ Something went wrong, please try again\\.").await?;
            return Ok(());
        };
        cx.stores.events.insert(event.clone()).await?;
        tracing::info!(event_id = %event.id, template_id = %self.template_id, "event submitted from template");

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

        // Keep the template in step with what the actor actually sent.
        // Failure only logs; the submission already succeeded.
        match cx
            .stores
            .templates
            .find_by_id(&self.template_id, cx.actor.id)
            .await
        {
            Ok(Some(mut template)) => {
                template.refresh_from_draft(&self.draft);
                if let Err(err) = cx.stores.templates.update(&template).await {
                    tracing::warn!(template_id = %template.id, error = %err, "template refresh failed");
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(template_id = %self.template_id, error = %err, "template refresh lookup failed");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Flow for TemplateUseFlow {
    fn name(&self) -> &'static str {
        "template-use"
    }

    async fn begin(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        let Some(template) = cx
            .stores
            .templates
            .find_by_id(&self.template_id, cx.actor.id)
            .await?
        else {
            cx.say("⚠️ That template no longer exists\\.").await?;
            return Ok(FlowStatus::Finished);
        };
        self.draft = EventDraft::from_template(&template, &cx.actor);
        cx.say(&format!(
            "📄 Using *{}*\\. First the dates:",
            escape(&template.name)
        ))
        .await?;
        let triad = DateTriad::new();
        triad.begin(cx).await?;
        self.step = UseStep::Dates(triad);
        Ok(FlowStatus::AwaitingInput)
    }

    async fn on_input(&mut self, input: Input, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        // Take the step so a cancellation can carry it into the gate.
        let step = std::mem::replace(&mut self.step, UseStep::Dates(DateTriad::new()));
        match step {
            UseStep::Dates(mut triad) => {
                match triad.handle(&input, &mut self.draft, cx).await? {
                    TriadOutcome::Continue => {
                        self.step = UseStep::Dates(triad);
                        Ok(FlowStatus::AwaitingInput)
                    }
                    TriadOutcome::Done => {
                        let mut summary = SummaryLoop::new(DESCRIPTION_MAX_EXTENDED);
                        summary.begin(&self.draft, cx).await?;
                        self.step = UseStep::Summary(summary);
                        Ok(FlowStatus::AwaitingInput)
                    }
                    TriadOutcome::Cancelled => {
                        self.open_gate(UseStep::Dates(triad), cx).await?;
                        Ok(FlowStatus::AwaitingInput)
                    }
                }
            }
            UseStep::Summary(mut summary) => {
                match summary.on_input(&input, &mut self.draft, cx).await? {
                    SummaryOutcome::Continue => {
                        self.step = UseStep::Summary(summary);
                        Ok(FlowStatus::AwaitingInput)
                    }
                    SummaryOutcome::Confirmed => {
                        self.finalize(cx).await?;
                        Ok(FlowStatus::Finished)
                    }
                    SummaryOutcome::Cancelled => {
                        if summary.last_cancelled().is_some() {
                            // A field editor was cancelled: gate it.
                            self.open_gate(UseStep::Summary(summary), cx).await?;
                            Ok(FlowStatus::AwaitingInput)
                        } else {
                            cx.say_cancelled().await?;
                            Ok(FlowStatus::Finished)
                        }
                    }
                }
            }
            UseStep::Gate { prior } => match input.callback_action() {
                Some(CallbackAction::CancelGateYes) => {
                    cx.ack(&input).await?;
                    cx.say_cancelled().await?;
                    Ok(FlowStatus::Finished)
                }
                Some(CallbackAction::CancelGateNo) => {
                    cx.ack(&input).await?;
                    match *prior {
                        UseStep::Dates(triad) => {
                            // Re-prompt the stage the triad was on.
                            triad.begin(cx).await?;
                            self.step = UseStep::Dates(triad);
                        }
                        UseStep::Summary(mut summary) => {
                            match summary.last_cancelled() {
                                Some(field) => summary.reopen(field, &self.draft, cx).await?,
                                None => summary.begin(&self.draft, cx).await?,
                            }
                            self.step = UseStep::Summary(summary);
                        }
                        UseStep::Gate { .. } => {}
                    }
                    Ok(FlowStatus::AwaitingInput)
                }
                _ => {
                    cx.ack(&input).await?;
                    self.step = UseStep::Gate { prior };
                    Ok(FlowStatus::AwaitingInput)
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

pub struct TemplateSaveFlow {
    draft: Option<EventDraft>,
}

impl TemplateSaveFlow {
    pub fn new() -> Self {
        Self { draft: None }
    }
}

impl Default for TemplateSaveFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Flow for TemplateSaveFlow {
    fn name(&self) -> &'static str {
        "template-save"
    }

    async fn begin(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        // Taking the slot clears it whatever happens next.
        let Some(draft) = cx.staging.take(cx.actor.id) else {
            cx.say("⚠️ There is no recent submission to save\\.").await?;
            return Ok(FlowStatus::Finished);
        };
        let count = cx.stores.templates.count_by_owner(cx.actor.id).await?;
        if count >= cx.config.max_templates_per_owner {
            cx.say(&format!(
                "⚠️ You already have {} templates\\. Delete one first\\.",
                cx.config.max_templates_per_owner
            ))
            .await?;
            return Ok(FlowStatus::Finished);
        }
        self.draft = Some(draft);
        cx.say_kb(
            &format!("💾 Send a name for the template \\(max {TEMPLATE_NAME_MAX} characters\\)\\."),
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
            cx.say("⚠️ Just send a name as text\\.").await?;
            return Ok(FlowStatus::AwaitingInput);
        };
        let name: String = text.trim().chars().take(TEMPLATE_NAME_MAX).collect();
        if name.is_empty() {
            cx.say("⚠️ The name cannot be empty\\.").await?;
            return Ok(FlowStatus::AwaitingInput);
        }
        let Some(draft) = self.draft.take() else {
            return Ok(FlowStatus::Finished);
        };
        let template = EventTemplate::from_draft(&draft, name.clone(), &cx.actor, Utc::now());
        cx.stores.templates.insert(template).await?;
        tracing::info!(actor_id = cx.actor.id, "template saved");
        cx.say(&format!("💾 Saved as *{}*\\.", escape(&name))).await?;
        Ok(FlowStatus::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::testutil::{drive, stamp, test_cx};

    fn draft_for(cx: &FlowCx) -> EventDraft {
        let mut draft = EventDraft::new(&cx.actor);
        draft.title = "Board Game Night".into();
        draft.description = "Bring games".into();
        draft.location = "Community Hall".into();
        draft.categories = vec![Category::Entertainment];
        draft
    }

    #[tokio::test]
    async fn save_snapshots_staged_draft_and_clears_slot() {
        let (cx, _transport) = test_cx().await;
        cx.staging.stage(cx.actor.id, draft_for(&cx));

        let mut flow = TemplateSaveFlow::new();
        flow.begin(&cx).await.unwrap();
        assert!(cx.staging.peek(cx.actor.id).is_none());

        let long_name = "n".repeat(TEMPLATE_NAME_MAX + 20);
        let status = flow.on_input(Input::Text(long_name), &cx).await.unwrap();
        assert!(matches!(status, FlowStatus::Finished));

        let templates = cx.stores.templates.find_by_owner(cx.actor.id).await.unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name.chars().count(), TEMPLATE_NAME_MAX);
        assert_eq!(templates[0].title, "Board Game Night");
    }

    #[tokio::test]
    async fn save_respects_per_owner_cap() {
        let (cx, transport) = test_cx().await;
        for i in 0..cx.config.max_templates_per_owner {
            let template = EventTemplate::from_draft(
                &draft_for(&cx),
                format!("t{i}"),
                &cx.actor,
                Utc::now(),
            );
            cx.stores.templates.insert(template).await.unwrap();
        }
        cx.staging.stage(cx.actor.id, draft_for(&cx));

        let mut flow = TemplateSaveFlow::new();
        let status = flow.begin(&cx).await.unwrap();
        assert!(matches!(status, FlowStatus::Finished));
        assert!(transport
            .last_sent_to(cx.venue)
            .unwrap()
            .text
            .contains("Delete one first"));
        // The slot is cleared even on failure.
        assert!(cx.staging.peek(cx.actor.id).is_none());
    }

    #[tokio::test]
    async fn use_template_collects_dates_then_summary() {
        let (cx, transport) = test_cx().await;
        let template =
            EventTemplate::from_draft(&draft_for(&cx), "weekly", &cx.actor, Utc::now());
        cx.stores.templates.insert(template.clone()).await.unwrap();

        let mut flow = TemplateUseFlow::new(template.id.clone());
        flow.begin(&cx).await.unwrap();
        for h in [24, 25, 27] {
            flow.on_input(Input::Text(stamp(&cx, h)), &cx).await.unwrap();
        }
        flow.on_input(drive::press(CallbackAction::DatesConfirm), &cx)
            .await
            .unwrap();
        // Summary is up with the template content.
        assert!(transport
            .last_sent_to(cx.venue)
            .unwrap()
            .text
            .contains("Board Game Night"));

        let status = flow
            .on_input(drive::press(CallbackAction::ConfirmSubmission), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::Finished));
        assert!(!transport.sent_to(cx.config.admin_venue).is_empty());
    }

    #[tokio::test]
    async fn cancel_gate_can_resume_the_dates() {
        let (cx, _transport) = test_cx().await;
        let template =
            EventTemplate::from_draft(&draft_for(&cx), "weekly", &cx.actor, Utc::now());
        cx.stores.templates.insert(template.clone()).await.unwrap();

        let mut flow = TemplateUseFlow::new(template.id.clone());
        flow.begin(&cx).await.unwrap();
        flow.on_input(Input::Text(stamp(&cx, 24)), &cx).await.unwrap();
        // Cancel mid-triad: the gate opens instead of aborting.
        flow.on_input(drive::press(CallbackAction::CancelConversation), &cx)
            .await
            .unwrap();
        let status = flow
            .on_input(drive::press(CallbackAction::CancelGateNo), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::AwaitingInput));
        // The triad kept its first date; two more complete it.
        flow.on_input(Input::Text(stamp(&cx, 25)), &cx).await.unwrap();
        flow.on_input(Input::Text(stamp(&cx, 27)), &cx).await.unwrap();
        flow.on_input(drive::press(CallbackAction::DatesConfirm), &cx)
            .await
            .unwrap();
        assert!(flow.draft.entry_date.is_some());
    }

    #[tokio::test]
    async fn cancel_gate_yes_aborts() {
        let (cx, transport) = test_cx().await;
        let template =
            EventTemplate::from_draft(&draft_for(&cx), "weekly", &cx.actor, Utc::now());
        cx.stores.templates.insert(template.clone()).await.unwrap();

        let mut flow = TemplateUseFlow::new(template.id.clone());
        flow.begin(&cx).await.unwrap();
        flow.on_input(drive::press(CallbackAction::CancelConversation), &cx)
            .await
            .unwrap();
        let status = flow
            .on_input(drive::press(CallbackAction::CancelGateYes), &cx)
            .await
            .unwrap();
        assert!(matches!(status, FlowStatus::Finished));
        assert!(transport
            .last_sent_to(cx.venue)
            .unwrap()
            .text
            .contains("Cancelled"));
    }
}
