//! Summary-edit loop shared by the submit, edit, and template-use flows.
//!
//! Shows the draft with a confirm/cancel row and one edit button per field.
//! Picking a field re-runs that field's collector in place and returns to the
//! summary; confirm and cancel resolve the loop.

use crate::models::EventDraft;
use crate::render::{
    format_caption, format_event, format_overflow, EventCard, RenderTarget, CAPTION_LIMIT,
};
use crate::routing::actions::CallbackAction;
use crate::transport::{Button, Keyboard};

use super::collectors::{CollectOutcome, FieldCollector};
use super::dates::{DateTriad, TriadOutcome};
use super::{Field, FlowCx, FlowError, Input};

/// A field editor re-invoked from the summary.
pub enum Editor {
    Field(FieldCollector),
    Dates(DateTriad),
}

impl Editor {
    pub fn for_field(field: Field, draft: &EventDraft, description_max: usize) -> Editor {
        match field {
            Field::Dates => Editor::Dates(DateTriad::new()),
            other => Editor::Field(FieldCollector::for_field(other, draft, description_max)),
        }
    }

    pub fn field(&self) -> Field {
        match self {
            Editor::Field(collector) => collector.field(),
            Editor::Dates(_) => Field::Dates,
        }
    }

    pub async fn begin(&self, cx: &FlowCx) -> Result<(), FlowError> {
        match self {
            Editor::Field(collector) => collector.begin(cx).await,
            Editor::Dates(triad) => triad.begin(cx).await,
        }
    }

    pub async fn handle(
        &mut self,
        input: &Input,
        draft: &mut EventDraft,
        cx: &FlowCx,
    ) -> Result<CollectOutcome, FlowError> {
        match self {
            Editor::Field(collector) => collector.handle(input, draft, cx).await,
            Editor::Dates(triad) => Ok(match triad.handle(input, draft, cx).await? {
                TriadOutcome::Continue => CollectOutcome::Continue,
                TriadOutcome::Done => CollectOutcome::Done,
                TriadOutcome::Cancelled => CollectOutcome::Cancelled,
            }),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SummaryOutcome {
    Continue,
    Confirmed,
    Cancelled,
}

pub struct SummaryLoop {
    editing: Option<Editor>,
    /// Field whose editor was cancelled last, for callers that gate aborts.
    last_cancelled: Option<Field>,
    description_max: usize,
}

impl SummaryLoop {
    pub fn new(description_max: usize) -> Self {
        Self {
            editing: None,
            last_cancelled: None,
            description_max,
        }
    }

    pub fn last_cancelled(&self) -> Option<Field> {
        self.last_cancelled
    }

    /// Re-open the editor for `field` after a caller vetoed its cancellation.
    pub async fn reopen(
        &mut self,
        field: Field,
        draft: &EventDraft,
        cx: &FlowCx,
    ) -> Result<(), FlowError> {
        self.open_editor(field, draft, cx).await?;
        self.last_cancelled = None;
        Ok(())
    }

    /// Open a field editor with a keep button, so backing out of one field
    /// returns to the summary instead of abandoning the conversation.
    async fn open_editor(
        &mut self,
        field: Field,
        draft: &EventDraft,
        cx: &FlowCx,
    ) -> Result<(), FlowError> {
        let editor = Editor::for_field(field, draft, self.description_max);
        editor.begin(cx).await?;
        cx.say_kb(
            "↩️ Or keep the current value\\.",
            Keyboard::new().line("↩️ Keep as is", CallbackAction::KeepField.encode()),
        )
        .await?;
        self.editing = Some(editor);
        Ok(())
    }

    pub async fn begin(&mut self, draft: &EventDraft, cx: &FlowCx) -> Result<(), FlowError> {
        self.editing = None;
        send_summary(draft, cx).await
    }

    pub async fn on_input(
        &mut self,
        input: &Input,
        draft: &mut EventDraft,
        cx: &FlowCx,
    ) -> Result<SummaryOutcome, FlowError> {
        if self.editing.is_some()
            && matches!(input.callback_action(), Some(CallbackAction::KeepField))
        {
            cx.ack_toast(input, "Kept unchanged").await?;
            self.editing = None;
            send_summary(draft, cx).await?;
            return Ok(SummaryOutcome::Continue);
        }

        if let Some(editor) = self.editing.as_mut() {
            return match editor.handle(input, draft, cx).await? {
                CollectOutcome::Continue => Ok(SummaryOutcome::Continue),
                CollectOutcome::Done => {
                    self.editing = None;
                    send_summary(draft, cx).await?;
                    Ok(SummaryOutcome::Continue)
                }
                CollectOutcome::Cancelled => {
                    self.last_cancelled = Some(editor.field());
                    self.editing = None;
                    Ok(SummaryOutcome::Cancelled)
                }
            };
        }

        match input.callback_action() {
            Some(CallbackAction::ConfirmSubmission) => {
                cx.ack(input).await?;
                Ok(SummaryOutcome::Confirmed)
            }
            Some(CallbackAction::CancelSubmission | CallbackAction::CancelConversation) => {
                cx.ack(input).await?;
                self.last_cancelled = None;
                Ok(SummaryOutcome::Cancelled)
            }
            Some(CallbackAction::Separator) => {
                cx.ack(input).await?;
                Ok(SummaryOutcome::Continue)
            }
            Some(CallbackAction::EditField(field)) => {
                let field = *field;
                cx.ack(input).await?;
                self.open_editor(field, draft, cx).await?;
                Ok(SummaryOutcome::Continue)
            }
            _ => {
                cx.ack(input).await?;
                Ok(SummaryOutcome::Continue)
            }
        }
    }
}

fn summary_keyboard() -> Keyboard {
    let edit_button =
        |field: Field| Button::new(format!("✏️ {}", field.label()), CallbackAction::EditField(field).encode());
    Keyboard::new()
        .row(vec![
            Button::new("✅ Submit", CallbackAction::ConfirmSubmission.encode()),
            Button::new("❌ Cancel", CallbackAction::CancelSubmission.encode()),
        ])
        .line("———", CallbackAction::Separator.encode())
        .row(vec![edit_button(Field::Title), edit_button(Field::Description)])
        .row(vec![edit_button(Field::Location), edit_button(Field::Dates)])
        .row(vec![edit_button(Field::Categories), edit_button(Field::Links)])
        .row(vec![edit_button(Field::GroupLink), edit_button(Field::Image)])
}

async fn send_summary(draft: &EventDraft, cx: &FlowCx) -> Result<(), FlowError> {
    let card = EventCard::from(draft);
    let text = format_event(&card, &cx.config, &RenderTarget::Summary);
    match &draft.image {
        Some(image) if text.chars().count() <= CAPTION_LIMIT => {
            cx.transport
                .send_photo(cx.venue, image, &text, Some(summary_keyboard()))
                .await?;
        }
        Some(image) => {
            let caption = format_caption(&card, &cx.config, &RenderTarget::Summary);
            cx.transport.send_photo(cx.venue, image, &caption, None).await?;
            cx.say_kb(&format_overflow(&card), summary_keyboard()).await?;
        }
        None => {
            cx.say_kb(&text, summary_keyboard()).await?;
        }
    }
    Ok(())
}
