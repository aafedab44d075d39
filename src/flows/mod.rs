//! Conversation engine.
//!
//! A flow is an explicit state machine owned by one actor's session. The
//! router calls [`Flow::begin`] when the flow starts and feeds every further
//! update through [`Flow::on_input`] until the flow reports
//! [`FlowStatus::Finished`]. Flows never block waiting for input; all
//! suspension points are explicit step-enum states.

pub mod admin;
pub mod collectors;
pub mod dates;
pub mod delete;
pub mod edit;
pub mod push;
pub mod search;
pub mod submit;
pub mod summary;
pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::models::{ActorInfo, MessageId, VenueId};
use crate::moderation::Moderation;
use crate::routing::actions::CallbackAction;
use crate::staging::TemplateStaging;
use crate::store::{StoreError, Stores};
use crate::transport::{Button, Keyboard, Transport, TransportError};

/// An event field addressable by the summary-edit loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
    Location,
    Dates,
    Categories,
    Links,
    GroupLink,
    Image,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Title,
        Field::Description,
        Field::Location,
        Field::Dates,
        Field::Categories,
        Field::Links,
        Field::GroupLink,
        Field::Image,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Location => "location",
            Field::Dates => "dates",
            Field::Categories => "categories",
            Field::Links => "links",
            Field::GroupLink => "group_link",
            Field::Image => "image",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Title => "Title",
            Field::Description => "Description",
            Field::Location => "Location",
            Field::Dates => "Dates",
            Field::Categories => "Categories",
            Field::Links => "Links",
            Field::GroupLink => "Group link",
            Field::Image => "Image",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Whether a flow still wants input.
pub enum FlowStatus {
    AwaitingInput,
    Finished,
    /// Replace this flow with another one and begin it immediately.
    Handoff(Box<dyn Flow>),
}

/// One update routed into an active flow.
#[derive(Debug, Clone)]
pub enum Input {
    Text(String),
    Photo { file_ref: String },
    Callback { id: String, action: CallbackAction },
}

impl Input {
    pub fn callback_action(&self) -> Option<&CallbackAction> {
        match self {
            Input::Callback { action, .. } => Some(action),
            _ => None,
        }
    }

    pub fn is_cancel(&self) -> bool {
        matches!(
            self.callback_action(),
            Some(CallbackAction::CancelConversation)
        )
    }
}

/// Everything a flow needs to talk to the outside world.
#[derive(Clone)]
pub struct FlowCx {
    pub transport: Arc<dyn Transport>,
    pub stores: Stores,
    pub config: Arc<Config>,
    pub staging: Arc<TemplateStaging>,
    pub moderation: Arc<Moderation>,
    pub actor: ActorInfo,
    /// The venue this conversation happens in.
    pub venue: VenueId,
}

impl FlowCx {
    pub async fn say(&self, text: &str) -> Result<MessageId, FlowError> {
        Ok(self.transport.send_text(self.venue, text, None).await?)
    }

    pub async fn say_kb(&self, text: &str, keyboard: Keyboard) -> Result<MessageId, FlowError> {
        Ok(self
            .transport
            .send_text(self.venue, text, Some(keyboard))
            .await?)
    }

    /// Acknowledge a callback press without a toast. No-op for other input.
    pub async fn ack(&self, input: &Input) -> Result<(), FlowError> {
        if let Input::Callback { id, .. } = input {
            self.transport.answer_callback(id, None).await?;
        }
        Ok(())
    }

    /// Acknowledge a callback press with a toast. No-op for other input.
    pub async fn ack_toast(&self, input: &Input, notice: &str) -> Result<(), FlowError> {
        if let Input::Callback { id, .. } = input {
            self.transport.answer_callback(id, Some(notice)).await?;
        }
        Ok(())
    }

    /// Standard cancellation notice, sent after a cancel button press.
    pub async fn say_cancelled(&self) -> Result<(), FlowError> {
        self.say("❌ Cancelled\\. Nothing was saved\\.").await?;
        Ok(())
    }
}

/// The standard abort button carried by most prompts.
pub fn cancel_button() -> Button {
    Button::new("❌ Cancel", CallbackAction::CancelConversation.encode())
}

/// A one-row keyboard holding just the abort button.
pub fn cancel_keyboard() -> Keyboard {
    Keyboard::new().row(vec![cancel_button()])
}

#[async_trait]
pub trait Flow: Send {
    /// Flow name used in tracing fields.
    fn name(&self) -> &'static str;

    /// Send the opening prompt. A flow may finish immediately, for example
    /// when the actor has nothing to select from.
    async fn begin(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError>;

    async fn on_input(&mut self, input: Input, cx: &FlowCx) -> Result<FlowStatus, FlowError>;
}
