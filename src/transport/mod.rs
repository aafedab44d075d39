//! Chat-transport contract.
//!
//! The crate never talks to a concrete chat platform; everything goes through
//! [`Transport`]. The bundled [`RecordingTransport`] is a loopback
//! implementation that records traffic for tests and local runs.

mod recording;

pub use recording::{RecordingTransport, SentMessage};

use async_trait::async_trait;

use crate::models::{ActorInfo, ImageData, MessageId, VenueId};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("edit failed: {0}")]
    EditFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("attachment fetch failed: {0}")]
    FetchFailed(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// One inline button: a label and the callback data it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: String,
}

impl Button {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

/// Inline keyboard attached to an outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    /// Convenience for a full-width single button.
    pub fn line(self, label: impl Into<String>, action: impl Into<String>) -> Self {
        self.row(vec![Button::new(label, action)])
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(
        &self,
        venue: VenueId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> TransportResult<MessageId>;

    async fn send_photo(
        &self,
        venue: VenueId,
        image: &ImageData,
        caption: &str,
        keyboard: Option<Keyboard>,
    ) -> TransportResult<MessageId>;

    async fn edit_text(
        &self,
        venue: VenueId,
        message_id: MessageId,
        text: &str,
    ) -> TransportResult<()>;

    async fn delete_message(&self, venue: VenueId, message_id: MessageId) -> TransportResult<()>;

    /// Acknowledge a callback press, with an optional toast shown to the actor.
    async fn answer_callback(&self, callback_id: &str, notice: Option<&str>)
        -> TransportResult<()>;

    /// Resolve a transport file reference into raw bytes.
    async fn fetch_attachment(&self, file_ref: &str) -> TransportResult<Vec<u8>>;
}

/// One inbound update from the transport.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub actor: ActorInfo,
    pub venue: VenueId,
    pub kind: IncomingKind,
}

#[derive(Debug, Clone)]
pub enum IncomingKind {
    /// A slash command, name without the slash.
    Command(String),
    Text(String),
    Photo { file_ref: String },
    Callback { id: String, data: String },
}

impl Incoming {
    pub fn command(actor: ActorInfo, venue: VenueId, name: &str) -> Self {
        Self {
            actor,
            venue,
            kind: IncomingKind::Command(name.trim_start_matches('/').to_string()),
        }
    }

    pub fn text(actor: ActorInfo, venue: VenueId, text: impl Into<String>) -> Self {
        Self {
            actor,
            venue,
            kind: IncomingKind::Text(text.into()),
        }
    }

    pub fn photo(actor: ActorInfo, venue: VenueId, file_ref: impl Into<String>) -> Self {
        Self {
            actor,
            venue,
            kind: IncomingKind::Photo {
                file_ref: file_ref.into(),
            },
        }
    }

    pub fn callback(actor: ActorInfo, venue: VenueId, data: impl Into<String>) -> Self {
        Self {
            actor,
            venue,
            kind: IncomingKind::Callback {
                id: uuid::Uuid::new_v4().to_string(),
                data: data.into(),
            },
        }
    }
}
