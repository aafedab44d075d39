//! Loopback transport that records everything it is asked to deliver.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::models::{ImageData, MessageId, VenueId};

use super::{Keyboard, Transport, TransportError, TransportResult};

/// A message the recorder accepted for delivery.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub id: MessageId,
    pub venue: VenueId,
    pub text: String,
    pub has_image: bool,
    pub keyboard: Option<Keyboard>,
}

#[derive(Default)]
pub struct RecordingTransport {
    next_id: AtomicI64,
    sent: Mutex<Vec<SentMessage>>,
    edited: Mutex<Vec<(VenueId, MessageId, String)>>,
    deleted: Mutex<Vec<(VenueId, MessageId)>>,
    toasts: Mutex<Vec<(String, Option<String>)>>,
    attachments: Mutex<HashMap<String, Vec<u8>>>,
    fail_edits: AtomicBool,
    fail_sends_to: Mutex<HashSet<VenueId>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    /// Register bytes behind a file reference for `fetch_attachment`.
    pub fn stage_attachment(&self, file_ref: impl Into<String>, bytes: Vec<u8>) {
        self.attachments.lock().insert(file_ref.into(), bytes);
    }

    /// Make every subsequent `edit_text` fail.
    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent send to `venue` fail.
    pub fn fail_sends_to(&self, venue: VenueId) {
        self.fail_sends_to.lock().insert(venue);
    }

    /// Undo [`RecordingTransport::fail_sends_to`] for `venue`.
    pub fn allow_sends_to(&self, venue: VenueId) {
        self.fail_sends_to.lock().remove(&venue);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, venue: VenueId) -> Vec<SentMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.venue == venue)
            .cloned()
            .collect()
    }

    pub fn last_sent_to(&self, venue: VenueId) -> Option<SentMessage> {
        self.sent_to(venue).into_iter().last()
    }

    pub fn edited(&self) -> Vec<(VenueId, MessageId, String)> {
        self.edited.lock().clone()
    }

    pub fn deleted(&self) -> Vec<(VenueId, MessageId)> {
        self.deleted.lock().clone()
    }

    pub fn toasts(&self) -> Vec<(String, Option<String>)> {
        self.toasts.lock().clone()
    }

    fn record_send(
        &self,
        venue: VenueId,
        text: &str,
        has_image: bool,
        keyboard: Option<Keyboard>,
    ) -> TransportResult<MessageId> {
        if self.fail_sends_to.lock().contains(&venue) {
            return Err(TransportError::SendFailed(format!(
                "venue {venue} unavailable"
            )));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().push(SentMessage {
            id,
            venue,
            text: text.to_string(),
            has_image,
            keyboard,
        });
        Ok(id)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(
        &self,
        venue: VenueId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> TransportResult<MessageId> {
        self.record_send(venue, text, false, keyboard)
    }

    async fn send_photo(
        &self,
        venue: VenueId,
        _image: &ImageData,
        caption: &str,
        keyboard: Option<Keyboard>,
    ) -> TransportResult<MessageId> {
        self.record_send(venue, caption, true, keyboard)
    }

    async fn edit_text(
        &self,
        venue: VenueId,
        message_id: MessageId,
        text: &str,
    ) -> TransportResult<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(TransportError::EditFailed("edit rejected".into()));
        }
        let known = self
            .sent
            .lock()
            .iter()
            .any(|m| m.venue == venue && m.id == message_id);
        if !known {
            return Err(TransportError::EditFailed(format!(
                "message {message_id} not found in venue {venue}"
            )));
        }
        self.edited.lock().push((venue, message_id, text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, venue: VenueId, message_id: MessageId) -> TransportResult<()> {
        self.deleted.lock().push((venue, message_id));
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        notice: Option<&str>,
    ) -> TransportResult<()> {
        self.toasts
            .lock()
            .push((callback_id.to_string(), notice.map(str::to_string)));
        Ok(())
    }

    async fn fetch_attachment(&self, file_ref: &str) -> TransportResult<Vec<u8>> {
        self.attachments
            .lock()
            .get(file_ref)
            .cloned()
            .ok_or_else(|| TransportError::FetchFailed(format!("unknown file ref {file_ref}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn message_ids_are_monotonic() {
        let transport = RecordingTransport::new();
        let a = transport.send_text(1, "first", None).await.unwrap();
        let b = transport.send_text(1, "second", None).await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn edits_require_a_known_message() {
        let transport = RecordingTransport::new();
        let id = transport.send_text(5, "hello", None).await.unwrap();
        transport.edit_text(5, id, "hello again").await.unwrap();
        assert!(transport.edit_text(5, id + 100, "nope").await.is_err());
    }
}
