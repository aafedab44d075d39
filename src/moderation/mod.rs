//! Event lifecycle service.
//!
//! Approval, rejection, publication, push, deletion, and the ban hammer all
//! live here. Flows and the router call in; everything venue-facing degrades
//! gracefully: a failed side message is logged, never propagated into the
//! actor's conversation.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::config::Config;
use crate::models::{
    ActorInfo, BlacklistedUser, Event, EventStatus, MessageId, VenueId,
};
use crate::render::{
    escape, format_caption, format_event, format_overflow, EventCard, RenderTarget, CAPTION_LIMIT,
};
use crate::routing::actions::CallbackAction;
use crate::store::{StoreError, Stores};
use crate::transport::{Button, Keyboard, Transport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("event {0} is not in a publishable state")]
    NotPublishable(String),
}

/// How a publish request reached the public venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A fresh post went out.
    Posted,
    /// The existing post was edited in place.
    Edited,
    /// The existing post could not be edited and was replaced by a new one.
    Replaced,
}

/// What a reject request ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectOutcome {
    Rejected,
    NotFound,
    /// The event is live in the public venue; rejecting it now would leave
    /// the stored pointer at a post nobody moderated away.
    AlreadyPublished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanOutcome {
    Banned,
    AlreadyBanned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnbanOutcome {
    Removed,
    NotListed,
}

pub struct Moderation {
    transport: Arc<dyn Transport>,
    stores: Stores,
    config: Arc<Config>,
}

impl Moderation {
    pub fn new(transport: Arc<dyn Transport>, stores: Stores, config: Arc<Config>) -> Self {
        Self {
            transport,
            stores,
            config,
        }
    }

    /// Post a review notice with approve/reject buttons to the admin venue.
    pub async fn notify_admins(&self, event: &Event, is_edit: bool) -> Result<(), ModerationError> {
        let kb = Keyboard::new().row(vec![
            Button::new("✅ Approve", CallbackAction::Approve(event.id.clone()).encode()),
            Button::new("❌ Reject", CallbackAction::Reject(event.id.clone()).encode()),
        ]);
        let target = RenderTarget::Admin {
            is_edit,
            is_push: false,
        };
        self.send_card(self.config.admin_venue, &event.into(), &target, Some(kb))
            .await?;
        Ok(())
    }

    /// Handle an approve button press. Idempotent: approving an event that is
    /// live in the public venue is a no-op with its own toast. An approved
    /// event without a message identity had its publish fail, so a repeat
    /// press retries the publication instead.
    pub async fn approve(&self, event_id: &str, callback_id: &str) -> Result<(), ModerationError> {
        let Some(mut event) = self.stores.events.find_by_id(event_id).await? else {
            self.toast(callback_id, "Event not found").await;
            return Ok(());
        };
        if event.status.is_published() && event.message_id.is_some() {
            self.toast(callback_id, "Already published").await;
            return Ok(());
        }
        event.status = match event.status {
            EventStatus::Pending | EventStatus::Rejected => EventStatus::Approved,
            EventStatus::EditedPending => EventStatus::EditedApproved,
            published => published,
        };
        // Re-approval wipes any earlier rejection.
        event.rejection_reason = None;
        event.updated_at = Utc::now();
        self.stores.events.update(&event).await?;

        match self.publish(&event).await {
            Ok(outcome) => {
                tracing::info!(event_id = %event.id, ?outcome, "event approved");
                self.toast(callback_id, "Approved").await;
                self.side_message(
                    self.config.admin_venue,
                    &format!("✅ Published: {}", escape(&event.title)),
                )
                .await;
            }
            Err(err) => {
                tracing::error!(event_id = %event.id, error = %err, "publish after approval failed");
                self.toast(callback_id, "Approved, but publishing failed").await;
            }
        }
        Ok(())
    }

    /// Persist a rejection and notify the submitter best-effort. Only events
    /// still under review can be rejected; a stale reject button pressed
    /// after publication bounces instead of flipping a live event.
    pub async fn reject(
        &self,
        event_id: &str,
        reason: &str,
    ) -> Result<RejectOutcome, ModerationError> {
        let Some(mut event) = self.stores.events.find_by_id(event_id).await? else {
            return Ok(RejectOutcome::NotFound);
        };
        if event.status.is_published() {
            tracing::debug!(event_id = %event.id, "stale reject on a published event");
            return Ok(RejectOutcome::AlreadyPublished);
        }
        event.status = EventStatus::Rejected;
        event.rejection_reason = Some(reason.to_string());
        event.updated_at = Utc::now();
        self.stores.events.update(&event).await?;
        tracing::info!(event_id = %event.id, "event rejected");

        // Fire-and-forget: the submitter may have blocked the bot.
        self.side_message(
            event.submitter_id,
            &format!(
                "😔 Your event *{}* was not approved\\.\nReason: {}",
                escape(&event.title),
                escape(reason)
            ),
        )
        .await;
        Ok(RejectOutcome::Rejected)
    }

    /// Publish dispatch. Approved posts fresh, edited-approved replaces the
    /// live posting. Message identities are persisted on the event row.
    pub async fn publish(&self, event: &Event) -> Result<PublishOutcome, ModerationError> {
        let mut event = event.clone();
        let outcome = match event.status {
            EventStatus::Approved => {
                self.post_new(&mut event).await?;
                PublishOutcome::Posted
            }
            EventStatus::EditedApproved => self.replace(&mut event).await?,
            _ => return Err(ModerationError::NotPublishable(event.id.clone())),
        };
        self.post_management_message(&event).await;
        Ok(outcome)
    }

    async fn post_new(&self, event: &mut Event) -> Result<(), ModerationError> {
        let (message_id, description_message_id) = self
            .send_card(
                self.config.public_venue,
                &(&*event).into(),
                &RenderTarget::Channel,
                None,
            )
            .await?;
        event.message_id = Some(message_id);
        event.description_message_id = description_message_id;
        event.updated_at = Utc::now();
        self.stores.events.update(event).await?;
        Ok(())
    }

    async fn replace(&self, event: &mut Event) -> Result<PublishOutcome, ModerationError> {
        // Text-only posts can be edited in place; anything with an image or a
        // split caption is reposted.
        if let (Some(message_id), None, None) =
            (event.message_id, event.description_message_id, event.image.as_ref())
        {
            let text = format_event(&(&*event).into(), &self.config, &RenderTarget::Channel);
            match self
                .transport
                .edit_text(self.config.public_venue, message_id, &text)
                .await
            {
                Ok(()) => return Ok(PublishOutcome::Edited),
                Err(err) => {
                    tracing::warn!(event_id = %event.id, error = %err, "in-place edit failed, reposting");
                }
            }
        }

        let had_posting = event.message_id.is_some();
        self.take_down_posting(event).await?;
        match self.post_new(event).await {
            Ok(()) => Ok(if had_posting {
                PublishOutcome::Replaced
            } else {
                PublishOutcome::Posted
            }),
            Err(err) => {
                // The old post is gone and the new one never landed; the
                // cleared identity is already persisted so the store does not
                // point at a deleted message.
                tracing::error!(event_id = %event.id, error = %err, "repost failed, posting state inconsistent");
                Err(err)
            }
        }
    }

    /// Delete the live messages best-effort and persist the cleared identity.
    async fn take_down_posting(&self, event: &mut Event) -> Result<(), ModerationError> {
        for message_id in [event.message_id, event.description_message_id]
            .into_iter()
            .flatten()
        {
            if let Err(err) = self
                .transport
                .delete_message(self.config.public_venue, message_id)
                .await
            {
                tracing::warn!(event_id = %event.id, message_id, error = %err, "message deletion failed");
            }
        }
        event.message_id = None;
        event.description_message_id = None;
        self.stores.events.update(event).await?;
        Ok(())
    }

    /// Admin management message, reposted after every publish change so the
    /// newest post always has a delete handle next to it.
    async fn post_management_message(&self, event: &Event) {
        let kb = Keyboard::new().row(vec![
            Button::new("🗑 Delete", CallbackAction::AdminDelete(event.id.clone()).encode()),
            Button::new(
                "🚫 Ban & delete",
                CallbackAction::AdminBanDelete(event.id.clone()).encode(),
            ),
        ]);
        let text = format!(
            "🛠 Manage *{}* by {}",
            escape(&event.title),
            escape(&event.submitter_name)
        );
        if let Err(err) = self
            .transport
            .send_text(self.config.admin_venue, &text, Some(kb))
            .await
        {
            tracing::warn!(event_id = %event.id, error = %err, "management message failed");
        }
    }

    /// Remove an event and its live posting. Reports the result to
    /// `reply_venue` when given. Returns whether a row was removed.
    pub async fn delete_event(
        &self,
        event_id: &str,
        reply_venue: Option<VenueId>,
    ) -> Result<bool, ModerationError> {
        let Some(mut event) = self.stores.events.find_by_id(event_id).await? else {
            if let Some(venue) = reply_venue {
                self.side_message(venue, "⚠️ This event no longer exists\\.").await;
            }
            return Ok(false);
        };
        self.take_down_posting(&mut event).await?;
        match self.stores.events.delete(event_id).await {
            Ok(()) | Err(StoreError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }
        tracing::info!(event_id, "event deleted");
        if let Some(venue) = reply_venue {
            self.side_message(
                venue,
                &format!("🗑 Deleted: {}", escape(&event.title)),
            )
            .await;
        }
        Ok(true)
    }

    /// Re-publish an event to the top of the public venue, once per lifetime.
    /// Every ineligibility has its own verbatim outcome message.
    pub async fn push_event(
        &self,
        event_id: &str,
        reply_venue: VenueId,
    ) -> Result<(), ModerationError> {
        let Some(mut event) = self.stores.events.find_by_id(event_id).await? else {
            self.side_message(reply_venue, "⚠️ This event no longer exists\\.").await;
            return Ok(());
        };
        let now = Utc::now();
        if event.pushed_count > 0 {
            self.side_message(reply_venue, "⚠️ This event was already pushed once\\.")
                .await;
            return Ok(());
        }
        if event.created_at > now - Duration::days(self.config.push_min_age_days) {
            self.side_message(
                reply_venue,
                &format!(
                    "⚠️ Events can be pushed once they are {} days old\\.",
                    self.config.push_min_age_days
                ),
            )
            .await;
            return Ok(());
        }
        if event.end_date <= now {
            self.side_message(reply_venue, "⚠️ This event has already ended\\.").await;
            return Ok(());
        }
        if !event.status.is_published() {
            self.side_message(reply_venue, "⚠️ Only published events can be pushed\\.")
                .await;
            return Ok(());
        }

        self.take_down_posting(&mut event).await?;
        self.post_new(&mut event).await?;
        event.pushed_at = Some(now);
        event.pushed_count += 1;
        self.stores.events.update(&event).await?;
        tracing::info!(event_id = %event.id, "event pushed");

        let target = RenderTarget::Admin {
            is_edit: false,
            is_push: true,
        };
        if let Err(err) = self
            .send_card(self.config.admin_venue, &(&event).into(), &target, None)
            .await
        {
            tracing::warn!(event_id = %event.id, error = %err, "push admin notice failed");
        }
        self.post_management_message(&event).await;
        self.side_message(reply_venue, "📣 Your event was pushed\\!").await;
        Ok(())
    }

    pub async fn ban_user(
        &self,
        target: i64,
        target_name: Option<String>,
        reason: Option<String>,
        admin: &ActorInfo,
    ) -> Result<BanOutcome, ModerationError> {
        let entry = BlacklistedUser {
            user_id: target,
            user_name: target_name,
            banned_by: Some(admin.id),
            banned_by_name: Some(admin.display_name.clone()),
            reason,
            banned_at: Utc::now(),
        };
        match self.stores.blacklist.insert(entry).await {
            Ok(()) => {
                tracing::info!(target, admin_id = admin.id, "actor banned");
                Ok(BanOutcome::Banned)
            }
            Err(StoreError::AlreadyExists) => Ok(BanOutcome::AlreadyBanned),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn unban_user(&self, target: i64) -> Result<UnbanOutcome, ModerationError> {
        match self.stores.blacklist.remove(target).await {
            Ok(()) => {
                tracing::info!(target, "actor unbanned");
                Ok(UnbanOutcome::Removed)
            }
            Err(StoreError::NotFound) => Ok(UnbanOutcome::NotListed),
            Err(err) => Err(err.into()),
        }
    }

    /// Ban the submitter, then delete the event. Strictly in that order; if
    /// the ban does not land, the event stays and one combined failure
    /// message is sent.
    pub async fn ban_and_delete(
        &self,
        event_id: &str,
        admin: &ActorInfo,
        reply_venue: VenueId,
    ) -> Result<(), ModerationError> {
        let Some(event) = self.stores.events.find_by_id(event_id).await? else {
            self.side_message(reply_venue, "⚠️ This event no longer exists\\.").await;
            return Ok(());
        };
        let ban = self
            .ban_user(
                event.submitter_id,
                Some(event.submitter_name.clone()),
                Some(format!("banned while removing event {event_id}")),
                admin,
            )
            .await;
        match ban {
            Ok(BanOutcome::Banned) => {
                self.delete_event(event_id, None).await?;
                self.side_message(
                    reply_venue,
                    &format!(
                        "🚫 {} was banned and the event was deleted\\.",
                        escape(&event.submitter_name)
                    ),
                )
                .await;
            }
            Ok(BanOutcome::AlreadyBanned) => {
                self.side_message(
                    reply_venue,
                    "⚠️ The submitter is already banned; the event was left in place\\.",
                )
                .await;
            }
            Err(err) => {
                tracing::error!(event_id, error = %err, "ban failed");
                self.side_message(
                    reply_venue,
                    "⚠️ The ban failed; the event was left in place\\.",
                )
                .await;
            }
        }
        Ok(())
    }

    /// Render an event card into a venue, splitting oversized captions into
    /// a photo plus a follow-up text message.
    async fn send_card(
        &self,
        venue: VenueId,
        card: &EventCard<'_>,
        target: &RenderTarget,
        keyboard: Option<Keyboard>,
    ) -> Result<(MessageId, Option<MessageId>), ModerationError> {
        let text = format_event(card, &self.config, target);
        match card.image {
            Some(image) if text.chars().count() <= CAPTION_LIMIT => {
                let id = self
                    .transport
                    .send_photo(venue, image, &text, keyboard)
                    .await?;
                Ok((id, None))
            }
            Some(image) => {
                let caption = format_caption(card, &self.config, target);
                let id = self.transport.send_photo(venue, image, &caption, None).await?;
                let overflow_id = self
                    .transport
                    .send_text(venue, &format_overflow(card), keyboard)
                    .await?;
                Ok((id, Some(overflow_id)))
            }
            None => {
                let id = self.transport.send_text(venue, &text, keyboard).await?;
                Ok((id, None))
            }
        }
    }

    async fn toast(&self, callback_id: &str, notice: &str) {
        if let Err(err) = self.transport.answer_callback(callback_id, Some(notice)).await {
            tracing::warn!(error = %err, "callback answer failed");
        }
    }

    async fn side_message(&self, venue: VenueId, text: &str) {
        if let Err(err) = self.transport.send_text(venue, text, None).await {
            tracing::warn!(venue, error = %err, "side message failed");
        }
    }
}
