//! Single-field collectors.
//!
//! A collector owns the prompt, validation, and re-prompt loop for one event
//! field. `begin` sends the prompt; `handle` classifies the next update and
//! either keeps waiting, finishes, or reports cancellation. Validation faults
//! never abort the flow: the collector explains the fault and re-prompts.

use url::Url;

use crate::models::{Category, EventDraft, ImageData};
use crate::render::escape;
use crate::routing::actions::CallbackAction;
use crate::transport::{Button, Keyboard};

use super::{cancel_button, cancel_keyboard, Field, FlowCx, FlowError, Input};

pub const TITLE_MAX: usize = 80;
pub const DESCRIPTION_MAX: usize = 405;
/// Relaxed description bound used when instantiating from a template.
pub const DESCRIPTION_MAX_EXTENDED: usize = 550;
pub const LOCATION_MIN: usize = 3;
pub const LOCATION_MAX: usize = 90;
pub const LINK_MAX: usize = 40;
pub const MAX_LINKS: usize = 2;

/// What a collector wants the enclosing flow to do next.
#[derive(Debug, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Still waiting for valid input.
    Continue,
    /// The field was written into the draft.
    Done,
    /// The actor pressed cancel; the flow decides what that means.
    Cancelled,
}

pub enum FieldCollector {
    Title,
    Description { max: usize },
    Location,
    Categories { selected: Vec<Category> },
    Links,
    GroupLink,
    Image,
}

impl FieldCollector {
    /// Collector for `field`, seeded from the draft where state carries over.
    ///
    /// `Field::Dates` has its own state machine and is not built here.
    pub fn for_field(field: Field, draft: &EventDraft, description_max: usize) -> FieldCollector {
        match field {
            Field::Title => FieldCollector::Title,
            Field::Description => FieldCollector::Description {
                max: description_max,
            },
            Field::Location => FieldCollector::Location,
            Field::Categories => FieldCollector::Categories {
                selected: draft.categories.clone(),
            },
            Field::Links => FieldCollector::Links,
            Field::GroupLink => FieldCollector::GroupLink,
            Field::Image => FieldCollector::Image,
            Field::Dates => unreachable!("date collection uses DateTriad"),
        }
    }

    pub fn field(&self) -> Field {
        match self {
            FieldCollector::Title => Field::Title,
            FieldCollector::Description { .. } => Field::Description,
            FieldCollector::Location => Field::Location,
            FieldCollector::Categories { .. } => Field::Categories,
            FieldCollector::Links => Field::Links,
            FieldCollector::GroupLink => Field::GroupLink,
            FieldCollector::Image => Field::Image,
        }
    }

    pub async fn begin(&self, cx: &FlowCx) -> Result<(), FlowError> {
        match self {
            FieldCollector::Title => {
                cx.say_kb(
                    &format!("✏️ Send the event title \\(max {TITLE_MAX} characters\\)\\."),
                    cancel_keyboard(),
                )
                .await?;
            }
            FieldCollector::Description { max } => {
                cx.say_kb(
                    &format!("📝 Send the event description \\(max {max} characters\\)\\."),
                    cancel_keyboard(),
                )
                .await?;
            }
            FieldCollector::Location => {
                cx.say_kb(
                    &format!(
                        "📍 Where does it take place? \\({LOCATION_MIN}\\-{LOCATION_MAX} characters\\)"
                    ),
                    cancel_keyboard(),
                )
                .await?;
            }
            FieldCollector::Categories { selected } => {
                let max = cx.config.max_categories;
                cx.say_kb(
                    &format!("🏷 Pick up to {max} categories, then press Done\\."),
                    category_keyboard(selected),
                )
                .await?;
            }
            FieldCollector::Links => {
                let kb = Keyboard::new()
                    .line("⏭ No links", CallbackAction::SkipLinks.encode())
                    .row(vec![cancel_button()]);
                cx.say_kb(
                    &format!(
                        "🔗 Send up to {MAX_LINKS} links \\(max {LINK_MAX} characters each\\), or reply no\\."
                    ),
                    kb,
                )
                .await?;
            }
            FieldCollector::GroupLink => {
                let kb = Keyboard::new()
                    .line("⏭ No group link", CallbackAction::SkipGroupLink.encode())
                    .row(vec![cancel_button()]);
                cx.say_kb("👥 Send a group chat link, or skip\\.", kb).await?;
            }
            FieldCollector::Image => {
                let kb = Keyboard::new()
                    .line("⏭ No image", CallbackAction::SkipImage.encode())
                    .row(vec![cancel_button()]);
                cx.say_kb("🖼 Send an image for the event, or skip\\.", kb)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn handle(
        &mut self,
        input: &Input,
        draft: &mut EventDraft,
        cx: &FlowCx,
    ) -> Result<CollectOutcome, FlowError> {
        if input.is_cancel() {
            cx.ack(input).await?;
            return Ok(CollectOutcome::Cancelled);
        }

        match self {
            FieldCollector::Title => match input {
                Input::Text(text) => {
                    let text = text.trim();
                    if text.is_empty() || text.chars().count() > TITLE_MAX {
                        cx.say(&format!(
                            "⚠️ The title must be 1\\-{TITLE_MAX} characters\\. Try again\\."
                        ))
                        .await?;
                        self.begin(cx).await?;
                        Ok(CollectOutcome::Continue)
                    } else {
                        draft.title = text.to_string();
                        Ok(CollectOutcome::Done)
                    }
                }
                _ => self.reprompt(cx).await,
            },

            FieldCollector::Description { max } => match input {
                Input::Text(text) => {
                    let limit = *max;
                    let text = text.trim();
                    if text.is_empty() || text.chars().count() > limit {
                        cx.say(&format!(
                            "⚠️ The description must be 1\\-{limit} characters\\. Try again\\."
                        ))
                        .await?;
                        self.begin(cx).await?;
                        Ok(CollectOutcome::Continue)
                    } else {
                        draft.description = text.to_string();
                        Ok(CollectOutcome::Done)
                    }
                }
                _ => self.reprompt(cx).await,
            },

            FieldCollector::Location => match input {
                Input::Text(text) => {
                    let text = text.trim();
                    let len = text.chars().count();
                    if !(LOCATION_MIN..=LOCATION_MAX).contains(&len) {
                        cx.say(&format!(
                            "⚠️ The location must be {LOCATION_MIN}\\-{LOCATION_MAX} characters\\. Try again\\."
                        ))
                        .await?;
                        self.begin(cx).await?;
                        Ok(CollectOutcome::Continue)
                    } else {
                        draft.location = text.to_string();
                        Ok(CollectOutcome::Done)
                    }
                }
                _ => self.reprompt(cx).await,
            },

            FieldCollector::Categories { selected } => match input.callback_action() {
                Some(CallbackAction::Category(label)) => {
                    let Some(category) = Category::from_label(label) else {
                        cx.ack_toast(input, "Unknown category").await?;
                        return Ok(CollectOutcome::Continue);
                    };
                    if let Some(pos) = selected.iter().position(|c| *c == category) {
                        selected.remove(pos);
                        cx.ack_toast(input, &format!("{} removed", category.label()))
                            .await?;
                    } else if selected.len() >= cx.config.max_categories {
                        cx.ack_toast(
                            input,
                            &format!("At most {} categories", cx.config.max_categories),
                        )
                        .await?;
                        return Ok(CollectOutcome::Continue);
                    } else {
                        selected.push(category);
                        cx.ack_toast(input, &format!("{} added", category.label()))
                            .await?;
                    }
                    self.begin(cx).await?;
                    Ok(CollectOutcome::Continue)
                }
                Some(CallbackAction::CategoryReset) => {
                    selected.clear();
                    cx.ack_toast(input, "Selection cleared").await?;
                    self.begin(cx).await?;
                    Ok(CollectOutcome::Continue)
                }
                Some(CallbackAction::CategoryDone) => {
                    if selected.is_empty() {
                        cx.ack_toast(input, "Pick at least one category").await?;
                        Ok(CollectOutcome::Continue)
                    } else {
                        draft.categories = selected.clone();
                        cx.ack_toast(input, "Categories saved").await?;
                        Ok(CollectOutcome::Done)
                    }
                }
                _ => {
                    cx.ack(input).await?;
                    Ok(CollectOutcome::Continue)
                }
            },

            FieldCollector::Links => match input {
                Input::Callback { .. }
                    if input.callback_action() == Some(&CallbackAction::SkipLinks) =>
                {
                    cx.ack(input).await?;
                    draft.links.clear();
                    Ok(CollectOutcome::Done)
                }
                Input::Text(text) => {
                    if text.trim().eq_ignore_ascii_case("no") {
                        draft.links.clear();
                        return Ok(CollectOutcome::Done);
                    }
                    let tokens: Vec<&str> = text.split_whitespace().collect();
                    if tokens.is_empty() {
                        return self.reprompt(cx).await;
                    }
                    if tokens.len() > MAX_LINKS {
                        cx.say(&format!(
                            "⚠️ Send at most {MAX_LINKS} links\\. Try again\\."
                        ))
                        .await?;
                        self.begin(cx).await?;
                        return Ok(CollectOutcome::Continue);
                    }
                    let mut links = Vec::with_capacity(tokens.len());
                    for token in tokens {
                        if token.chars().count() > LINK_MAX {
                            cx.say(&format!(
                                "⚠️ Links may be at most {LINK_MAX} characters\\. Try again\\."
                            ))
                            .await?;
                            self.begin(cx).await?;
                            return Ok(CollectOutcome::Continue);
                        }
                        if Url::parse(token).is_err() {
                            cx.say(&format!(
                                "⚠️ {} is not a valid link\\. Try again\\.",
                                escape(token)
                            ))
                            .await?;
                            self.begin(cx).await?;
                            return Ok(CollectOutcome::Continue);
                        }
                        links.push(token.to_string());
                    }
                    draft.links = links;
                    Ok(CollectOutcome::Done)
                }
                _ => self.reprompt(cx).await,
            },

            FieldCollector::GroupLink => match input {
                Input::Callback { .. }
                    if input.callback_action() == Some(&CallbackAction::SkipGroupLink) =>
                {
                    cx.ack(input).await?;
                    draft.group_link = None;
                    Ok(CollectOutcome::Done)
                }
                Input::Text(text) => {
                    let token = text.split_whitespace().next().unwrap_or("");
                    if token.chars().count() > LINK_MAX || Url::parse(token).is_err() {
                        cx.say("⚠️ That does not look like a valid link\\. Try again\\.")
                            .await?;
                        self.begin(cx).await?;
                        Ok(CollectOutcome::Continue)
                    } else {
                        draft.group_link = Some(token.to_string());
                        Ok(CollectOutcome::Done)
                    }
                }
                _ => self.reprompt(cx).await,
            },

            FieldCollector::Image => match input {
                Input::Callback { .. }
                    if input.callback_action() == Some(&CallbackAction::SkipImage) =>
                {
                    cx.ack(input).await?;
                    draft.image = None;
                    Ok(CollectOutcome::Done)
                }
                Input::Photo { file_ref } => match cx.transport.fetch_attachment(file_ref).await {
                    Ok(bytes) => {
                        draft.image = Some(ImageData::from_bytes(&bytes));
                        Ok(CollectOutcome::Done)
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "attachment fetch failed");
                        cx.say("⚠️ Could not load that image\\. Send it again or skip\\.")
                            .await?;
                        Ok(CollectOutcome::Continue)
                    }
                },
                _ => self.reprompt(cx).await,
            },
        }
    }

    async fn reprompt(&self, cx: &FlowCx) -> Result<CollectOutcome, FlowError> {
        cx.say("⚠️ That is not what I expected here\\.").await?;
        self.begin(cx).await?;
        Ok(CollectOutcome::Continue)
    }
}

fn category_keyboard(selected: &[Category]) -> Keyboard {
    let mut kb = Keyboard::new();
    for chunk in Category::ALL.chunks(3) {
        let row = chunk
            .iter()
            .map(|c| {
                let label = if selected.contains(c) {
                    format!("✅ {}", c.label())
                } else {
                    c.label().to_string()
                };
                Button::new(label, CallbackAction::Category(c.label().to_string()).encode())
            })
            .collect();
        kb = kb.row(row);
    }
    kb.row(vec![
        Button::new("🔄 Reset", CallbackAction::CategoryReset.encode()),
        Button::new("✔️ Done", CallbackAction::CategoryDone.encode()),
    ])
    .row(vec![cancel_button()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_cx;

    fn text(s: &str) -> Input {
        Input::Text(s.to_string())
    }

    fn press(action: CallbackAction) -> Input {
        Input::Callback {
            id: "cb".into(),
            action,
        }
    }

    #[tokio::test]
    async fn title_rejects_overlong_then_accepts() {
        let (cx, _transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut collector = FieldCollector::Title;

        let long = "x".repeat(TITLE_MAX + 1);
        assert_eq!(
            collector.handle(&text(&long), &mut draft, &cx).await.unwrap(),
            CollectOutcome::Continue
        );
        assert!(draft.title.is_empty());

        assert_eq!(
            collector
                .handle(&text("Jazz Night"), &mut draft, &cx)
                .await
                .unwrap(),
            CollectOutcome::Done
        );
        assert_eq!(draft.title, "Jazz Night");
    }

    #[tokio::test]
    async fn location_enforces_both_bounds() {
        let (cx, _transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut collector = FieldCollector::Location;

        assert_eq!(
            collector.handle(&text("ab"), &mut draft, &cx).await.unwrap(),
            CollectOutcome::Continue
        );
        let long = "x".repeat(LOCATION_MAX + 1);
        assert_eq!(
            collector.handle(&text(&long), &mut draft, &cx).await.unwrap(),
            CollectOutcome::Continue
        );
        assert_eq!(
            collector
                .handle(&text("Town Hall"), &mut draft, &cx)
                .await
                .unwrap(),
            CollectOutcome::Done
        );
    }

    #[tokio::test]
    async fn links_reprompt_on_extra_tokens_instead_of_dropping() {
        let (cx, transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut collector = FieldCollector::Links;

        assert_eq!(
            collector
                .handle(
                    &text("https://a.example https://b.example https://c.example"),
                    &mut draft,
                    &cx
                )
                .await
                .unwrap(),
            CollectOutcome::Continue
        );
        assert!(draft.links.is_empty());
        assert!(transport
            .sent_to(cx.venue)
            .iter()
            .any(|m| m.text.contains("at most 2 links")));

        assert_eq!(
            collector
                .handle(&text("https://a.example https://b.example"), &mut draft, &cx)
                .await
                .unwrap(),
            CollectOutcome::Done
        );
        assert_eq!(draft.links, vec!["https://a.example", "https://b.example"]);
    }

    #[tokio::test]
    async fn links_reject_invalid_url() {
        let (cx, _transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut collector = FieldCollector::Links;

        assert_eq!(
            collector
                .handle(&text("not-a-url"), &mut draft, &cx)
                .await
                .unwrap(),
            CollectOutcome::Continue
        );
        assert!(draft.links.is_empty());
    }

    #[tokio::test]
    async fn links_no_reply_clears() {
        let (cx, _transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        draft.links = vec!["https://old.example".into()];
        let mut collector = FieldCollector::Links;

        assert_eq!(
            collector.handle(&text("No"), &mut draft, &cx).await.unwrap(),
            CollectOutcome::Done
        );
        assert!(draft.links.is_empty());
    }

    #[tokio::test]
    async fn categories_toggle_and_cap() {
        let (cx, _transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut collector = FieldCollector::Categories { selected: vec![] };

        for label in ["Music", "Art", "Dance"] {
            assert_eq!(
                collector
                    .handle(
                        &press(CallbackAction::Category(label.into())),
                        &mut draft,
                        &cx
                    )
                    .await
                    .unwrap(),
                CollectOutcome::Continue
            );
        }
        // Cap reached, fourth selection bounces.
        assert_eq!(
            collector
                .handle(
                    &press(CallbackAction::Category("Sport".into())),
                    &mut draft,
                    &cx
                )
                .await
                .unwrap(),
            CollectOutcome::Continue
        );
        // Re-tap deselects.
        collector
            .handle(
                &press(CallbackAction::Category("Art".into())),
                &mut draft,
                &cx,
            )
            .await
            .unwrap();

        assert_eq!(
            collector
                .handle(&press(CallbackAction::CategoryDone), &mut draft, &cx)
                .await
                .unwrap(),
            CollectOutcome::Done
        );
        assert_eq!(draft.categories, vec![Category::Music, Category::Dance]);
    }

    #[tokio::test]
    async fn empty_category_selection_cannot_finish() {
        let (cx, _transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut collector = FieldCollector::Categories { selected: vec![] };
        assert_eq!(
            collector
                .handle(&press(CallbackAction::CategoryDone), &mut draft, &cx)
                .await
                .unwrap(),
            CollectOutcome::Continue
        );
    }

    #[tokio::test]
    async fn image_fetch_failure_is_retryable() {
        let (cx, transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut collector = FieldCollector::Image;

        assert_eq!(
            collector
                .handle(
                    &Input::Photo {
                        file_ref: "missing".into()
                    },
                    &mut draft,
                    &cx
                )
                .await
                .unwrap(),
            CollectOutcome::Continue
        );

        transport.stage_attachment("ok", vec![1, 2, 3]);
        assert_eq!(
            collector
                .handle(
                    &Input::Photo {
                        file_ref: "ok".into()
                    },
                    &mut draft,
                    &cx
                )
                .await
                .unwrap(),
            CollectOutcome::Done
        );
        assert!(draft.image.is_some());
    }

    #[tokio::test]
    async fn cancel_button_cancels() {
        let (cx, _transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut collector = FieldCollector::Title;
        assert_eq!(
            collector
                .handle(&press(CallbackAction::CancelConversation), &mut draft, &cx)
                .await
                .unwrap(),
            CollectOutcome::Cancelled
        );
    }
}
