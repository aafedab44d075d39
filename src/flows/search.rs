//! Public event search by day.
//!
//! A day search returns published events overlapping that calendar day in the
//! configured timezone. Events stay visible until two hours after they end.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::render::{
    escape, format_event, format_local_date, EventCard, RenderTarget, CAPTION_LIMIT,
};
use crate::routing::actions::CallbackAction;
use crate::transport::{Button, Keyboard};

use super::{Flow, FlowCx, FlowError, FlowStatus, Input};

/// How long after its end an event keeps showing up in results.
fn linger() -> Duration {
    Duration::hours(2)
}

enum Step {
    Menu,
    AwaitDate,
}

pub struct SearchFlow {
    step: Step,
}

impl SearchFlow {
    pub fn new() -> Self {
        Self { step: Step::Menu }
    }

    async fn run_search(&self, date: NaiveDate, cx: &FlowCx) -> Result<(), FlowError> {
        let tz = cx.config.timezone;
        let day_start_local = date.and_time(NaiveTime::MIN);
        let day_start = match tz.from_local_datetime(&day_start_local).earliest() {
            Some(local) => local.with_timezone(&Utc),
            // Midnight falls into a DST gap; anchor on the UTC reading.
            None => Utc.from_utc_datetime(&day_start_local),
        };
        let day_end = day_start + Duration::days(1) - Duration::seconds(1);
        let floor = Utc::now() - linger();

        let events = cx.stores.events.find_for_day(day_start, day_end, floor).await?;
        let date_label = escape(&format_local_date(day_start, &cx.config));
        if events.is_empty() {
            cx.say(&format!("🤷 Nothing found for {date_label}\\.")).await?;
            return Ok(());
        }
        cx.say(&format!(
            "🔎 {} event\\(s\\) on {date_label}:",
            events.len()
        ))
        .await?;

        let total = events.len();
        for (i, event) in events.iter().enumerate() {
            let card = EventCard::from(event);
            let target = RenderTarget::Listing {
                index: i + 1,
                total,
            };
            let text = format_event(&card, &cx.config, &target);
            let result = match &event.image {
                Some(image) if text.chars().count() <= CAPTION_LIMIT => cx
                    .transport
                    .send_photo(cx.venue, image, &text, None)
                    .await
                    .map(|_| ()),
                _ => cx.transport.send_text(cx.venue, &text, None).await.map(|_| ()),
            };
            // One broken rendering must not swallow the rest of the results.
            if let Err(err) = result {
                tracing::warn!(event_id = %event.id, error = %err, "search result delivery failed");
            }
        }
        Ok(())
    }
}

impl Default for SearchFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Flow for SearchFlow {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn begin(&mut self, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        let kb = Keyboard::new()
            .row(vec![
                Button::new("📅 Today", CallbackAction::SearchToday.encode()),
                Button::new("📆 Tomorrow", CallbackAction::SearchTomorrow.encode()),
            ])
            .line("🗓 Pick a date", CallbackAction::SearchSpecificDate.encode())
            .line("🚪 Exit", CallbackAction::SearchExit.encode());
        cx.say_kb("🔎 What day are you interested in?", kb).await?;
        Ok(FlowStatus::AwaitingInput)
    }

    async fn on_input(&mut self, input: Input, cx: &FlowCx) -> Result<FlowStatus, FlowError> {
        match self.step {
            Step::Menu => match input.callback_action() {
                Some(CallbackAction::SearchToday) => {
                    cx.ack(&input).await?;
                    let today = Utc::now().with_timezone(&cx.config.timezone).date_naive();
                    self.run_search(today, cx).await?;
                    Ok(FlowStatus::Finished)
                }
                Some(CallbackAction::SearchTomorrow) => {
                    cx.ack(&input).await?;
                    let tomorrow = (Utc::now().with_timezone(&cx.config.timezone)
                        + Duration::days(1))
                    .date_naive();
                    self.run_search(tomorrow, cx).await?;
                    Ok(FlowStatus::Finished)
                }
                Some(CallbackAction::SearchSpecificDate) => {
                    cx.ack(&input).await?;
                    let kb = Keyboard::new()
                        .line("❌ Cancel", CallbackAction::SearchDateCancel.encode());
                    cx.say_kb(
                        &format!(
                            "🗓 Send a date like {}\\.",
                            escape(
                                &Utc::now()
                                    .with_timezone(&cx.config.timezone)
                                    .format(&cx.config.date_only_format)
                                    .to_string()
                            )
                        ),
                        kb,
                    )
                    .await?;
                    self.step = Step::AwaitDate;
                    Ok(FlowStatus::AwaitingInput)
                }
                Some(CallbackAction::SearchExit | CallbackAction::CancelConversation) => {
                    cx.ack(&input).await?;
                    cx.say("👋 Closed the search\\.").await?;
                    Ok(FlowStatus::Finished)
                }
                _ => {
                    cx.ack(&input).await?;
                    Ok(FlowStatus::AwaitingInput)
                }
            },
            Step::AwaitDate => match &input {
                Input::Text(text) => {
                    match NaiveDate::parse_from_str(text.trim(), &cx.config.date_only_format) {
                        Ok(date) => {
                            self.run_search(date, cx).await?;
                            Ok(FlowStatus::Finished)
                        }
                        Err(_) => {
                            cx.say("⚠️ I could not read that date\\. Try again\\.").await?;
                            Ok(FlowStatus::AwaitingInput)
                        }
                    }
                }
                _ => {
                    if matches!(
                        input.callback_action(),
                        Some(
                            CallbackAction::SearchDateCancel | CallbackAction::CancelConversation
                        )
                    ) {
                        cx.ack(&input).await?;
                        cx.say_cancelled().await?;
                        return Ok(FlowStatus::Finished);
                    }
                    cx.ack(&input).await?;
                    Ok(FlowStatus::AwaitingInput)
                }
            },
        }
    }
}
