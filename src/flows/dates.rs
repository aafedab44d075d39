//! Three-date collection: doors-open, start, end.
//!
//! Input is parsed as wall-clock time in the configured timezone. Each date
//! must lie in the future; ordering is doors <= start < end. An ordering
//! violation re-prompts the step that violated it. Nothing touches the draft
//! until the actor confirms the checkpoint, at which point all three commit
//! atomically. Reset at the checkpoint restarts from the first date.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::EventDraft;
use crate::render::{escape, format_local};
use crate::routing::actions::CallbackAction;
use crate::transport::{Button, Keyboard};

use super::{cancel_button, cancel_keyboard, FlowCx, FlowError, Input};

#[derive(Debug, PartialEq, Eq)]
pub enum TriadOutcome {
    Continue,
    Done,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Entry,
    Start,
    End,
    Confirm,
}

enum ParseFault {
    Format,
    Past,
}

pub struct DateTriad {
    stage: Stage,
    entry: Option<DateTime<Utc>>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl Default for DateTriad {
    fn default() -> Self {
        Self::new()
    }
}

impl DateTriad {
    pub fn new() -> Self {
        Self {
            stage: Stage::Entry,
            entry: None,
            start: None,
            end: None,
        }
    }

    pub async fn begin(&self, cx: &FlowCx) -> Result<(), FlowError> {
        self.prompt(cx).await
    }

    async fn prompt(&self, cx: &FlowCx) -> Result<(), FlowError> {
        let fmt = escape(&example_stamp(cx));
        match self.stage {
            Stage::Entry => {
                cx.say_kb(
                    &format!("🚪 When do doors open? Send it like {fmt}\\."),
                    cancel_keyboard(),
                )
                .await?;
            }
            Stage::Start => {
                cx.say_kb(
                    &format!("▶️ When does the event start? Send it like {fmt}\\."),
                    cancel_keyboard(),
                )
                .await?;
            }
            Stage::End => {
                cx.say_kb(
                    &format!("⏹ When does the event end? Send it like {fmt}\\."),
                    cancel_keyboard(),
                )
                .await?;
            }
            Stage::Confirm => {
                // All three are set when we reach the checkpoint.
                let (entry, start, end) = (self.entry, self.start, self.end);
                let line = |dt: Option<DateTime<Utc>>| {
                    dt.map(|d| escape(&format_local(d, &cx.config)))
                        .unwrap_or_else(|| "—".to_string())
                };
                let kb = Keyboard::new()
                    .row(vec![
                        Button::new("✔️ Confirm", CallbackAction::DatesConfirm.encode()),
                        Button::new("🔄 Start over", CallbackAction::DatesReset.encode()),
                    ])
                    .row(vec![cancel_button()]);
                cx.say_kb(
                    &format!(
                        "🗓 Please check the dates:\n\n🚪 Doors: {}\n▶️ Start: {}\n⏹ End: {}",
                        line(entry),
                        line(start),
                        line(end)
                    ),
                    kb,
                )
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
    ) -> Result<TriadOutcome, FlowError> {
        if input.is_cancel() {
            cx.ack(input).await?;
            return Ok(TriadOutcome::Cancelled);
        }

        match self.stage {
            Stage::Entry | Stage::Start | Stage::End => {
                let Input::Text(text) = input else {
                    if let Some(
                        CallbackAction::DatesConfirm | CallbackAction::DatesReset,
                    ) = input.callback_action()
                    {
                        // Stale checkpoint button after a reset.
                        cx.ack(input).await?;
                        return Ok(TriadOutcome::Continue);
                    }
                    cx.ack(input).await?;
                    self.prompt(cx).await?;
                    return Ok(TriadOutcome::Continue);
                };
                let parsed = match self.parse_future_local(text, cx) {
                    Ok(dt) => dt,
                    Err(ParseFault::Format) => {
                        cx.say(&format!(
                            "⚠️ I could not read that date\\. Use the format {}\\.",
                            escape(&example_stamp(cx))
                        ))
                        .await?;
                        self.prompt(cx).await?;
                        return Ok(TriadOutcome::Continue);
                    }
                    Err(ParseFault::Past) => {
                        cx.say("⚠️ That moment is already in the past\\. Send a future date\\.")
                            .await?;
                        self.prompt(cx).await?;
                        return Ok(TriadOutcome::Continue);
                    }
                };

                match self.stage {
                    Stage::Entry => {
                        self.entry = Some(parsed);
                        self.stage = Stage::Start;
                    }
                    Stage::Start => {
                        if self.entry.is_some_and(|entry| parsed < entry) {
                            cx.say(
                                "⚠️ The start cannot be before doors open\\. Send the start again\\.",
                            )
                            .await?;
                            self.prompt(cx).await?;
                            return Ok(TriadOutcome::Continue);
                        }
                        self.start = Some(parsed);
                        self.stage = Stage::End;
                    }
                    Stage::End => {
                        if self.start.is_some_and(|start| parsed <= start) {
                            cx.say("⚠️ The end must be after the start\\. Send the end again\\.")
                                .await?;
                            self.prompt(cx).await?;
                            return Ok(TriadOutcome::Continue);
                        }
                        self.end = Some(parsed);
                        self.stage = Stage::Confirm;
                    }
                    Stage::Confirm => unreachable!(),
                }
                self.prompt(cx).await?;
                Ok(TriadOutcome::Continue)
            }

            Stage::Confirm => match input.callback_action() {
                Some(CallbackAction::DatesConfirm) => {
                    cx.ack_toast(input, "Dates saved").await?;
                    draft.entry_date = self.entry;
                    draft.start_date = self.start;
                    draft.end_date = self.end;
                    Ok(TriadOutcome::Done)
                }
                Some(CallbackAction::DatesReset) => {
                    cx.ack(input).await?;
                    *self = DateTriad::new();
                    self.prompt(cx).await?;
                    Ok(TriadOutcome::Continue)
                }
                _ => {
                    cx.ack(input).await?;
                    self.prompt(cx).await?;
                    Ok(TriadOutcome::Continue)
                }
            },
        }
    }

    fn parse_future_local(&self, text: &str, cx: &FlowCx) -> Result<DateTime<Utc>, ParseFault> {
        let naive = NaiveDateTime::parse_from_str(text.trim(), &cx.config.date_format)
            .map_err(|_| ParseFault::Format)?;
        let local = naive
            .and_local_timezone(cx.config.timezone)
            .earliest()
            .ok_or(ParseFault::Format)?;
        let instant = local.with_timezone(&Utc);
        if instant <= Utc::now() {
            return Err(ParseFault::Past);
        }
        Ok(instant)
    }
}

fn example_stamp(cx: &FlowCx) -> String {
    (Utc::now() + chrono::Duration::days(1))
        .with_timezone(&cx.config.timezone)
        .format(&cx.config.date_format)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_cx;
    use chrono::Duration;

    fn text(s: String) -> Input {
        Input::Text(s)
    }

    fn press(action: CallbackAction) -> Input {
        Input::Callback {
            id: "cb".into(),
            action,
        }
    }

    fn stamp(cx: &FlowCx, hours_ahead: i64) -> String {
        (Utc::now() + Duration::hours(hours_ahead))
            .with_timezone(&cx.config.timezone)
            .format(&cx.config.date_format)
            .to_string()
    }

    #[tokio::test]
    async fn happy_path_commits_only_on_confirm() {
        let (cx, _transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut triad = DateTriad::new();
        triad.begin(&cx).await.unwrap();

        for h in [24, 25, 28] {
            assert_eq!(
                triad.handle(&text(stamp(&cx, h)), &mut draft, &cx).await.unwrap(),
                TriadOutcome::Continue
            );
        }
        // Checkpoint reached, draft still untouched.
        assert!(draft.entry_date.is_none());

        assert_eq!(
            triad
                .handle(&press(CallbackAction::DatesConfirm), &mut draft, &cx)
                .await
                .unwrap(),
            TriadOutcome::Done
        );
        assert!(draft.entry_date.is_some());
        assert!(draft.start_date.unwrap() < draft.end_date.unwrap());
        assert!(draft.entry_date.unwrap() <= draft.start_date.unwrap());
    }

    #[tokio::test]
    async fn past_date_is_rejected() {
        let (cx, _transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut triad = DateTriad::new();
        triad.begin(&cx).await.unwrap();

        assert_eq!(
            triad
                .handle(&text(stamp(&cx, -24)), &mut draft, &cx)
                .await
                .unwrap(),
            TriadOutcome::Continue
        );
        // Still on the first date.
        assert_eq!(
            triad.handle(&text(stamp(&cx, 24)), &mut draft, &cx).await.unwrap(),
            TriadOutcome::Continue
        );
        assert!(triad.entry.is_some());
    }

    #[tokio::test]
    async fn start_before_doors_reprompts_start_only() {
        let (cx, _transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut triad = DateTriad::new();
        triad.begin(&cx).await.unwrap();

        triad.handle(&text(stamp(&cx, 30)), &mut draft, &cx).await.unwrap();
        // Start before doors: rejected, doors kept.
        triad.handle(&text(stamp(&cx, 25)), &mut draft, &cx).await.unwrap();
        assert_eq!(triad.stage, Stage::Start);
        assert!(triad.entry.is_some());
        assert!(triad.start.is_none());

        triad.handle(&text(stamp(&cx, 31)), &mut draft, &cx).await.unwrap();
        assert_eq!(triad.stage, Stage::End);
    }

    #[tokio::test]
    async fn end_not_after_start_reprompts_end_only() {
        let (cx, _transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut triad = DateTriad::new();
        triad.begin(&cx).await.unwrap();

        triad.handle(&text(stamp(&cx, 24)), &mut draft, &cx).await.unwrap();
        triad.handle(&text(stamp(&cx, 26)), &mut draft, &cx).await.unwrap();
        triad.handle(&text(stamp(&cx, 25)), &mut draft, &cx).await.unwrap();
        assert_eq!(triad.stage, Stage::End);
        assert!(triad.end.is_none());
    }

    #[tokio::test]
    async fn reset_restarts_from_first_date() {
        let (cx, _transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut triad = DateTriad::new();
        triad.begin(&cx).await.unwrap();

        for h in [24, 25, 28] {
            triad.handle(&text(stamp(&cx, h)), &mut draft, &cx).await.unwrap();
        }
        triad
            .handle(&press(CallbackAction::DatesReset), &mut draft, &cx)
            .await
            .unwrap();
        assert_eq!(triad.stage, Stage::Entry);
        assert!(triad.entry.is_none() && triad.start.is_none() && triad.end.is_none());
        assert!(draft.entry_date.is_none());
    }

    #[tokio::test]
    async fn malformed_input_reprompts() {
        let (cx, _transport) = test_cx().await;
        let mut draft = EventDraft::new(&cx.actor);
        let mut triad = DateTriad::new();
        triad.begin(&cx).await.unwrap();

        assert_eq!(
            triad
                .handle(&text("tomorrow evening".into()), &mut draft, &cx)
                .await
                .unwrap(),
            TriadOutcome::Continue
        );
        assert!(triad.entry.is_none());
    }
}
