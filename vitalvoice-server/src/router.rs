//! Conversation routing.
//!
//! One utterance in, exactly one branch out:
//!
//! 1. reminder intent with enough confidence → resolve, save, confirm
//!    (no model call); a failed save falls through to chat with a note
//! 2. emergency → chat with the emergency-care fragment in the system prompt
//! 3. otherwise → chat with the sentiment tone hint, if any
//!
//! Reminder intent is checked before emergency. Reminders are the narrower,
//! more actionable intent.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use vitalvoice_core::clock::Clock;
use vitalvoice_core::completion::{CompletionError, TextCompletion};
use vitalvoice_core::emergency::{EmergencyClassifier, EmergencyVerdict};
use vitalvoice_core::intent::{ReminderIntentClassifier, ReminderVerdict};
use vitalvoice_core::models::{ConversationTurn, ReminderRecord, Role};
use vitalvoice_core::resolver::display_time;
use vitalvoice_core::sentiment::SentimentScorer;
use vitalvoice_core::store::{HistoryStore, ReminderStore};
use vitalvoice_core::{VitalConfig, VitalError};

use crate::subsystems::reminders::ReminderDraft;

pub const BASE_SYSTEM_PROMPT: &str = "You are VitalVoice, a warm and patient voice assistant \
for older adults and people managing their health. Answer clearly and briefly in plain \
language that reads well aloud. You can help with everyday questions, medication and \
appointment reminders, and general wellbeing. You are not a doctor: for anything that \
sounds serious, encourage the user to contact a medical professional.";

pub const EMERGENCY_INSTRUCTION: &str = "IMPORTANT: The user's message may describe an \
emergency. Respond calmly and briefly. Tell them to call their local emergency number \
(such as 911) right away if they or someone else is in danger, give simple immediate \
safety steps, and remind them they can alert their saved emergency contacts from the \
Emergency page.";

pub const REMINDER_FAILED_INSTRUCTION: &str = "The user asked for a reminder but it could \
not be saved automatically. Acknowledge the request and help them with it conversationally.";

pub const REMINDER_FAILED_HINT: &str = "I couldn't save that reminder automatically. You can \
add it manually from the Reminders page.";

/// Request body of `POST /chat/message`. Fields are optional so that missing
/// values surface as validation errors rather than extractor rejections.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub input: Option<String>,
    pub user_id: Option<String>,
    pub language: Option<String>,
}

impl ChatRequest {
    /// Read `input`, `userId` and `language` from a raw JSON body. Absent or
    /// null fields stay `None`; any other non-string value is rejected.
    pub fn from_json(body: &Value) -> Result<Self, ChatError> {
        let field = |key: &str| match body.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ChatError::Validation(format!("{} must be a string", key))),
        };
        Ok(Self {
            input: field("input")?,
            user_id: field("userId")?,
            language: field("language")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteBranch {
    ReminderConfirmed,
    ReminderFailedChatFallback,
    EmergencyChat,
    PlainChat,
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub branch: RouteBranch,
    pub message: String,
    pub emergency: EmergencyVerdict,
    pub reminder: ReminderVerdict,
    pub reminder_result: Option<ReminderRecord>,
}

impl ChatOutcome {
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "success": true,
            "message": self.message,
            "emergency_detected": self.emergency.is_emergency,
            "emergency_confidence": self.emergency.confidence,
            "reminder_detected": self.reminder.is_reminder,
            "reminder_confidence": self.reminder.confidence,
            "reminder_result": self.reminder_result,
        })
    }
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("store failed: {0}")]
    Store(#[from] VitalError),
}

pub struct ConversationRouter {
    reminders: Arc<dyn ReminderStore>,
    history: Arc<dyn HistoryStore>,
    completion: Arc<dyn TextCompletion>,
    clock: Arc<dyn Clock>,
    sentiment: SentimentScorer,
    emergency: EmergencyClassifier,
    intent: ReminderIntentClassifier,
    history_limit: usize,
}

impl ConversationRouter {
    pub fn new(
        config: &VitalConfig,
        reminders: Arc<dyn ReminderStore>,
        history: Arc<dyn HistoryStore>,
        completion: Arc<dyn TextCompletion>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reminders,
            history,
            completion,
            clock,
            sentiment: SentimentScorer::default(),
            emergency: EmergencyClassifier::new(config.classifier.emergency.clone()),
            intent: ReminderIntentClassifier::new(config.classifier.reminder.clone()),
            history_limit: config.completion.history_limit,
        }
    }

    /// Swap the sentiment primitive.
    pub fn with_sentiment(mut self, sentiment: SentimentScorer) -> Self {
        self.sentiment = sentiment;
        self
    }

    pub fn intent_classifier(&self) -> &ReminderIntentClassifier {
        &self.intent
    }

    pub fn completion(&self) -> &dyn TextCompletion {
        self.completion.as_ref()
    }

    pub fn reminder_store(&self) -> &dyn ReminderStore {
        self.reminders.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub async fn handle(&self, req: ChatRequest) -> Result<ChatOutcome, ChatError> {
        let input = required(req.input.as_deref(), "input")?;
        let user_id = required(req.user_id.as_deref(), "userId")?;

        let now = self.clock.now();
        let sentiment = self.sentiment.score(input);
        let emergency = self.emergency.classify(input, &sentiment);
        let reminder = self.intent.classify(input);

        tracing::info!(
            user_id,
            emergency = emergency.is_emergency,
            emergency_score = emergency.score,
            reminder = reminder.is_reminder,
            reminder_confidence = reminder.confidence,
            polarity = sentiment.polarity,
            "Utterance classified"
        );

        let mut reminder_failed = false;
        if reminder.is_reminder && reminder.confidence > self.intent.weights().routing_threshold {
            let draft = ReminderDraft::from_components(&reminder.components);
            match self.reminders.save(draft.resolve(user_id, now)).await {
                Ok(record) => {
                    let message = confirmation_message(
                        &record,
                        draft.date.is_some(),
                        draft.time.is_some(),
                    );
                    self.record_exchange(user_id, input, &message).await;
                    tracing::info!(user_id, reminder_id = %record.id, branch = "reminder_confirmed", "Chat routed");
                    return Ok(ChatOutcome {
                        branch: RouteBranch::ReminderConfirmed,
                        message,
                        emergency,
                        reminder,
                        reminder_result: Some(record),
                    });
                }
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Reminder save failed, falling back to chat");
                    reminder_failed = true;
                }
            }
        }

        let branch = if reminder_failed {
            RouteBranch::ReminderFailedChatFallback
        } else if emergency.is_emergency {
            RouteBranch::EmergencyChat
        } else {
            RouteBranch::PlainChat
        };

        let mut system = BASE_SYSTEM_PROMPT.to_string();
        if reminder_failed {
            push_sentence(&mut system, REMINDER_FAILED_INSTRUCTION);
        }
        if emergency.is_emergency {
            push_sentence(&mut system, EMERGENCY_INSTRUCTION);
        } else if let Some(hint) = sentiment.tone_hint() {
            push_sentence(&mut system, hint.instruction());
        }
        if let Some(instruction) = language_instruction(req.language.as_deref()) {
            push_sentence(&mut system, &instruction);
        }

        let mut turns: Vec<ConversationTurn> = self
            .history
            .find_history(user_id, Some(self.history_limit))
            .await?
            .into_iter()
            .filter(|t| t.role != Role::System)
            .collect();
        turns.push(ConversationTurn::user(input));

        let reply = match self.completion.complete(&system, &turns).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(user_id, backend = self.completion.name(), error = %e, "Completion failed");
                return Err(e.into());
            }
        };

        let message = if reminder_failed {
            format!("{}\n\n{}", reply, REMINDER_FAILED_HINT)
        } else {
            reply
        };

        self.record_exchange(user_id, input, &message).await;
        tracing::info!(user_id, branch = ?branch, "Chat routed");

        Ok(ChatOutcome {
            branch,
            message,
            emergency,
            reminder,
            reminder_result: None,
        })
    }

    /// History is auxiliary to the reply: an append failure is logged, never
    /// surfaced, so a saved reminder is not reported as failed.
    async fn record_exchange(&self, user_id: &str, input: &str, reply: &str) {
        let turns = [ConversationTurn::user(input), ConversationTurn::assistant(reply)];
        if let Err(e) = self.history.append_history(user_id, &turns).await {
            tracing::warn!(user_id, error = %e, "Failed to append conversation history");
        }
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ChatError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ChatError::Validation(format!("{} is required", field)))
}

fn push_sentence(system: &mut String, sentence: &str) {
    system.push(' ');
    system.push_str(sentence);
}

/// `None` for English or an unset language.
pub fn language_instruction(language: Option<&str>) -> Option<String> {
    let lang = language.map(str::trim).filter(|l| !l.is_empty())?;
    if lang.eq_ignore_ascii_case("en") || lang.eq_ignore_ascii_case("english") || lang.to_lowercase().starts_with("en-") {
        return None;
    }
    Some(format!("Always respond in {}.", lang))
}

/// "Saturday, October 17" for a `YYYY-MM-DD` date; the raw value otherwise.
pub fn display_date(iso: &str) -> String {
    NaiveDate::parse_from_str(iso, "%Y-%m-%d")
        .map(|d| d.format("%A, %B %-d").to_string())
        .unwrap_or_else(|_| iso.to_string())
}

/// Three templates, keyed on which of date/time the user actually said.
pub fn confirmation_message(record: &ReminderRecord, date_given: bool, time_given: bool) -> String {
    let date = display_date(&record.date);
    let time = display_time(&record.time);
    match (date_given, time_given) {
        (true, true) => format!(
            "Done! I'll remind you to {} on {} at {}.",
            record.title, date, time
        ),
        (false, true) => format!(
            "Done! I'll remind you to {} at {}. I've scheduled it for {}.",
            record.title, time, date
        ),
        (_, false) => format!(
            "Done! I'll remind you to {} on {}. You didn't mention a time, so I picked {}; \
             you can change it on the Reminders page.",
            record.title, date, time
        ),
    }
}
