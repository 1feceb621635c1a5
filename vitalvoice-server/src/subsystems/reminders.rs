//! Reminder drafting: turning model output or classifier components into
//! concrete `NewReminder`s.
//!
//! The completion service is asked for JSON. Whatever comes back is located
//! inside optional markdown fences, read leniently, and every field passes
//! through the resolver, so a reminder always lands with a real date and
//! time even when the model returns nothing usable.

use once_cell::sync::Lazy;

use chrono::{Duration, NaiveDateTime, Timelike};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use vitalvoice_core::completion::{CompletionError, TextCompletion};
use vitalvoice_core::intent::{ReminderComponents, ReminderIntentClassifier};
use vitalvoice_core::models::{
    ConversationTurn, NewReminder, ReminderRecord, DEFAULT_REMINDER_TITLE,
};
use vitalvoice_core::resolver::{is_null_like, resolve_date, resolve_time};
use vitalvoice_core::store::ReminderStore;
use vitalvoice_core::VitalError;

static FENCED_ARRAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json)?\s*(\[[\s\S]*?\])\s*```|(\[[\s\S]*?\])")
        .expect("static pattern compiles")
});
static FENCED_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json)?\s*(\{[\s\S]*?\})\s*```|(\{[\s\S]*?\})")
        .expect("static pattern compiles")
});

/// A reminder as proposed by the model or the classifier, before resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReminderDraft {
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl ReminderDraft {
    /// Read `title`/`date`/`time` from a JSON object. Strings and numbers are
    /// accepted; anything else counts as missing.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            title: obj.get("title").and_then(json_text),
            date: obj.get("date").and_then(json_text),
            time: obj.get("time").and_then(json_text),
        })
    }

    /// Build a draft from the local classifier: the task phrase is the title
    /// and the first date/time fragments feed the resolver.
    pub fn from_components(components: &ReminderComponents) -> Self {
        Self {
            title: components.task_text.clone(),
            date: components.date_fragments.first().cloned(),
            time: components.time_fragments.first().cloned(),
        }
    }

    /// Resolve into a writable reminder. Never fails.
    pub fn resolve(&self, user_id: &str, now: NaiveDateTime) -> NewReminder {
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !is_null_like(t))
            .unwrap_or(DEFAULT_REMINDER_TITLE)
            .to_string();
        let date = resolve_date(self.date.as_deref(), &title, now);
        let time = resolve_time(self.time.as_deref(), &title, now);
        NewReminder {
            user_id: user_id.to_string(),
            title,
            date,
            time,
        }
    }
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Find reminder JSON in a model reply: an array first (fenced or bare),
/// then a single object. Returns `None` when nothing parseable is present.
pub fn extract_drafts(content: &str) -> Option<Vec<ReminderDraft>> {
    if let Some(items) = first_json(&FENCED_ARRAY, content).and_then(|v| match v {
        Value::Array(items) if !items.is_empty() => Some(items),
        _ => None,
    }) {
        let drafts: Vec<ReminderDraft> = items.iter().filter_map(ReminderDraft::from_json).collect();
        if !drafts.is_empty() {
            return Some(drafts);
        }
    }

    first_json(&FENCED_OBJECT, content)
        .as_ref()
        .and_then(ReminderDraft::from_json)
        .map(|d| vec![d])
}

fn first_json(pattern: &Regex, content: &str) -> Option<Value> {
    let caps = pattern.captures(content)?;
    let text = caps.get(1).or_else(|| caps.get(2))?.as_str();
    match serde_json::from_str(text) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(error = %e, "Candidate reminder JSON did not parse");
            None
        }
    }
}

// ============================================================================
// Prompt construction
// ============================================================================

/// Date/time grounding for the extraction prompt: today, tomorrow, the next
/// week's weekday mapping and a time-of-day suggestion.
pub fn date_context(now: NaiveDateTime) -> String {
    let today = now.date();
    let tomorrow = today + Duration::days(1);
    let (time_of_day, suggested) = match now.hour() {
        5..=11 => ("morning", "9:00 AM"),
        12..=16 => ("afternoon", "3:00 PM"),
        17..=20 => ("evening", "7:00 PM"),
        _ => ("night", "8:00 PM"),
    };

    let mut ctx = String::from(
        "CURRENT DATE & TIME CONTEXT (use this to convert relative dates):\n\n",
    );
    ctx.push_str(&format!("- Today is: {} ({})\n", today, today.format("%A")));
    ctx.push_str(&format!("- Tomorrow is: {} ({})\n", tomorrow, tomorrow.format("%A")));
    ctx.push_str(&format!(
        "- Current time: {} ({})\n\nDay name mappings:\n",
        now.format("%H:%M"),
        time_of_day
    ));
    for offset in 1..7 {
        let day = today + Duration::days(offset);
        ctx.push_str(&format!(
            "- {}: {}\n",
            day.format("%A").to_string().to_lowercase(),
            day
        ));
    }
    ctx.push_str(&format!(
        "\nSmart defaults:\n\
         - If no date is given: tomorrow for medicine/health, today for general tasks\n\
         - If no time is given: {} (current {}) or 9:00 AM for medicine\n",
        suggested, time_of_day
    ));
    ctx
}

pub fn extraction_prompt(now: NaiveDateTime) -> String {
    let tomorrow = (now.date() + Duration::days(1)).format("%Y-%m-%d");
    format!(
        "You are an expert reminder creation assistant. Parse user input into structured \
         reminders.\n\n{}\n\
         INSTRUCTIONS:\n\
         1. Extract title, date and time from the user input\n\
         2. Use the context above to convert relative dates\n\
         3. Dates are YYYY-MM-DD, times are 12-hour H:MM AM/PM\n\
         4. Return only a JSON array\n\n\
         Return format: [{{\"title\": \"task description\", \"date\": \"YYYY-MM-DD\", \"time\": \"H:MM AM/PM\"}}]\n\n\
         Examples:\n\
         - \"remind me medicine\" -> [{{\"title\": \"take medicine\", \"date\": \"{}\", \"time\": \"9:00 AM\"}}]\n\
         - \"appointment tomorrow\" -> [{{\"title\": \"appointment\", \"date\": \"{}\", \"time\": \"10:00 AM\"}}]\n",
        date_context(now),
        tomorrow,
        tomorrow
    )
}

// ============================================================================
// Formatting pipeline
// ============================================================================

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("no reminders could be saved")]
    NothingSaved { errors: Vec<String> },
}

#[derive(Debug, Serialize)]
pub struct FormatOutcome {
    pub reminders: Vec<ReminderRecord>,
    pub errors: Vec<String>,
    /// True when the model reply held no usable JSON and the local
    /// classifier's components were used instead.
    pub used_fallback: bool,
}

/// Ask the model to structure `input`, resolve every draft and save each.
/// Individual save failures are collected; the call fails only when nothing
/// was saved.
pub async fn format_reminders(
    input: &str,
    user_id: &str,
    now: NaiveDateTime,
    completion: &dyn TextCompletion,
    classifier: &ReminderIntentClassifier,
    store: &dyn ReminderStore,
) -> Result<FormatOutcome, FormatError> {
    let system = extraction_prompt(now);
    let turn = ConversationTurn::user(format!(
        "Parse this into reminders with intelligent date/time inference: {}",
        input
    ));
    let reply = completion.complete(&system, &[turn]).await?;

    let (drafts, used_fallback) = match extract_drafts(&reply) {
        Some(drafts) => (drafts, false),
        None => {
            tracing::warn!(user_id, "No reminder JSON in model reply, using local extraction");
            let verdict = classifier.classify(input);
            (vec![ReminderDraft::from_components(&verdict.components)], true)
        }
    };

    let mut reminders = Vec::with_capacity(drafts.len());
    let mut errors = Vec::new();
    for draft in &drafts {
        match store.save(draft.resolve(user_id, now)).await {
            Ok(record) => reminders.push(record),
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to save reminder");
                errors.push(format!("Error processing reminder: {}", e));
            }
        }
    }

    if reminders.is_empty() {
        return Err(FormatError::NothingSaved { errors });
    }

    tracing::info!(user_id, count = reminders.len(), used_fallback, "Reminders formatted");
    Ok(FormatOutcome {
        reminders,
        errors,
        used_fallback,
    })
}

#[derive(Error, Debug)]
pub enum ReminderDataError {
    #[error("{0}")]
    Invalid(String),

    #[error("failed to save reminder data: {0}")]
    Store(#[from] VitalError),
}

/// Resolve and save reminders posted directly by a client (object or array).
/// Entries are validated up front so a bad entry saves nothing.
pub async fn save_reminder_data(
    payload: &Value,
    now: NaiveDateTime,
    store: &dyn ReminderStore,
) -> Result<Vec<ReminderRecord>, ReminderDataError> {
    let items: Vec<&Value> = match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![payload],
        _ => {
            return Err(ReminderDataError::Invalid(
                "Reminder data must be an object or an array".to_string(),
            ))
        }
    };
    if items.is_empty() {
        return Err(ReminderDataError::Invalid("No reminder data provided".to_string()));
    }

    let mut resolved = Vec::with_capacity(items.len());
    for item in items {
        let user_id = item
            .get("userId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ReminderDataError::Invalid("Each reminder needs a userId".to_string()))?;
        let draft = ReminderDraft::from_json(item).ok_or_else(|| {
            ReminderDataError::Invalid("Reminder entries must be objects".to_string())
        })?;
        resolved.push(draft.resolve(user_id, now));
    }

    let mut saved = Vec::with_capacity(resolved.len());
    for reminder in resolved {
        saved.push(store.save(reminder).await?);
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        // Friday
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_extracts_fenced_array() {
        let reply = "Sure!\n```json\n[{\"title\": \"take medicine\", \"date\": \"2026-10-17\", \"time\": \"9:00 AM\"},\n {\"title\": \"call mom\", \"date\": null, \"time\": \"6 pm\"}]\n```";
        let drafts = extract_drafts(reply).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].time.as_deref(), Some("9:00 AM"));
        assert_eq!(drafts[1].date, None);
    }

    #[test]
    fn test_extracts_bare_object_when_no_array() {
        let reply = "Here you go: {\"title\": \"dentist\", \"date\": \"tomorrow\"}";
        let drafts = extract_drafts(reply).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title.as_deref(), Some("dentist"));
        assert_eq!(drafts[0].time, None);
    }

    #[test]
    fn test_no_json_yields_none() {
        assert!(extract_drafts("I could not understand that.").is_none());
        assert!(extract_drafts("[not json]").is_none());
    }

    #[test]
    fn test_resolve_fills_every_field() {
        let draft = ReminderDraft {
            title: Some("null".to_string()),
            date: Some("none".to_string()),
            time: None,
        };
        let r = draft.resolve("u1", now());
        assert_eq!(r.title, DEFAULT_REMINDER_TITLE);
        assert_eq!(r.date.len(), 10);
        assert_eq!(r.time.len(), 5);
    }

    #[test]
    fn test_resolve_normalizes_model_values() {
        let draft = ReminderDraft {
            title: Some("take medicine".to_string()),
            date: Some("2026-10-17".to_string()),
            time: Some("9:00 PM".to_string()),
        };
        let r = draft.resolve("u1", now());
        assert_eq!(r.date, "2026-10-17");
        assert_eq!(r.time, "21:00");
    }

    #[test]
    fn test_date_context_maps_upcoming_weekdays() {
        let ctx = date_context(now());
        assert!(ctx.contains("Today is: 2026-10-16 (Friday)"));
        assert!(ctx.contains("Tomorrow is: 2026-10-17 (Saturday)"));
        assert!(ctx.contains("- thursday: 2026-10-22"));
        assert!(ctx.contains("(morning)"));
        assert!(!ctx.contains("- friday:"));
    }

    #[tokio::test]
    async fn test_reminder_data_resolves_each_entry() {
        let store = vitalvoice_core::store::MemoryStore::new();
        let payload = serde_json::json!([
            {"userId": "u1", "title": "walk", "date": "tomorrow", "time": "7 am"},
            {"userId": "u1", "title": "lunch with Sam"}
        ]);
        let saved = save_reminder_data(&payload, now(), &store).await.unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].date, "2026-10-17");
        assert_eq!(saved[0].time, "07:00");
        assert_eq!(saved[1].time, "12:30");
    }

    #[tokio::test]
    async fn test_reminder_data_rejects_missing_user_without_writing() {
        let store = vitalvoice_core::store::MemoryStore::new();
        let payload = serde_json::json!([{"userId": "u1", "title": "a"}, {"title": "b"}]);
        let err = save_reminder_data(&payload, now(), &store).await.unwrap_err();
        assert!(matches!(err, ReminderDataError::Invalid(_)));
        assert_eq!(store.reminder_count().await, 0);
    }
}
