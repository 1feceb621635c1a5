//! Reminder intent detection and component extraction.
//!
//! Lenient on purpose: a missed reminder costs more than an extra
//! confirmation. Time/date fragments are collected for display and as
//! resolver input; exact values come from [`crate::resolver`].

use once_cell::sync::Lazy;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::patterns::PatternGroup;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReminderWeights {
    pub keyword: f64,
    pub time: f64,
    pub date: f64,
    pub task: f64,
    pub polite: f64,
    pub question: f64,
    pub past_tense: f64,
    /// Score at or above which a message counts as a reminder on score alone.
    pub lenient_score: f64,
    /// Keyword-bearing messages this short are reminders outright.
    pub short_word_limit: usize,
    /// Confidence the router requires before writing a reminder.
    pub routing_threshold: f64,
}

impl Default for ReminderWeights {
    fn default() -> Self {
        Self {
            keyword: 50.0,
            time: 30.0,
            date: 25.0,
            task: 20.0,
            polite: 20.0,
            question: -15.0,
            past_tense: -20.0,
            lenient_score: 30.0,
            short_word_limit: 10,
            routing_threshold: 0.2,
        }
    }
}

// ============================================================================
// Pattern tables
// ============================================================================

const KEYWORDS: &[&str] = &[
    r"\bremind(er|ers)?\b",
    r"\bremember\b",
    r"\balarms?\b",
    r"\balert\b",
    r"\bnotify\b",
    r"\bwake me\b",
    r"\bschedule\b",
    r"\bappointments?\b",
    r"\bmeetings?\b",
    r"\bdon'?t forget\b",
    r"\bhelp me remember\b",
    r"\bset (a |an )?(reminder|alarm)\b",
    r"\bremind me (about|of|when)\b",
    r"\bi need to remember\b",
    r"\bmake sure i\b",
];

const TIME_INDICATORS: &[&str] = &[
    r"\b\d{1,2}(:\d{2})?\s*(am|pm|a\.m\.|p\.m\.)",
    r"\b\d{1,2}:\d{2}\b",
    r"\b\d{1,2}\s*o'?clock\b",
    r"\b(morning|afternoon|evening|night|tonight|noon|midnight|bedtime)\b",
];

const DATE_INDICATORS: &[&str] = &[
    r"\b(day after tomorrow|today|tomorrow|yesterday)\b",
    r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
    r"\b(next|this) (week|month)\b",
    r"\b\d{1,2}/\d{1,2}(/\d{2,4})?\b",
    r"\b(january|february|march|april|may|june|july|august|september|october|november|december)(\s+\d{1,2}(st|nd|rd|th)?)?\b",
];

const TASK_INDICATORS: &[&str] = &[
    r"\bto [a-z]+",
    r"\b(take|call|buy|pick up|visit|check|drink|eat|go|pay|book|attend)\b",
    r"\b(medicine|medication|meds|pills?|tablets?|insulin|dose)\b",
    r"\b(doctor|hospital|pharmacy|prescription|vitamins?)\b",
];

const POLITE: &[&str] = &[r"\b(please|could you|can you|would you)\b"];

const QUESTIONS: &[&str] = &[
    r"^(what|how|why|when|where|which|who|is|are|do|does|did)\b",
    r"\?\s*$",
];

const PAST_TENSE: &[&str] = &[
    r"\balready\b",
    r"\b(took|did|went|had|was|were|finished|completed)\b",
    r"\blast (week|night|month|time)\b",
];

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

/// Tried in order; the first capture wins.
static TASK_EXTRACTORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"remind(?:er)?\s+(?:me\s+)?(?:to|about)\s+(.+)",
        r"don'?t\s+forget\s+to\s+(.+)",
        r"remember\s+to\s+(.+)",
    ]
    .into_iter()
    .map(re)
    .collect()
});

/// Connectives left hanging once a schedule fragment is cut off a task.
static DANGLING_CONNECTIVE: Lazy<Regex> = Lazy::new(|| {
    re(r"\s*\b(at|on|by|around|in\s+the|in|this|next|every|before|after|until)$")
});

// ============================================================================
// Verdict
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReminderComponents {
    pub task_text: Option<String>,
    pub time_fragments: Vec<String>,
    pub date_fragments: Vec<String>,
    pub word_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReminderBreakdown {
    pub keyword_count: usize,
    pub time_count: usize,
    pub date_count: usize,
    pub task_count: usize,
    pub polite: bool,
    pub question_count: usize,
    pub past_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReminderVerdict {
    pub is_reminder: bool,
    pub score: f64,
    pub confidence: f64,
    pub breakdown: ReminderBreakdown,
    pub components: ReminderComponents,
}

// ============================================================================
// Classifier
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReminderIntentClassifier {
    weights: ReminderWeights,
    keywords: PatternGroup,
    time: PatternGroup,
    date: PatternGroup,
    task: PatternGroup,
    polite: PatternGroup,
    question: PatternGroup,
    past: PatternGroup,
}

impl Default for ReminderIntentClassifier {
    fn default() -> Self {
        Self::new(ReminderWeights::default())
    }
}

impl ReminderIntentClassifier {
    pub fn new(weights: ReminderWeights) -> Self {
        Self {
            weights,
            keywords: PatternGroup::compile("reminder_keyword", KEYWORDS),
            time: PatternGroup::compile("time_indicator", TIME_INDICATORS),
            date: PatternGroup::compile("date_indicator", DATE_INDICATORS),
            task: PatternGroup::compile("task_indicator", TASK_INDICATORS),
            polite: PatternGroup::compile("polite", POLITE),
            question: PatternGroup::compile("question", QUESTIONS),
            past: PatternGroup::compile("past_tense", PAST_TENSE),
        }
    }

    pub fn weights(&self) -> &ReminderWeights {
        &self.weights
    }

    pub fn classify(&self, text: &str) -> ReminderVerdict {
        let w = &self.weights;
        let lower = text.trim().to_lowercase();

        let b = ReminderBreakdown {
            keyword_count: self.keywords.count_matches(&lower),
            time_count: self.time.count_matches(&lower),
            date_count: self.date.count_matches(&lower),
            task_count: self.task.count_matches(&lower),
            polite: self.polite.is_match(&lower),
            question_count: self.question.count_matches(&lower),
            past_count: self.past.count_matches(&lower),
        };

        let mut score = b.keyword_count as f64 * w.keyword
            + b.time_count as f64 * w.time
            + b.date_count as f64 * w.date
            + b.task_count as f64 * w.task
            + b.question_count as f64 * w.question
            + b.past_count as f64 * w.past_tense;
        if b.polite {
            score += w.polite;
        }

        let components = self.extract_components(&lower);

        let has_keyword = b.keyword_count > 0;
        let has_detail = b.time_count > 0 || b.date_count > 0 || b.task_count > 0;
        let is_reminder = (has_keyword && has_detail)
            || score >= w.lenient_score
            || (has_keyword && components.word_count <= w.short_word_limit);
        let confidence = (score / 100.0).clamp(0.0, 1.0);

        ReminderVerdict {
            is_reminder,
            score,
            confidence,
            breakdown: b,
            components,
        }
    }

    fn extract_components(&self, lower: &str) -> ReminderComponents {
        ReminderComponents {
            task_text: self.extract_task(lower),
            time_fragments: self.time.find_all(lower),
            date_fragments: self.date.find_all(lower),
            word_count: lower.split_whitespace().count(),
        }
    }

    /// Pull the task phrase out of "remind me to X", "don't forget to X" or
    /// "remember to X". The phrase ends where the first date or time
    /// fragment begins; a connective left hanging before it is dropped.
    pub fn extract_task(&self, lower: &str) -> Option<String> {
        let captured = TASK_EXTRACTORS
            .iter()
            .find_map(|re| re.captures(lower))
            .and_then(|caps| caps.get(1))?
            .as_str();

        let cut = [self.time.first_start(captured), self.date.first_start(captured)]
            .into_iter()
            .flatten()
            .min();

        let mut task = captured[..cut.unwrap_or(captured.len())]
            .trim()
            .trim_end_matches(|c: char| c.is_ascii_punctuation())
            .trim()
            .to_string();
        if cut.is_some() {
            while let Some(m) = DANGLING_CONNECTIVE.find(&task) {
                task.truncate(m.start());
            }
        }

        let task = task.trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
        if task.is_empty() {
            None
        } else {
            Some(task.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> ReminderVerdict {
        ReminderIntentClassifier::default().classify(text)
    }

    #[test]
    fn test_medicine_reminder_with_time() {
        let v = classify("remind me to take medicine at 9am");
        assert!(v.is_reminder);
        assert!(v.confidence > 0.2);
        let task = v.components.task_text.unwrap();
        assert!(task.contains("take medicine"), "task was {:?}", task);
        assert_eq!(v.components.time_fragments, vec!["9am"]);
    }

    #[test]
    fn test_past_tense_suppresses_reminder() {
        let v = classify("I already took my medicine yesterday");
        assert!(!v.is_reminder, "score {}", v.score);
        assert_eq!(v.breakdown.keyword_count, 0);
        assert_eq!(v.breakdown.past_count, 2);
        // date 25 + task 20 - past 40
        assert_eq!(v.score, 5.0);
    }

    #[test]
    fn test_components_for_call_mom() {
        let v = classify("remind me to call mom tomorrow morning");
        assert!(v.is_reminder);
        assert_eq!(v.components.task_text.as_deref(), Some("call mom"));
        assert_eq!(v.components.date_fragments, vec!["tomorrow"]);
        assert_eq!(v.components.time_fragments, vec!["morning"]);
        assert_eq!(v.components.word_count, 7);
    }

    #[test]
    fn test_short_keyword_message_is_reminder() {
        let v = classify("set an alarm");
        assert!(v.is_reminder);
        assert!(v.breakdown.keyword_count >= 1);
    }

    #[test]
    fn test_small_talk_is_not_reminder() {
        let v = classify("how are you doing this evening?");
        assert!(!v.is_reminder, "score {}", v.score);
    }

    #[test]
    fn test_confidence_is_capped() {
        let v = classify("please remind me to take my pills at 8:00 tomorrow, don't forget");
        assert_eq!(v.confidence, 1.0);
        assert!(v.breakdown.polite);
    }

    fn task(text: &str) -> Option<String> {
        ReminderIntentClassifier::default().extract_task(text)
    }

    #[test]
    fn test_extract_task_variants() {
        assert_eq!(
            task("don't forget to water the plants on friday").as_deref(),
            Some("water the plants")
        );
        assert_eq!(task("remember to drink water.").as_deref(), Some("drink water"));
        assert_eq!(
            task("reminder about dentist appointment next week").as_deref(),
            Some("dentist appointment")
        );
        assert_eq!(task("remind me to check in").as_deref(), Some("check in"));
        assert_eq!(task("remind me to tomorrow"), None);
        assert_eq!(task("what's the weather"), None);
    }

    #[test]
    fn test_task_keeps_prepositions_inside_the_phrase() {
        assert_eq!(
            task("remind me to turn on the heater tomorrow").as_deref(),
            Some("turn on the heater")
        );
        assert_eq!(
            task("remind me to finish this report at 5pm").as_deref(),
            Some("finish this report")
        );
        assert_eq!(
            task("remind me to take my pills every evening").as_deref(),
            Some("take my pills")
        );
    }

    #[test]
    fn test_minutes_with_meridiem_is_one_fragment() {
        let v = classify("remind me to take my pills at 9:30 pm");
        assert_eq!(v.components.time_fragments, vec!["9:30 pm"]);
        assert_eq!(v.components.task_text.as_deref(), Some("take my pills"));

        let v = classify("remind me to call the pharmacy at 2:30 PM");
        assert_eq!(v.components.time_fragments, vec!["2:30 pm"]);
    }
}
