//! Emergency detection.
//!
//! Two stages: an additive score over pattern groups, sentiment and surface
//! urgency, then a validation override that vetoes high-ish scores carrying
//! no concrete danger or medical-distress signal. Every weight lives in
//! [`EmergencyWeights`] so retuning is a config change.

use once_cell::sync::Lazy;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::patterns::PatternGroup;
use crate::sentiment::Sentiment;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmergencyWeights {
    pub immediate_danger: f64,
    pub medical: f64,
    pub safety_threat: f64,
    pub emotional_distress: f64,

    pub polarity_strong: f64,
    pub polarity_moderate: f64,
    pub polarity_mild: f64,
    pub subjectivity_high: f64,
    pub subjectivity_moderate: f64,

    pub exclamation_run: f64,
    pub exclamation_pair: f64,
    pub shouting: f64,
    pub urgency_words: f64,

    pub help_with: f64,
    pub question: f64,
    pub hypothetical: f64,
    pub long_question: f64,
    pub polite: f64,
    pub casual_inquiry: f64,
    pub symptom_inquiry: f64,
    pub academic: f64,

    pub short_message_boost: f64,
    pub brief_message_boost: f64,

    /// Score at or above which a message is an emergency.
    pub decision_threshold: f64,
    /// Score at or above which the validation override is skipped.
    pub validation_bypass_threshold: f64,
}

impl Default for EmergencyWeights {
    fn default() -> Self {
        Self {
            immediate_danger: 50.0,
            medical: 35.0,
            safety_threat: 40.0,
            emotional_distress: 12.0,

            polarity_strong: 25.0,
            polarity_moderate: 15.0,
            polarity_mild: 5.0,
            subjectivity_high: 20.0,
            subjectivity_moderate: 15.0,

            exclamation_run: 20.0,
            exclamation_pair: 10.0,
            shouting: 15.0,
            urgency_words: 15.0,

            help_with: -25.0,
            question: -15.0,
            hypothetical: -20.0,
            long_question: -20.0,
            polite: -10.0,
            casual_inquiry: -30.0,
            symptom_inquiry: -20.0,
            academic: -25.0,

            short_message_boost: 25.0,
            brief_message_boost: 15.0,

            decision_threshold: 60.0,
            validation_bypass_threshold: 80.0,
        }
    }
}

// ============================================================================
// Pattern tables
// ============================================================================

const IMMEDIATE_DANGER: &[&str] = &[
    r"\bhelp\b",
    r"\b(can'?t|cannot|can not) breathe?\b",
    r"\b(not|stopped) breathing\b",
    r"\bheart attack\b",
    r"\b(i'?m|i am|he'?s|she'?s|they'?re) dying\b",
    r"\bcall (911|an ambulance|the ambulance)\b",
    r"\bemergency\b",
    r"\bunconscious\b",
    r"\bchoking\b",
    r"\bcollapsed\b",
    r"\bbleeding (heavily|badly|a lot)\b",
];

const MEDICAL: &[&str] = &[
    r"\bchest pain\b",
    r"\bstroke\b",
    r"\bseizure\b",
    r"\boverdose\b",
    r"\bsevere bleeding\b",
    r"\ballergic reaction\b",
    r"\banaphyla",
    r"\bpoison(ed|ing)?\b",
    r"\bbroken (bone|arm|leg|hip)\b",
    r"\b(fainted|passed out)\b",
    r"\bsevere pain\b",
    r"\bhigh fever\b",
    r"\bnumb(ness)?\b",
];

const SAFETY_THREAT: &[&str] = &[
    r"\bsomeone (is )?(trying to )?(hurt|kill|attack)",
    r"\bbeing (attacked|followed)\b",
    r"\b(intruder|break(ing)? in|broke in)\b",
    r"\bfire\b",
    r"\b(gun|knife|weapon)\b",
    r"\b(kill myself|suicide|end my life|hurt myself)\b",
    r"\babus(e|ed|ing)\b",
    r"\bkidnap",
    r"\bthreaten(ing|ed)?\b",
];

const EMOTIONAL_DISTRESS: &[&str] = &[
    r"\b(scared|terrified|frightened)\b",
    r"\bpanic",
    r"\bafraid\b",
    r"\bdesperate\b",
    r"\bhopeless\b",
    r"\balone\b",
    r"\bcrying\b",
    r"\b(can'?t|cannot) cope\b",
    r"\boverwhelmed\b",
    r"\banxious\b",
];

const HELP_WITH: &[&str] = &[
    r"\bhelp me (with|to|understand|find|write|learn|plan|choose)\b",
    r"\bcan you help\b",
    r"\bneed (some )?help with\b",
];

const QUESTION: &[&str] = &[
    r"^(what|how|why|when|where|which|who)\b",
    r"\bwhat (is|are)\b",
    r"\bhow (do|does|can|to)\b",
    r"\bcan you (tell|explain)\b",
    r"\?\s*$",
];

const HYPOTHETICAL: &[&str] = &[
    r"\bwhat if\b",
    r"\bif i (ever|were)\b",
    r"\bin case\b",
    r"\bhypothetical",
    r"\bsuppose\b",
    r"\bwould happen\b",
    r"\bin the future\b",
    r"\bsomeday\b",
];

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

static URGENCY: Lazy<Regex> =
    Lazy::new(|| re(r"\b(now|immediately|right now|asap|urgent)\b"));
static POLITE: Lazy<Regex> =
    Lazy::new(|| re(r"\b(please|thank you|could you|would you|if possible)\b"));
static CASUAL_INQUIRY: Lazy<Regex> =
    Lazy::new(|| re(r"\b(just wondering|just curious|general question)\b"));
static SYMPTOM_INQUIRY: Lazy<Regex> =
    Lazy::new(|| re(r"\b(symptoms of|causes of|treatment for|information about)\b"));
static ACADEMIC: Lazy<Regex> =
    Lazy::new(|| re(r"\b(research|study|assignment|paper|article|thesis)\b"));
static SHOUTED_WORD: Lazy<Regex> = Lazy::new(|| re(r"[A-Z]{5,}"));

// ============================================================================
// Verdict
// ============================================================================

/// Per-signal evidence behind a verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmergencyBreakdown {
    pub immediate_count: usize,
    pub medical_count: usize,
    pub safety_count: usize,
    pub distress_count: usize,
    pub help_with_count: usize,
    pub question_count: usize,
    pub hypothetical_count: usize,
    pub word_count: usize,
    pub pattern_score: f64,
    pub sentiment_score: f64,
    pub surface_score: f64,
    pub suppression_score: f64,
    pub length_score: f64,
    pub override_applied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyVerdict {
    pub is_emergency: bool,
    pub score: f64,
    pub confidence: f64,
    pub breakdown: EmergencyBreakdown,
}

// ============================================================================
// Classifier
// ============================================================================

#[derive(Debug, Clone)]
pub struct EmergencyClassifier {
    weights: EmergencyWeights,
    immediate: PatternGroup,
    medical: PatternGroup,
    safety: PatternGroup,
    distress: PatternGroup,
    help_with: PatternGroup,
    question: PatternGroup,
    hypothetical: PatternGroup,
}

impl Default for EmergencyClassifier {
    fn default() -> Self {
        Self::new(EmergencyWeights::default())
    }
}

impl EmergencyClassifier {
    pub fn new(weights: EmergencyWeights) -> Self {
        Self {
            weights,
            immediate: PatternGroup::compile("immediate_danger", IMMEDIATE_DANGER),
            medical: PatternGroup::compile("medical", MEDICAL),
            safety: PatternGroup::compile("safety_threat", SAFETY_THREAT),
            distress: PatternGroup::compile("emotional_distress", EMOTIONAL_DISTRESS),
            help_with: PatternGroup::compile("help_with", HELP_WITH),
            question: PatternGroup::compile("question", QUESTION),
            hypothetical: PatternGroup::compile("hypothetical", HYPOTHETICAL),
        }
    }

    pub fn weights(&self) -> &EmergencyWeights {
        &self.weights
    }

    pub fn classify(&self, text: &str, sentiment: &Sentiment) -> EmergencyVerdict {
        let w = &self.weights;
        let lower = text.trim().to_lowercase();
        let polarity = sentiment.polarity;
        let subjectivity = sentiment.subjectivity;

        let mut b = EmergencyBreakdown {
            immediate_count: self.immediate.count_occurrences(&lower),
            medical_count: self.medical.count_occurrences(&lower),
            safety_count: self.safety.count_occurrences(&lower),
            distress_count: self.distress.count_occurrences(&lower),
            help_with_count: self.help_with.count_occurrences(&lower),
            question_count: self.question.count_occurrences(&lower),
            hypothetical_count: self.hypothetical.count_occurrences(&lower),
            word_count: lower.split_whitespace().count(),
            ..Default::default()
        };

        b.pattern_score = b.immediate_count as f64 * w.immediate_danger
            + b.medical_count as f64 * w.medical
            + b.safety_count as f64 * w.safety_threat
            + b.distress_count as f64 * w.emotional_distress;

        b.sentiment_score = self.sentiment_contribution(polarity, subjectivity);
        b.surface_score = self.surface_contribution(text, &lower);
        b.suppression_score = self.suppression(&lower, &b);

        let running = b.pattern_score + b.sentiment_score + b.surface_score + b.suppression_score;

        b.length_score = if b.word_count <= 3 && (b.immediate_count > 0 || polarity < -0.5) {
            w.short_message_boost
        } else if b.word_count <= 6 && running > 20.0 {
            w.brief_message_boost
        } else {
            0.0
        };

        let score = (running + b.length_score).max(0.0);
        let mut is_emergency = score >= w.decision_threshold;
        let mut confidence = (score / 100.0).min(1.0);

        let has_immediate = b.immediate_count > 0 || b.safety_count > 0;
        let has_medical_distress = b.medical_count > 0 && polarity < -0.3;
        if !has_immediate && !has_medical_distress && score < w.validation_bypass_threshold {
            if is_emergency {
                tracing::debug!(score, "Emergency score vetoed: no concrete danger signal");
            }
            is_emergency = false;
            confidence /= 2.0;
            b.override_applied = true;
        }

        EmergencyVerdict {
            is_emergency,
            score,
            confidence,
            breakdown: b,
        }
    }

    fn sentiment_contribution(&self, polarity: f64, subjectivity: f64) -> f64 {
        let w = &self.weights;
        let tier = if polarity < -0.4 {
            w.polarity_strong
        } else if polarity < -0.2 {
            w.polarity_moderate
        } else if polarity < 0.0 {
            w.polarity_mild
        } else {
            0.0
        };
        // Only the highest matching subjectivity tier applies.
        let subjective = if subjectivity > 0.8 && polarity < -0.2 {
            w.subjectivity_high
        } else if subjectivity > 0.6 && polarity < -0.3 {
            w.subjectivity_moderate
        } else {
            0.0
        };
        tier + subjective
    }

    /// Exclamation runs and shouting are read off the original casing.
    fn surface_contribution(&self, original: &str, lower: &str) -> f64 {
        let w = &self.weights;
        let mut score = 0.0;

        let longest_bang_run = original
            .split(|c: char| c != '!')
            .map(str::len)
            .max()
            .unwrap_or(0);
        if longest_bang_run >= 3 {
            score += w.exclamation_run;
        } else if longest_bang_run == 2 {
            score += w.exclamation_pair;
        }

        if SHOUTED_WORD.is_match(original) {
            score += w.shouting;
        }
        if URGENCY.is_match(lower) {
            score += w.urgency_words;
        }
        score
    }

    fn suppression(&self, lower: &str, b: &EmergencyBreakdown) -> f64 {
        let w = &self.weights;
        let mut score = b.help_with_count as f64 * w.help_with
            + b.question_count as f64 * w.question
            + b.hypothetical_count as f64 * w.hypothetical;

        if b.word_count > 30 && b.question_count > 0 {
            score += w.long_question;
        }
        if POLITE.is_match(lower) {
            score += w.polite;
        }
        if CASUAL_INQUIRY.is_match(lower) {
            score += w.casual_inquiry;
        }
        if SYMPTOM_INQUIRY.is_match(lower) {
            score += w.symptom_inquiry;
        }
        if ACADEMIC.is_match(lower) {
            score += w.academic;
        }
        score
    }
}
