//! Sentiment signal consumed by the emergency classifier and by reply tone
//! selection.
//!
//! The analysis primitive sits behind [`SentimentAnalyzer`]. The shipped
//! [`LexiconAnalyzer`] averages per-word polarity/subjectivity from a small
//! adjective lexicon, scaling by a preceding intensifier and flipping (and
//! damping) under negation.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Sentiment {
    /// -1.0 (very negative) ..= 1.0 (very positive)
    pub polarity: f64,
    /// 0.0 (objective) ..= 1.0 (subjective)
    pub subjectivity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneHint {
    Encouraging,
    Empathetic,
}

impl ToneHint {
    pub fn instruction(&self) -> &'static str {
        match self {
            ToneHint::Encouraging => {
                "The user seems happy or positive. You can reply in an encouraging and friendly tone."
            }
            ToneHint::Empathetic => {
                "The user seems upset or worried. Please reply with extra empathy and reassurance."
            }
        }
    }
}

impl Sentiment {
    pub fn tone_hint(&self) -> Option<ToneHint> {
        if self.polarity > 0.1 {
            Some(ToneHint::Encouraging)
        } else if self.polarity < -0.1 {
            Some(ToneHint::Empathetic)
        } else {
            None
        }
    }
}

/// Lexical polarity/subjectivity primitive.
pub trait SentimentAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Sentiment;
}

/// Clamps whatever the analyzer returns into the documented ranges.
#[derive(Clone)]
pub struct SentimentScorer {
    analyzer: Arc<dyn SentimentAnalyzer>,
}

impl SentimentScorer {
    pub fn new(analyzer: Arc<dyn SentimentAnalyzer>) -> Self {
        Self { analyzer }
    }

    pub fn score(&self, text: &str) -> Sentiment {
        let raw = self.analyzer.analyze(text);
        Sentiment {
            polarity: finite_or_zero(raw.polarity).clamp(-1.0, 1.0),
            subjectivity: finite_or_zero(raw.subjectivity).clamp(0.0, 1.0),
        }
    }
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new(Arc::new(LexiconAnalyzer))
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

// ============================================================================
// LexiconAnalyzer
// ============================================================================

/// (word, polarity, subjectivity)
const LEXICON: &[(&str, f64, f64)] = &[
    ("good", 0.7, 0.6),
    ("great", 0.8, 0.75),
    ("happy", 0.8, 1.0),
    ("glad", 0.5, 1.0),
    ("wonderful", 1.0, 1.0),
    ("excellent", 1.0, 1.0),
    ("amazing", 0.6, 0.9),
    ("awesome", 1.0, 1.0),
    ("fantastic", 0.4, 0.9),
    ("perfect", 1.0, 1.0),
    ("beautiful", 0.85, 1.0),
    ("nice", 0.6, 1.0),
    ("fine", 0.4, 0.5),
    ("better", 0.5, 0.5),
    ("best", 1.0, 0.3),
    ("love", 0.5, 0.6),
    ("lovely", 0.5, 0.75),
    ("grateful", 0.7, 0.8),
    ("thankful", 0.5, 0.7),
    ("excited", 0.4, 0.75),
    ("calm", 0.3, 0.75),
    ("relaxed", 0.4, 0.6),
    ("healthy", 0.5, 0.5),
    ("fun", 0.3, 0.2),
    ("okay", 0.5, 0.5),
    ("ok", 0.5, 0.5),
    ("bad", -0.7, 0.67),
    ("terrible", -1.0, 1.0),
    ("awful", -1.0, 1.0),
    ("horrible", -1.0, 1.0),
    ("worst", -1.0, 1.0),
    ("worse", -0.4, 0.6),
    ("sad", -0.5, 1.0),
    ("unhappy", -0.6, 0.9),
    ("upset", -0.6, 0.7),
    ("worried", -0.4, 0.7),
    ("scared", -0.5, 0.8),
    ("afraid", -0.6, 0.9),
    ("terrified", -1.0, 1.0),
    ("frightened", -0.7, 0.9),
    ("anxious", -0.25, 0.75),
    ("depressed", -0.6, 0.8),
    ("lonely", -0.5, 0.8),
    ("alone", -0.3, 0.6),
    ("hopeless", -0.8, 0.9),
    ("miserable", -1.0, 1.0),
    ("sick", -0.7, 0.85),
    ("ill", -0.5, 0.8),
    ("painful", -0.7, 0.9),
    ("pain", -0.5, 0.6),
    ("hurts", -0.5, 0.6),
    ("weak", -0.375, 0.5),
    ("tired", -0.4, 0.7),
    ("exhausted", -0.4, 0.7),
    ("dizzy", -0.4, 0.6),
    ("angry", -0.5, 1.0),
    ("frustrated", -0.7, 0.4),
    ("stressed", -0.5, 0.7),
    ("severe", -0.6, 0.75),
    ("serious", -0.3, 0.67),
    ("wrong", -0.5, 0.9),
    ("dead", -0.2, 0.4),
    ("dying", -0.6, 0.8),
];

/// (word, multiplier)
const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("really", 1.3),
    ("so", 1.2),
    ("too", 1.2),
    ("super", 1.3),
    ("quite", 1.1),
    ("extremely", 1.5),
    ("incredibly", 1.5),
    ("absolutely", 1.4),
];

const NEGATIONS: &[&str] = &["not", "no", "never", "cannot", "nothing", "without"];

/// Negated words flip sign and keep half their strength ("not good" ≈ -0.35).
const NEGATION_FACTOR: f64 = -0.5;

static LEXICON_INDEX: Lazy<HashMap<&'static str, (f64, f64)>> =
    Lazy::new(|| LEXICON.iter().map(|&(w, p, s)| (w, (p, s))).collect());

#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconAnalyzer;

impl SentimentAnalyzer for LexiconAnalyzer {
    fn analyze(&self, text: &str) -> Sentiment {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|t| !t.is_empty())
            .collect();

        let mut polarities = Vec::new();
        let mut subjectivities = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            let Some(&(mut p, mut s)) = LEXICON_INDEX.get(token) else {
                continue;
            };

            if let Some(prev) = i.checked_sub(1).map(|j| tokens[j]) {
                if let Some((_, factor)) = INTENSIFIERS.iter().find(|(w, _)| *w == prev) {
                    p *= factor;
                    s *= factor;
                }
            }

            let window = &tokens[i.saturating_sub(3)..i];
            if window.iter().any(|t| is_negation(t)) {
                p *= NEGATION_FACTOR;
            }

            polarities.push(p.clamp(-1.0, 1.0));
            subjectivities.push(s.clamp(0.0, 1.0));
        }

        if polarities.is_empty() {
            return Sentiment::default();
        }

        let n = polarities.len() as f64;
        Sentiment {
            polarity: polarities.iter().sum::<f64>() / n,
            subjectivity: subjectivities.iter().sum::<f64>() / n,
        }
    }
}

fn is_negation(token: &str) -> bool {
    NEGATIONS.contains(&token) || token.ends_with("n't")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(text: &str) -> Sentiment {
        SentimentScorer::default().score(text)
    }

    #[test]
    fn test_neutral_text_scores_zero() {
        let s = score("set a reminder for the blue folder");
        assert_eq!(s.polarity, 0.0);
        assert_eq!(s.subjectivity, 0.0);
        assert_eq!(s.tone_hint(), None);
    }

    #[test]
    fn test_positive_text_is_encouraging() {
        let s = score("I feel great today, what a wonderful morning");
        assert!(s.polarity > 0.1, "got {:?}", s);
        assert_eq!(s.tone_hint(), Some(ToneHint::Encouraging));
    }

    #[test]
    fn test_negative_text_is_empathetic() {
        let s = score("I am so scared and I feel terrible");
        assert!(s.polarity < -0.4, "got {:?}", s);
        assert!(s.subjectivity > 0.8);
        assert_eq!(s.tone_hint(), Some(ToneHint::Empathetic));
    }

    #[test]
    fn test_negation_flips_polarity() {
        let s = score("I don't feel good");
        assert!(s.polarity < 0.0, "got {:?}", s);
    }

    #[test]
    fn test_intensifier_scales_and_clamps() {
        let plain = score("bad");
        let strong = score("very bad");
        assert!(strong.polarity < plain.polarity);
        assert!(score("extremely terrible").polarity >= -1.0);
    }

    struct Wild;
    impl SentimentAnalyzer for Wild {
        fn analyze(&self, _text: &str) -> Sentiment {
            Sentiment { polarity: -7.0, subjectivity: f64::NAN }
        }
    }

    #[test]
    fn test_scorer_clamps_external_analyzer() {
        let s = SentimentScorer::new(Arc::new(Wild)).score("anything");
        assert_eq!(s.polarity, -1.0);
        assert_eq!(s.subjectivity, 0.0);
    }
}
