pub mod alerts;
pub mod clock;
pub mod completion;
pub mod config;
pub mod db;
pub mod emergency;
pub mod error;
pub mod intent;
pub mod models;
pub mod patterns;
pub mod resolver;
pub mod sentiment;
pub mod store;

pub use alerts::{AlertError, AlertSender, TwilioAlertSender, TwilioCredentials};
pub use clock::{Clock, FixedClock, SystemClock};
pub use completion::{CompletionError, TextCompletion, TogetherCompletionClient};
pub use config::VitalConfig;
pub use emergency::{EmergencyClassifier, EmergencyVerdict, EmergencyWeights};
pub use error::VitalError;
pub use intent::{ReminderComponents, ReminderIntentClassifier, ReminderVerdict, ReminderWeights};
pub use sentiment::{LexiconAnalyzer, Sentiment, SentimentAnalyzer, SentimentScorer, ToneHint};
pub use store::{ContactStore, HistoryStore, MemoryStore, PgStore, ReminderStore};
