use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_REMINDER_TITLE: &str = "New Reminder";

/// A persisted reminder. `date` is always `YYYY-MM-DD` and `time` is always
/// `HH:MM`; both are filled by the resolver before a record is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReminderRecord {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub title: String,
    pub date: String,
    pub time: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reminder ready to be written; ids and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReminder {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub title: String,
    pub date: String,
    pub time: String,
}
