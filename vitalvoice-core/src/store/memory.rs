use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ContactStore, HistoryStore, ReminderStore};
use crate::error::VitalError;
use crate::models::{ConversationTurn, NewReminder, ReminderRecord, SavedContact};

#[derive(Debug, Default)]
struct Inner {
    reminders: Vec<ReminderRecord>,
    history: HashMap<String, Vec<ConversationTurn>>,
    contacts: Vec<SavedContact>,
}

/// Process-local store with the same semantics as `PgStore`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total reminders held, across users.
    pub async fn reminder_count(&self) -> usize {
        self.inner.lock().await.reminders.len()
    }
}

#[async_trait]
impl ReminderStore for MemoryStore {
    async fn save(&self, reminder: NewReminder) -> Result<ReminderRecord, VitalError> {
        let now = Utc::now();
        let record = ReminderRecord {
            id: Uuid::new_v4(),
            user_id: reminder.user_id,
            title: reminder.title,
            date: reminder.date,
            time: reminder.time,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().await.reminders.push(record.clone());
        Ok(record)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<ReminderRecord>, VitalError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<ReminderRecord> = inner
            .reminders
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.date.as_str(), a.time.as_str(), a.created_at)
                .cmp(&(b.date.as_str(), b.time.as_str(), b.created_at))
        });
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ReminderRecord>, VitalError> {
        let inner = self.inner.lock().await;
        Ok(inner.reminders.iter().find(|r| r.id == id).cloned())
    }

    async fn delete(&self, id: Uuid, user_id: &str) -> Result<bool, VitalError> {
        let mut inner = self.inner.lock().await;
        let before = inner.reminders.len();
        inner
            .reminders
            .retain(|r| !(r.id == id && r.user_id == user_id));
        Ok(inner.reminders.len() < before)
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append_history(
        &self,
        user_id: &str,
        turns: &[ConversationTurn],
    ) -> Result<(), VitalError> {
        let mut inner = self.inner.lock().await;
        inner
            .history
            .entry(user_id.to_string())
            .or_default()
            .extend(turns.iter().cloned());
        Ok(())
    }

    async fn find_history(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ConversationTurn>, VitalError> {
        let inner = self.inner.lock().await;
        let Some(log) = inner.history.get(user_id) else {
            return Ok(Vec::new());
        };
        let skip = limit.map_or(0, |n| log.len().saturating_sub(n));
        Ok(log[skip..].to_vec())
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn list_contacts(&self, user_id: &str) -> Result<Vec<SavedContact>, VitalError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<SavedContact> = inner
            .contacts
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn add_contact(&self, contact: SavedContact) -> Result<SavedContact, VitalError> {
        let mut inner = self.inner.lock().await;
        inner
            .contacts
            .retain(|c| !(c.user_id == contact.user_id && c.id == contact.id));
        inner.contacts.push(contact.clone());
        Ok(contact)
    }

    async fn delete_contact(&self, user_id: &str, id: &str) -> Result<bool, VitalError> {
        let mut inner = self.inner.lock().await;
        let before = inner.contacts.len();
        inner
            .contacts
            .retain(|c| !(c.user_id == user_id && c.id == id));
        Ok(inner.contacts.len() < before)
    }
}
