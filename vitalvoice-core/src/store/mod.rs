//! Persistence collaborators.
//!
//! The router and HTTP layer only see these traits. `PgStore` is the
//! production implementation; `MemoryStore` backs tests and local runs
//! without a database.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::VitalError;
use crate::models::{ConversationTurn, NewReminder, ReminderRecord, SavedContact};

#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Persist a reminder and return it with its id and timestamps.
    async fn save(&self, reminder: NewReminder) -> Result<ReminderRecord, VitalError>;

    /// A user's reminders, soonest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<ReminderRecord>, VitalError>;

    async fn get(&self, id: Uuid) -> Result<Option<ReminderRecord>, VitalError>;

    /// Delete a reminder owned by `user_id`. Returns false when nothing matched.
    async fn delete(&self, id: Uuid, user_id: &str) -> Result<bool, VitalError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append turns to the user's log in the given order.
    async fn append_history(
        &self,
        user_id: &str,
        turns: &[ConversationTurn],
    ) -> Result<(), VitalError>;

    /// The most recent `limit` turns (all when `None`), oldest first.
    async fn find_history(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ConversationTurn>, VitalError>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn list_contacts(&self, user_id: &str) -> Result<Vec<SavedContact>, VitalError>;

    /// Insert, or replace the contact with the same `(user_id, id)`.
    async fn add_contact(&self, contact: SavedContact) -> Result<SavedContact, VitalError>;

    async fn delete_contact(&self, user_id: &str, id: &str) -> Result<bool, VitalError>;
}
