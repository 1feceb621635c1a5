use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ContactStore, HistoryStore, ReminderStore};
use crate::error::VitalError;
use crate::models::{ConversationTurn, NewReminder, ReminderRecord, Role, SavedContact};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ReminderStore for PgStore {
    async fn save(&self, reminder: NewReminder) -> Result<ReminderRecord, VitalError> {
        let record = sqlx::query_as::<_, ReminderRecord>(
            r#"
            INSERT INTO reminders (id, user_id, title, date, time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, title, date, time, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&reminder.user_id)
        .bind(&reminder.title)
        .bind(&reminder.date)
        .bind(&reminder.time)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id = %record.id, user_id = %record.user_id, "Reminder saved");
        Ok(record)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<ReminderRecord>, VitalError> {
        let rows = sqlx::query_as::<_, ReminderRecord>(
            r#"
            SELECT id, user_id, title, date, time, created_at, updated_at
            FROM reminders
            WHERE user_id = $1
            ORDER BY date ASC, time ASC, created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ReminderRecord>, VitalError> {
        let row = sqlx::query_as::<_, ReminderRecord>(
            "SELECT id, user_id, title, date, time, created_at, updated_at FROM reminders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid, user_id: &str) -> Result<bool, VitalError> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl HistoryStore for PgStore {
    async fn append_history(
        &self,
        user_id: &str,
        turns: &[ConversationTurn],
    ) -> Result<(), VitalError> {
        let mut tx = self.pool.begin().await?;
        for turn in turns {
            sqlx::query(
                "INSERT INTO conversation_turns (user_id, role, content, created_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(user_id)
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .bind(turn.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_history(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ConversationTurn>, VitalError> {
        let rows: Vec<(String, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT role, content, created_at FROM (
                SELECT seq, role, content, created_at
                FROM conversation_turns
                WHERE user_id = $1
                ORDER BY seq DESC
                LIMIT $2
            ) recent
            ORDER BY seq ASC
            "#,
        )
        .bind(user_id)
        .bind(limit.map(|n| n as i64))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(role, content, created_at)| {
                let role: Role = role.parse().map_err(VitalError::Other)?;
                Ok(ConversationTurn {
                    role,
                    content,
                    created_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ContactStore for PgStore {
    async fn list_contacts(&self, user_id: &str) -> Result<Vec<SavedContact>, VitalError> {
        let rows = sqlx::query_as::<_, SavedContact>(
            "SELECT id, user_id, name, phone, relationship FROM saved_contacts WHERE user_id = $1 ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn add_contact(&self, contact: SavedContact) -> Result<SavedContact, VitalError> {
        let saved = sqlx::query_as::<_, SavedContact>(
            r#"
            INSERT INTO saved_contacts (id, user_id, name, phone, relationship)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, id) DO UPDATE
                SET name = EXCLUDED.name,
                    phone = EXCLUDED.phone,
                    relationship = EXCLUDED.relationship
            RETURNING id, user_id, name, phone, relationship
            "#,
        )
        .bind(&contact.id)
        .bind(&contact.user_id)
        .bind(&contact.name)
        .bind(&contact.phone)
        .bind(&contact.relationship)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    async fn delete_contact(&self, user_id: &str, id: &str) -> Result<bool, VitalError> {
        let result = sqlx::query("DELETE FROM saved_contacts WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
