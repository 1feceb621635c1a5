use serde::{Deserialize, Serialize};

/// An emergency contact saved by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SavedContact {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub phone: String,
    pub relationship: String,
}
