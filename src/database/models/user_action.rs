use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserAction {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub table_name: String,
    pub action: String,
    pub action_value: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ref_id: String,
}
