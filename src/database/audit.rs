use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::descriptor::{quote, RecordDescriptor};
use super::error::StorageError;
use super::executor;
use super::models::UserAction;
use super::params::{NamedParams, NamedQuery};
use super::transaction::UnitOfWork;
use super::value::SqlValue;
use crate::config;

/// Status codes accepted by status transitions
pub const VALID_STATUS_CODES: [&str; 2] = ["0", "1"];

pub fn validate_status(code: &str) -> Result<(), StorageError> {
    if VALID_STATUS_CODES.contains(&code) {
        Ok(())
    } else {
        Err(StorageError::Validation(format!("invalid status code: {}", code)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditAction {
    Create,
    Update,
    UpdateStatus,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "Create",
            AuditAction::Update => "Update",
            AuditAction::UpdateStatus => "Update Status",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stands in for both sides of a changed secret column
pub const REDACTED: &str = "[redacted]";

/// Before and after value of one changed column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub before: Value,
    pub after: Value,
}

/// Changed writable columns of one update, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordDiff {
    pub changes: BTreeMap<String, FieldChange>,
}

impl RecordDiff {
    /// Compare two value rows of the same record type; stamps and identity are ignored
    pub fn between(d: &RecordDescriptor, before: &[SqlValue], after: &[SqlValue]) -> Result<Self, StorageError> {
        d.check_values(before)?;
        d.check_values(after)?;

        let changes = d
            .writable_values(before)
            .zip(d.writable_values(after))
            .filter(|((_, old), (_, new))| old != new)
            .map(|((column, old), (_, new))| {
                let change = if column.is_secret() {
                    FieldChange { before: Value::from(REDACTED), after: Value::from(REDACTED) }
                } else {
                    FieldChange { before: old.to_json(), after: new.to_json() }
                };
                (column.name.to_string(), change)
            })
            .collect();

        Ok(Self { changes })
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.changes.keys().map(String::as_str).collect()
    }
}

/// Receives update diffs; diffs are never persisted
#[async_trait]
pub trait ChangeObserver: Send + Sync {
    async fn on_update(&self, table: &str, ref_id: &str, actor_id: &str, diff: &RecordDiff);
}

/// Default observer: structured log line per update
pub struct TracingObserver;

#[async_trait]
impl ChangeObserver for TracingObserver {
    async fn on_update(&self, table: &str, ref_id: &str, actor_id: &str, diff: &RecordDiff) {
        if diff.is_empty() || !config::config().audit.log_diffs {
            return;
        }
        let changes = serde_json::to_string(&diff.changes).unwrap_or_default();
        tracing::info!(target: "audit", table, ref_id, actor_id, %changes, "record updated");
    }
}

/// Writes append-only `user_actions` rows in the caller's transaction
#[derive(Clone)]
pub struct AuditTrail {
    table: String,
    observer: Arc<dyn ChangeObserver>,
}

impl fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditTrail").field("table", &self.table).finish()
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new(config::config().audit.table.clone())
    }
}

impl AuditTrail {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into(), observer: Arc::new(TracingObserver) }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ChangeObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn entry(&self, uow: &UnitOfWork, table: &str, ref_id: &str, action: AuditAction, value: Option<&str>) -> NamedQuery {
        let sql = format!(
            "INSERT INTO {} (\"id\", \"user_id\", \"user_name\", \"table_name\", \"action\", \"action_value\", \"created_at\", \"ref_id\") \
             VALUES (:id, :user_id, :user_name, :table_name, :action, :action_value, :created_at, :ref_id)",
            quote(&self.table)
        );
        let params = NamedParams::new()
            .with("id", Uuid::new_v4().to_string())
            .with("user_id", uow.actor().id.clone())
            .with("user_name", uow.actor().name.clone())
            .with("table_name", table)
            .with("action", action.as_str())
            .with("action_value", value.map(str::to_string))
            .with("created_at", Utc::now())
            .with("ref_id", ref_id);
        NamedQuery::new(sql, params)
    }

    async fn write(&self, uow: &mut UnitOfWork, query: NamedQuery) -> Result<(), StorageError> {
        executor::execute(uow, &query)
            .await
            .map(|_| ())
            .map_err(|e| e.with_path("AuditTrail->write()"))
    }

    pub async fn record_create(&self, uow: &mut UnitOfWork, table: &str, ref_id: &str) -> Result<(), StorageError> {
        let query = self.entry(uow, table, ref_id, AuditAction::Create, None);
        self.write(uow, query).await
    }

    /// Log the diff through the observer and persist the action row
    pub async fn record_update(
        &self,
        uow: &mut UnitOfWork,
        d: &RecordDescriptor,
        before: &[SqlValue],
        after: &[SqlValue],
        ref_id: &str,
    ) -> Result<RecordDiff, StorageError> {
        let diff = RecordDiff::between(d, before, after)?;
        self.observer.on_update(&d.table, ref_id, &uow.actor().id, &diff).await;

        let query = self.entry(uow, &d.table, ref_id, AuditAction::Update, None);
        self.write(uow, query).await?;
        Ok(diff)
    }

    pub async fn record_status_change(
        &self,
        uow: &mut UnitOfWork,
        table: &str,
        ref_id: &str,
        status: &str,
    ) -> Result<(), StorageError> {
        validate_status(status)?;
        let query = self.entry(uow, table, ref_id, AuditAction::UpdateStatus, Some(status));
        self.write(uow, query).await
    }

    /// Trail entries for one record, oldest first
    pub async fn find_by_ref(&self, uow: &mut UnitOfWork, ref_id: &str) -> Result<Vec<UserAction>, StorageError> {
        let sql = format!(
            "SELECT \"id\", \"user_id\", \"user_name\", \"table_name\", \"action\", \"action_value\", \"created_at\", \"ref_id\" \
             FROM {} WHERE \"ref_id\" = :ref_id ORDER BY \"created_at\" ASC",
            quote(&self.table)
        );
        let query = NamedQuery::new(sql, NamedParams::new().with("ref_id", ref_id));
        executor::fetch_all(uow, &query).await
    }
}
