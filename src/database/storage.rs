use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::FromRow;
use tracing::debug;

use super::audit::{validate_status, AuditTrail, RecordDiff};
use super::descriptor::{describe, Describable, RecordDescriptor, StorageConfig};
use super::error::StorageError;
use super::executor;
use super::params::{NamedParams, NamedQuery};
use super::statement::{self, Pagination};
use super::transaction::UnitOfWork;
use super::value::SqlValue;
use crate::config;

/// Counts reported by bulk writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub rows_affected: u64,
    pub statements: usize,
}

/// Generic mapper for one record type stored in one table.
///
/// Holds no connection; every call runs through the given [`UnitOfWork`].
/// `insert`, `update` and `update_status` write their audit row in the same
/// transaction as the change, opening one when the unit of work has none.
pub struct Storage<T> {
    descriptor: Arc<RecordDescriptor>,
    audit: AuditTrail,
    placeholder_budget: usize,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Storage<T> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            audit: self.audit.clone(),
            placeholder_budget: self.placeholder_budget,
            _record: PhantomData,
        }
    }
}

impl<T: Describable> Storage<T> {
    pub fn new(table: &str, storage_config: StorageConfig) -> Result<Self, StorageError> {
        Ok(Self {
            descriptor: describe::<T>(table, storage_config)?,
            audit: AuditTrail::default(),
            placeholder_budget: config::config().database.placeholder_budget,
            _record: PhantomData,
        })
    }

    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_placeholder_budget(mut self, budget: usize) -> Self {
        self.placeholder_budget = budget.max(1);
        self
    }

    pub fn descriptor(&self) -> &RecordDescriptor {
        &self.descriptor
    }

    pub fn table(&self) -> &str {
        &self.descriptor.table
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// First record matching `predicate`
    pub async fn single(&self, uow: &mut UnitOfWork, predicate: &str, params: NamedParams) -> Result<T, StorageError> {
        let query = statement::select(&self.descriptor, Some(predicate), params, None, Pagination::new(1, 1))?;
        executor::fetch_one(uow, &query).await.map_err(|e| e.with_path("Storage->single()"))
    }

    /// Every record matching `predicate`
    pub async fn where_(&self, uow: &mut UnitOfWork, predicate: &str, params: NamedParams) -> Result<Vec<T>, StorageError> {
        let query = statement::select(&self.descriptor, Some(predicate), params, None, Pagination::all())?;
        executor::fetch_all(uow, &query).await.map_err(|e| e.with_path("Storage->where_()"))
    }

    /// Run a caller-written select and map rows into `R`
    pub async fn select_with_query<R>(&self, uow: &mut UnitOfWork, sql: &str, params: NamedParams) -> Result<Vec<R>, StorageError>
    where
        R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        executor::fetch_all(uow, &NamedQuery::new(sql, params))
            .await
            .map_err(|e| e.with_path("Storage->select_with_query()"))
    }

    pub async fn select_first_with_query<R>(&self, uow: &mut UnitOfWork, sql: &str, params: NamedParams) -> Result<R, StorageError>
    where
        R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        executor::fetch_one(uow, &NamedQuery::new(sql, params))
            .await
            .map_err(|e| e.with_path("Storage->select_first_with_query()"))
    }

    pub async fn find_by_id(&self, uow: &mut UnitOfWork, id: &str) -> Result<T, StorageError> {
        let query = statement::find_by_id(&self.descriptor, id)?;
        executor::fetch_one(uow, &query).await.map_err(|e| e.with_path("Storage->find_by_id()"))
    }

    /// Page through every live record ordered by id; page and size must both be positive to paginate
    pub async fn find_all(&self, uow: &mut UnitOfWork, page: i64, size: i64, ascending: bool) -> Result<Vec<T>, StorageError> {
        let query = statement::find_all(&self.descriptor, Pagination::new(page, size), ascending)?;
        executor::fetch_all(uow, &query).await.map_err(|e| e.with_path("Storage->find_all()"))
    }

    pub async fn count_all(&self, uow: &mut UnitOfWork) -> Result<i64, StorageError> {
        executor::fetch_count(uow, &statement::count_all(&self.descriptor))
            .await
            .map_err(|e| e.with_path("Storage->count_all()"))
    }

    /// Free-form statement; returns affected rows
    pub async fn exec_query(&self, uow: &mut UnitOfWork, sql: &str, params: NamedParams) -> Result<u64, StorageError> {
        executor::execute(uow, &NamedQuery::new(sql, params))
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| e.with_path("Storage->exec_query()"))
    }

    fn identity(&self, values: &[SqlValue]) -> Result<String, StorageError> {
        match self.descriptor.identity_of(values)? {
            SqlValue::Text(Some(id)) => Ok(id),
            other => Err(StorageError::Misuse(format!(
                "identity of table {} must be text, got {:?}",
                self.descriptor.table, other
            ))),
        }
    }

    pub async fn insert(&self, uow: &mut UnitOfWork, record: &T) -> Result<u64, StorageError> {
        let scope = uow.open_scope().await?;
        let result = self.insert_with_trail(uow, record).await;
        uow.close_scope(scope, result).await.map_err(|e| e.with_path("Storage->insert()"))
    }

    async fn insert_with_trail(&self, uow: &mut UnitOfWork, record: &T) -> Result<u64, StorageError> {
        let values = record.values();
        let id = self.identity(&values)?;
        let rows = self.insert_values(uow, &values).await?;
        self.audit.record_create(uow, &self.descriptor.table, &id).await?;
        Ok(rows)
    }

    pub async fn insert_no_trail(&self, uow: &mut UnitOfWork, record: &T) -> Result<u64, StorageError> {
        self.insert_values(uow, &record.values())
            .await
            .map_err(|e| e.with_path("Storage->insert_no_trail()"))
    }

    async fn insert_values(&self, uow: &mut UnitOfWork, values: &[SqlValue]) -> Result<u64, StorageError> {
        let query = statement::insert(&self.descriptor, uow.actor(), Utc::now(), values)?;
        Ok(executor::execute(uow, &query).await?.rows_affected())
    }

    /// Batched multi-row insert stamped with the current time
    pub async fn insert_many(&self, uow: &mut UnitOfWork, records: &[T]) -> Result<BulkOutcome, StorageError> {
        self.insert_many_with_time(uow, records, Utc::now()).await
    }

    /// Batched multi-row insert with an explicit creation time.
    ///
    /// Batches run in order and stop at the first failure. Batches that ran
    /// before it stay applied unless the unit of work has a transaction open.
    pub async fn insert_many_with_time(
        &self,
        uow: &mut UnitOfWork,
        records: &[T],
        created_at: DateTime<Utc>,
    ) -> Result<BulkOutcome, StorageError> {
        let rows: Vec<Vec<SqlValue>> = records.iter().map(T::values).collect();
        let batches = statement::insert_batches(&self.descriptor, uow.actor(), created_at, &rows, self.placeholder_budget)?;
        self.run_batches(uow, &batches).await.map_err(|e| e.with_path("Storage->insert_many()"))
    }

    async fn run_batches(&self, uow: &mut UnitOfWork, batches: &[NamedQuery]) -> Result<BulkOutcome, StorageError> {
        let mut outcome = BulkOutcome::default();
        for (i, batch) in batches.iter().enumerate() {
            let result = executor::execute(uow, batch).await?;
            outcome.rows_affected += result.rows_affected();
            outcome.statements += 1;
            debug!(table = %self.descriptor.table, batch = i + 1, of = batches.len(), "batch applied");
        }
        Ok(outcome)
    }

    /// Update every writable column from `record` and audit the change.
    ///
    /// Returns the per-column diff against the stored row.
    pub async fn update(&self, uow: &mut UnitOfWork, record: &T) -> Result<RecordDiff, StorageError> {
        let scope = uow.open_scope().await?;
        let result = self.update_with_trail(uow, record).await;
        uow.close_scope(scope, result).await.map_err(|e| e.with_path("Storage->update()"))
    }

    async fn update_with_trail(&self, uow: &mut UnitOfWork, record: &T) -> Result<RecordDiff, StorageError> {
        let after = record.values();
        let id = self.identity(&after)?;
        let before = self.find_by_id(uow, &id).await?.values();

        self.update_values(uow, &after).await?;
        self.audit.record_update(uow, &self.descriptor, &before, &after, &id).await
    }

    pub async fn update_no_trail(&self, uow: &mut UnitOfWork, record: &T) -> Result<u64, StorageError> {
        self.update_values(uow, &record.values())
            .await
            .map_err(|e| e.with_path("Storage->update_no_trail()"))
    }

    async fn update_values(&self, uow: &mut UnitOfWork, values: &[SqlValue]) -> Result<u64, StorageError> {
        let query = statement::update(&self.descriptor, uow.actor(), Utc::now(), values)?;
        match executor::execute(uow, &query).await?.rows_affected() {
            0 => Err(StorageError::NotFound),
            n => Ok(n),
        }
    }

    /// Batched set-from-values update keyed on id; same failure semantics as `insert_many`
    pub async fn update_many(&self, uow: &mut UnitOfWork, records: &[T]) -> Result<BulkOutcome, StorageError> {
        let rows: Vec<Vec<SqlValue>> = records.iter().map(T::values).collect();
        let batches = statement::update_batches(&self.descriptor, uow.actor(), Utc::now(), &rows, self.placeholder_budget)?;
        self.run_batches(uow, &batches).await.map_err(|e| e.with_path("Storage->update_many()"))
    }

    /// Move a record to status `"0"` or `"1"` and audit the transition.
    /// Any other code fails before a statement is issued.
    pub async fn update_status(&self, uow: &mut UnitOfWork, id: &str, status: &str) -> Result<(), StorageError> {
        validate_status(status)?;
        let query = statement::update_status(&self.descriptor, uow.actor(), Utc::now(), id, status)?;

        let scope = uow.open_scope().await?;
        let result = self.update_status_with_trail(uow, &query, id, status).await;
        uow.close_scope(scope, result).await.map_err(|e| e.with_path("Storage->update_status()"))
    }

    async fn update_status_with_trail(&self, uow: &mut UnitOfWork, query: &NamedQuery, id: &str, status: &str) -> Result<(), StorageError> {
        if executor::execute(uow, query).await?.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        self.audit.record_status_change(uow, &self.descriptor.table, id, status).await
    }

    /// Soft delete; a hard delete on immutable tables
    pub async fn delete(&self, uow: &mut UnitOfWork, id: &str) -> Result<(), StorageError> {
        let query = statement::delete(&self.descriptor, uow.actor(), Utc::now(), id)?;
        match executor::execute(uow, &query).await {
            Ok(r) if r.rows_affected() == 0 => Err(StorageError::NotFound),
            Ok(_) => Ok(()),
            Err(e) => Err(e.with_path("Storage->delete()")),
        }
    }

    pub async fn delete_many(&self, uow: &mut UnitOfWork, ids: &[String]) -> Result<u64, StorageError> {
        let Some(query) = statement::delete_many(&self.descriptor, uow.actor(), Utc::now(), ids)? else {
            return Ok(0);
        };
        executor::execute(uow, &query)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| e.with_path("Storage->delete_many()"))
    }

    pub async fn hard_delete(&self, uow: &mut UnitOfWork, id: &str) -> Result<(), StorageError> {
        let query = statement::hard_delete(&self.descriptor, id)?;
        match executor::execute(uow, &query).await {
            Ok(r) if r.rows_affected() == 0 => Err(StorageError::NotFound),
            Ok(_) => Ok(()),
            Err(e) => Err(e.with_path("Storage->hard_delete()")),
        }
    }
}
