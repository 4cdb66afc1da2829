use std::time::Instant;

use sqlx::postgres::{PgQueryResult, PgRow};
use sqlx::FromRow;
use tracing::{debug, warn};

use super::error::StorageError;
use super::params::{NamedQuery, SqlResult};
use super::transaction::UnitOfWork;
use super::value::{bind_query, bind_query_as, bind_query_scalar};
use crate::config;

// The unit of work's transaction when one is open, the pool otherwise.
macro_rules! run_on {
    ($uow:expr, $query:expr, $method:ident) => {
        match $uow.transaction_mut() {
            Some(tx) => $query.$method(&mut **tx).await,
            None => $query.$method($uow.pool()).await,
        }
    };
}

fn prepare(query: &NamedQuery) -> Result<SqlResult, StorageError> {
    let compiled = query.compile()?;
    if config::config().database.enable_query_logging {
        debug!(sql = %compiled.query, params = compiled.params.len(), "executing statement");
    }
    Ok(compiled)
}

fn observe(sql: &str, started: Instant) {
    let db = &config::config().database;
    let elapsed = started.elapsed().as_millis() as u64;
    if db.enable_slow_query_warning && elapsed >= db.slow_query_threshold_ms {
        warn!(elapsed_ms = elapsed, sql = %sql, "slow query");
    }
}

/// Run a statement that returns no rows
pub async fn execute(uow: &mut UnitOfWork, query: &NamedQuery) -> Result<PgQueryResult, StorageError> {
    let compiled = prepare(query)?;
    let started = Instant::now();

    let mut q = sqlx::query(&compiled.query);
    for p in &compiled.params {
        q = bind_query(q, p);
    }
    let result = run_on!(uow, q, execute);

    observe(&compiled.query, started);
    result.map_err(|e| StorageError::from(e).with_path("Executor->execute()"))
}

pub async fn fetch_all<T>(uow: &mut UnitOfWork, query: &NamedQuery) -> Result<Vec<T>, StorageError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let compiled = prepare(query)?;
    let started = Instant::now();

    let mut q = sqlx::query_as::<_, T>(&compiled.query);
    for p in &compiled.params {
        q = bind_query_as(q, p);
    }
    let rows = run_on!(uow, q, fetch_all);

    observe(&compiled.query, started);
    rows.map_err(|e| StorageError::from(e).with_path("Executor->fetch_all()"))
}

pub async fn fetch_optional<T>(uow: &mut UnitOfWork, query: &NamedQuery) -> Result<Option<T>, StorageError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let compiled = prepare(query)?;
    let started = Instant::now();

    let mut q = sqlx::query_as::<_, T>(&compiled.query);
    for p in &compiled.params {
        q = bind_query_as(q, p);
    }
    let row = run_on!(uow, q, fetch_optional);

    observe(&compiled.query, started);
    row.map_err(|e| StorageError::from(e).with_path("Executor->fetch_optional()"))
}

/// Single-record read; zero rows is `NotFound`
pub async fn fetch_one<T>(uow: &mut UnitOfWork, query: &NamedQuery) -> Result<T, StorageError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    fetch_optional(uow, query).await?.ok_or(StorageError::NotFound)
}

/// First column of the first row as a count
pub async fn fetch_count(uow: &mut UnitOfWork, query: &NamedQuery) -> Result<i64, StorageError> {
    let compiled = prepare(query)?;
    let started = Instant::now();

    let mut q = sqlx::query_scalar::<_, i64>(&compiled.query);
    for p in &compiled.params {
        q = bind_query_scalar(q, p);
    }
    let count = run_on!(uow, q, fetch_one);

    observe(&compiled.query, started);
    count.map_err(|e| StorageError::from(e).with_path("Executor->fetch_count()"))
}
