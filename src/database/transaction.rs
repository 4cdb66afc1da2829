use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use super::error::StorageError;

/// The authenticated user a unit of work acts on behalf of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Open,
    Committed,
    RolledBack,
}

/// Per-request execution context: who is acting and where statements run.
///
/// Statements go to the open transaction when there is one and straight to
/// the pool otherwise.
pub struct UnitOfWork {
    actor: Actor,
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    state: TxState,
}

/// Marks whether a scope began the transaction it runs in
#[must_use]
pub(crate) struct TxScope {
    owned: bool,
}

impl UnitOfWork {
    pub fn new(pool: PgPool, actor: Actor) -> Self {
        Self { actor, pool, tx: None, state: TxState::Idle }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    pub(crate) fn transaction_mut(&mut self) -> Option<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut()
    }

    /// Join the open transaction or begin a new one
    pub(crate) async fn open_scope(&mut self) -> Result<TxScope, StorageError> {
        if self.tx.is_some() {
            return Ok(TxScope { owned: false });
        }

        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::from(e).with_path("UnitOfWork->begin()"))?;
        self.tx = Some(tx);
        self.state = TxState::Open;
        debug!(actor = %self.actor.id, "transaction opened");
        Ok(TxScope { owned: true })
    }

    /// Commit or roll back a transaction this scope began; joined scopes pass the result through
    pub(crate) async fn close_scope<R, E>(&mut self, scope: TxScope, result: Result<R, E>) -> Result<R, E>
    where
        E: From<StorageError>,
    {
        if !scope.owned {
            return result;
        }
        let Some(tx) = self.tx.take() else {
            return result;
        };

        match result {
            Ok(value) => match tx.commit().await {
                Ok(()) => {
                    self.state = TxState::Committed;
                    debug!(actor = %self.actor.id, "transaction committed");
                    Ok(value)
                }
                Err(e) => {
                    self.state = TxState::RolledBack;
                    Err(E::from(StorageError::from(e).with_path("UnitOfWork->commit()")))
                }
            },
            Err(err) => {
                if let Err(e) = tx.rollback().await {
                    warn!("rollback failed: {}", e);
                }
                self.state = TxState::RolledBack;
                debug!(actor = %self.actor.id, "transaction rolled back");
                Err(err)
            }
        }
    }
}

/// Hands out units of work bound to the application pool
#[derive(Clone)]
pub struct TransactionManager {
    pool: PgPool,
}

impl TransactionManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn unit_of_work(&self, actor: Actor) -> UnitOfWork {
        UnitOfWork::new(self.pool.clone(), actor)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Run `f` inside a transaction on `uow`.
///
/// `Ok` commits and `Err` rolls back. When `uow` already has an open
/// transaction, `f` joins it and the outermost caller decides the outcome.
pub async fn run_in_transaction<R, E, F>(uow: &mut UnitOfWork, f: F) -> Result<R, E>
where
    F: for<'c> FnOnce(&'c mut UnitOfWork) -> BoxFuture<'c, Result<R, E>>,
    E: From<StorageError>,
{
    let scope = uow.open_scope().await.map_err(E::from)?;
    let result = f(uow).await;
    uow.close_scope(scope, result).await
}
