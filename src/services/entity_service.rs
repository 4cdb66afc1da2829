use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::audit::validate_status;
use crate::database::error::StorageError;
use crate::database::models::{Entity, Status, User};
use crate::database::repository::EntityRepository;
use crate::database::transaction::{Actor, TransactionManager, UnitOfWork};
use crate::filter::types::FindAllParams;
use crate::services::password::verify_password;

/// A page of records plus the total across all pages
#[derive(Debug, Clone, Serialize)]
pub struct Listing<T> {
    pub total_data: i64,
    pub page: i64,
    pub size: i64,
    pub items: Vec<T>,
}

/// Use cases for one master-data entity
pub struct EntityService<T> {
    repository: EntityRepository<T>,
    transactions: TransactionManager,
}

impl<T> Clone for EntityService<T> {
    fn clone(&self) -> Self {
        Self { repository: self.repository.clone(), transactions: self.transactions.clone() }
    }
}

impl<T: Entity> EntityService<T> {
    pub fn new(pool: PgPool) -> Result<Self, StorageError> {
        Ok(Self { repository: EntityRepository::new()?, transactions: TransactionManager::new(pool) })
    }

    pub fn repository(&self) -> &EntityRepository<T> {
        &self.repository
    }

    fn unit_of_work(&self, actor: &Actor) -> UnitOfWork {
        self.transactions.unit_of_work(actor.clone())
    }

    pub async fn find_all(&self, actor: &Actor, params: &FindAllParams) -> Result<Listing<T>, StorageError> {
        let mut uow = self.unit_of_work(actor);
        let items = self.repository.find_all(&mut uow, params).await?;
        let total_data = self.repository.count(&mut uow, params).await?;
        Ok(Listing { total_data, page: params.page, size: params.size, items })
    }

    pub async fn count(&self, actor: &Actor, params: &FindAllParams) -> Result<i64, StorageError> {
        self.repository.count(&mut self.unit_of_work(actor), params).await
    }

    pub async fn find(&self, actor: &Actor, id: &str) -> Result<T, StorageError> {
        self.repository.find(&mut self.unit_of_work(actor), id).await
    }

    /// Validate, assign a fresh id and the default status, then insert with an audit row
    pub async fn create(&self, actor: &Actor, input: T::Input) -> Result<T, StorageError> {
        T::validate(&input, true)?;
        let record = T::from_input(Uuid::new_v4().to_string(), input);
        self.repository.create(&mut self.unit_of_work(actor), &record).await
    }

    pub async fn update(&self, actor: &Actor, id: &str, input: T::Input) -> Result<T, StorageError> {
        T::validate(&input, false)?;
        let mut uow = self.unit_of_work(actor);
        let mut record = self.repository.find(&mut uow, id).await?;
        record.apply(input);
        let (updated, _diff) = self.repository.update(&mut uow, &record).await?;
        Ok(updated)
    }

    /// Set `status` on every id; all succeed or none do
    pub async fn update_status(&self, actor: &Actor, ids: &[String], status: &str) -> Result<usize, StorageError> {
        if ids.is_empty() {
            return Err(StorageError::Validation("ids must not be empty".to_string()));
        }
        validate_status(status)?;
        let updated = self.repository.update_status(&mut self.unit_of_work(actor), ids, status).await?;
        info!(table = T::TABLE, count = updated, status, "{} status changed", T::LABEL);
        Ok(updated)
    }

    pub async fn find_status(&self, actor: &Actor) -> Result<Vec<Status>, StorageError> {
        self.repository.find_status(&mut self.unit_of_work(actor)).await
    }
}

impl EntityService<User> {
    /// Active user whose username and password match, if any
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<User>, StorageError> {
        let mut uow = self.transactions.unit_of_work(Actor::new("system", "system"));
        let user = match self
            .repository
            .find_by(&mut uow, "username", username)
            .await
        {
            Ok(user) => user,
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        if user.status_id != crate::database::models::DEFAULT_STATUS_ID {
            warn!(username, "login refused for inactive user");
            return Ok(None);
        }
        if !verify_password(password, &user.password) {
            return Ok(None);
        }
        Ok(Some(user))
    }
}
