#![allow(dead_code)]

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use luxe_api::config;
use luxe_api::database::models::Bank;
use luxe_api::database::{Actor, DatabaseManager, UnitOfWork};

/// Migrated pool for integration tests, or `None` when `DATABASE_URL` is unset
pub async fn pool() -> Result<Option<PgPool>> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set; skipping database test");
        return Ok(None);
    }
    let pool = DatabaseManager::connect(&config::config().database)
        .await
        .context("connecting to test database")?;
    DatabaseManager::migrate(&pool).await.context("migrating test database")?;
    Ok(Some(pool))
}

pub fn actor() -> Actor {
    Actor::new("tester-1", "Tester")
}

pub fn unit_of_work(pool: &PgPool) -> UnitOfWork {
    UnitOfWork::new(pool.clone(), actor())
}

/// Throwaway copy of `like`'s columns, dropped by [`ScratchTable::drop_table`]
pub struct ScratchTable {
    pub name: String,
    pool: PgPool,
}

impl ScratchTable {
    pub async fn like(pool: &PgPool, like: &str) -> Result<Self> {
        let name = format!("t_{}", Uuid::new_v4().simple());
        sqlx::query(&format!("CREATE TABLE \"{}\" (LIKE \"{}\" INCLUDING ALL)", name, like))
            .execute(pool)
            .await?;
        Ok(Self { name, pool: pool.clone() })
    }

    pub async fn with_ddl(pool: &PgPool, columns: &str) -> Result<Self> {
        let name = format!("t_{}", Uuid::new_v4().simple());
        sqlx::query(&format!("CREATE TABLE \"{}\" ({})", name, columns)).execute(pool).await?;
        Ok(Self { name, pool: pool.clone() })
    }

    pub async fn drop_table(self) -> Result<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", self.name)).execute(&self.pool).await?;
        Ok(())
    }
}

pub fn bank(name: &str) -> Bank {
    Bank {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        status_id: "1".to_string(),
        status_name: None,
        created_at: None,
        created_by: None,
        updated_at: None,
        updated_by: None,
    }
}
