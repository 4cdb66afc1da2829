pub mod audit;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod manager;
pub mod models;
pub mod params;
pub mod repository;
pub mod statement;
pub mod storage;
pub mod transaction;
pub mod value;

pub use audit::{AuditAction, AuditTrail, ChangeObserver, FieldChange, RecordDiff, TracingObserver};
pub use descriptor::{describe, Column, ColumnKind, Describable, RecordDescriptor, StorageConfig};
pub use error::StorageError;
pub use manager::DatabaseManager;
pub use params::{NamedParams, NamedQuery, SqlResult};
pub use repository::EntityRepository;
pub use statement::Pagination;
pub use storage::{BulkOutcome, Storage};
pub use transaction::{run_in_transaction, Actor, TransactionManager, TxState, UnitOfWork};
pub use value::SqlValue;
