pub mod bank;
pub mod brand;
pub mod category;
pub mod product;
pub mod status;
pub mod user;
pub mod user_action;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::descriptor::Describable;
use super::error::StorageError;

pub use bank::Bank;
pub use brand::Brand;
pub use category::Category;
pub use product::{Product, ProductInput};
pub use status::Status;
pub use user::{User, UserInput};
pub use user_action::UserAction;

/// Status assigned to newly created records
pub const DEFAULT_STATUS_ID: &str = "1";

/// A master-data record exposed through the entity services and routes
pub trait Entity: Describable + Clone + Serialize + Send + Sync {
    const TABLE: &'static str;
    /// Singular name used in messages and logs
    const LABEL: &'static str;
    /// Columns a listing keyword may be matched against
    const SEARCHABLE: &'static [&'static str];
    /// Columns a listing may filter on by exact value
    const FILTERABLE: &'static [&'static str];

    type Input: DeserializeOwned + Send + Sync + 'static;

    fn validate(input: &Self::Input, creating: bool) -> Result<(), StorageError>;

    fn from_input(id: String, input: Self::Input) -> Self;

    fn apply(&mut self, input: Self::Input);

    fn id(&self) -> &str;
}

/// Payload for entities that only carry a name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameInput {
    pub name: String,
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), StorageError> {
    if value.trim().is_empty() {
        return Err(StorageError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
