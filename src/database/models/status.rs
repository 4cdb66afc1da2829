use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::descriptor::{Column, Describable};
use crate::database::value::SqlValue;

/// Lookup row for `status_id`; stored in an immutable table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Status {
    pub id: String,
    pub name: String,
}

impl Status {
    pub const TABLE: &'static str = "status";
}

impl Describable for Status {
    const COLUMNS: &'static [Column] = &[Column::id(), Column::plain("name")];

    fn values(&self) -> Vec<SqlValue> {
        vec![self.id.clone().into(), self.name.clone().into()]
    }
}
