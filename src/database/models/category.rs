use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{require, Entity, NameInput, DEFAULT_STATUS_ID};
use crate::database::descriptor::{Column, Describable};
use crate::database::error::StorageError;
use crate::database::value::SqlValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub status_id: String,
    #[sqlx(default)]
    pub status_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

impl Describable for Category {
    const COLUMNS: &'static [Column] = &[
        Column::id(),
        Column::plain("name"),
        Column::plain("status_id"),
        Column::time("created_at"),
        Column::plain("created_by"),
        Column::time("updated_at"),
        Column::plain("updated_by"),
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.clone().into(),
            self.name.clone().into(),
            self.status_id.clone().into(),
            self.created_at.into(),
            self.created_by.clone().into(),
            self.updated_at.into(),
            self.updated_by.clone().into(),
        ]
    }
}

impl Entity for Category {
    const TABLE: &'static str = "categories";
    const LABEL: &'static str = "category";
    const SEARCHABLE: &'static [&'static str] = &["name"];
    const FILTERABLE: &'static [&'static str] = &["name"];

    type Input = NameInput;

    fn validate(input: &NameInput, _creating: bool) -> Result<(), StorageError> {
        require("name", &input.name)
    }

    fn from_input(id: String, input: NameInput) -> Self {
        Self {
            id,
            name: input.name,
            status_id: DEFAULT_STATUS_ID.to_string(),
            status_name: None,
            created_at: None,
            created_by: None,
            updated_at: None,
            updated_by: None,
        }
    }

    fn apply(&mut self, input: NameInput) {
        self.name = input.name;
    }

    fn id(&self) -> &str {
        &self.id
    }
}
