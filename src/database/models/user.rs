use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{require, Entity, DEFAULT_STATUS_ID};
use crate::database::descriptor::{Column, Describable};
use crate::database::error::StorageError;
use crate::database::value::SqlValue;
use crate::services::password::hash_password;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub username: String,
    /// Salted SHA-512 hex digest
    #[serde(skip_serializing, default)]
    pub password: String,
    pub status_id: String,
    #[sqlx(default)]
    pub status_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInput {
    pub name: String,
    pub email: String,
    pub username: String,
    /// Required on create; on update an absent password keeps the current one
    #[serde(default)]
    pub password: Option<String>,
}

impl Describable for User {
    const COLUMNS: &'static [Column] = &[
        Column::id(),
        Column::plain("name"),
        Column::plain("email"),
        Column::plain("username"),
        Column::secret("password"),
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
            self.email.clone().into(),
            self.username.clone().into(),
            self.password.clone().into(),
            self.status_id.clone().into(),
            self.created_at.into(),
            self.created_by.clone().into(),
            self.updated_at.into(),
            self.updated_by.clone().into(),
        ]
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const LABEL: &'static str = "user";
    const SEARCHABLE: &'static [&'static str] = &["name", "email", "username"];
    const FILTERABLE: &'static [&'static str] = &["email", "username"];

    type Input = UserInput;

    fn validate(input: &UserInput, creating: bool) -> Result<(), StorageError> {
        require("name", &input.name)?;
        require("email", &input.email)?;
        require("username", &input.username)?;
        if creating {
            require("password", input.password.as_deref().unwrap_or_default())?;
        }
        Ok(())
    }

    fn from_input(id: String, input: UserInput) -> Self {
        Self {
            id,
            name: input.name,
            email: input.email,
            username: input.username,
            password: hash_password(input.password.as_deref().unwrap_or_default()),
            status_id: DEFAULT_STATUS_ID.to_string(),
            status_name: None,
            created_at: None,
            created_by: None,
            updated_at: None,
            updated_by: None,
        }
    }

    fn apply(&mut self, input: UserInput) {
        self.name = input.name;
        self.email = input.email;
        self.username = input.username;
        if let Some(password) = input.password.filter(|p| !p.is_empty()) {
            self.password = hash_password(&password);
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}
