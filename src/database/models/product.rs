use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{require, Entity, DEFAULT_STATUS_ID};
use crate::database::descriptor::{Column, Describable};
use crate::database::error::StorageError;
use crate::database::value::SqlValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: String,
    pub code: String,
    pub name: String,
    pub price: f64,
    pub brand_id: String,
    pub category_id: String,
    pub description: Option<String>,
    pub status_id: String,
    #[sqlx(default)]
    pub status_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInput {
    pub code: String,
    pub name: String,
    pub price: f64,
    pub brand_id: String,
    pub category_id: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Describable for Product {
    const COLUMNS: &'static [Column] = &[
        Column::id(),
        Column::plain("code"),
        Column::plain("name"),
        Column::plain("price"),
        Column::plain("brand_id"),
        Column::plain("category_id"),
        Column::plain("description"),
        Column::plain("status_id"),
        Column::time("created_at"),
        Column::plain("created_by"),
        Column::time("updated_at"),
        Column::plain("updated_by"),
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.clone().into(),
            self.code.clone().into(),
            self.name.clone().into(),
            self.price.into(),
            self.brand_id.clone().into(),
            self.category_id.clone().into(),
            self.description.clone().into(),
            self.status_id.clone().into(),
            self.created_at.into(),
            self.created_by.clone().into(),
            self.updated_at.into(),
            self.updated_by.clone().into(),
        ]
    }
}

impl Entity for Product {
    const TABLE: &'static str = "products";
    const LABEL: &'static str = "product";
    const SEARCHABLE: &'static [&'static str] = &["code", "name", "description"];
    const FILTERABLE: &'static [&'static str] = &["code", "brand_id", "category_id"];

    type Input = ProductInput;

    fn validate(input: &ProductInput, _creating: bool) -> Result<(), StorageError> {
        require("code", &input.code)?;
        require("name", &input.name)?;
        require("brand_id", &input.brand_id)?;
        require("category_id", &input.category_id)?;
        if !input.price.is_finite() || input.price < 0.0 {
            return Err(StorageError::Validation("price must be a non-negative number".to_string()));
        }
        Ok(())
    }

    fn from_input(id: String, input: ProductInput) -> Self {
        Self {
            id,
            code: input.code,
            name: input.name,
            price: input.price,
            brand_id: input.brand_id,
            category_id: input.category_id,
            description: input.description,
            status_id: DEFAULT_STATUS_ID.to_string(),
            status_name: None,
            created_at: None,
            created_by: None,
            updated_at: None,
            updated_by: None,
        }
    }

    fn apply(&mut self, input: ProductInput) {
        self.code = input.code;
        self.name = input.name;
        self.price = input.price;
        self.brand_id = input.brand_id;
        self.category_id = input.category_id;
        self.description = input.description;
    }

    fn id(&self) -> &str {
        &self.id
    }
}
