use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use sqlx::postgres::PgRow;
use sqlx::FromRow;

use super::error::StorageError;
use super::value::SqlValue;

/// Identity column shared by every record type
pub const ID_COLUMN: &str = "id";

/// Columns stamped by the mapper; never taken from caller-supplied values
pub const STAMP_COLUMNS: [&str; 6] = [
    "created_at",
    "created_by",
    "updated_at",
    "updated_by",
    "deleted_at",
    "deleted_by",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Plain,
    Time,
    Json,
    Id,
    /// Persisted like plain text but never exposed in diffs or logs
    Secret,
}

impl ColumnKind {
    /// Cast applied to parameters inside a VALUES list, where PostgreSQL
    /// cannot infer column types from the target table.
    pub fn values_cast(&self) -> Option<&'static str> {
        match self {
            ColumnKind::Time => Some("timestamptz"),
            ColumnKind::Json => Some("jsonb"),
            ColumnKind::Plain | ColumnKind::Id | ColumnKind::Secret => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn id() -> Self {
        Self { name: ID_COLUMN, kind: ColumnKind::Id }
    }

    pub const fn plain(name: &'static str) -> Self {
        Self { name, kind: ColumnKind::Plain }
    }

    pub const fn time(name: &'static str) -> Self {
        Self { name, kind: ColumnKind::Time }
    }

    pub const fn json(name: &'static str) -> Self {
        Self { name, kind: ColumnKind::Json }
    }

    pub const fn secret(name: &'static str) -> Self {
        Self { name, kind: ColumnKind::Secret }
    }

    pub fn is_secret(&self) -> bool {
        self.kind == ColumnKind::Secret
    }

    pub fn is_identity(&self) -> bool {
        self.kind == ColumnKind::Id || self.name == ID_COLUMN
    }

    pub fn is_readonly(&self) -> bool {
        STAMP_COLUMNS.contains(&self.name)
    }
}

/// A record type the storage mapper can persist.
///
/// `COLUMNS` lists every persisted column in a fixed order and `values`
/// returns one value per column in that same order. Fields not listed
/// (joined display columns, for example) never appear in generated SQL.
pub trait Describable: for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + 'static {
    const COLUMNS: &'static [Column];

    fn values(&self) -> Vec<SqlValue>;
}

/// Construction-time storage options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StorageConfig {
    /// Immutable tables have no soft delete and no `updated_*` stamps
    pub is_immutable: bool,
}

/// Cached description of one record type bound to one table
#[derive(Debug)]
pub struct RecordDescriptor {
    pub table: String,
    pub columns: &'static [Column],
    pub immutable: bool,
    identity: Option<usize>,
    select_fields: String,
    insertable: Vec<usize>,
    writable: Vec<usize>,
}

impl RecordDescriptor {
    pub fn new(table: &str, columns: &'static [Column], config: StorageConfig) -> Result<Self, StorageError> {
        validate_identifier(table)?;
        for column in columns {
            validate_identifier(column.name)?;
        }

        let identity = columns.iter().position(Column::is_identity);
        if identity.is_none() {
            tracing::warn!("record type for table {} declares no id column", table);
        }

        let select_fields = columns.iter().map(|c| quote(c.name)).collect::<Vec<_>>().join(", ");
        let insertable: Vec<usize> = (0..columns.len()).filter(|&i| !columns[i].is_readonly()).collect();
        let writable = insertable.iter().copied().filter(|&i| !columns[i].is_identity()).collect();

        Ok(Self {
            table: table.to_string(),
            columns,
            immutable: config.is_immutable,
            identity,
            select_fields,
            insertable,
            writable,
        })
    }

    pub fn quoted_table(&self) -> String {
        quote(&self.table)
    }

    /// `"id", "name", ...` in declaration order
    pub fn select_fields(&self) -> &str {
        &self.select_fields
    }

    /// Select list with every column qualified by `alias`
    pub fn select_fields_as(&self, alias: &str) -> String {
        self.columns
            .iter()
            .map(|c| format!("{}.{}", quote(alias), quote(c.name)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Columns a caller supplies on insert: the identity plus writable columns
    pub fn insertable_values<'a>(&'a self, values: &'a [SqlValue]) -> impl Iterator<Item = (&'a Column, &'a SqlValue)> + 'a {
        self.insertable.iter().map(move |&i| (&self.columns[i], &values[i]))
    }

    pub fn insertable_columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.insertable.iter().map(|&i| &self.columns[i])
    }

    /// Caller-writable columns: everything except the identity and stamps
    pub fn writable_columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.writable.iter().map(|&i| &self.columns[i])
    }

    pub fn identity_column(&self) -> Result<&Column, StorageError> {
        self.identity
            .map(|i| &self.columns[i])
            .ok_or_else(|| StorageError::Misuse(format!("table {} has no id column", self.table)))
    }

    /// Check a value row against the column list
    pub fn check_values(&self, values: &[SqlValue]) -> Result<(), StorageError> {
        if values.len() != self.columns.len() {
            return Err(StorageError::Misuse(format!(
                "record for table {} produced {} values for {} columns",
                self.table,
                values.len(),
                self.columns.len()
            )));
        }
        Ok(())
    }

    pub fn identity_of(&self, values: &[SqlValue]) -> Result<SqlValue, StorageError> {
        let index = self
            .identity
            .ok_or_else(|| StorageError::Misuse(format!("table {} has no id column", self.table)))?;
        self.check_values(values)?;
        Ok(values[index].clone())
    }

    /// Writable `(column, value)` pairs of a value row
    pub fn writable_values<'a>(&'a self, values: &'a [SqlValue]) -> impl Iterator<Item = (&'a Column, &'a SqlValue)> + 'a {
        self.writable.iter().map(move |&i| (&self.columns[i], &values[i]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DescriptorKey {
    type_id: TypeId,
    table: String,
    config: StorageConfig,
}

static DESCRIPTORS: Lazy<RwLock<HashMap<DescriptorKey, Arc<RecordDescriptor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Describe `T` stored in `table`, building the descriptor on first use.
pub fn describe<T: Describable>(table: &str, config: StorageConfig) -> Result<Arc<RecordDescriptor>, StorageError> {
    let key = DescriptorKey {
        type_id: TypeId::of::<T>(),
        table: table.to_string(),
        config,
    };

    if let Some(found) = DESCRIPTORS.read().ok().and_then(|cache| cache.get(&key).cloned()) {
        return Ok(found);
    }

    let descriptor = Arc::new(RecordDescriptor::new(table, T::COLUMNS, config)?);
    let mut cache = DESCRIPTORS
        .write()
        .map_err(|_| StorageError::Misuse("descriptor cache lock poisoned".to_string()))?;
    Ok(cache.entry(key).or_insert(descriptor).clone())
}

pub fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn validate_identifier(name: &str) -> Result<(), StorageError> {
    let mut chars = name.chars();
    let valid_start = chars.next().map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StorageError::Misuse(format!("invalid identifier: {}", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, sqlx::FromRow)]
    struct Widget {
        id: String,
        label: String,
        created_at: Option<chrono::DateTime<chrono::Utc>>,
    }

    impl Describable for Widget {
        const COLUMNS: &'static [Column] = &[Column::id(), Column::plain("label"), Column::time("created_at")];

        fn values(&self) -> Vec<SqlValue> {
            vec![self.id.clone().into(), self.label.clone().into(), self.created_at.into()]
        }
    }

    #[derive(Debug, sqlx::FromRow)]
    struct Anonymous {
        label: String,
    }

    impl Describable for Anonymous {
        const COLUMNS: &'static [Column] = &[Column::plain("label")];

        fn values(&self) -> Vec<SqlValue> {
            vec![self.label.clone().into()]
        }
    }

    #[test]
    fn builds_fragments_in_declaration_order() {
        let d = describe::<Widget>("widgets", StorageConfig::default()).unwrap();
        assert_eq!(d.select_fields(), "\"id\", \"label\", \"created_at\"");
        assert_eq!(d.select_fields_as("w"), "\"w\".\"id\", \"w\".\"label\", \"w\".\"created_at\"");
        let writable: Vec<_> = d.writable_columns().map(|c| c.name).collect();
        assert_eq!(writable, vec!["label"]);
        let insertable: Vec<_> = d.insertable_columns().map(|c| c.name).collect();
        assert_eq!(insertable, vec!["id", "label"]);
    }

    #[test]
    fn caches_per_type_and_table() {
        let a = describe::<Widget>("gadgets", StorageConfig::default()).unwrap();
        let b = describe::<Widget>("gadgets", StorageConfig::default()).unwrap();
        let c = describe::<Widget>("gadgets", StorageConfig { is_immutable: true }).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(c.immutable);
    }

    #[test]
    fn missing_identity_fails_at_lookup_time() {
        let d = describe::<Anonymous>("anonymous", StorageConfig::default()).unwrap();
        let row = Anonymous { label: "x".into() };
        assert!(matches!(d.identity_of(&row.values()), Err(StorageError::Misuse(_))));
    }

    #[test]
    fn value_count_mismatch_is_misuse() {
        let d = describe::<Widget>("widgets", StorageConfig::default()).unwrap();
        let err = d.check_values(&[SqlValue::from("only-one")]).unwrap_err();
        assert!(matches!(err, StorageError::Misuse(_)));
    }

    #[test]
    fn rejects_unsafe_table_names() {
        assert!(describe::<Widget>("widgets; DROP TABLE x", StorageConfig::default()).is_err());
        assert!(RecordDescriptor::new("1abc", Widget::COLUMNS, StorageConfig::default()).is_err());
    }

    #[test]
    fn stamps_are_readonly() {
        assert!(Column::time("updated_at").is_readonly());
        assert!(!Column::plain("name").is_readonly());
        assert_eq!(ColumnKind::Json.values_cast(), Some("jsonb"));
    }
}
