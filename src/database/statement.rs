//! SQL generation for the storage mapper.
//!
//! Every builder returns a [`NamedQuery`] with `:name` placeholders; the
//! executor compiles them to positional parameters. Nothing here touches
//! the database.

use chrono::{DateTime, Utc};

use super::descriptor::{quote, Column, RecordDescriptor, ID_COLUMN};
use super::error::StorageError;
use super::params::{NamedParams, NamedQuery};
use super::transaction::Actor;
use super::value::SqlValue;

pub const STATUS_COLUMN: &str = "status_id";
const DELETED_AT: &str = "deleted_at";
const DELETED_BY: &str = "deleted_by";

/// 1-based page window; disabled unless both numbers are positive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub size: i64,
}

impl Pagination {
    pub fn new(page: i64, size: i64) -> Self {
        Self { page, size }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.page > 0 && self.size > 0
    }

    /// Rows skipped before this page; a window past `i64::MAX` rows is a validation error
    pub fn offset(&self) -> Result<i64, StorageError> {
        self.page
            .checked_sub(1)
            .and_then(|skipped| skipped.checked_mul(self.size))
            .ok_or_else(|| StorageError::Validation(format!("page {} of size {} is out of range", self.page, self.size)))
    }

    /// Append `LIMIT`/`OFFSET` to `sql` when paging is enabled
    pub fn apply(&self, sql: &mut String, params: &mut NamedParams) -> Result<(), StorageError> {
        if self.is_enabled() {
            let offset = self.offset()?;
            sql.push_str(" LIMIT :page_limit OFFSET :page_offset");
            params.insert("page_limit", self.size);
            params.insert("page_offset", offset);
        }
        Ok(())
    }
}

/// Rows that fit in one statement under `budget` bind parameters
pub fn rows_per_batch(params_per_row: usize, budget: usize) -> usize {
    if params_per_row == 0 {
        return 1;
    }
    (budget / params_per_row).max(1)
}

/// Stamp columns written on insert, in column order
fn insert_stamp_columns(d: &RecordDescriptor) -> Vec<&'static str> {
    if d.immutable {
        vec!["created_by", "created_at"]
    } else {
        vec!["created_by", "created_at", "updated_by", "updated_at"]
    }
}

fn insert_column_list(d: &RecordDescriptor) -> Vec<&'static str> {
    let mut columns = insert_stamp_columns(d);
    columns.extend(d.insertable_columns().map(|c| c.name));
    columns
}

fn suffixed(name: &str, row: Option<usize>) -> String {
    match row {
        Some(n) => format!("{}{}", name, n),
        None => name.to_string(),
    }
}

/// Bind one row's insert values, suffixing every name with `row` when given
fn insert_args(
    d: &RecordDescriptor,
    actor: &Actor,
    created_at: DateTime<Utc>,
    values: &[SqlValue],
    row: Option<usize>,
    params: &mut NamedParams,
) -> Result<String, StorageError> {
    d.check_values(values)?;

    let mut placeholders = Vec::new();
    for stamp in insert_stamp_columns(d) {
        let name = suffixed(stamp, row);
        let value: SqlValue = if stamp.ends_with("_by") {
            actor.id.clone().into()
        } else {
            created_at.into()
        };
        placeholders.push(format!(":{}", name));
        params.insert_unique(name, value)?;
    }
    for (column, value) in d.insertable_values(values) {
        let name = suffixed(column.name, row);
        placeholders.push(format!(":{}", name));
        params.insert_unique(name, value.clone())?;
    }

    Ok(format!("({})", placeholders.join(", ")))
}

fn quoted_list(columns: &[&str]) -> String {
    columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ")
}

pub fn insert(
    d: &RecordDescriptor,
    actor: &Actor,
    now: DateTime<Utc>,
    values: &[SqlValue],
) -> Result<NamedQuery, StorageError> {
    let mut params = NamedParams::new();
    let row = insert_args(d, actor, now, values, None, &mut params)?;
    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        d.quoted_table(),
        quoted_list(&insert_column_list(d)),
        row
    );
    Ok(NamedQuery::new(sql, params))
}

/// One multi-row INSERT per batch; placeholders carry the 1-based row index
pub fn insert_batches(
    d: &RecordDescriptor,
    actor: &Actor,
    created_at: DateTime<Utc>,
    rows: &[Vec<SqlValue>],
    placeholder_budget: usize,
) -> Result<Vec<NamedQuery>, StorageError> {
    let columns = insert_column_list(d);
    let batch_size = rows_per_batch(columns.len(), placeholder_budget);
    let header = format!("INSERT INTO {} ({}) VALUES ", d.quoted_table(), quoted_list(&columns));

    rows.chunks(batch_size)
        .map(|chunk| -> Result<NamedQuery, StorageError> {
            let mut params = NamedParams::new();
            let tuples = chunk
                .iter()
                .enumerate()
                .map(|(i, values)| insert_args(d, actor, created_at, values, Some(i + 1), &mut params))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(NamedQuery::new(format!("{}{}", header, tuples.join(", ")), params))
        })
        .collect()
}

fn require_mutable(d: &RecordDescriptor, operation: &str) -> Result<(), StorageError> {
    if d.immutable {
        return Err(StorageError::Misuse(format!(
            "{} is not supported on immutable table {}",
            operation, d.table
        )));
    }
    Ok(())
}

pub fn update(
    d: &RecordDescriptor,
    actor: &Actor,
    now: DateTime<Utc>,
    values: &[SqlValue],
) -> Result<NamedQuery, StorageError> {
    require_mutable(d, "update")?;
    let id = d.identity_of(values)?;

    let mut params = NamedParams::new()
        .with("updated_at", now)
        .with("updated_by", actor.id.clone());
    let mut sets = vec![
        format!("{} = :updated_at", quote("updated_at")),
        format!("{} = :updated_by", quote("updated_by")),
    ];
    for (column, value) in d.writable_values(values) {
        sets.push(format!("{} = :{}", quote(column.name), column.name));
        params.insert(column.name, value.clone());
    }
    params.insert(ID_COLUMN, id);

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = :{}",
        d.quoted_table(),
        sets.join(", "),
        quote(ID_COLUMN),
        ID_COLUMN
    );
    Ok(NamedQuery::new(sql, params))
}

fn values_placeholder(column: &Column, name: &str) -> String {
    match column.kind.values_cast() {
        Some(cast) => format!("CAST(:{} AS {})", name, cast),
        None => format!(":{}", name),
    }
}

/// Set-from-values bulk update joined on the identity column
pub fn update_batches(
    d: &RecordDescriptor,
    actor: &Actor,
    now: DateTime<Utc>,
    rows: &[Vec<SqlValue>],
    placeholder_budget: usize,
) -> Result<Vec<NamedQuery>, StorageError> {
    require_mutable(d, "update_many")?;
    let identity = *d.identity_column()?;

    let updated_at = Column::time("updated_at");
    let updated_by = Column::plain("updated_by");
    let mut columns: Vec<Column> = vec![updated_at, updated_by, identity];
    columns.extend(d.writable_columns().copied());

    let assignments = columns
        .iter()
        .filter(|c| !c.is_identity())
        .map(|c| format!("{col} = {}.{col}", quote("updated"), col = quote(c.name)))
        .collect::<Vec<_>>()
        .join(", ");
    let names: Vec<&str> = columns.iter().map(|c| c.name).collect();
    let batch_size = rows_per_batch(columns.len(), placeholder_budget);

    rows.chunks(batch_size)
        .map(|chunk| -> Result<NamedQuery, StorageError> {
            let mut params = NamedParams::new();
            let mut tuples = Vec::with_capacity(chunk.len());
            for (i, values) in chunk.iter().enumerate() {
                let row = i + 1;
                let id = d.identity_of(values)?;

                let mut row_values: Vec<SqlValue> = vec![now.into(), actor.id.clone().into(), id];
                row_values.extend(d.writable_values(values).map(|(_, v)| v.clone()));

                let mut placeholders = Vec::with_capacity(columns.len());
                for (column, value) in columns.iter().zip(row_values) {
                    let name = suffixed(column.name, Some(row));
                    placeholders.push(values_placeholder(column, &name));
                    params.insert_unique(name, value)?;
                }
                tuples.push(format!("({})", placeholders.join(", ")));
            }

            let sql = format!(
                "UPDATE {table} AS {cur} SET {assignments} FROM (VALUES {tuples}) AS {upd}({names}) WHERE {cur}.{id} = {upd}.{id}",
                table = d.quoted_table(),
                cur = quote("current"),
                upd = quote("updated"),
                assignments = assignments,
                tuples = tuples.join(", "),
                names = quoted_list(&names),
                id = quote(identity.name),
            );
            Ok(NamedQuery::new(sql, params))
        })
        .collect()
}

pub fn update_status(
    d: &RecordDescriptor,
    actor: &Actor,
    now: DateTime<Utc>,
    id: &str,
    status: &str,
) -> Result<NamedQuery, StorageError> {
    if !d.has_column(STATUS_COLUMN) {
        return Err(StorageError::Misuse(format!("table {} has no {} column", d.table, STATUS_COLUMN)));
    }

    let mut params = NamedParams::new().with(STATUS_COLUMN, status).with(ID_COLUMN, id);
    let mut sets = vec![format!("{} = :{}", quote(STATUS_COLUMN), STATUS_COLUMN)];
    if !d.immutable {
        sets.push(format!("{} = :updated_at", quote("updated_at")));
        sets.push(format!("{} = :updated_by", quote("updated_by")));
        params.insert("updated_at", now);
        params.insert("updated_by", actor.id.clone());
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = :{}",
        d.quoted_table(),
        sets.join(", "),
        quote(ID_COLUMN),
        ID_COLUMN
    );
    Ok(NamedQuery::new(sql, params))
}

/// WHERE clause with the not-deleted filter for mutable tables
fn where_clause(d: &RecordDescriptor, predicate: Option<&str>) -> String {
    let predicate = predicate.map(str::trim).filter(|p| !p.is_empty());
    match (d.immutable, predicate) {
        (false, Some(p)) => format!(" WHERE {} IS NULL AND ({})", quote(DELETED_AT), p),
        (false, None) => format!(" WHERE {} IS NULL", quote(DELETED_AT)),
        (true, Some(p)) => format!(" WHERE {}", p),
        (true, None) => String::new(),
    }
}

/// Shared by single-row and multi-row reads
pub fn select(
    d: &RecordDescriptor,
    predicate: Option<&str>,
    mut params: NamedParams,
    order_by: Option<&str>,
    page: Pagination,
) -> Result<NamedQuery, StorageError> {
    let mut sql = format!(
        "SELECT {} FROM {}{}",
        d.select_fields(),
        d.quoted_table(),
        where_clause(d, predicate)
    );
    if let Some(order) = order_by.filter(|o| !o.trim().is_empty()) {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    }
    page.apply(&mut sql, &mut params)?;
    Ok(NamedQuery::new(sql, params))
}

pub fn find_by_id(d: &RecordDescriptor, id: &str) -> Result<NamedQuery, StorageError> {
    let identity = d.identity_column()?;
    let predicate = format!("{} = :{}", quote(identity.name), ID_COLUMN);
    select(d, Some(&predicate), NamedParams::new().with(ID_COLUMN, id), None, Pagination::all())
}

pub fn find_all(d: &RecordDescriptor, page: Pagination, ascending: bool) -> Result<NamedQuery, StorageError> {
    let identity = d.identity_column()?;
    let order = format!("{} {}", quote(identity.name), if ascending { "ASC" } else { "DESC" });
    select(d, None, NamedParams::new(), Some(&order), page)
}

pub fn count_all(d: &RecordDescriptor) -> NamedQuery {
    NamedQuery::new(
        format!("SELECT COUNT(*) FROM {}{}", d.quoted_table(), where_clause(d, None)),
        NamedParams::new(),
    )
}

pub fn hard_delete(d: &RecordDescriptor, id: &str) -> Result<NamedQuery, StorageError> {
    let identity = d.identity_column()?;
    Ok(NamedQuery::new(
        format!("DELETE FROM {} WHERE {} = :{}", d.quoted_table(), quote(identity.name), ID_COLUMN),
        NamedParams::new().with(ID_COLUMN, id),
    ))
}

/// Soft delete; immutable tables have no delete stamps and are deleted outright
pub fn delete(d: &RecordDescriptor, actor: &Actor, now: DateTime<Utc>, id: &str) -> Result<NamedQuery, StorageError> {
    if d.immutable {
        return hard_delete(d, id);
    }
    let identity = d.identity_column()?;
    let sql = format!(
        "UPDATE {} SET {} = :{}, {} = :{} WHERE {} = :{}",
        d.quoted_table(),
        quote(DELETED_AT),
        DELETED_AT,
        quote(DELETED_BY),
        DELETED_BY,
        quote(identity.name),
        ID_COLUMN
    );
    let params = NamedParams::new()
        .with(DELETED_AT, now)
        .with(DELETED_BY, actor.id.clone())
        .with(ID_COLUMN, id);
    Ok(NamedQuery::new(sql, params))
}

/// `None` when there is nothing to delete
pub fn delete_many(
    d: &RecordDescriptor,
    actor: &Actor,
    now: DateTime<Utc>,
    ids: &[String],
) -> Result<Option<NamedQuery>, StorageError> {
    if ids.is_empty() {
        return Ok(None);
    }
    let identity = d.identity_column()?;

    if d.immutable {
        let sql = format!("DELETE FROM {} WHERE {} IN (:ids)", d.quoted_table(), quote(identity.name));
        return Ok(Some(NamedQuery::new(sql, NamedParams::new().with("ids", ids.to_vec()))));
    }

    let mut params = NamedParams::new().with(DELETED_AT, now).with(DELETED_BY, actor.id.clone());
    let mut placeholders = Vec::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        let name = suffixed(ID_COLUMN, Some(i + 1));
        placeholders.push(format!(":{}", name));
        params.insert_unique(name, id.clone())?;
    }
    let placeholders = placeholders.join(", ");
    let sql = format!(
        "UPDATE {} SET {} = :{}, {} = :{} WHERE {} IN ({})",
        d.quoted_table(),
        quote(DELETED_AT),
        DELETED_AT,
        quote(DELETED_BY),
        DELETED_BY,
        quote(identity.name),
        placeholders
    );
    Ok(Some(NamedQuery::new(sql, params)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::descriptor::{Describable, StorageConfig};

    #[derive(Debug, Clone, sqlx::FromRow)]
    struct Gadget {
        id: String,
        name: String,
        meta: Option<serde_json::Value>,
        status_id: String,
        created_at: Option<DateTime<Utc>>,
        created_by: Option<String>,
        updated_at: Option<DateTime<Utc>>,
        updated_by: Option<String>,
    }

    impl Describable for Gadget {
        const COLUMNS: &'static [Column] = &[
            Column::id(),
            Column::plain("name"),
            Column::json("meta"),
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
                SqlValue::Json(self.meta.clone()),
                self.status_id.clone().into(),
                self.created_at.into(),
                self.created_by.clone().into(),
                self.updated_at.into(),
                self.updated_by.clone().into(),
            ]
        }
    }

    fn gadget(id: &str, name: &str) -> Gadget {
        Gadget {
            id: id.into(),
            name: name.into(),
            meta: None,
            status_id: "1".into(),
            created_at: None,
            created_by: Some("someone-else".into()),
            updated_at: None,
            updated_by: None,
        }
    }

    fn mutable() -> RecordDescriptor {
        RecordDescriptor::new("gadgets", Gadget::COLUMNS, StorageConfig::default()).unwrap()
    }

    fn immutable() -> RecordDescriptor {
        RecordDescriptor::new("gadgets", Gadget::COLUMNS, StorageConfig { is_immutable: true }).unwrap()
    }

    fn actor() -> Actor {
        Actor::new("u-1", "Tester")
    }

    #[test]
    fn insert_stamps_actor_and_skips_caller_stamps() {
        let now = Utc::now();
        let q = insert(&mutable(), &actor(), now, &gadget("g-1", "Drill").values()).unwrap();
        assert_eq!(
            q.sql,
            "INSERT INTO \"gadgets\" (\"created_by\", \"created_at\", \"updated_by\", \"updated_at\", \"id\", \"name\", \"meta\", \"status_id\") \
             VALUES (:created_by, :created_at, :updated_by, :updated_at, :id, :name, :meta, :status_id)"
        );
        assert_eq!(q.params.get("created_by"), Some(&SqlValue::from("u-1")));
        assert_eq!(q.params.get("created_at"), Some(&SqlValue::from(now)));
        assert_eq!(q.params.len(), 8);
    }

    #[test]
    fn immutable_insert_has_no_updated_stamps() {
        let q = insert(&immutable(), &actor(), Utc::now(), &gadget("g-1", "Drill").values()).unwrap();
        assert!(!q.sql.contains("updated_by"));
        assert!(q.params.get("updated_at").is_none());
    }

    #[test]
    fn insert_rejects_short_value_rows() {
        let err = insert(&mutable(), &actor(), Utc::now(), &[SqlValue::from("x")]).unwrap_err();
        assert!(matches!(err, StorageError::Misuse(_)));
    }

    #[test]
    fn bulk_insert_suffixes_row_index_and_batches() {
        let rows: Vec<Vec<SqlValue>> = (0..5).map(|i| gadget(&format!("g-{i}"), "x").values()).collect();
        // 8 params per row, budget 20 -> 2 rows per batch -> 3 statements
        let batches = insert_batches(&mutable(), &actor(), Utc::now(), &rows, 20).unwrap();
        assert_eq!(batches.len(), 3);
        assert!(batches[0].sql.contains("(:created_by1, :created_at1, :updated_by1, :updated_at1, :id1, :name1, :meta1, :status_id1)"));
        assert!(batches[0].sql.contains(":status_id2)"));
        assert!(!batches[0].sql.contains(":id3"));
        assert_eq!(batches[2].params.get("id1"), Some(&SqlValue::from("g-4")));
        assert_eq!(batches[1].params.len(), 16);
    }

    #[test]
    fn colliding_row_suffixes_are_misuse() {
        // `tag` at row 11 and `tag1` at row 1 would both bind `:tag11`
        const TAGGED: &[Column] = &[Column::id(), Column::plain("tag"), Column::plain("tag1")];
        let d = RecordDescriptor::new("tagged", TAGGED, StorageConfig::default()).unwrap();
        let rows: Vec<Vec<SqlValue>> = (0..11)
            .map(|i| vec![SqlValue::from(format!("t-{i}")), "a".into(), "b".into()])
            .collect();

        let err = insert_batches(&d, &actor(), Utc::now(), &rows, 60_000).unwrap_err();
        assert!(matches!(err, StorageError::Misuse(_)), "{:?}", err);
        assert!(insert_batches(&d, &actor(), Utc::now(), &rows[..10], 60_000).is_ok());
    }

    #[test]
    fn batch_size_never_drops_to_zero() {
        assert_eq!(rows_per_batch(8, 60_000), 7_500);
        assert_eq!(rows_per_batch(100, 10), 1);
        assert_eq!(rows_per_batch(0, 10), 1);
    }

    #[test]
    fn update_sets_stamps_and_writable_columns_by_identity() {
        let q = update(&mutable(), &actor(), Utc::now(), &gadget("g-1", "Saw").values()).unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"gadgets\" SET \"updated_at\" = :updated_at, \"updated_by\" = :updated_by, \"name\" = :name, \
             \"meta\" = :meta, \"status_id\" = :status_id WHERE \"id\" = :id"
        );
        assert_eq!(q.params.get("id"), Some(&SqlValue::from("g-1")));
        assert_eq!(q.params.get("updated_by"), Some(&SqlValue::from("u-1")));
        assert!(q.params.get("created_by").is_none());
    }

    #[test]
    fn update_on_immutable_is_misuse() {
        let err = update(&immutable(), &actor(), Utc::now(), &gadget("g-1", "Saw").values()).unwrap_err();
        assert!(matches!(err, StorageError::Misuse(_)));
        let rows = vec![gadget("g-1", "Saw").values()];
        assert!(update_batches(&immutable(), &actor(), Utc::now(), &rows, 100).is_err());
    }

    #[test]
    fn bulk_update_joins_values_list_on_identity() {
        let rows = vec![gadget("g-1", "Saw").values(), gadget("g-2", "Axe").values()];
        let batches = update_batches(&mutable(), &actor(), Utc::now(), &rows, 60_000).unwrap();
        assert_eq!(batches.len(), 1);
        let sql = &batches[0].sql;
        assert!(sql.starts_with("UPDATE \"gadgets\" AS \"current\" SET \"updated_at\" = \"updated\".\"updated_at\""));
        assert!(sql.contains("(CAST(:updated_at1 AS timestamptz), :updated_by1, :id1, :name1, CAST(:meta1 AS jsonb), :status_id1)"));
        assert!(sql.contains(":id2"));
        assert!(sql.contains("AS \"updated\"(\"updated_at\", \"updated_by\", \"id\", \"name\", \"meta\", \"status_id\")"));
        assert!(sql.ends_with("WHERE \"current\".\"id\" = \"updated\".\"id\""));
        assert!(!sql.contains("\"id\" = \"updated\".\"id\","));
        assert_eq!(batches[0].params.get("name2"), Some(&SqlValue::from("Axe")));
    }

    #[test]
    fn bulk_update_batches_with_the_same_policy() {
        let rows: Vec<Vec<SqlValue>> = (0..7).map(|i| gadget(&format!("g-{i}"), "x").values()).collect();
        // 6 params per row, budget 12 -> 2 rows per batch
        let batches = update_batches(&mutable(), &actor(), Utc::now(), &rows, 12).unwrap();
        assert_eq!(batches.len(), 4);
    }

    #[test]
    fn select_injects_not_deleted_for_mutable_tables() {
        let q = select(&mutable(), Some("name = :name"), NamedParams::new().with("name", "x"), None, Pagination::all()).unwrap();
        assert!(q.sql.ends_with("FROM \"gadgets\" WHERE \"deleted_at\" IS NULL AND (name = :name)"));

        let q = select(&immutable(), Some("name = :name"), NamedParams::new(), None, Pagination::all()).unwrap();
        assert!(q.sql.ends_with("FROM \"gadgets\" WHERE name = :name"));

        let q = select(&immutable(), None, NamedParams::new(), None, Pagination::all()).unwrap();
        assert!(q.sql.ends_with("FROM \"gadgets\""));
    }

    #[test]
    fn find_all_pages_by_identity() {
        let q = find_all(&mutable(), Pagination::new(2, 10), false).unwrap();
        assert!(q.sql.ends_with("WHERE \"deleted_at\" IS NULL ORDER BY \"id\" DESC LIMIT :page_limit OFFSET :page_offset"));
        assert_eq!(q.params.get("page_limit"), Some(&SqlValue::from(10i64)));
        assert_eq!(q.params.get("page_offset"), Some(&SqlValue::from(10i64)));
    }

    #[test]
    fn page_window_beyond_i64_is_rejected() {
        for (page, size) in [(i64::MAX, 10), (2, i64::MAX), (i64::MAX, i64::MAX)] {
            let err = find_all(&mutable(), Pagination::new(page, size), true).unwrap_err();
            assert!(matches!(err, StorageError::Validation(_)), "{:?}", err);
        }
        // the last representable window still pages
        assert_eq!(Pagination::new(1, i64::MAX).offset().unwrap(), 0);
        assert_eq!(Pagination::new(i64::MAX, 1).offset().unwrap(), i64::MAX - 1);
    }

    #[test]
    fn non_positive_page_or_size_disables_pagination() {
        for (page, size) in [(0, 10), (1, 0), (-1, -1)] {
            let q = find_all(&mutable(), Pagination::new(page, size), true).unwrap();
            assert!(q.sql.ends_with("ORDER BY \"id\" ASC"), "{}", q.sql);
            assert!(q.params.is_empty());
        }
    }

    #[test]
    fn count_respects_soft_delete() {
        assert_eq!(count_all(&mutable()).sql, "SELECT COUNT(*) FROM \"gadgets\" WHERE \"deleted_at\" IS NULL");
        assert_eq!(count_all(&immutable()).sql, "SELECT COUNT(*) FROM \"gadgets\"");
    }

    #[test]
    fn status_update_stamps_mutable_tables_only() {
        let q = update_status(&mutable(), &actor(), Utc::now(), "g-1", "0").unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"gadgets\" SET \"status_id\" = :status_id, \"updated_at\" = :updated_at, \"updated_by\" = :updated_by WHERE \"id\" = :id"
        );
        let q = update_status(&immutable(), &actor(), Utc::now(), "g-1", "0").unwrap();
        assert_eq!(q.sql, "UPDATE \"gadgets\" SET \"status_id\" = :status_id WHERE \"id\" = :id");
    }

    #[test]
    fn delete_is_soft_unless_immutable() {
        let q = delete(&mutable(), &actor(), Utc::now(), "g-1").unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"gadgets\" SET \"deleted_at\" = :deleted_at, \"deleted_by\" = :deleted_by WHERE \"id\" = :id"
        );
        let q = delete(&immutable(), &actor(), Utc::now(), "g-1").unwrap();
        assert_eq!(q.sql, "DELETE FROM \"gadgets\" WHERE \"id\" = :id");
    }

    #[test]
    fn delete_many_renders_one_placeholder_per_id() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let q = delete_many(&mutable(), &actor(), Utc::now(), &ids).unwrap().unwrap();
        assert!(q.sql.ends_with("WHERE \"id\" IN (:id1, :id2, :id3)"));
        assert_eq!(q.params.get("id3"), Some(&SqlValue::from("c")));

        let q = delete_many(&immutable(), &actor(), Utc::now(), &ids).unwrap().unwrap();
        let compiled = q.compile().unwrap();
        assert_eq!(compiled.query, "DELETE FROM \"gadgets\" WHERE \"id\" IN ($1, $2, $3)");

        assert!(delete_many(&mutable(), &actor(), Utc::now(), &[]).unwrap().is_none());
    }

    #[test]
    fn every_builder_compiles_without_missing_parameters() {
        let d = mutable();
        let now = Utc::now();
        let values = gadget("g-1", "Drill").values();
        let queries = vec![
            insert(&d, &actor(), now, &values).unwrap(),
            update(&d, &actor(), now, &values).unwrap(),
            update_status(&d, &actor(), now, "g-1", "1").unwrap(),
            find_by_id(&d, "g-1").unwrap(),
            find_all(&d, Pagination::new(1, 5), true).unwrap(),
            delete(&d, &actor(), now, "g-1").unwrap(),
            hard_delete(&d, "g-1").unwrap(),
        ];
        for q in queries {
            assert!(q.compile().is_ok(), "failed to compile {}", q.sql);
        }
    }
}
