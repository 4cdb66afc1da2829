use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::{Query, QueryAs, QueryScalar};
use sqlx::{FromRow, Postgres};

/// A typed value bound to a statement parameter.
///
/// Nullable variants keep their SQL type so that a NULL still binds as
/// `timestamptz` or `jsonb` rather than as untyped text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(Option<bool>),
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    Timestamp(Option<DateTime<Utc>>),
    Json(Option<Value>),
    /// Expanded into one placeholder per element by the parameter compiler
    List(Vec<SqlValue>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            SqlValue::Null
                | SqlValue::Bool(None)
                | SqlValue::Int(None)
                | SqlValue::Float(None)
                | SqlValue::Text(None)
                | SqlValue::Timestamp(None)
                | SqlValue::Json(None)
        )
    }

    /// JSON rendering used by audit diffs and logs
    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(v) => json!(v),
            SqlValue::Int(v) => json!(v),
            SqlValue::Float(v) => json!(v),
            SqlValue::Text(v) => json!(v),
            SqlValue::Timestamp(v) => json!(v.map(|t| t.to_rfc3339())),
            SqlValue::Json(v) => v.clone().unwrap_or(Value::Null),
            SqlValue::List(items) => Value::Array(items.iter().map(SqlValue::to_json).collect()),
        }
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(Some(v))
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(Some(v.to_string()))
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(Some(v.clone()))
    }
}

impl From<Option<String>> for SqlValue {
    fn from(v: Option<String>) -> Self {
        SqlValue::Text(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(Some(v))
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(Some(v as i64))
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(Some(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(Some(v))
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(Some(v))
    }
}

impl From<Option<DateTime<Utc>>> for SqlValue {
    fn from(v: Option<DateTime<Utc>>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<Value> for SqlValue {
    fn from(v: Value) -> Self {
        SqlValue::Json(Some(v))
    }
}

impl<T: Into<SqlValue>> From<Vec<T>> for SqlValue {
    fn from(items: Vec<T>) -> Self {
        SqlValue::List(items.into_iter().map(Into::into).collect())
    }
}

// The three binders below mirror each other; sqlx exposes no common trait for `bind`.

pub(crate) fn bind_query<'q>(
    q: Query<'q, Postgres, PgArguments>,
    v: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match v {
        SqlValue::Null => q.bind(None::<String>),
        SqlValue::Bool(b) => q.bind(*b),
        SqlValue::Int(i) => q.bind(*i),
        SqlValue::Float(f) => q.bind(*f),
        SqlValue::Text(s) => q.bind(s.clone()),
        SqlValue::Timestamp(t) => q.bind(*t),
        SqlValue::Json(j) => q.bind(j.clone()),
        // Lists are flattened before binding
        SqlValue::List(_) => q,
    }
}

pub(crate) fn bind_query_as<'q, O>(
    q: QueryAs<'q, Postgres, O, PgArguments>,
    v: &SqlValue,
) -> QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    match v {
        SqlValue::Null => q.bind(None::<String>),
        SqlValue::Bool(b) => q.bind(*b),
        SqlValue::Int(i) => q.bind(*i),
        SqlValue::Float(f) => q.bind(*f),
        SqlValue::Text(s) => q.bind(s.clone()),
        SqlValue::Timestamp(t) => q.bind(*t),
        SqlValue::Json(j) => q.bind(j.clone()),
        SqlValue::List(_) => q,
    }
}

pub(crate) fn bind_query_scalar<'q, O>(
    q: QueryScalar<'q, Postgres, O, PgArguments>,
    v: &SqlValue,
) -> QueryScalar<'q, Postgres, O, PgArguments> {
    match v {
        SqlValue::Null => q.bind(None::<String>),
        SqlValue::Bool(b) => q.bind(*b),
        SqlValue::Int(i) => q.bind(*i),
        SqlValue::Float(f) => q.bind(*f),
        SqlValue::Text(s) => q.bind(s.clone()),
        SqlValue::Timestamp(t) => q.bind(*t),
        SqlValue::Json(j) => q.bind(j.clone()),
        SqlValue::List(_) => q,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_nulls_are_null() {
        assert!(SqlValue::Null.is_null());
        assert!(SqlValue::Timestamp(None).is_null());
        assert!(SqlValue::from(None::<String>).is_null());
        assert!(!SqlValue::from("").is_null());
        assert!(!SqlValue::List(vec![]).is_null());
    }

    #[test]
    fn vectors_become_lists() {
        let v = SqlValue::from(vec!["a", "b"]);
        assert_eq!(v, SqlValue::List(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn renders_json_for_diffs() {
        assert_eq!(SqlValue::from("BCA").to_json(), json!("BCA"));
        assert_eq!(SqlValue::from(12.5).to_json(), json!(12.5));
        assert_eq!(SqlValue::Text(None).to_json(), Value::Null);
        assert_eq!(SqlValue::from(json!({"a": 1})).to_json(), json!({"a": 1}));
    }
}
