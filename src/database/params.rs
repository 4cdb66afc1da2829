use std::collections::HashMap;

use super::error::StorageError;
use super::value::SqlValue;

/// PostgreSQL rejects statements with more bind parameters than this
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Named parameter map for one statement (`:name` placeholders)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedParams {
    values: HashMap<String, SqlValue>,
}

impl NamedParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Insert without replacing; a name that is already bound is a misuse
    pub fn insert_unique(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Result<(), StorageError> {
        let name = name.into();
        if self.values.contains_key(&name) {
            return Err(StorageError::Misuse(format!("parameter :{} is bound twice", name)));
        }
        self.values.insert(name, value.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn extend(&mut self, other: NamedParams) {
        self.values.extend(other.values);
    }
}

/// SQL text with named placeholders plus the values for them
#[derive(Debug, Clone, PartialEq)]
pub struct NamedQuery {
    pub sql: String,
    pub params: NamedParams,
}

impl NamedQuery {
    pub fn new(sql: impl Into<String>, params: NamedParams) -> Self {
        Self { sql: sql.into(), params }
    }

    pub fn compile(&self) -> Result<SqlResult, StorageError> {
        compile_named(&self.sql, &self.params)
    }
}

/// Positional SQL ready for binding
#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlValue>,
}

/// Rewrite `:name` placeholders into `$n`, in order of appearance.
///
/// List values expand into `$n, $n+1, ...` so `IN (:ids)` works with any
/// number of ids. `::type` casts and anything inside quotes, dollar quotes
/// or comments is copied through untouched.
pub fn compile_named(sql: &str, params: &NamedParams) -> Result<SqlResult, StorageError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut query = String::with_capacity(sql.len() + 16);
    let mut bound: Vec<SqlValue> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                let end = skip_quoted(&chars, i, c)?;
                query.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..].iter().position(|&ch| ch == '\n').map_or(chars.len(), |p| i + p);
                query.extend(&chars[i..end]);
                i = end;
            }
            '$' if chars.get(i + 1) == Some(&'$') => {
                let end = find_sequence(&chars, i + 2, &['$', '$'])
                    .ok_or_else(|| StorageError::Query("unterminated dollar-quoted string".to_string()))?;
                query.extend(&chars[i..end + 2]);
                i = end + 2;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                query.push_str("::");
                i += 2;
            }
            ':' if chars.get(i + 1).map_or(false, |ch| ch.is_ascii_alphabetic() || *ch == '_') => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let value = params
                    .get(&name)
                    .ok_or_else(|| StorageError::Query(format!("missing value for parameter :{}", name)))?;
                push_placeholder(&mut query, &mut bound, &name, value)?;
                i = end;
            }
            _ => {
                query.push(c);
                i += 1;
            }
        }
    }

    if bound.len() > MAX_BIND_PARAMS {
        return Err(StorageError::Query(format!(
            "statement binds {} parameters, the limit is {}",
            bound.len(),
            MAX_BIND_PARAMS
        )));
    }

    Ok(SqlResult { query, params: bound })
}

fn push_placeholder(
    query: &mut String,
    bound: &mut Vec<SqlValue>,
    name: &str,
    value: &SqlValue,
) -> Result<(), StorageError> {
    match value {
        SqlValue::List(items) => {
            if items.is_empty() {
                return Err(StorageError::Query(format!("list parameter :{} is empty", name)));
            }
            let placeholders: Vec<String> = items
                .iter()
                .map(|item| {
                    bound.push(item.clone());
                    format!("${}", bound.len())
                })
                .collect();
            query.push_str(&placeholders.join(", "));
        }
        other => {
            bound.push(other.clone());
            query.push_str(&format!("${}", bound.len()));
        }
    }
    Ok(())
}

/// Index just past the closing quote; doubled quotes are escapes.
fn skip_quoted(chars: &[char], start: usize, quote: char) -> Result<usize, StorageError> {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(StorageError::Query(format!("unterminated {} quote", quote)))
}

fn find_sequence(chars: &[char], from: usize, needle: &[char]) -> Option<usize> {
    (from..chars.len().saturating_sub(needle.len() - 1)).find(|&i| chars[i..].starts_with(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_names_in_order_of_appearance() {
        let params = NamedParams::new().with("id", "a").with("name", "BCA");
        let out = compile_named("UPDATE t SET name = :name WHERE id = :id", &params).unwrap();
        assert_eq!(out.query, "UPDATE t SET name = $1 WHERE id = $2");
        assert_eq!(out.params, vec![SqlValue::from("BCA"), SqlValue::from("a")]);
    }

    #[test]
    fn repeated_names_bind_twice() {
        let params = NamedParams::new().with("kw", "%x%");
        let out = compile_named("a ILIKE :kw OR b ILIKE :kw", &params).unwrap();
        assert_eq!(out.query, "a ILIKE $1 OR b ILIKE $2");
        assert_eq!(out.params.len(), 2);
    }

    #[test]
    fn expands_lists_for_in_clauses() {
        let params = NamedParams::new()
            .with("ids", vec!["a", "b", "c"])
            .with("status", "1");
        let out = compile_named("id IN (:ids) AND status_id = :status", &params).unwrap();
        assert_eq!(out.query, "id IN ($1, $2, $3) AND status_id = $4");
        assert_eq!(out.params[3], SqlValue::from("1"));
    }

    #[test]
    fn leaves_casts_and_literals_alone() {
        let params = NamedParams::new().with("at", chrono::Utc::now());
        let sql = "SELECT ':nope', \"we::ird\" FROM t WHERE x::text = 'a''b' AND at = CAST(:at AS timestamptz)";
        let out = compile_named(sql, &params).unwrap();
        assert_eq!(
            out.query,
            "SELECT ':nope', \"we::ird\" FROM t WHERE x::text = 'a''b' AND at = CAST($1 AS timestamptz)"
        );
        assert_eq!(out.params.len(), 1);
    }

    #[test]
    fn missing_parameter_is_a_query_error() {
        let err = compile_named("SELECT * FROM t WHERE id = :id", &NamedParams::new()).unwrap_err();
        assert!(matches!(err, StorageError::Query(msg) if msg.contains(":id")));
    }

    #[test]
    fn empty_list_is_rejected() {
        let params = NamedParams::new().with("ids", Vec::<String>::new());
        assert!(compile_named("id IN (:ids)", &params).is_err());
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        assert!(compile_named("SELECT 'abc", &NamedParams::new()).is_err());
    }
}
