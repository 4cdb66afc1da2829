use std::collections::BTreeMap;

use super::error::FilterError;
use super::filter::validate_column;
use crate::database::params::NamedParams;

/// Builds the listing predicate and its named parameters
pub struct FilterWhere<'a> {
    alias: &'a str,
    conditions: Vec<String>,
    params: NamedParams,
}

impl<'a> FilterWhere<'a> {
    pub fn new(alias: &'a str) -> Self {
        Self { alias, conditions: vec![], params: NamedParams::new() }
    }

    fn column(&self, name: &str) -> String {
        format!("\"{}\".\"{}\"", self.alias, name)
    }

    pub fn not_deleted(mut self) -> Self {
        let condition = format!("{} IS NULL", self.column("deleted_at"));
        self.conditions.push(condition);
        self
    }

    pub fn status_in(mut self, status_ids: &[String]) -> Self {
        if !status_ids.is_empty() {
            let condition = format!("{} IN (:status_ids)", self.column("status_id"));
            self.conditions.push(condition);
            self.params.insert("status_ids", status_ids.to_vec());
        }
        self
    }

    /// Case-insensitive substring match OR-ed across `fields`
    pub fn keyword(mut self, keyword: Option<&str>, fields: &[String], searchable: &[&str]) -> Result<Self, FilterError> {
        let Some(keyword) = keyword else {
            return Ok(self);
        };
        let fields: Vec<String> = if fields.is_empty() {
            searchable.iter().map(|s| s.to_string()).collect()
        } else {
            fields.to_vec()
        };
        if fields.is_empty() {
            return Ok(self);
        }

        let mut matches = Vec::with_capacity(fields.len());
        for field in &fields {
            validate_column(field)?;
            if !searchable.contains(&field.as_str()) {
                return Err(FilterError::ColumnNotAllowed(field.clone()));
            }
            matches.push(format!("{} ILIKE :keyword", self.column(field)));
        }
        self.conditions.push(format!("({})", matches.join(" OR ")));
        self.params.insert("keyword", format!("%{}%", escape_like(keyword)));
        Ok(self)
    }

    pub fn equals(mut self, filters: &BTreeMap<String, String>, filterable: &[&str]) -> Result<Self, FilterError> {
        for (field, value) in filters {
            validate_column(field)?;
            if !filterable.contains(&field.as_str()) {
                return Err(FilterError::ColumnNotAllowed(field.clone()));
            }
            let name = format!("filter_{}", field);
            let condition = format!("{} = :{}", self.column(field), name);
            self.conditions.push(condition);
            self.params.insert(name, value.clone());
        }
        Ok(self)
    }

    pub fn build(self) -> (String, NamedParams) {
        let predicate = if self.conditions.is_empty() {
            "TRUE".to_string()
        } else {
            self.conditions.join(" AND ")
        };
        (predicate, self.params)
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::value::SqlValue;

    #[test]
    fn empty_builder_matches_everything() {
        let (predicate, params) = FilterWhere::new("t").build();
        assert_eq!(predicate, "TRUE");
        assert!(params.is_empty());
    }

    #[test]
    fn combines_conditions_with_and() {
        let mut filters = BTreeMap::new();
        filters.insert("brand_id".to_string(), "b-1".to_string());

        let (predicate, params) = FilterWhere::new("t")
            .not_deleted()
            .status_in(&["1".to_string()])
            .keyword(Some("dr"), &[], &["code", "name"])
            .unwrap()
            .equals(&filters, &["brand_id"])
            .unwrap()
            .build();

        assert_eq!(
            predicate,
            "\"t\".\"deleted_at\" IS NULL AND \"t\".\"status_id\" IN (:status_ids) AND \
             (\"t\".\"code\" ILIKE :keyword OR \"t\".\"name\" ILIKE :keyword) AND \"t\".\"brand_id\" = :filter_brand_id"
        );
        assert_eq!(params.get("keyword"), Some(&SqlValue::from("%dr%")));
        assert_eq!(params.get("filter_brand_id"), Some(&SqlValue::from("b-1")));
    }

    #[test]
    fn keyword_wildcards_are_escaped() {
        let (_, params) = FilterWhere::new("t").keyword(Some("50%_off"), &[], &["name"]).unwrap().build();
        assert_eq!(params.get("keyword"), Some(&SqlValue::from("%50\\%\\_off%")));
    }

    #[test]
    fn rejects_columns_outside_the_allow_list() {
        let err = FilterWhere::new("t").keyword(Some("x"), &["password".to_string()], &["name"]).err();
        assert_eq!(err, Some(FilterError::ColumnNotAllowed("password".into())));

        let mut filters = BTreeMap::new();
        filters.insert("price".to_string(), "1".to_string());
        assert!(FilterWhere::new("t").equals(&filters, &["code"]).is_err());
    }
}
