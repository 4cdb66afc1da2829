use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::FindAllParams;
use crate::database::params::NamedParams;
use crate::database::statement::Pagination;

/// Listing filter for one entity, bound to the alias its query uses
pub struct Filter {
    alias: String,
    columns: Vec<&'static str>,
    searchable: &'static [&'static str],
    filterable: &'static [&'static str],
}

/// Predicate, parameters, ordering and page window for one listing
#[derive(Debug, Clone)]
pub struct FilterSql {
    pub predicate: String,
    pub params: NamedParams,
    pub order: String,
    pub page: Pagination,
}

impl Filter {
    pub fn new(
        alias: impl Into<String>,
        columns: Vec<&'static str>,
        searchable: &'static [&'static str],
        filterable: &'static [&'static str],
    ) -> Result<Self, FilterError> {
        let alias = alias.into();
        validate_column(&alias)?;
        Ok(Self { alias, columns, searchable, filterable })
    }

    pub fn to_sql(&self, params: &FindAllParams) -> Result<FilterSql, FilterError> {
        let (predicate, named) = FilterWhere::new(&self.alias)
            .not_deleted()
            .status_in(&params.status_ids)
            .keyword(params.keyword.as_deref(), &params.keyword_fields, self.searchable)?
            .equals(&params.filters, self.filterable)?
            .build();
        let order = FilterOrder::generate(&params.sort, &self.alias, &self.columns)?;

        Ok(FilterSql {
            predicate,
            params: named,
            order,
            page: Pagination::new(params.page, params.size),
        })
    }

    /// Predicate and parameters only, for counting
    pub fn to_count_sql(&self, params: &FindAllParams) -> Result<(String, NamedParams), FilterError> {
        let sql = self.to_sql(params)?;
        Ok((sql.predicate, sql.params))
    }
}

pub(crate) fn validate_column(name: &str) -> Result<(), FilterError> {
    let mut chars = name.chars();
    let valid_start = chars.next().map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn filter() -> Filter {
        Filter::new("t", vec!["id", "code", "name"], &["code", "name"], &["code"]).unwrap()
    }

    #[test]
    fn builds_listing_sql_from_query_params() {
        let query: HashMap<String, String> = [("page", "2"), ("size", "5"), ("status_id", "1"), ("sort_name", "name"), ("sort_by", "asc")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let params = FindAllParams::from_query(&query).unwrap();
        let sql = filter().to_sql(&params).unwrap();

        assert_eq!(sql.predicate, "\"t\".\"deleted_at\" IS NULL AND \"t\".\"status_id\" IN (:status_ids)");
        assert_eq!(sql.order, "\"t\".\"name\" ASC");
        assert_eq!(sql.page, Pagination::new(2, 5));
    }

    #[test]
    fn default_order_is_newest_identity_first() {
        let sql = filter().to_sql(&FindAllParams::default()).unwrap();
        assert_eq!(sql.order, "\"t\".\"id\" DESC");
        assert!(!sql.page.is_enabled());
    }

    #[test]
    fn rejects_bad_alias() {
        assert!(Filter::new("t x", vec![], &[], &[]).is_err());
    }
}
