use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::error::FilterError;
use crate::config;
use crate::database::audit::VALID_STATUS_CODES;

/// Query-string keys with a fixed meaning; anything else is an exact-match filter
const RESERVED_KEYS: [&str; 7] = ["page", "size", "status_id", "keyword", "keyword_name", "sort_name", "sort_by"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn parse(s: &str) -> Result<Self, FilterError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(FilterError::InvalidSortDirection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

/// Listing parameters shared by every entity
#[derive(Debug, Clone, PartialEq)]
pub struct FindAllParams {
    /// 1-based; zero or negative lists everything
    pub page: i64,
    pub size: i64,
    pub status_ids: Vec<String>,
    pub keyword: Option<String>,
    pub keyword_fields: Vec<String>,
    pub sort: Vec<FilterOrderInfo>,
    pub filters: BTreeMap<String, String>,
}

impl Default for FindAllParams {
    fn default() -> Self {
        Self {
            page: -1,
            size: config::config().api.default_page_size,
            status_ids: vec![],
            keyword: None,
            keyword_fields: vec![],
            sort: vec![FilterOrderInfo { column: "id".to_string(), sort: SortDirection::Desc }],
            filters: BTreeMap::new(),
        }
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',').map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect()
}

fn parse_number(field: &'static str, value: &str) -> Result<i64, FilterError> {
    value
        .trim()
        .parse()
        .map_err(|_| FilterError::InvalidNumber { field, value: value.to_string() })
}

impl FindAllParams {
    /// Parse a raw query string map.
    ///
    /// `sort_name=name,code&sort_by=asc,desc` pairs names with directions;
    /// when fewer directions than names are given, the last one repeats.
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, FilterError> {
        let mut params = Self::default();

        if let Some(page) = query.get("page").filter(|v| !v.trim().is_empty()) {
            params.page = parse_number("page", page)?;
        }
        if let Some(size) = query.get("size").filter(|v| !v.trim().is_empty()) {
            params.size = parse_number("size", size)?;
        }
        if let Some(status) = query.get("status_id") {
            params.status_ids = split_list(status);
            if let Some(bad) = params.status_ids.iter().find(|s| !VALID_STATUS_CODES.contains(&s.as_str())) {
                return Err(FilterError::InvalidStatus(bad.clone()));
            }
        }
        params.keyword = query.get("keyword").map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        if let Some(fields) = query.get("keyword_name") {
            params.keyword_fields = split_list(fields);
        }

        if let Some(names) = query.get("sort_name").map(|s| split_list(s)).filter(|n| !n.is_empty()) {
            let directions = query
                .get("sort_by")
                .map(|s| split_list(s))
                .unwrap_or_default()
                .iter()
                .map(|d| SortDirection::parse(d))
                .collect::<Result<Vec<_>, _>>()?;
            let last = directions.last().copied().unwrap_or(SortDirection::Desc);
            params.sort = names
                .into_iter()
                .enumerate()
                .map(|(i, column)| FilterOrderInfo { column, sort: directions.get(i).copied().unwrap_or(last) })
                .collect();
        } else if let Some(direction) = query.get("sort_by").filter(|s| !s.trim().is_empty()) {
            params.sort = vec![FilterOrderInfo { column: "id".to_string(), sort: SortDirection::parse(direction)? }];
        }

        params.filters = query
            .iter()
            .filter(|(k, v)| !RESERVED_KEYS.contains(&k.as_str()) && !v.trim().is_empty())
            .map(|(k, v)| (k.clone(), v.trim().to_string()))
            .collect();

        Ok(params)
    }
}
