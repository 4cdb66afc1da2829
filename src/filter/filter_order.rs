use super::error::FilterError;
use super::filter::validate_column;
use super::types::FilterOrderInfo;

pub struct FilterOrder;

impl FilterOrder {
    /// `"t"."name" ASC, "t"."id" DESC`; every column must be in `allowed`
    pub fn generate(infos: &[FilterOrderInfo], alias: &str, allowed: &[&str]) -> Result<String, FilterError> {
        let parts = infos
            .iter()
            .map(|info| {
                validate_column(&info.column)?;
                if !allowed.contains(&info.column.as_str()) {
                    return Err(FilterError::ColumnNotAllowed(info.column.clone()));
                }
                Ok(format!("\"{}\".\"{}\" {}", alias, info.column, info.sort.to_sql()))
            })
            .collect::<Result<Vec<_>, FilterError>>()?;
        Ok(parts.join(", "))
    }
}
