use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Column not allowed here: {0}")]
    ColumnNotAllowed(String),

    #[error("Invalid sort direction: {0}")]
    InvalidSortDirection(String),

    #[error("Invalid status code: {0}")]
    InvalidStatus(String),

    #[error("Invalid number for {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },
}
