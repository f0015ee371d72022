use crate::value::Kind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RowmapError {
    #[error("No such column: {0}")]
    UnknownColumn(String),

    #[error("Field '{field}' expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: Kind,
        actual: &'static str,
    },

    #[error("Field '{field}' value is too long: {length} > {max_length}")]
    ValueTooLong {
        field: String,
        length: usize,
        max_length: usize,
    },

    #[error("Required field '{0}' can not be null")]
    RequiredFieldMissing(String),

    #[error("Invalid foreign key: {0}")]
    InvalidForeignKey(String),

    #[error("Foreign record not found: {table}.{column} = {value}")]
    ReferenceNotFound {
        table: String,
        column: String,
        value: String,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, RowmapError>;
