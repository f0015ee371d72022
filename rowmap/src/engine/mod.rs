pub mod recording;
pub mod sqlite;

pub use recording::RecordingEngine;
pub use sqlite::{SqliteConfig, SqliteEngine};

use crate::error::Result;
use crate::value::{Kind, Params, Row};
use log::debug;

/// One SQL statement with its named parameter bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Option<Params>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    /// Bound value for a key, if any.
    pub fn param(&self, key: &str) -> Option<&crate::value::Value> {
        self.params.as_ref().and_then(|params| params.get(key))
    }
}

/// The SQL execution capability records and tables are built on.
///
/// Implementations run one statement per call, synchronously. Errors are
/// handed back to the caller untranslated.
pub trait Engine: Send + Sync {
    /// Execute a statement, binding `:key` placeholders from its parameters.
    /// Returns the produced rows (empty for statements without results).
    fn execute(&self, statement: &Statement) -> Result<Vec<Row>>;

    /// Row identifier generated by the most recent INSERT.
    fn last_insert_id(&self) -> Option<i64>;

    /// Rows changed by the most recent data-modifying statement.
    fn rows_affected(&self) -> usize;

    /// Storage type name for a field kind, used by CREATE TABLE.
    fn map_kind(&self, kind: Kind) -> &'static str;
}

/// SQLite's storage classes for each kind.
pub fn sqlite_type(kind: Kind) -> &'static str {
    match kind {
        Kind::Text => "TEXT",
        Kind::Integer | Kind::Boolean => "INTEGER",
        Kind::Real => "REAL",
    }
}

pub(crate) fn run(engine: &dyn Engine, statement: &Statement) -> Result<Vec<Row>> {
    debug!(
        "execute sql={} params={}",
        statement.sql,
        statement.params.as_ref().map_or(0, |params| params.len())
    );
    engine.execute(statement)
}
