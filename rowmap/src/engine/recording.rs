use super::{sqlite_type, Engine, Statement};
use crate::error::{Result, RowmapError};
use crate::value::{Kind, Row};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Engine that records every statement instead of running it.
///
/// SELECT statements answer with scripted rows queued by
/// [`RecordingEngine::push_rows`] (or nothing). INSERTs hand out increasing
/// row ids starting at 1; UPDATE and DELETE report one affected row.
#[derive(Default)]
pub struct RecordingEngine {
    state: Mutex<RecordingState>,
}

#[derive(Default)]
struct RecordingState {
    statements: Vec<Statement>,
    results: VecDeque<Vec<Row>>,
    next_id: i64,
    last_insert_id: Option<i64>,
    rows_affected: usize,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next SELECT.
    pub fn push_rows(&self, rows: Vec<Row>) {
        if let Ok(mut state) = self.state.lock() {
            state.results.push_back(rows);
        }
    }

    /// Every statement executed so far, oldest first.
    pub fn statements(&self) -> Vec<Statement> {
        self.state
            .lock()
            .map(|state| state.statements.clone())
            .unwrap_or_default()
    }

    pub fn last_statement(&self) -> Option<Statement> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.statements.last().cloned())
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.statements.clear();
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RecordingState>> {
        self.state
            .lock()
            .map_err(|_| RowmapError::Engine("recording engine lock poisoned".into()))
    }
}

impl Engine for RecordingEngine {
    fn execute(&self, statement: &Statement) -> Result<Vec<Row>> {
        let mut state = self.lock()?;
        state.statements.push(statement.clone());

        let verb = statement
            .sql
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        match verb.as_str() {
            "SELECT" => return Ok(state.results.pop_front().unwrap_or_default()),
            "INSERT" => {
                state.next_id += 1;
                state.last_insert_id = Some(state.next_id);
                state.rows_affected = 1;
            }
            "UPDATE" | "DELETE" => state.rows_affected = 1,
            _ => state.rows_affected = 0,
        }
        Ok(Vec::new())
    }

    fn last_insert_id(&self) -> Option<i64> {
        self.state.lock().ok().and_then(|state| state.last_insert_id)
    }

    fn rows_affected(&self) -> usize {
        self.state.lock().map_or(0, |state| state.rows_affected)
    }

    fn map_kind(&self, kind: Kind) -> &'static str {
        sqlite_type(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_statements_in_order() {
        let engine = RecordingEngine::new();
        engine.execute(&Statement::new("INSERT into T DEFAULT VALUES")).unwrap();
        engine.execute(&Statement::new("INSERT into T DEFAULT VALUES")).unwrap();
        engine.execute(&Statement::new("DELETE from T WHERE rowid = 1")).unwrap();

        let sql: Vec<String> = engine.statements().into_iter().map(|s| s.sql).collect();
        assert_eq!(sql.len(), 3);
        assert!(sql[2].starts_with("DELETE"));
        assert_eq!(engine.last_insert_id(), Some(2));
        assert_eq!(engine.rows_affected(), 1);
    }

    #[test]
    fn test_select_returns_scripted_rows() {
        let engine = RecordingEngine::new();
        engine.push_rows(vec![Row::new().with("rowid", 4)]);

        let rows = engine.execute(&Statement::new("SELECT *,rowid from T")).unwrap();
        assert_eq!(rows.len(), 1);

        let rows = engine.execute(&Statement::new("SELECT *,rowid from T")).unwrap();
        assert!(rows.is_empty());

        engine.clear();
        assert!(engine.last_statement().is_none());
    }
}
