// Table handle - schema-level statements and the select builder

use crate::condition::Condition;
use crate::engine::{self, Engine, Statement};
use crate::error::{Result, RowmapError};
use crate::record::Record;
use crate::schema::{Schema, ROWID};
use crate::value::Row;
use std::sync::Arc;

/// A schema bound to the engine its records are stored through.
#[derive(Clone)]
pub struct Table {
    schema: Arc<Schema>,
    engine: Arc<dyn Engine>,
}

impl Table {
    pub fn new(schema: Arc<Schema>, engine: Arc<dyn Engine>) -> Self {
        Self { schema, engine }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// A new record of this table, not yet inserted.
    pub fn record(&self) -> Record {
        Record::new(Arc::clone(&self.schema), Arc::clone(&self.engine))
    }

    pub fn create(&self) -> Result<()> {
        if self.schema.fields().is_empty() {
            return Err(RowmapError::Schema(format!(
                "Table '{}' declares no fields",
                self.schema.table()
            )));
        }

        let definitions: Vec<String> = self
            .schema
            .fields()
            .iter()
            .map(|field| field.render_storage_type(|kind| self.engine.map_kind(kind)))
            .collect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.schema.table(),
            definitions.join(", ")
        );
        engine::run(self.engine.as_ref(), &Statement::new(sql))?;
        Ok(())
    }

    pub fn drop(&self) -> Result<()> {
        let sql = format!("DROP TABLE IF EXISTS {}", self.schema.table());
        engine::run(self.engine.as_ref(), &Statement::new(sql))?;
        Ok(())
    }

    pub fn select(&self) -> Select<'_> {
        Select {
            table: self,
            columns: Vec::new(),
            filter: None,
            limit: None,
        }
    }

    /// Fetch one record by row identifier.
    pub fn get(&self, rowid: i64) -> Result<Option<Record>> {
        let mut rows = self
            .select()
            .filter(self.schema.rowid().eq(rowid))
            .limit(1)
            .fetch()?;
        rows.next().transpose()
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("table", &self.schema.table())
            .finish()
    }
}

/// SELECT builder. The row identifier is always part of the projection.
#[derive(Debug)]
pub struct Select<'a> {
    table: &'a Table,
    columns: Vec<String>,
    filter: Option<Condition>,
    limit: Option<usize>,
}

impl<'a> Select<'a> {
    /// Restrict the projection to these attributes. Checked when the
    /// statement is built.
    pub fn columns(mut self, attrs: &[&str]) -> Self {
        self.columns = attrs.iter().map(|attr| attr.to_string()).collect();
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(condition);
        self
    }

    /// Maximum number of rows. Zero means no limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the statement without executing it.
    pub fn statement(&self) -> Result<Statement> {
        let schema = &self.table.schema;

        let projection = if self.columns.is_empty() {
            format!("*,{ROWID}")
        } else {
            let mut columns = Vec::with_capacity(self.columns.len() + 1);
            for attr in &self.columns {
                if attr.eq_ignore_ascii_case(ROWID) {
                    continue;
                }
                columns.push(schema.field(attr)?.column_name());
            }
            columns.push(ROWID);
            columns.join(",")
        };

        let mut sql = format!("SELECT {projection} from {}", schema.table());
        let mut statement_params = None;
        if let Some(filter) = &self.filter {
            let (condition, params) = filter.compile();
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
            statement_params = Some(params);
        }
        if let Some(limit) = self.limit.filter(|&limit| limit > 0) {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        Ok(Statement {
            sql,
            params: statement_params,
        })
    }

    /// Execute and return the matching records.
    pub fn fetch(self) -> Result<Rows> {
        let statement = self.statement()?;
        let rows = engine::run(self.table.engine.as_ref(), &statement)?;
        Ok(Rows {
            schema: Arc::clone(&self.table.schema),
            engine: Arc::clone(&self.table.engine),
            rows: rows.into_iter(),
        })
    }
}

/// Records of one SELECT, built from the returned rows as they are consumed.
pub struct Rows {
    schema: Arc<Schema>,
    engine: Arc<dyn Engine>,
    rows: std::vec::IntoIter<Row>,
}

impl Rows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.len() == 0
    }
}

impl Iterator for Rows {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(Record::from_row(
            Arc::clone(&self.schema),
            Arc::clone(&self.engine),
            row,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RecordingEngine;
    use crate::schema::Field;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn setup() -> (Table, Arc<RecordingEngine>) {
        let schema = Schema::builder("Person")
            .field(Field::text("name").max_length(50).required())
            .field(Field::integer("age"))
            .field(Field::boolean("active").column("is_active"))
            .build()
            .unwrap();
        let engine = Arc::new(RecordingEngine::new());
        (Table::new(schema, engine.clone()), engine)
    }

    #[test]
    fn test_create_and_drop() {
        let (table, engine) = setup();
        table.create().unwrap();
        table.drop().unwrap();

        let sql: Vec<String> = engine.statements().into_iter().map(|s| s.sql).collect();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE IF NOT EXISTS Person (name TEXT NOT NULL, age INTEGER, is_active INTEGER)",
                "DROP TABLE IF EXISTS Person",
            ]
        );
    }

    #[test]
    fn test_select_with_condition() {
        let (table, _engine) = setup();
        let schema = Arc::clone(table.schema());
        let age = schema.field("age").unwrap();
        let name = schema.field("name").unwrap();

        let statement = table
            .select()
            .filter(age.ge(18).and(name.ne("Bob")))
            .statement()
            .unwrap();

        assert_eq!(
            statement.sql,
            "SELECT *,rowid from Person WHERE (age >= :__p1) AND (name != :__p2)"
        );
        assert_eq!(statement.param("__p1"), Some(&Value::Integer(18)));
        assert_eq!(statement.param("__p2"), Some(&Value::from("Bob")));
    }

    #[test]
    fn test_select_columns_always_include_rowid() {
        let (table, _engine) = setup();
        let statement = table
            .select()
            .columns(&["name", "active", "rowid"])
            .limit(5)
            .statement()
            .unwrap();

        assert_eq!(statement.sql, "SELECT name,is_active,rowid from Person LIMIT 5");
        assert_eq!(statement.params, None);
    }

    #[test]
    fn test_zero_limit_is_unlimited() {
        let (table, _engine) = setup();
        let statement = table.select().limit(0).statement().unwrap();
        assert_eq!(statement.sql, "SELECT *,rowid from Person");
    }

    #[test]
    fn test_select_unknown_column() {
        let (table, engine) = setup();
        let result = table.select().columns(&["salary"]).fetch();

        assert!(matches!(result, Err(RowmapError::UnknownColumn(c)) if c == "salary"));
        assert!(engine.statements().is_empty());
    }

    #[test]
    fn test_fetch_builds_persisted_records() {
        let (table, engine) = setup();
        engine.push_rows(vec![
            Row::new().with("name", "Ada").with("age", 36).with("is_active", 1).with("rowid", 1),
            Row::new().with("name", "Bob").with("age", 17).with("is_active", 0).with("rowid", 2),
        ]);

        let rows = table.select().fetch().unwrap();
        assert_eq!(rows.len(), 2);

        let records: Vec<Record> = rows.collect::<Result<_>>().unwrap();
        assert_eq!(records[0].rowid(), Some(1));
        assert_eq!(records[0].get("active").unwrap(), &Value::Boolean(true));
        assert_eq!(records[1].get("name").unwrap(), &Value::from("Bob"));
        assert!(records.iter().all(Record::is_persisted));
    }

    #[test]
    fn test_get_by_rowid() {
        let (table, engine) = setup();
        assert!(table.get(4).unwrap().is_none());

        let statement = engine.last_statement().unwrap();
        assert_eq!(statement.sql, "SELECT *,rowid from Person WHERE rowid = :__p1 LIMIT 1");
        assert_eq!(statement.param("__p1"), Some(&Value::Integer(4)));
    }
}
