pub mod reference;

pub use reference::Reference;

use crate::engine::{self, Engine, Statement};
use crate::error::{Result, RowmapError};
use crate::schema::{Field, Schema, ROWID};
use crate::value::{Params, Row, Value};
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

/// Outcome of [`Record::add`] and [`Record::save`].
#[derive(Debug, Clone, PartialEq)]
pub enum Saved {
    Inserted { rowid: i64 },
    /// Attribute names written by the UPDATE.
    Updated { columns: Vec<String> },
    /// Nothing was pending; no statement was executed.
    Unchanged,
}

/// Outcome of [`Record::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deleted {
    Removed { rows: usize },
    /// The record has no row identifier. No statement was executed.
    NotInserted,
}

#[derive(Debug)]
enum Slot {
    Value(Value),
    Reference(Reference),
}

impl Slot {
    fn value(&self) -> &Value {
        match self {
            Slot::Value(value) => value,
            Slot::Reference(reference) => reference.raw_value(),
        }
    }
}

/// One row of a table, held in memory.
///
/// A new record keeps edits in its current values. Once it has a row
/// identifier, edits are staged as pending values until `save()` writes
/// exactly those columns.
pub struct Record {
    schema: Arc<Schema>,
    engine: Arc<dyn Engine>,
    rowid: Option<i64>,
    values: Vec<Slot>,
    pending: Vec<Option<Value>>,
}

impl Record {
    /// A new, not yet inserted record holding the schema defaults.
    pub fn new(schema: Arc<Schema>, engine: Arc<dyn Engine>) -> Self {
        let values = schema
            .defaults()
            .map(|(_, value)| Slot::Value(value.clone()))
            .collect();
        let pending = vec![None; schema.fields().len()];
        Record {
            schema,
            engine,
            rowid: None,
            values,
            pending,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn rowid(&self) -> Option<i64> {
        self.rowid
    }

    pub fn is_persisted(&self) -> bool {
        self.rowid.is_some()
    }

    fn index(&self, attr: &str) -> Result<usize> {
        self.schema
            .position(attr)
            .ok_or_else(|| RowmapError::UnknownColumn(attr.to_string()))
    }

    /// Pending value if one is staged, else the current value.
    pub fn get(&self, attr: &str) -> Result<&Value> {
        let index = self.index(attr)?;
        Ok(self.effective(index))
    }

    fn effective(&self, index: usize) -> &Value {
        self.pending[index]
            .as_ref()
            .unwrap_or_else(|| self.values[index].value())
    }

    /// The foreign-key slot of `attr`, once a value has been stored in it.
    pub fn reference(&self, attr: &str) -> Result<Option<&Reference>> {
        let index = self.index(attr)?;
        match &self.values[index] {
            Slot::Reference(reference) => Ok(Some(reference)),
            Slot::Value(_) => Ok(None),
        }
    }

    /// Validate and store a field value.
    ///
    /// Foreign-key fields look up the referenced row immediately.
    pub fn set(&mut self, attr: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.index(attr)?;
        let schema = Arc::clone(&self.schema);
        let field = &schema.fields()[index];

        let value = field.coerce(value.into());
        field.check_required(&value)?;
        field.validate(&value)?;

        if self.rowid.is_none() {
            self.values[index] = self.new_slot(field, value)?;
            return Ok(());
        }

        match &mut self.values[index] {
            Slot::Reference(reference) => {
                if reference.raw_value() != &value {
                    reference.update(value)?;
                }
            }
            Slot::Value(current) => match field.foreign_key() {
                Some(foreign_key) => {
                    if *current != value {
                        let baseline = current.clone();
                        self.values[index] = Slot::Reference(Reference::with_baseline(
                            foreign_key.clone(),
                            Arc::clone(&self.engine),
                            baseline,
                            value,
                        )?);
                    }
                }
                None if *current == value => self.pending[index] = None,
                None => self.pending[index] = Some(value),
            },
        }
        Ok(())
    }

    fn new_slot(&self, field: &Field, value: Value) -> Result<Slot> {
        Ok(match field.foreign_key() {
            Some(foreign_key) => Slot::Reference(Reference::new(
                foreign_key.clone(),
                Arc::clone(&self.engine),
                value,
            )?),
            None => Slot::Value(value),
        })
    }

    /// Attribute names that `save()` would write.
    pub fn changes(&self) -> Vec<&str> {
        self.changed_indices()
            .into_iter()
            .map(|index| self.schema.fields()[index].name())
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.changed_indices().is_empty()
    }

    fn changed_indices(&self) -> Vec<usize> {
        (0..self.values.len())
            .filter(|&index| match &self.values[index] {
                Slot::Reference(reference) => reference.has_changed(),
                Slot::Value(_) => self.pending[index].is_some(),
            })
            .collect()
    }

    /// INSERT every field and adopt the generated row identifier.
    pub fn add(&mut self) -> Result<Saved> {
        let schema = Arc::clone(&self.schema);
        let mut columns = Vec::with_capacity(schema.fields().len());
        let mut params = Params::new();

        for (index, field) in schema.fields().iter().enumerate() {
            let value = self.effective(index);
            field.check_required(value)?;
            columns.push(field.column_name());
            params.insert(field.column_name().to_string(), field.to_storage(value));
        }

        let sql = if columns.is_empty() {
            format!("INSERT into {} DEFAULT VALUES", schema.table())
        } else {
            let placeholders: Vec<String> = columns.iter().map(|c| format!(":{c}")).collect();
            format!(
                "INSERT into {} ({}) VALUES ({})",
                schema.table(),
                columns.join(","),
                placeholders.join(",")
            )
        };

        engine::run(self.engine.as_ref(), &Statement::new(sql).with_params(params))?;

        let rowid = self.engine.last_insert_id().ok_or_else(|| {
            RowmapError::Engine(format!("no row id reported for insert into {}", schema.table()))
        })?;
        self.rowid = Some(rowid);
        self.commit_pending();
        Ok(Saved::Inserted { rowid })
    }

    /// UPDATE the changed columns, or INSERT when the record is new.
    pub fn save(&mut self) -> Result<Saved> {
        let Some(rowid) = self.rowid else {
            return self.add();
        };

        let changed = self.changed_indices();
        if changed.is_empty() {
            debug!("{} row {rowid} unchanged, skipping update", self.schema.table());
            return Ok(Saved::Unchanged);
        }

        let schema = Arc::clone(&self.schema);
        let (condition, mut params) = schema.rowid().eq(rowid).compile();
        let mut assignments = Vec::with_capacity(changed.len());
        let mut names = Vec::with_capacity(changed.len());

        for &index in &changed {
            let field = &schema.fields()[index];
            let value = self.effective(index);
            field.check_required(value)?;

            let column = field.column_name();
            assignments.push(format!("{column}=:{column}"));
            params.insert(column.to_string(), field.to_storage(value));
            names.push(field.name().to_string());
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            schema.table(),
            assignments.join(","),
            condition
        );
        engine::run(self.engine.as_ref(), &Statement::new(sql).with_params(params))?;

        self.commit_pending();
        Ok(Saved::Updated { columns: names })
    }

    /// DELETE this record's row. A record that was never inserted is
    /// reported as [`Deleted::NotInserted`] without touching the engine.
    pub fn delete(&mut self) -> Result<Deleted> {
        let Some(rowid) = self.rowid else {
            warn!("delete on {} record that was never inserted", self.schema.table());
            return Ok(Deleted::NotInserted);
        };

        let (condition, params) = self.schema.rowid().eq(rowid).compile();
        let sql = format!("DELETE from {} WHERE {}", self.schema.table(), condition);
        engine::run(self.engine.as_ref(), &Statement::new(sql).with_params(params))?;

        let rows = self.engine.rows_affected();
        self.rowid = None;
        self.commit_pending();
        Ok(Deleted::Removed { rows })
    }

    /// Drop staged edits, restoring the last saved values.
    /// A failed foreign-key lookup leaves every edit in place.
    pub fn revert(&mut self) -> Result<()> {
        let mut restored = Vec::new();
        for (index, slot) in self.values.iter().enumerate() {
            if let Slot::Reference(reference) = slot {
                if reference.has_changed() {
                    let baseline = reference.baseline().clone();
                    let target = reference.lookup(&baseline)?;
                    restored.push((index, baseline, target));
                }
            }
        }

        for (index, baseline, target) in restored {
            if let Slot::Reference(reference) = &mut self.values[index] {
                reference.apply(baseline, target);
            }
        }
        self.pending.iter_mut().for_each(|slot| *slot = None);
        Ok(())
    }

    fn commit_pending(&mut self) {
        for (slot, pending) in self.values.iter_mut().zip(self.pending.iter_mut()) {
            match slot {
                Slot::Value(current) => {
                    if let Some(value) = pending.take() {
                        *current = value;
                    }
                }
                Slot::Reference(reference) => reference.reset(),
            }
        }
    }

    /// Build a persisted record from a row read back from storage. A value
    /// whose kind differs from its field's is a `TypeMismatch`.
    pub(crate) fn from_row(schema: Arc<Schema>, engine: Arc<dyn Engine>, row: Row) -> Result<Self> {
        let mut record = Record::new(Arc::clone(&schema), engine);

        for (column, value) in row.columns() {
            if column.eq_ignore_ascii_case(ROWID) {
                record.rowid = value.as_i64();
                continue;
            }
            let attr = schema.attribute_for_column(column);
            let Some(index) = schema.position(attr) else {
                debug!("ignoring column {column} not declared on {}", schema.table());
                continue;
            };
            let field = &schema.fields()[index];
            let value = field.coerce(value.clone());
            if value.kind().is_some_and(|kind| kind != field.kind()) {
                debug!(
                    "{} column {column} holds {}, declared {}",
                    schema.table(),
                    value.type_name(),
                    field.kind()
                );
                return Err(RowmapError::TypeMismatch {
                    field: field.name().to_string(),
                    expected: field.kind(),
                    actual: value.type_name(),
                });
            }
            record.values[index] = record.new_slot(field, value)?;
        }

        Ok(record)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.schema.table())
            .field("rowid", &self.rowid)
            .field("values", &self.values)
            .field("pending", &self.pending)
            .finish()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rowid {
            Some(rowid) => write!(f, "Table '{}' row {rowid}:", self.schema.table())?,
            None => write!(f, "Table '{}' row new:", self.schema.table())?,
        }
        for (index, field) in self.schema.fields().iter().enumerate() {
            write!(f, "\n{}: {}", field.name(), self.effective(index))?;
        }
        Ok(())
    }
}
