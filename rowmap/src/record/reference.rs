use super::Record;
use crate::engine::Engine;
use crate::error::{Result, RowmapError};
use crate::schema::ForeignKey;
use crate::table::Table;
use crate::value::Value;
use log::debug;
use std::fmt;
use std::sync::Arc;

/// Foreign-key slot of a record.
///
/// Holds the raw key value and looks the referenced row up as soon as the
/// value is stored (construction and every `update`). The lookup result is
/// cached until the next `update`.
pub struct Reference {
    foreign_key: ForeignKey,
    engine: Arc<dyn Engine>,
    value: Value,
    baseline: Value,
    target: Option<Box<Record>>,
}

impl Reference {
    pub fn new(foreign_key: ForeignKey, engine: Arc<dyn Engine>, value: Value) -> Result<Self> {
        Self::with_baseline(foreign_key, engine, value.clone(), value)
    }

    /// A reference whose last persisted value is `baseline`, now holding `value`.
    pub fn with_baseline(
        foreign_key: ForeignKey,
        engine: Arc<dyn Engine>,
        baseline: Value,
        value: Value,
    ) -> Result<Self> {
        let mut reference = Reference {
            foreign_key,
            engine,
            value: Value::Null,
            baseline,
            target: None,
        };
        reference.update(value)?;
        Ok(reference)
    }

    /// Store a new raw value and look up the matching referenced row.
    /// A failed lookup leaves the reference unchanged.
    pub fn update(&mut self, value: Value) -> Result<()> {
        let target = self.lookup(&value)?;
        self.apply(value, target);
        Ok(())
    }

    pub(crate) fn lookup(&self, value: &Value) -> Result<Option<Box<Record>>> {
        if value.is_null() {
            return Ok(None);
        }

        let schema = Arc::clone(self.foreign_key.schema());
        let field = self.foreign_key.field()?;
        let table = Table::new(Arc::clone(&schema), Arc::clone(&self.engine));
        let mut rows = table
            .select()
            .filter(field.eq(value.clone()))
            .limit(1)
            .fetch()?;

        let target = rows.next().transpose()?.map(Box::new);
        if target.is_none() {
            debug!(
                "no row in {} where {} = {}",
                schema.table(),
                field.column_name(),
                value
            );
        }
        Ok(target)
    }

    pub(crate) fn apply(&mut self, value: Value, target: Option<Box<Record>>) {
        self.value = value;
        self.target = target;
    }

    /// The stored key value, as written to storage.
    pub fn raw_value(&self) -> &Value {
        &self.value
    }

    /// The referenced record, if the last lookup found one.
    pub fn resolve(&self) -> Option<&Record> {
        self.target.as_deref()
    }

    /// The referenced record, or `ReferenceNotFound`.
    pub fn target(&self) -> Result<&Record> {
        self.resolve().ok_or_else(|| RowmapError::ReferenceNotFound {
            table: self.foreign_key.schema().table().to_string(),
            column: self.foreign_key.attr().to_string(),
            value: self.value.to_string(),
        })
    }

    /// Read a field of the referenced record.
    pub fn get(&self, attr: &str) -> Result<&Value> {
        self.target()?.get(attr)
    }

    pub fn foreign_key(&self) -> &ForeignKey {
        &self.foreign_key
    }

    pub fn baseline(&self) -> &Value {
        &self.baseline
    }

    pub fn has_changed(&self) -> bool {
        self.value != self.baseline
    }

    /// Accept the current value as persisted.
    pub fn reset(&mut self) {
        self.baseline = self.value.clone();
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("table", &self.foreign_key.schema().table())
            .field("attr", &self.foreign_key.attr())
            .field("value", &self.value)
            .field("baseline", &self.baseline)
            .field("resolved", &self.target.is_some())
            .finish()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolve() {
            Some(record) => write!(f, "{record}"),
            None => f.write_str("No Data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RecordingEngine;
    use crate::schema::{Field, Schema};
    use crate::value::Row;

    fn setup() -> (Arc<Schema>, Arc<RecordingEngine>) {
        let people = Schema::builder("Person")
            .field(Field::text("name"))
            .build()
            .unwrap();
        (people, Arc::new(RecordingEngine::new()))
    }

    fn owner_key(people: &Arc<Schema>) -> ForeignKey {
        let pet = Schema::builder("Pet")
            .field(Field::integer("owner").references(people, "rowid"))
            .build()
            .unwrap();
        pet.field("owner").unwrap().foreign_key().unwrap().clone()
    }

    #[test]
    fn test_lookup_on_construction() {
        let (people, engine) = setup();
        engine.push_rows(vec![Row::new().with("name", "Ada").with("rowid", 3)]);

        let reference = Reference::new(owner_key(&people), engine.clone(), 3.into()).unwrap();

        let lookup = engine.last_statement().unwrap();
        assert_eq!(lookup.sql, "SELECT *,rowid from Person WHERE rowid = :__p1 LIMIT 1");
        assert_eq!(lookup.param("__p1"), Some(&Value::Integer(3)));

        let owner = reference.resolve().unwrap();
        assert_eq!(owner.rowid(), Some(3));
        assert_eq!(reference.get("name").unwrap(), &Value::from("Ada"));
        assert!(!reference.has_changed());
    }

    #[test]
    fn test_missing_row_reports_not_found() {
        let (people, engine) = setup();
        let reference = Reference::new(owner_key(&people), engine, 9.into()).unwrap();

        assert!(reference.resolve().is_none());
        assert!(matches!(
            reference.get("name"),
            Err(RowmapError::ReferenceNotFound { value, .. }) if value == "9"
        ));
        assert_eq!(reference.to_string(), "No Data");
    }

    #[test]
    fn test_null_value_does_not_query() {
        let (people, engine) = setup();
        let reference = Reference::new(owner_key(&people), engine.clone(), Value::Null).unwrap();

        assert!(engine.statements().is_empty());
        assert!(reference.resolve().is_none());
    }

    #[test]
    fn test_change_tracking() {
        let (people, engine) = setup();
        let mut reference = Reference::new(owner_key(&people), engine.clone(), 1.into()).unwrap();

        reference.update(2.into()).unwrap();
        assert!(reference.has_changed());
        assert_eq!(reference.raw_value(), &Value::Integer(2));
        assert_eq!(engine.statements().len(), 2);

        reference.reset();
        assert!(!reference.has_changed());
        assert_eq!(reference.baseline(), &Value::Integer(2));
    }
}
