use super::{Schema, ROWID};
use crate::condition::{BinaryOp, Condition, Operand};
use crate::error::{Result, RowmapError};
use crate::value::{Kind, Value};
use std::sync::Arc;

/// Typed column metadata for one declared attribute of a record schema.
///
/// Fields are declared with a builder chain and handed to
/// [`Schema::builder`](super::Schema::builder). Comparison methods build
/// [`Condition`]s rather than booleans:
///
/// ```ignore
/// let adults = person.field("age")?.ge(18);
/// ```
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    column: Option<String>,
    kind: Kind,
    required: bool,
    max_length: Option<usize>,
    default: Value,
    foreign_key: Option<ForeignKey>,
}

/// Reference from a field to a field of another, already built schema.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    schema: Arc<Schema>,
    attr: String,
}

impl ForeignKey {
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn attr(&self) -> &str {
        &self.attr
    }

    /// The referenced field descriptor (`rowid` included).
    pub fn field(&self) -> Result<&Field> {
        if self.attr == ROWID {
            return Ok(self.schema.rowid());
        }
        self.schema.field(&self.attr).map_err(|_| {
            RowmapError::InvalidForeignKey(format!(
                "'{}' is not a field of table '{}'",
                self.attr,
                self.schema.table()
            ))
        })
    }
}

impl Field {
    pub fn new(name: &str, kind: Kind) -> Self {
        let default = match kind {
            Kind::Boolean => Value::Boolean(false),
            _ => Value::Null,
        };
        Field {
            name: name.to_string(),
            column: None,
            kind,
            required: false,
            max_length: None,
            default,
            foreign_key: None,
        }
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, Kind::Text)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, Kind::Integer)
    }

    pub fn real(name: &str) -> Self {
        Self::new(name, Kind::Real)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, Kind::Boolean)
    }

    // ── Declaration ─────────────────────────────────────────────────

    /// Storage column name, when it differs from the attribute name.
    pub fn column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Maximum length in characters. Text fields only.
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    /// Declare this field a foreign key to `attr` of `schema`.
    /// Checked when the owning schema is built.
    pub fn references(mut self, schema: &Arc<Schema>, attr: &str) -> Self {
        self.foreign_key = Some(ForeignKey {
            schema: Arc::clone(schema),
            attr: attr.to_string(),
        });
        self
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn max_len(&self) -> Option<usize> {
        self.max_length
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn foreign_key(&self) -> Option<&ForeignKey> {
        self.foreign_key.as_ref()
    }

    pub(crate) fn assign_column(&mut self) {
        if self.column.is_none() {
            self.column = Some(self.name.clone());
        }
    }

    // ── Values ──────────────────────────────────────────────────────

    /// Check a value's kind and length against this field. Null always passes;
    /// required-ness is checked by [`Field::check_required`].
    pub fn validate(&self, value: &Value) -> Result<()> {
        let Some(kind) = value.kind() else {
            return Ok(());
        };

        if kind != self.kind {
            return Err(RowmapError::TypeMismatch {
                field: self.name.clone(),
                expected: self.kind,
                actual: value.type_name(),
            });
        }

        if let (Value::Text(text), Some(max_length)) = (value, self.max_length) {
            let length = text.chars().count();
            if length > max_length {
                return Err(RowmapError::ValueTooLong {
                    field: self.name.clone(),
                    length,
                    max_length,
                });
            }
        }

        Ok(())
    }

    pub fn check_required(&self, value: &Value) -> Result<()> {
        if self.required && value.is_null() {
            return Err(RowmapError::RequiredFieldMissing(self.name.clone()));
        }
        Ok(())
    }

    /// Normalize a value read from storage: boolean fields accept 0/non-zero.
    pub fn coerce(&self, value: Value) -> Value {
        match (self.kind, value) {
            (Kind::Boolean, Value::Integer(n)) => Value::Boolean(n != 0),
            (_, value) => value,
        }
    }

    /// Representation bound into statements: booleans become 0/1.
    pub fn to_storage(&self, value: &Value) -> Value {
        match value {
            Value::Boolean(b) => Value::Integer(i64::from(*b)),
            other => other.clone(),
        }
    }

    // ── Conditions ──────────────────────────────────────────────────

    pub fn eq(&self, value: impl Into<Operand>) -> Condition {
        Condition::compare(self, BinaryOp::Eq, value)
    }

    pub fn ne(&self, value: impl Into<Operand>) -> Condition {
        Condition::compare(self, BinaryOp::Ne, value)
    }

    pub fn lt(&self, value: impl Into<Operand>) -> Condition {
        Condition::compare(self, BinaryOp::Lt, value)
    }

    pub fn le(&self, value: impl Into<Operand>) -> Condition {
        Condition::compare(self, BinaryOp::Le, value)
    }

    pub fn gt(&self, value: impl Into<Operand>) -> Condition {
        Condition::compare(self, BinaryOp::Gt, value)
    }

    pub fn ge(&self, value: impl Into<Operand>) -> Condition {
        Condition::compare(self, BinaryOp::Ge, value)
    }

    /// Column definition for CREATE TABLE, typed through the engine's mapping.
    pub fn render_storage_type(&self, map_kind: impl Fn(Kind) -> &'static str) -> String {
        let mut definition = format!("{} {}", self.column_name(), map_kind(self.kind));
        if self.required {
            definition.push_str(" NOT NULL");
        }
        definition
    }
}
