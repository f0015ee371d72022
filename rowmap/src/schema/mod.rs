pub mod field;
pub mod parser;
pub mod types;

pub use field::{Field, ForeignKey};
pub use parser::{parse_catalog, parse_catalog_str, Catalog};
pub use types::{CatalogDefinition, FieldDefinition, TableDefinition};

use crate::error::{Result, RowmapError};
use crate::value::{Kind, Value};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

/// Name of the implicit row identity column every table carries.
pub const ROWID: &str = "rowid";

/// Record mapping model for one table.
///
/// Built once by [`SchemaBuilder::build`] and shared read-only (behind an
/// `Arc`) by every record of the table. Field order is declaration order and
/// is the column order of INSERT and CREATE TABLE.
#[derive(Debug)]
pub struct Schema {
    table: String,
    fields: Vec<Field>,
    positions: HashMap<String, usize>,
    aliases: HashMap<String, String>,
    rowid: Field,
}

impl Schema {
    pub fn builder(table: &str) -> SchemaBuilder {
        SchemaBuilder {
            table: table.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a declared field by attribute name.
    pub fn field(&self, attr: &str) -> Result<&Field> {
        self.position(attr)
            .map(|index| &self.fields[index])
            .ok_or_else(|| RowmapError::UnknownColumn(attr.to_string()))
    }

    pub fn has_field(&self, attr: &str) -> bool {
        self.positions.contains_key(attr)
    }

    pub(crate) fn position(&self, attr: &str) -> Option<usize> {
        self.positions.get(attr).copied()
    }

    /// Attribute name -> default value, in declaration order.
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(|field| (field.name(), field.default_value()))
    }

    /// Storage column -> attribute name, for fields whose names differ.
    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }

    /// Map a column name read back from storage to its attribute name.
    pub fn attribute_for_column<'a>(&'a self, column: &'a str) -> &'a str {
        self.aliases.get(column).map_or(column, String::as_str)
    }

    /// Descriptor of the implicit `rowid` column, usable in conditions.
    pub fn rowid(&self) -> &Field {
        &self.rowid
    }
}

/// Collects field declarations for a table and validates them into a [`Schema`].
pub struct SchemaBuilder {
    table: String,
    fields: Vec<Field>,
}

impl SchemaBuilder {
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Validate the declarations, assign storage names and register aliases.
    pub fn build(self) -> Result<Arc<Schema>> {
        check_identifier("table", &self.table)?;

        let mut fields = Vec::with_capacity(self.fields.len());
        let mut positions = HashMap::new();
        let mut aliases = HashMap::new();
        let mut columns = HashSet::new();

        for mut field in self.fields {
            field.assign_column();
            validate_field(&self.table, &field)?;

            let name = field.name().to_string();
            let column = field.column_name().to_string();

            if positions.contains_key(&name) {
                return Err(RowmapError::Schema(format!(
                    "Duplicate field '{name}' in table '{}'",
                    self.table
                )));
            }
            if !columns.insert(column.clone()) {
                return Err(RowmapError::Schema(format!(
                    "Duplicate column '{column}' in table '{}'",
                    self.table
                )));
            }

            if column != name {
                aliases.insert(column, name.clone());
            }
            positions.insert(name, fields.len());
            fields.push(field);
        }

        Ok(Arc::new(Schema {
            table: self.table,
            fields,
            positions,
            aliases,
            rowid: Field::integer(ROWID),
        }))
    }
}

fn validate_field(table: &str, field: &Field) -> Result<()> {
    check_identifier("field", field.name())?;
    check_identifier("column", field.column_name())?;

    for name in [field.name(), field.column_name()] {
        if name.starts_with("__") || name.eq_ignore_ascii_case(ROWID) {
            return Err(RowmapError::Schema(format!(
                "'{name}' is reserved and can not be declared on table '{table}'"
            )));
        }
    }

    if field.max_len().is_some() && field.kind() != Kind::Text {
        return Err(RowmapError::Schema(format!(
            "Field '{}' of kind {} can not have a maximum length",
            field.name(),
            field.kind()
        )));
    }

    field.validate(field.default_value())?;

    if let Some(foreign_key) = field.foreign_key() {
        let target = foreign_key.field()?;
        if target.kind() != field.kind() {
            return Err(RowmapError::InvalidForeignKey(format!(
                "'{}' is {} but {}.{} is {}",
                field.name(),
                field.kind(),
                foreign_key.schema().table(),
                target.name(),
                target.kind()
            )));
        }
    }

    Ok(())
}

fn check_identifier(what: &str, name: &str) -> Result<()> {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    let re = IDENTIFIER
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

    if re.is_match(name) {
        Ok(())
    } else {
        Err(RowmapError::Schema(format!("Invalid {what} name '{name}'")))
    }
}
