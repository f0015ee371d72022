use super::types::{CatalogDefinition, FieldDefinition};
use super::{Field, Schema};
use crate::error::{Result, RowmapError};
use crate::value::{Kind, Value};
use std::path::Path;
use std::sync::Arc;

/// A set of built schemas, looked up by table name.
#[derive(Debug, Default)]
pub struct Catalog {
    schemas: Vec<Arc<Schema>>,
}

impl Catalog {
    /// Build every table of a definition, in order.
    pub fn from_definition(definition: &CatalogDefinition) -> Result<Self> {
        let mut catalog = Catalog::default();

        for table in &definition.tables {
            if catalog.get(&table.name).is_some() {
                return Err(RowmapError::Schema(format!(
                    "Duplicate table '{}'",
                    table.name
                )));
            }

            let mut builder = Schema::builder(&table.name);
            for field_def in &table.fields {
                builder = builder.field(catalog.build_field(field_def)?);
            }
            catalog.schemas.push(builder.build()?);
        }

        Ok(catalog)
    }

    pub fn get(&self, table: &str) -> Option<&Arc<Schema>> {
        self.schemas.iter().find(|schema| schema.table() == table)
    }

    pub fn schemas(&self) -> &[Arc<Schema>] {
        &self.schemas
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    fn build_field(&self, definition: &FieldDefinition) -> Result<Field> {
        let mut field = Field::new(&definition.name, definition.kind);

        if let Some(column) = &definition.column {
            field = field.column(column);
        }
        if definition.required {
            field = field.required();
        }
        if let Some(length) = definition.length {
            field = field.max_length(length);
        }
        if let Some(default) = &definition.default {
            field = field.default(yaml_to_value(definition, default)?);
        }
        if let Some(reference) = &definition.references {
            let (table, attr) = reference.split_once('.').ok_or_else(|| {
                RowmapError::InvalidForeignKey(format!(
                    "'{reference}' on field '{}' is not of the form Table.field",
                    definition.name
                ))
            })?;
            let target = self.get(table).ok_or_else(|| {
                RowmapError::InvalidForeignKey(format!(
                    "table '{table}' referenced by field '{}' is not declared before it",
                    definition.name
                ))
            })?;
            field = field.references(target, attr);
        }

        Ok(field)
    }
}

/// Parse a catalog YAML file and build its schemas
pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)?;
    parse_catalog_str(&content)
}

/// Parse a catalog YAML string and build its schemas
pub fn parse_catalog_str(content: &str) -> Result<Catalog> {
    let definition: CatalogDefinition = serde_yaml::from_str(content)?;
    Catalog::from_definition(&definition)
}

fn yaml_to_value(definition: &FieldDefinition, yaml: &serde_yaml::Value) -> Result<Value> {
    let value = match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Boolean(*b),
        serde_yaml::Value::String(s) => Value::Text(s.clone()),
        serde_yaml::Value::Number(n) => match (definition.kind, n.as_i64(), n.as_f64()) {
            (Kind::Real, _, Some(f)) => Value::Real(f),
            (_, Some(i), _) => Value::Integer(i),
            (_, None, Some(f)) => Value::Real(f),
            _ => Value::Null,
        },
        _ => {
            return Err(RowmapError::Schema(format!(
                "Unsupported default for field '{}'",
                definition.name
            )))
        }
    };
    Ok(value)
}
