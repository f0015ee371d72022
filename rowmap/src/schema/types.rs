use crate::value::Kind;
use serde::Deserialize;

/// Top-level catalog definition parsed from a YAML file
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogDefinition {
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
}

/// Definition of a single table. Tables are built in declaration order, so a
/// table may only reference tables listed before it.
#[derive(Debug, Clone, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// Definition of a single field in a table
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Kind,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub length: Option<usize>,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
    /// `Table.attr` of an earlier table
    #[serde(default)]
    pub references: Option<String>,
}
