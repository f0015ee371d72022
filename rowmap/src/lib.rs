pub mod condition;
pub mod engine;
pub mod error;
pub mod record;
pub mod schema;
pub mod table;
pub mod value;

pub use condition::{BinaryOp, Condition, Operand};
pub use engine::{Engine, RecordingEngine, SqliteConfig, SqliteEngine, Statement};
pub use error::{Result, RowmapError};
pub use record::{Deleted, Record, Reference, Saved};
pub use schema::{parse_catalog, parse_catalog_str, Catalog, Field, ForeignKey, Schema, SchemaBuilder};
pub use table::{Rows, Select, Table};
pub use value::{Kind, Params, Row, Value};
