//! Data store access
//!
//! The pipeline talks to its backing store only through [`DataStore`]; the
//! SQLite implementation is the one shipped with the crate.

pub mod sqlite_store;

pub use sqlite_store::SqliteStore;

use crate::config::BootstrapSeed;
use crate::error::Result;
use crate::model::ColumnMetadata;

/// One result row, column name to value, in select-list order
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Operations the pipeline needs from a data store
pub trait DataStore: Send + Sync {
    /// Columns of `table` in declaration order. A missing table yields an
    /// empty list.
    fn describe_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>>;

    /// Exact, case-sensitive existence test.
    fn table_exists(&self, table: &str) -> Result<bool>;

    /// Run a read statement and collect every row.
    fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Create the seed table if missing and fill it when empty.
    fn bootstrap(&self, seed: &BootstrapSeed) -> Result<()>;

    fn list_tables(&self) -> Result<Vec<String>>;

    fn ping(&self) -> Result<()>;
}
