//! Schema resolution: maps user vocabulary onto verified table and column
//! identifiers, backed by a per-table descriptor cache.

pub mod cache;
pub mod resolver;

pub use cache::SchemaCache;
pub use resolver::{ColumnMatch, SchemaResolver, TableMatch};
