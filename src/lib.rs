pub mod config;
pub mod db;
pub mod error;
pub mod extractor;
pub mod guard;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod string_utils;
pub mod synthesizer;

pub use config::PipelineConfig;
pub use db::{DataStore, Row, SqliteStore};
pub use error::{FailureDescription, NlSqlError, Result};
pub use extractor::IntentExtractor;
pub use guard::ExecutionGuard;
pub use model::{IntermediateQuery, Predicate, QueryType, ResolvedQuery, TableDescriptor};
pub use pipeline::{QueryOutcome, QueryPipeline, QueryResponse, Translation};
pub use schema::{SchemaCache, SchemaResolver};
pub use synthesizer::StatementSynthesizer;
