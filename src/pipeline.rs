//! Query Pipeline
//!
//! Wires the four stages together: extract → resolve → synthesize → guard.
//! Every invocation runs synchronously on the caller's thread; the schema
//! cache inside the resolver is the only state shared between invocations.

use crate::config::PipelineConfig;
use crate::db::{DataStore, Row};
use crate::error::{FailureDescription, Result};
use crate::extractor::IntentExtractor;
use crate::guard::ExecutionGuard;
use crate::model::{IntermediateQuery, ResolvedQuery};
use crate::schema::SchemaResolver;
use crate::synthesizer::StatementSynthesizer;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info_span};
use uuid::Uuid;

/// Everything up to, but not including, execution
#[derive(Debug, Clone, Serialize)]
pub struct Translation {
    pub intermediate: IntermediateQuery,
    pub resolved: ResolvedQuery,
    pub statement: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub intermediate: IntermediateQuery,
    pub resolved: ResolvedQuery,
    /// Statement as executed, including any appended row cap
    pub statement: String,
    pub rows: Vec<Row>,
}

/// Serializable envelope for callers that want a single response shape
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDescription>,
}

impl From<Result<QueryOutcome>> for QueryResponse {
    fn from(result: Result<QueryOutcome>) -> Self {
        match result {
            Ok(outcome) => Self {
                success: true,
                sql: Some(outcome.statement),
                results: Some(outcome.rows),
                error: None,
            },
            Err(e) => Self {
                success: false,
                sql: None,
                results: None,
                error: Some(FailureDescription::from(&e)),
            },
        }
    }
}

pub struct QueryPipeline {
    extractor: IntentExtractor,
    resolver: SchemaResolver,
    synthesizer: StatementSynthesizer,
    guard: ExecutionGuard,
    store: Arc<dyn DataStore>,
    fallback_table: String,
}

impl QueryPipeline {
    pub fn new(store: Arc<dyn DataStore>, config: PipelineConfig) -> Self {
        let PipelineConfig {
            vocabulary,
            schema,
            bootstrap,
            guard,
            rendering,
        } = config;
        let fallback_table = bootstrap.table.clone();

        Self {
            extractor: IntentExtractor::new(vocabulary),
            resolver: SchemaResolver::new(Arc::clone(&store), schema, bootstrap),
            synthesizer: StatementSynthesizer::new(rendering),
            guard: ExecutionGuard::new(Arc::clone(&store), guard),
            store,
            fallback_table,
        }
    }

    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    /// Extract, resolve and synthesize without touching the guard.
    pub fn translate(&self, text: &str) -> Result<Translation> {
        let intermediate = self.extractor.extract(text);
        let resolved = self.resolver.resolve(intermediate.clone());
        let statement = self.synthesizer.synthesize(&resolved)?;
        debug!("Generated SQL: {}", statement);

        Ok(Translation {
            intermediate,
            resolved,
            statement,
        })
    }

    /// Run the full pipeline for one request.
    pub fn process(&self, text: &str) -> Result<QueryOutcome> {
        let span = info_span!("nl_query", request_id = %Uuid::new_v4());
        let _enter = span.enter();
        debug!("Processing natural language query: {}", text);

        let result = self.translate(text).and_then(|translation| {
            let executed = self.guard.execute(&translation.statement)?;
            Ok(QueryOutcome {
                intermediate: translation.intermediate,
                resolved: translation.resolved,
                statement: executed.statement,
                rows: executed.rows,
            })
        });

        if let Err(e) = &result {
            error!("Error processing query: {}", e);
        }
        result
    }

    pub fn respond(&self, text: &str) -> QueryResponse {
        self.process(text).into()
    }

    /// Tables known to the store; the bootstrap table when the store cannot
    /// be listed.
    pub fn list_tables(&self) -> Vec<String> {
        self.store.list_tables().unwrap_or_else(|e| {
            error!("Error retrieving table names: {}", e);
            vec![self.fallback_table.clone()]
        })
    }

    pub fn health(&self) -> bool {
        match self.store.ping() {
            Ok(()) => true,
            Err(e) => {
                error!("Database connection test failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootstrapSeed;
    use crate::db::SqliteStore;
    use crate::error::NlSqlError;
    use crate::model::ColumnMetadata;

    fn pipeline() -> QueryPipeline {
        QueryPipeline::new(
            Arc::new(SqliteStore::in_memory().unwrap()),
            PipelineConfig::default(),
        )
    }

    struct OfflineStore;

    impl DataStore for OfflineStore {
        fn describe_columns(&self, _table: &str) -> Result<Vec<ColumnMetadata>> {
            Err(NlSqlError::Database("connection refused".to_string()))
        }
        fn table_exists(&self, _table: &str) -> Result<bool> {
            Err(NlSqlError::Database("connection refused".to_string()))
        }
        fn query(&self, _sql: &str) -> Result<Vec<Row>> {
            Err(NlSqlError::Database("connection refused".to_string()))
        }
        fn bootstrap(&self, _seed: &BootstrapSeed) -> Result<()> {
            Err(NlSqlError::Database("connection refused".to_string()))
        }
        fn list_tables(&self) -> Result<Vec<String>> {
            Err(NlSqlError::Database("connection refused".to_string()))
        }
        fn ping(&self) -> Result<()> {
            Err(NlSqlError::Database("connection refused".to_string()))
        }
    }

    #[test]
    fn test_translate_does_not_execute() {
        let translation = pipeline().translate("show staff").unwrap();
        assert_eq!(translation.statement, "SELECT * FROM employees");
    }

    #[test]
    fn test_respond_success_envelope() {
        let response = pipeline().respond("how many staff");
        assert!(response.success);
        assert_eq!(
            response.sql.as_deref(),
            Some("SELECT COUNT(*) as count FROM employees LIMIT 1000")
        );
        assert_eq!(response.results.unwrap()[0]["count"], serde_json::json!(5));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_offline_store_degrades_until_execution() {
        let pipeline = QueryPipeline::new(Arc::new(OfflineStore), PipelineConfig::default());

        let translation = pipeline.translate("list names of workers").unwrap();
        assert_eq!(translation.statement, "SELECT name, name FROM employees");

        let response = pipeline.respond("list names of workers");
        assert!(!response.success);
        let failure = response.error.unwrap();
        assert_eq!(failure.kind, "execution_failure");
        assert!(failure.message.contains("connection refused"));
    }

    #[test]
    fn test_list_tables_falls_back_to_bootstrap_table() {
        let offline = QueryPipeline::new(Arc::new(OfflineStore), PipelineConfig::default());
        assert_eq!(offline.list_tables(), vec!["employees".to_string()]);
        assert!(!offline.health());

        let online = pipeline();
        assert!(online.health());
        assert!(online.list_tables().is_empty());
    }
}
