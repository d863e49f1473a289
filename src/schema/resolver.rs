//! Schema Resolver
//!
//! Rewrites the raw tokens of an [`IntermediateQuery`] into identifiers that
//! exist in the store. Resolution never fails:
//! - an unknown table falls back to the bootstrap table,
//! - an unknown column is dropped,
//! - an indescribable table is described by the builtin default schema.

use super::cache::SchemaCache;
use crate::config::{BootstrapSeed, SchemaDefaults};
use crate::db::DataStore;
use crate::model::{ColumnDescriptor, IntermediateQuery, ResolvedQuery, TableDescriptor};
use crate::string_utils;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};

/// How a table token was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableMatch {
    Exact(String),
    /// A case or plural variant of the token exists
    Variant(String),
    /// Nothing matched; the bootstrap table is used
    Bootstrapped(String),
}

impl TableMatch {
    pub fn table(&self) -> &str {
        match self {
            TableMatch::Exact(t) | TableMatch::Variant(t) | TableMatch::Bootstrapped(t) => t,
        }
    }
}

/// How a column token was resolved, in priority order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnMatch {
    Exact(String),
    Alias(String),
    Partial(String),
    Unresolved,
}

impl ColumnMatch {
    pub fn column(&self) -> Option<&str> {
        match self {
            ColumnMatch::Exact(c) | ColumnMatch::Alias(c) | ColumnMatch::Partial(c) => Some(c),
            ColumnMatch::Unresolved => None,
        }
    }
}

pub struct SchemaResolver {
    store: Arc<dyn DataStore>,
    cache: SchemaCache,
    defaults: SchemaDefaults,
    seed: BootstrapSeed,
    bootstrapped: AtomicBool,
}

impl SchemaResolver {
    pub fn new(store: Arc<dyn DataStore>, defaults: SchemaDefaults, seed: BootstrapSeed) -> Self {
        Self {
            store,
            cache: SchemaCache::new(),
            defaults,
            seed,
            bootstrapped: AtomicBool::new(false),
        }
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Resolve every table and column reference of `query`.
    pub fn resolve(&self, query: IntermediateQuery) -> ResolvedQuery {
        let table = self.resolve_table(&query.table);
        let descriptor = self.table_info(table.table());

        let mut resolved = IntermediateQuery::new(query.query_type, table.table());

        resolved.columns = query
            .columns
            .map(|columns| self.resolve_all(&columns, &descriptor))
            .filter(|columns| !columns.is_empty());

        resolved.predicates = query
            .predicates
            .into_iter()
            .filter_map(|mut predicate| {
                let column = self.resolve_column(&predicate.column, &descriptor);
                column.column().map(|name| {
                    predicate.column = name.to_string();
                    predicate
                })
            })
            .collect();

        resolved.group_by = query
            .group_by
            .map(|columns| self.resolve_all(&columns, &descriptor))
            .filter(|columns| !columns.is_empty());

        if let Some(order_by) = query.order_by {
            if let Some(name) = self.resolve_column(&order_by, &descriptor).column() {
                resolved.order_by = Some(name.to_string());
                resolved.order_direction = query.order_direction;
            }
        }

        resolved.limit = query.limit;

        debug!("Resolved query against table {:?}", table);
        ResolvedQuery::new(resolved)
    }

    pub fn resolve_table(&self, token: &str) -> TableMatch {
        if self.exists(token) {
            return TableMatch::Exact(token.to_string());
        }

        if let Some(variant) = table_variants(token).into_iter().find(|v| self.exists(v)) {
            debug!("Table '{}' resolved to variant '{}'", token, variant);
            return TableMatch::Variant(variant);
        }

        self.bootstrap();
        info!("Table '{}' not found, falling back to {}", token, self.seed.table);
        TableMatch::Bootstrapped(self.seed.table.clone())
    }

    /// Priority: exact name, then alias, then substring either way. All
    /// comparisons ignore case.
    pub fn resolve_column(&self, token: &str, table: &TableDescriptor) -> ColumnMatch {
        let wanted = token.to_lowercase();

        if let Some(column) = table.columns.iter().find(|c| c.name.to_lowercase() == wanted) {
            return ColumnMatch::Exact(column.name.clone());
        }

        if let Some(column) = table
            .columns
            .iter()
            .find(|c| c.aliases.iter().any(|a| a.to_lowercase() == wanted))
        {
            return ColumnMatch::Alias(column.name.clone());
        }

        if !wanted.is_empty() {
            if let Some(column) = table.columns.iter().find(|c| {
                let name = c.name.to_lowercase();
                name.contains(&wanted) || wanted.contains(&name)
            }) {
                return ColumnMatch::Partial(column.name.clone());
            }
        }

        if tracing::enabled!(Level::DEBUG) {
            debug!(
                "Dropping unresolved column '{}' on {} (closest: {:?})",
                token,
                table.name,
                closest_column(token, table)
            );
        }
        ColumnMatch::Unresolved
    }

    /// Descriptor for `table`, populated from the store on first use.
    pub fn table_info(&self, table: &str) -> Arc<TableDescriptor> {
        if let Some(descriptor) = self.cache.get(table) {
            return descriptor;
        }

        match self.store.describe_columns(table) {
            Ok(columns) if !columns.is_empty() => {
                let descriptor = TableDescriptor {
                    name: table.to_string(),
                    columns: columns
                        .into_iter()
                        .map(|meta| {
                            let aliases = self.defaults.aliases_for(&meta.name);
                            ColumnDescriptor::from_metadata(meta, aliases)
                        })
                        .collect(),
                };
                info!("Cached schema for {} ({} columns)", table, descriptor.columns.len());
                self.cache.insert(descriptor)
            }
            Ok(_) => {
                warn!("No columns reported for table {}, using default schema", table);
                Arc::new(self.default_descriptor(table))
            }
            Err(e) => {
                warn!("Could not retrieve schema for table {}: {}", table, e);
                Arc::new(self.default_descriptor(table))
            }
        }
    }

    fn default_descriptor(&self, table: &str) -> TableDescriptor {
        TableDescriptor {
            name: table.to_string(),
            columns: self
                .defaults
                .default_columns
                .iter()
                .cloned()
                .map(|meta| {
                    let aliases = self.defaults.aliases_for(&meta.name);
                    ColumnDescriptor::from_metadata(meta, aliases)
                })
                .collect(),
        }
    }

    fn resolve_all(&self, tokens: &[String], table: &TableDescriptor) -> Vec<String> {
        tokens
            .iter()
            .filter_map(|token| self.resolve_column(token, table).column().map(String::from))
            .collect()
    }

    fn exists(&self, table: &str) -> bool {
        if table.is_empty() {
            return false;
        }
        match self.store.table_exists(table) {
            Ok(found) => found,
            Err(e) => {
                debug!("Error checking table existence for {}: {}", table, e);
                false
            }
        }
    }

    fn bootstrap(&self) {
        if self.bootstrapped.load(Ordering::Acquire) {
            return;
        }
        match self.store.bootstrap(&self.seed) {
            Ok(()) => self.bootstrapped.store(true, Ordering::Release),
            Err(e) => error!("Error creating sample table {}: {}", self.seed.table, e),
        }
    }
}

/// Column name most similar to `token`; a hint for logs only.
fn closest_column<'a>(token: &str, table: &'a TableDescriptor) -> Option<&'a str> {
    table
        .columns
        .iter()
        .map(|c| (c, string_utils::similarity(&c.name, token)))
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(c, _)| c.name.as_str())
}

/// Lowercase, uppercase, naive plural, naive singular.
fn table_variants(token: &str) -> Vec<String> {
    let mut variants = vec![token.to_lowercase(), token.to_uppercase(), format!("{}s", token)];
    let mut chars = token.chars();
    if chars.next_back().is_some() {
        variants.push(chars.as_str().to_string());
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Row, SqliteStore};
    use crate::error::{NlSqlError, Result};
    use crate::model::{ColumnMetadata, Predicate, QueryType};
    use std::sync::atomic::AtomicUsize;

    fn resolver_with(store: Arc<dyn DataStore>) -> SchemaResolver {
        SchemaResolver::new(store, SchemaDefaults::default(), BootstrapSeed::default())
    }

    fn sqlite_resolver() -> SchemaResolver {
        resolver_with(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    /// A store whose metadata queries always fail.
    #[derive(Default)]
    struct BrokenStore {
        bootstrap_calls: AtomicUsize,
    }

    impl DataStore for BrokenStore {
        fn describe_columns(&self, _table: &str) -> Result<Vec<ColumnMetadata>> {
            Err(NlSqlError::Database("metadata unavailable".to_string()))
        }
        fn table_exists(&self, _table: &str) -> Result<bool> {
            Err(NlSqlError::Database("metadata unavailable".to_string()))
        }
        fn query(&self, _sql: &str) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }
        fn bootstrap(&self, _seed: &BootstrapSeed) -> Result<()> {
            self.bootstrap_calls.fetch_add(1, Ordering::SeqCst);
            Err(NlSqlError::Database("read-only".to_string()))
        }
        fn list_tables(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unknown_table_bootstraps_default() {
        let resolver = sqlite_resolver();

        let table = resolver.resolve_table("products");
        assert_eq!(table, TableMatch::Bootstrapped("employees".to_string()));

        // the demonstration table now exists and is matched directly
        assert_eq!(
            resolver.resolve_table("employees"),
            TableMatch::Exact("employees".to_string())
        );
    }

    #[test]
    fn test_table_variants_in_order() {
        assert_eq!(
            table_variants("Employee"),
            vec!["employee", "EMPLOYEE", "Employees", "Employe"]
        );
        assert_eq!(table_variants(""), vec!["", "", "s"]);
    }

    #[test]
    fn test_table_variant_resolution() {
        let resolver = sqlite_resolver();
        resolver.resolve_table("nothing");

        assert_eq!(
            resolver.resolve_table("Employees"),
            TableMatch::Variant("employees".to_string())
        );
        assert_eq!(
            resolver.resolve_table("employee"),
            TableMatch::Variant("employees".to_string())
        );
        assert_eq!(
            resolver.resolve_table("employeess"),
            TableMatch::Variant("employees".to_string())
        );
    }

    #[test]
    fn test_column_priority() {
        let resolver = sqlite_resolver();
        let table = resolver.table_info("employees");

        assert_eq!(
            resolver.resolve_column("SALARY", &table),
            ColumnMatch::Exact("salary".to_string())
        );
        assert_eq!(
            resolver.resolve_column("Dept", &table),
            ColumnMatch::Alias("department".to_string())
        );
        assert_eq!(
            resolver.resolve_column("email_addr", &table),
            ColumnMatch::Partial("email".to_string())
        );
        assert_eq!(resolver.resolve_column("bonus", &table), ColumnMatch::Unresolved);
    }

    #[test]
    fn test_alias_beats_partial_match() {
        // "location" contains no column name but is an alias of city
        let resolver = sqlite_resolver();
        let table = resolver.table_info("employees");
        assert_eq!(
            resolver.resolve_column("location", &table),
            ColumnMatch::Alias("city".to_string())
        );
    }

    #[test]
    fn test_closest_column_hint() {
        let resolver = sqlite_resolver();
        let table = resolver.table_info("employees");

        assert_eq!(closest_column("salry", &table), Some("salary"));
        assert_eq!(resolver.resolve_column("salry", &table), ColumnMatch::Unresolved);

        let empty = TableDescriptor {
            name: "empty".to_string(),
            columns: Vec::new(),
        };
        assert_eq!(closest_column("salry", &empty), None);
    }

    #[test]
    fn test_metadata_failure_uses_default_schema_uncached() {
        let resolver = resolver_with(Arc::new(BrokenStore::default()));

        let table = resolver.table_info("staff");
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "email", "city", "department", "salary", "age"]);
        assert!(table.column("department").unwrap().aliases.contains("dept"));
        assert!(resolver.cache().is_empty());
    }

    #[test]
    fn test_failed_bootstrap_is_absorbed_and_retried() {
        let store = Arc::new(BrokenStore::default());
        let resolver = resolver_with(store.clone());

        assert_eq!(resolver.resolve_table("anything").table(), "employees");
        assert_eq!(resolver.resolve_table("anything").table(), "employees");
        assert_eq!(store.bootstrap_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_successful_bootstrap_runs_once() {
        let resolver = sqlite_resolver();
        resolver.resolve_table("ghosts");
        assert!(resolver.bootstrapped.load(Ordering::Acquire));
        resolver.resolve_table("phantoms");

        let rows = resolver.store.query("SELECT COUNT(*) as count FROM employees").unwrap();
        assert_eq!(rows[0]["count"], serde_json::json!(5));
    }

    #[test]
    fn test_descriptor_is_cached() {
        let resolver = sqlite_resolver();
        resolver.resolve_table("employees");

        let first = resolver.table_info("employees");
        let second = resolver.table_info("employees");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.cache().len(), 1);
    }

    #[test]
    fn test_resolve_drops_unknown_tokens() {
        let resolver = sqlite_resolver();

        let mut query = IntermediateQuery::new(QueryType::Select, "staff");
        query.columns = Some(vec!["bonus".to_string()]);
        query.predicates = vec![Predicate::eq("location", "pune"), Predicate::eq("badge", "x")];
        query.group_by = Some(vec!["team".to_string()]);
        query.order_by = Some("rank".to_string());
        query.limit = Some(3);

        let resolved = resolver.resolve(query);
        let resolved = resolved.query();

        assert_eq!(resolved.table, "employees");
        assert_eq!(resolved.columns, None);
        assert_eq!(resolved.predicates, vec![Predicate::eq("city", "pune")]);
        assert_eq!(resolved.group_by, Some(vec!["department".to_string()]));
        assert_eq!(resolved.order_by, None);
        assert_eq!(resolved.limit, Some(3));
    }

    #[test]
    fn test_resolved_columns_exist_in_descriptor() {
        let resolver = sqlite_resolver();

        let mut query = IntermediateQuery::new(QueryType::Select, "EMPLOYEES");
        query.columns = Some(vec!["Name".to_string(), "wage".to_string(), "identifier".to_string()]);
        query.predicates = vec![Predicate::gt("years", 30)];

        let resolved = resolver.resolve(query);
        let descriptor = resolver.table_info(&resolved.query().table);

        for column in resolved.query().columns.iter().flatten() {
            assert!(descriptor.column(column).is_some(), "{}", column);
        }
        assert_eq!(
            resolved.query().columns,
            Some(vec!["name".to_string(), "salary".to_string(), "id".to_string()])
        );
        assert_eq!(resolved.query().predicates, vec![Predicate::gt("age", 30)]);
    }
}
