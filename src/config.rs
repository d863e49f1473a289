//! Pipeline Configuration
//!
//! Every vocabulary, fallback schema and safety list the pipeline relies on
//! lives here as immutable data handed to the components. `Default` yields the
//! builtin values; a JSON file and a handful of environment variables can
//! override them.

use crate::error::{NlSqlError, Result};
use crate::model::ColumnMetadata;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub const ENV_DATABASE: &str = "NLSQL_DATABASE";
pub const ENV_MAX_RESULTS: &str = "NLSQL_MAX_RESULTS";
pub const ENV_PREDICATE_RENDERING: &str = "NLSQL_PREDICATE_RENDERING";

/// A user term and the canonical identifier it stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermMapping {
    pub term: String,
    pub target: String,
}

impl TermMapping {
    pub fn new(term: &str, target: &str) -> Self {
        Self {
            term: term.to_string(),
            target: target.to_string(),
        }
    }
}

/// Literal phrases that request grouping by one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseMapping {
    pub phrases: Vec<String>,
    pub column: String,
}

/// Lexical vocabulary used by the extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub count_triggers: Vec<String>,
    /// Scanned in order; the first term found in the text wins
    pub table_aliases: Vec<TermMapping>,
    pub default_table: String,
    pub column_synonyms: Vec<TermMapping>,
    pub stop_words: Vec<String>,
    /// Location phrases naming one of these are department filters
    pub department_values: Vec<String>,
    pub group_by_phrases: Vec<PhraseMapping>,
    pub order_by_columns: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let table = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(term, target)| TermMapping::new(term, target))
                .collect::<Vec<_>>()
        };

        Self {
            count_triggers: strings(&["count", "how many", "number of"]),
            table_aliases: table(&[
                ("employees", "employees"),
                ("staff", "employees"),
                ("workers", "employees"),
                ("people", "employees"),
                ("users", "users"),
                ("customers", "customers"),
                ("clients", "customers"),
                ("orders", "orders"),
                ("purchases", "orders"),
                ("products", "products"),
                ("items", "products"),
            ]),
            default_table: "employees".to_string(),
            column_synonyms: table(&[
                ("name", "name"),
                ("names", "name"),
                ("full name", "name"),
                ("email", "email"),
                ("emails", "email"),
                ("city", "city"),
                ("location", "city"),
                ("department", "department"),
                ("dept", "department"),
                ("salary", "salary"),
                ("wage", "salary"),
                ("age", "age"),
                ("id", "id"),
                ("identifier", "id"),
            ]),
            stop_words: strings(&[
                "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with",
                "by", "all",
            ]),
            department_values: strings(&["engineering", "marketing", "hr", "sales"]),
            group_by_phrases: vec![
                PhraseMapping {
                    phrases: strings(&["by department", "by dept"]),
                    column: "department".to_string(),
                },
                PhraseMapping {
                    phrases: strings(&["by city", "by location"]),
                    column: "city".to_string(),
                },
            ],
            order_by_columns: strings(&["name", "salary", "age"]),
        }
    }
}

impl Vocabulary {
    pub fn is_stop_word(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.stop_words.iter().any(|s| *s == word)
    }

    pub fn is_department_value(&self, value: &str) -> bool {
        let value = value.to_lowercase();
        self.department_values.iter().any(|d| *d == value)
    }
}

/// Builtin alias set for a column, keyed by lowercase column name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAliases {
    pub column: String,
    pub aliases: Vec<String>,
}

/// Schema knowledge used when the store cannot describe a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaDefaults {
    pub default_columns: Vec<ColumnMetadata>,
    pub column_aliases: Vec<ColumnAliases>,
}

impl Default for SchemaDefaults {
    fn default() -> Self {
        let aliases = |column: &str, aliases: &[&str]| ColumnAliases {
            column: column.to_string(),
            aliases: strings(aliases),
        };

        Self {
            default_columns: vec![
                ColumnMetadata::new("id", "integer", false),
                ColumnMetadata::new("name", "varchar", false),
                ColumnMetadata::new("email", "varchar", true),
                ColumnMetadata::new("city", "varchar", true),
                ColumnMetadata::new("department", "varchar", true),
                ColumnMetadata::new("salary", "numeric", true),
                ColumnMetadata::new("age", "integer", true),
            ],
            column_aliases: vec![
                aliases("id", &["identifier", "emp_id", "employee_id"]),
                aliases("name", &["full_name", "employee_name", "first_name"]),
                aliases("email", &["email_address", "mail"]),
                aliases("city", &["location", "address", "place"]),
                aliases("department", &["dept", "division", "team"]),
                aliases("salary", &["wage", "pay", "compensation"]),
                aliases("age", &["years", "old"]),
            ],
        }
    }
}

impl SchemaDefaults {
    pub fn aliases_for(&self, column: &str) -> BTreeSet<String> {
        let column = column.to_lowercase();
        self.column_aliases
            .iter()
            .find(|a| a.column == column)
            .map(|a| a.aliases.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedColumn {
    pub name: String,
    /// Type and constraints, e.g. `TEXT NOT NULL`
    pub definition: String,
}

/// Demonstration table created when no requested table can be resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapSeed {
    pub table: String,
    pub columns: Vec<SeedColumn>,
    pub insert_columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Default for BootstrapSeed {
    fn default() -> Self {
        let column = |name: &str, definition: &str| SeedColumn {
            name: name.to_string(),
            definition: definition.to_string(),
        };

        Self {
            table: "employees".to_string(),
            columns: vec![
                column("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
                column("name", "TEXT NOT NULL COLLATE NOCASE"),
                column("email", "TEXT COLLATE NOCASE"),
                column("city", "TEXT COLLATE NOCASE"),
                column("department", "TEXT COLLATE NOCASE"),
                column("salary", "NUMERIC"),
                column("age", "INTEGER"),
            ],
            insert_columns: strings(&["name", "email", "city", "department", "salary", "age"]),
            rows: vec![
                vec![json!("John Doe"), json!("john.doe@company.com"), json!("Mumbai"), json!("Engineering"), json!(75000), json!(30)],
                vec![json!("Jane Smith"), json!("jane.smith@company.com"), json!("Delhi"), json!("Marketing"), json!(65000), json!(28)],
                vec![json!("Bob Johnson"), json!("bob.johnson@company.com"), json!("Mumbai"), json!("Engineering"), json!(80000), json!(35)],
                vec![json!("Alice Brown"), json!("alice.brown@company.com"), json!("Bangalore"), json!("HR"), json!(60000), json!(32)],
                vec![json!("Charlie Wilson"), json!("charlie.wilson@company.com"), json!("Pune"), json!("Sales"), json!(70000), json!(29)],
            ],
        }
    }
}

/// Allow-list policy enforced before any statement reaches the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardPolicy {
    pub read_verb: String,
    pub denied_keywords: Vec<String>,
    pub max_rows: u64,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            read_verb: "select".to_string(),
            denied_keywords: strings(&[
                "drop",
                "delete",
                "update",
                "insert",
                "alter",
                "create",
                "truncate",
                "exec",
                "execute",
                "sp_",
                "xp_",
                "union",
                "information_schema",
                "pg_",
                "mysql",
                "sys",
                "master",
                "sqlite_",
                "pragma",
                "attach",
            ]),
            max_rows: 1000,
        }
    }
}

/// How predicates with a non-equality operator are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateRendering {
    /// `age > 30`
    #[default]
    Canonical,
    /// `age > = '30'`, the operator folded into the key
    Legacy,
}

impl FromStr for PredicateRendering {
    type Err = NlSqlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "canonical" => Ok(PredicateRendering::Canonical),
            "legacy" => Ok(PredicateRendering::Legacy),
            other => Err(NlSqlError::Config(format!(
                "unknown predicate rendering '{}' (expected canonical or legacy)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub vocabulary: Vocabulary,
    pub schema: SchemaDefaults,
    pub bootstrap: BootstrapSeed,
    pub guard: GuardPolicy,
    pub rendering: PredicateRendering,
}

impl PipelineConfig {
    /// Load a JSON configuration file; missing sections keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Loaded pipeline configuration from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_RESULTS) {
            self.guard.max_rows = raw.trim().parse().map_err(|_| {
                NlSqlError::Config(format!("{} must be a positive integer, got '{}'", ENV_MAX_RESULTS, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_PREDICATE_RENDERING) {
            self.rendering = raw.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.vocabulary.default_table.trim().is_empty() {
            return Err(NlSqlError::Config("default table must not be empty".to_string()));
        }
        if self.bootstrap.table.trim().is_empty() {
            return Err(NlSqlError::Config("bootstrap table must not be empty".to_string()));
        }
        if self.vocabulary.count_triggers.is_empty() {
            return Err(NlSqlError::Config("at least one count trigger is required".to_string()));
        }
        if self.guard.max_rows == 0 {
            return Err(NlSqlError::Config("max rows must be greater than zero".to_string()));
        }
        if self
            .bootstrap
            .rows
            .iter()
            .any(|row| row.len() != self.bootstrap.insert_columns.len())
        {
            return Err(NlSqlError::Config(
                "every bootstrap row must supply a value per insert column".to_string(),
            ));
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_aliases_lookup_is_case_insensitive() {
        let schema = SchemaDefaults::default();
        assert!(schema.aliases_for("Department").contains("dept"));
        assert!(schema.aliases_for("unknown").is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_MAX_RESULTS, "250"),
            (ENV_PREDICATE_RENDERING, "Legacy"),
        ]
        .into_iter()
        .collect();

        let config = PipelineConfig::default()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.guard.max_rows, 250);
        assert_eq!(config.rendering, PredicateRendering::Legacy);
    }

    #[test]
    fn test_zero_max_rows_is_rejected() {
        let result = PipelineConfig::default().apply_overrides(|key| {
            (key == ENV_MAX_RESULTS).then(|| "0".to_string())
        });
        assert!(matches!(result, Err(NlSqlError::Config(_))));
    }

    #[test]
    fn test_load_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"guard": {{"max_rows": 10}}, "rendering": "legacy"}}"#).unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();

        assert_eq!(config.guard.max_rows, 10);
        assert_eq!(config.guard.read_verb, "select");
        assert_eq!(config.rendering, PredicateRendering::Legacy);
        assert_eq!(config.vocabulary.default_table, "employees");
    }

    #[test]
    fn test_mismatched_seed_row_is_rejected() {
        let mut config = PipelineConfig::default();
        config.bootstrap.rows.push(vec![json!("Only Name")]);
        assert!(config.validate().is_err());
    }
}
