//! Execution Guard
//!
//! Last line of defense before the store. The guard does not trust its caller:
//! every statement is checked against the read-only policy, bounded, and only
//! then executed.

use crate::config::GuardPolicy;
use crate::db::{DataStore, Row};
use crate::error::{NlSqlError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, warn};

lazy_static! {
    static ref STRING_LITERAL: Regex = Regex::new(r"'[^']*'").unwrap();
    static ref LIMIT_CLAUSE: Regex = Regex::new(r"\blimit\b").unwrap();
    static ref INJECTION_PATTERNS: Vec<(&'static str, Regex)> = vec![
        ("quote", Regex::new(r"'").unwrap()),
        ("statement terminator", Regex::new(r";").unwrap()),
        ("line comment", Regex::new(r"--").unwrap()),
        ("block comment", Regex::new(r"(?s)/\*.*\*/").unwrap()),
    ];
}

/// Statement as executed, with its rows
#[derive(Debug, Clone, Serialize)]
pub struct GuardedResult {
    pub statement: String,
    pub rows: Vec<Row>,
}

pub struct ExecutionGuard {
    store: Arc<dyn DataStore>,
    policy: GuardPolicy,
}

impl ExecutionGuard {
    pub fn new(store: Arc<dyn DataStore>, policy: GuardPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    /// Validate, bound and run `sql`.
    pub fn execute(&self, sql: &str) -> Result<GuardedResult> {
        self.validate(sql)?;
        let statement = self.bound(sql);

        debug!("Executing SQL: {}", statement);
        let rows = self
            .store
            .query(&statement)
            .map_err(|e| NlSqlError::ExecutionFailure(store_message(e)))?;
        debug!("Query executed successfully, returned {} rows", rows.len());

        Ok(GuardedResult { statement, rows })
    }

    pub fn validate(&self, sql: &str) -> Result<()> {
        let normalized = sql.trim().to_lowercase();

        if !normalized.starts_with(&self.policy.read_verb) {
            let verb = normalized.split_whitespace().next().unwrap_or_default();
            warn!("Rejected non-read statement starting with '{}'", verb);
            return Err(NlSqlError::security(
                format!("only {} statements are allowed", self.policy.read_verb.to_uppercase()),
                verb,
            ));
        }

        if let Some(keyword) = self
            .policy
            .denied_keywords
            .iter()
            .find(|k| !k.is_empty() && normalized.contains(k.as_str()))
        {
            warn!("Rejected statement containing '{}'", keyword);
            return Err(NlSqlError::security(
                "statement contains potentially dangerous keyword",
                keyword.as_str(),
            ));
        }

        // literals produced by the synthesizer are masked so their quotes are
        // not mistaken for injected ones
        let masked = mask_literals(&normalized);
        if let Some((name, _)) = INJECTION_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(&masked))
        {
            warn!("Rejected statement matching {} pattern", name);
            return Err(NlSqlError::security(
                "statement contains potentially malicious pattern",
                *name,
            ));
        }

        Ok(())
    }

    /// Append the row cap unless the statement already limits itself. A
    /// `limit` inside a quoted value is not a clause.
    pub fn bound(&self, sql: &str) -> String {
        let sql = sql.trim();
        if LIMIT_CLAUSE.is_match(&mask_literals(&sql.to_lowercase())) {
            sql.to_string()
        } else {
            format!("{} LIMIT {}", sql, self.policy.max_rows)
        }
    }
}

fn mask_literals(sql: &str) -> Cow<'_, str> {
    STRING_LITERAL.replace_all(sql, "?")
}

fn store_message(err: NlSqlError) -> String {
    match err {
        NlSqlError::Database(message) | NlSqlError::ExecutionFailure(message) => message,
        other => other.to_string(),
    }
}
