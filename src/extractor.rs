//! Intent & Entity Extractor
//!
//! Turns raw request text into an [`IntermediateQuery`] using keyword, phrase
//! and regex heuristics. Nothing here knows the real schema: table and column
//! tokens come out raw and are verified later by the resolver.
//!
//! The text is lowercased with whitespace runs collapsed to one space, then
//! each heuristic runs independently on it:
//! 1. statement type (count triggers, otherwise select)
//! 2. table (first matching alias in declaration order, otherwise the default)
//! 3. columns (every matching synonym, in declaration order)
//! 4. predicates (location, department, age comparison)
//! 5. group by, order by, limit

use crate::config::Vocabulary;
use crate::model::{IntermediateQuery, Predicate, QueryType};
use crate::string_utils;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref LOCATION_PATTERN: Regex =
        Regex::new(r"(?i)(?:in|from|at)\s+([a-zA-Z\s]+?)(?:\s|$|,|\.)").unwrap();
    static ref DEPARTMENT_PATTERN: Regex =
        Regex::new(r"(?i)(?:department|dept)\s+([a-zA-Z\s]+?)(?:\s|$|,|\.)").unwrap();
    static ref AGE_PATTERN: Regex =
        Regex::new(r"(?i)(?:age|aged)\s+(?:over|above|greater than|>)\s+(\d+)").unwrap();
    static ref LIMIT_PATTERN: Regex = Regex::new(r"(?i)(?:limit|top|first)\s+(\d+)").unwrap();
}

const CITY_COLUMN: &str = "city";
const DEPARTMENT_COLUMN: &str = "department";
const AGE_COLUMN: &str = "age";

/// Outcome of statement-type classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A count trigger phrase was found
    Count { trigger: String },
    /// Nothing recognised; reads every row
    DefaultSelect,
}

impl Classification {
    pub fn query_type(&self) -> QueryType {
        match self {
            Classification::Count { .. } => QueryType::Count,
            Classification::DefaultSelect => QueryType::Select,
        }
    }
}

/// Outcome of table extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableChoice {
    Alias { term: String, table: String },
    Fallback(String),
}

impl TableChoice {
    pub fn table(&self) -> &str {
        match self {
            TableChoice::Alias { table, .. } => table,
            TableChoice::Fallback(table) => table,
        }
    }
}

pub struct IntentExtractor {
    vocabulary: Vocabulary,
}

impl IntentExtractor {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Parse raw text into an unresolved intermediate query.
    pub fn extract(&self, text: &str) -> IntermediateQuery {
        let normalized = string_utils::tokenize(text).join(" ");

        let classification = self.classify(&normalized);
        let table = self.extract_table(&normalized);

        let mut query = IntermediateQuery::new(classification.query_type(), table.table());
        query.columns = self.extract_columns(&normalized);
        query.predicates = self.extract_predicates(&normalized);
        query.group_by = self.extract_group_by(&normalized);
        query.order_by = self.extract_order_by(&normalized);
        query.limit = self.extract_limit(&normalized);

        debug!(
            "Extracted query: type={}, table={:?}, columns={:?}, predicates={}",
            query.query_type,
            table,
            query.columns,
            query.predicates.len()
        );

        query
    }

    pub fn classify(&self, normalized: &str) -> Classification {
        match string_utils::contains_any(normalized, &self.vocabulary.count_triggers) {
            Some(trigger) => Classification::Count {
                trigger: trigger.to_string(),
            },
            None => Classification::DefaultSelect,
        }
    }

    pub fn extract_table(&self, normalized: &str) -> TableChoice {
        self.vocabulary
            .table_aliases
            .iter()
            .find(|alias| !alias.term.is_empty() && normalized.contains(&alias.term))
            .map(|alias| TableChoice::Alias {
                term: alias.term.clone(),
                table: alias.target.clone(),
            })
            .unwrap_or_else(|| TableChoice::Fallback(self.vocabulary.default_table.clone()))
    }

    pub fn extract_columns(&self, normalized: &str) -> Option<Vec<String>> {
        let columns: Vec<String> = self
            .vocabulary
            .column_synonyms
            .iter()
            .filter(|synonym| !synonym.term.is_empty() && normalized.contains(&synonym.term))
            .map(|synonym| synonym.target.clone())
            .collect();

        if columns.is_empty() {
            None
        } else {
            Some(columns)
        }
    }

    pub fn extract_predicates(&self, normalized: &str) -> Vec<Predicate> {
        let location = self.capture_phrase(&LOCATION_PATTERN, normalized);
        let department = self.capture_phrase(&DEPARTMENT_PATTERN, normalized);

        let mut predicates = Vec::new();

        if let Some(place) = location {
            if !self.vocabulary.is_department_value(&place) {
                predicates.push(Predicate::eq(CITY_COLUMN, place));
            } else if department.is_none() {
                debug!("Location phrase '{}' names a department", place);
                predicates.push(Predicate::eq(DEPARTMENT_COLUMN, place));
            }
        }

        if let Some(dept) = department {
            predicates.push(Predicate::eq(DEPARTMENT_COLUMN, dept));
        }

        let age = AGE_PATTERN
            .captures(normalized)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok());
        if let Some(age) = age {
            predicates.push(Predicate::gt(AGE_COLUMN, age));
        }

        predicates
    }

    pub fn extract_group_by(&self, normalized: &str) -> Option<Vec<String>> {
        let group_by: Vec<String> = self
            .vocabulary
            .group_by_phrases
            .iter()
            .filter(|mapping| string_utils::contains_any(normalized, &mapping.phrases).is_some())
            .map(|mapping| mapping.column.clone())
            .collect();

        if group_by.is_empty() {
            None
        } else {
            Some(group_by)
        }
    }

    pub fn extract_order_by(&self, normalized: &str) -> Option<String> {
        self.vocabulary
            .order_by_columns
            .iter()
            .find(|column| {
                normalized.contains(&format!("order by {}", column))
                    || normalized.contains(&format!("sort by {}", column))
            })
            .cloned()
    }

    pub fn extract_limit(&self, normalized: &str) -> Option<u64> {
        LIMIT_PATTERN
            .captures(normalized)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// First captured phrase of `pattern`, unless it is blank or a stop-word.
    fn capture_phrase(&self, pattern: &Regex, normalized: &str) -> Option<String> {
        let phrase = pattern.captures(normalized)?.get(1)?.as_str().trim().to_string();
        if string_utils::is_blank(&phrase) || self.vocabulary.is_stop_word(&phrase) {
            return None;
        }
        Some(phrase)
    }
}

impl Default for IntentExtractor {
    fn default() -> Self {
        Self::new(Vocabulary::default())
    }
}
