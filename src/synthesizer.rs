//! Statement Synthesizer
//!
//! Compiles a [`ResolvedQuery`] into SQL text. Pure and deterministic; the
//! clause order is always verb, WHERE, GROUP BY, ORDER BY, LIMIT.

use crate::config::PredicateRendering;
use crate::error::{NlSqlError, Result};
use crate::model::{Predicate, PredicateValue, QueryType, ResolvedQuery};
use itertools::Itertools;

#[derive(Debug, Clone, Copy, Default)]
pub struct StatementSynthesizer {
    rendering: PredicateRendering,
}

impl StatementSynthesizer {
    pub fn new(rendering: PredicateRendering) -> Self {
        Self { rendering }
    }

    pub fn synthesize(&self, resolved: &ResolvedQuery) -> Result<String> {
        let query = resolved.query();
        if !query.query_type.is_synthesizable() {
            return Err(NlSqlError::UnsupportedQueryType(query.query_type));
        }

        let mut sql = if query.query_type == QueryType::Count {
            format!("SELECT COUNT(*) as count FROM {}", query.table)
        } else {
            let columns = match &query.columns {
                Some(columns) if !columns.is_empty() => columns.iter().join(", "),
                _ => "*".to_string(),
            };
            format!("SELECT {} FROM {}", columns, query.table)
        };

        if !query.predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(
                &query
                    .predicates
                    .iter()
                    .map(|p| self.render_predicate(p))
                    .join(" AND "),
            );
        }

        if let Some(group_by) = query.group_by.as_ref().filter(|g| !g.is_empty()) {
            sql.push_str(&format!(" GROUP BY {}", group_by.iter().join(", ")));
        }

        if let Some(order_by) = &query.order_by {
            sql.push_str(&format!(" ORDER BY {}", order_by));
            if let Some(direction) = query.order_direction {
                sql.push_str(&format!(" {}", direction));
            }
        }

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        Ok(sql)
    }

    fn render_predicate(&self, predicate: &Predicate) -> String {
        match self.rendering {
            PredicateRendering::Legacy => {
                format!("{} = {}", predicate.legacy_key(), quoted(&predicate.value.to_string()))
            }
            PredicateRendering::Canonical => {
                let value = match &predicate.value {
                    PredicateValue::Integer(n) => n.to_string(),
                    PredicateValue::Text(s) => quoted(s),
                };
                format!("{} {} {}", predicate.column, predicate.operator.as_sql(), value)
            }
        }
    }
}

fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
