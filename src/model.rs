//! Query Model
//!
//! The intermediate representation shared by every pipeline stage, plus the
//! schema descriptors the resolver caches.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of statement a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    Select,
    Count,
    Insert,
    Update,
    Delete,
}

impl QueryType {
    /// Only reads can be turned into a statement.
    pub fn is_synthesizable(&self) -> bool {
        matches!(self, QueryType::Select | QueryType::Count)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::Select => write!(f, "SELECT"),
            QueryType::Count => write!(f, "COUNT"),
            QueryType::Insert => write!(f, "INSERT"),
            QueryType::Update => write!(f, "UPDATE"),
            QueryType::Delete => write!(f, "DELETE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Comparison operator of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredicateOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">")]
    Gt,
}

impl PredicateOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            PredicateOperator::Eq => "=",
            PredicateOperator::Gt => ">",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateValue {
    Integer(i64),
    Text(String),
}

impl fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateValue::Integer(n) => write!(f, "{}", n),
            PredicateValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A single filter condition: `column operator value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: String,
    pub operator: PredicateOperator,
    pub value: PredicateValue,
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator: PredicateOperator::Eq,
            value: PredicateValue::Text(value.into()),
        }
    }

    pub fn gt(column: impl Into<String>, value: i64) -> Self {
        Self {
            column: column.into(),
            operator: PredicateOperator::Gt,
            value: PredicateValue::Integer(value),
        }
    }

    /// Key under which older consumers stored this condition, with any
    /// non-equality operator folded into it (e.g. `"age >"`).
    pub fn legacy_key(&self) -> String {
        match self.operator {
            PredicateOperator::Eq => self.column.clone(),
            op => format!("{} {}", self.column, op.as_sql()),
        }
    }
}

/// Structured form of a natural-language request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateQuery {
    pub query_type: QueryType,
    pub table: String,
    /// `None` selects every column
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub predicates: Vec<Predicate>,
    pub group_by: Option<Vec<String>>,
    pub order_by: Option<String>,
    pub order_direction: Option<OrderDirection>,
    pub limit: Option<u64>,
}

impl IntermediateQuery {
    pub fn new(query_type: QueryType, table: impl Into<String>) -> Self {
        Self {
            query_type,
            table: table.into(),
            columns: None,
            predicates: Vec::new(),
            group_by: None,
            order_by: None,
            order_direction: None,
            limit: None,
        }
    }

    pub fn predicate(&self, column: &str) -> Option<&Predicate> {
        self.predicates.iter().find(|p| p.column == column)
    }
}

/// An [`IntermediateQuery`] whose identifiers were verified against a catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedQuery(IntermediateQuery);

impl ResolvedQuery {
    pub(crate) fn new(query: IntermediateQuery) -> Self {
        Self(query)
    }

    /// Wrap a query without consulting a catalog. The caller vouches for
    /// every identifier in it.
    pub fn from_trusted(query: IntermediateQuery) -> Self {
        Self(query)
    }

    pub fn query(&self) -> &IntermediateQuery {
        &self.0
    }
}

/// Column metadata as reported by the data store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
}

impl ColumnDescriptor {
    pub fn from_metadata(meta: ColumnMetadata, aliases: BTreeSet<String>) -> Self {
        Self {
            name: meta.name,
            data_type: meta.data_type,
            nullable: meta.nullable,
            aliases,
        }
    }
}

/// Cached description of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}
