//! Query model shared by the refinement engine and the persistence boundary
//!
//! A [`Query`] is a conjunction of [`Predicate`]s against one model plus
//! ordering and paging. Stores execute it; the refinement engine only ever
//! narrows it.
//!
//! - [`refine`] - Validates caller filters against declared scopes
//! - [`store`] - The [`Store`] collaborator trait and an in-memory store

mod refine;
mod store;

pub use refine::{bind_scope, parse_order, refine, refine_request, PageLimits, RefinementRequest};
pub use store::{MemoryStore, Store};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A persisted record: field name -> JSON value
pub type Record = Map<String, Value>;

/// Comparison operator of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    #[default]
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Field equals any element of an array value
    In,
    /// Field is present and not null
    Present,
}

/// One `field op value` condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    #[serde(default)]
    pub op: Op,
    #[serde(default)]
    pub value: Value,
}

impl Predicate {
    pub fn new(field: &str, op: Op, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, Op::Eq, value)
    }

    pub fn one_of(field: &str, values: Vec<Value>) -> Self {
        Self::new(field, Op::In, Value::Array(values))
    }

    pub fn present(field: &str) -> Self {
        Self::new(field, Op::Present, Value::Null)
    }

    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            Op::Eq => loose_eq(actual, &self.value),
            Op::NotEq => !loose_eq(actual, &self.value),
            Op::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            Op::Gte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Op::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            Op::Lte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Op::In => match &self.value {
                Value::Array(candidates) => candidates.iter().any(|c| loose_eq(actual, c)),
                single => loose_eq(actual, single),
            },
            Op::Present => !actual.is_null(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl Order {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Desc,
        }
    }
}

/// A composed query against one model
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub model: String,
    pub predicates: Vec<Predicate>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// Narrow the query by one more predicate
    pub fn apply(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Same filter, no paging. Used for total counts.
    pub fn unpaged(&self) -> Self {
        Self {
            limit: None,
            offset: 0,
            ..self.clone()
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }

    /// Order according to the query's order clauses
    pub fn compare_records(&self, a: &Record, b: &Record) -> Ordering {
        for clause in &self.order {
            let left = a.get(&clause.field).unwrap_or(&Value::Null);
            let right = b.get(&clause.field).unwrap_or(&Value::Null);
            let ord = compare(left, right).unwrap_or(Ordering::Equal);
            let ord = match clause.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Equality that tolerates values decoded from query strings
/// (`"true"` vs `true`, `"3"` vs `3`)
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(s), other) | (other, Value::String(s)) => match other {
            Value::Bool(flag) => s.parse::<bool>().ok() == Some(*flag),
            Value::Number(n) => s.parse::<f64>().ok() == n.as_f64(),
            _ => false,
        },
        _ => false,
    }
}

/// Total-ish ordering over JSON scalars. Null sorts first; mismatched types
/// are incomparable unless one side parses as the other.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(s), Value::Number(n)) => s.parse::<f64>().ok()?.partial_cmp(&n.as_f64()?),
        (Value::Number(n), Value::String(s)) => n.as_f64()?.partial_cmp(&s.parse::<f64>().ok()?),
        _ => None,
    }
}

/// Render a key value the way it appears in a path segment
pub fn key_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
