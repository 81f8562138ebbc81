//! Refinement engine
//!
//! Turns untrusted filter parameters into query predicates. Only scopes the
//! resource declared can narrow a query; anything else rejects the whole
//! request. Every filter is validated and bound before the first one is
//! applied, so a failure never yields a partially refined query.

use super::{Direction, Op, Order, Predicate, Query};
use crate::error::RefineError;
use crate::graph::{ResourceDescriptor, ScopeDescriptor, ScopeRule};
use serde_json::Value;

/// Paging defaults and ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default: usize,
    pub max: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default: 25,
            max: 100,
        }
    }
}

/// Refinement asked for by one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefinementRequest {
    /// Scope name -> argument, in caller order
    pub filters: Vec<(String, Value)>,
    /// Parameterless scopes by name
    pub scopes: Vec<String>,
    pub order: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Bind one scope to its argument.
///
/// Returns the predicates the scope contributes; an empty vector means the
/// caller explicitly switched a parameterless scope off (`false`).
pub fn bind_scope(scope: &ScopeDescriptor, value: &Value) -> Result<Vec<Predicate>, RefineError> {
    let invalid = |reason: &str| RefineError::InvalidFilterValue {
        name: scope.name.clone(),
        reason: reason.to_string(),
    };

    match &scope.rule {
        ScopeRule::Fixed { predicates } => match value {
            Value::Null | Value::Bool(true) => Ok(predicates.clone()),
            Value::Bool(false) => Ok(Vec::new()),
            Value::String(s) if s == "true" || s == "1" => Ok(predicates.clone()),
            Value::String(s) if s == "false" || s == "0" => Ok(Vec::new()),
            _ => Err(invalid("scope takes no argument")),
        },
        ScopeRule::Param { field, op } => {
            if value.is_null() {
                return Err(RefineError::MissingArgument(scope.name.clone()));
            }
            let predicate = match op {
                Op::In => Predicate::one_of(field, in_values(value).ok_or_else(|| invalid("expected a list"))?),
                Op::Present => match value {
                    Value::Bool(true) => Predicate::present(field),
                    Value::Bool(false) => Predicate::eq(field, Value::Null),
                    Value::String(s) if s == "true" => Predicate::present(field),
                    Value::String(s) if s == "false" => Predicate::eq(field, Value::Null),
                    _ => return Err(invalid("expected true or false")),
                },
                other => {
                    if !is_scalar(value) {
                        return Err(invalid("expected a scalar"));
                    }
                    Predicate::new(field, *other, value.clone())
                },
            };
            Ok(vec![predicate])
        },
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn in_values(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) if items.iter().all(is_scalar) => Some(items.clone()),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect(),
        ),
        Value::Number(_) | Value::Bool(_) => Some(vec![value.clone()]),
        _ => None,
    }
}

/// Apply caller filters to `base`.
///
/// Filters are looked up by name among the descriptor's scopes in caller
/// order. Unknown names fail with [`RefineError::UnknownFilter`].
pub fn refine(
    base: Query,
    descriptor: &ResourceDescriptor,
    filters: &[(String, Value)],
) -> Result<Query, RefineError> {
    let mut bound = Vec::new();
    for (name, value) in filters {
        let scope = descriptor
            .scope_named(name)
            .ok_or_else(|| RefineError::UnknownFilter(name.clone()))?;
        bound.extend(bind_scope(scope, value)?);
    }

    tracing::debug!(
        "refined {} with {} filters into {} predicates",
        descriptor.name,
        filters.len(),
        bound.len()
    );

    Ok(bound.into_iter().fold(base, Query::apply))
}

/// Parse `field`, `field desc`, or a comma-separated list of those
pub fn parse_order(descriptor: &ResourceDescriptor, clause: &str) -> Result<Vec<Order>, RefineError> {
    clause
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut words = part.split_whitespace();
            let field = words.next().ok_or_else(|| RefineError::InvalidOrder(part.to_string()))?;
            let direction = match words.next().map(|d| d.to_ascii_lowercase()) {
                None => Direction::Asc,
                Some(d) if d == "asc" => Direction::Asc,
                Some(d) if d == "desc" => Direction::Desc,
                Some(_) => return Err(RefineError::InvalidOrder(part.to_string())),
            };
            if words.next().is_some() {
                return Err(RefineError::InvalidOrder(part.to_string()));
            }
            if !descriptor.knows_field(field) {
                return Err(RefineError::UnknownOrderField(field.to_string()));
            }
            Ok(Order {
                field: field.to_string(),
                direction,
            })
        })
        .collect()
}

/// Full refinement of a collection request: filters, named scopes, order
/// and paging. Nothing is applied unless everything validates.
pub fn refine_request(
    base: Query,
    descriptor: &ResourceDescriptor,
    request: &RefinementRequest,
    limits: PageLimits,
) -> Result<Query, RefineError> {
    let scoped: Vec<(String, Value)> = request
        .scopes
        .iter()
        .map(|name| (name.clone(), Value::Null))
        .collect();

    let order = match &request.order {
        Some(clause) => parse_order(descriptor, clause)?,
        None => Vec::new(),
    };

    let filters: Vec<(String, Value)> = request.filters.iter().cloned().chain(scoped).collect();
    let query = refine(base, descriptor, &filters)?;

    let limit = request.limit.unwrap_or(limits.default).min(limits.max);
    let query = order
        .into_iter()
        .fold(query, Query::order_by)
        .limit(limit)
        .offset(request.offset.unwrap_or(0));
    Ok(query)
}
