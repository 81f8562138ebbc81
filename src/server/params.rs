//! Request parameters
//!
//! The conventional parameter bag shared by server and client:
//! `filters[name]=value`, `filters[name][]=a`, `scopes[]=name`,
//! `order=field desc`, `limit`, `offset`, `include[]=association`.

use crate::error::ApiError;
use crate::query::RefinementRequest;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    /// Scope name -> argument, in caller order
    pub filters: Vec<(String, Value)>,
    pub scopes: Vec<String>,
    pub order: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Associations to nest in the response
    pub include: Vec<String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.filters.push((name.to_string(), value.into()));
        self
    }

    pub fn scope(mut self, name: &str) -> Self {
        self.scopes.push(name.to_string());
        self
    }

    pub fn order(mut self, clause: &str) -> Self {
        self.order = Some(clause.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn include(mut self, association: &str) -> Self {
        self.include.push(association.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn refinement(&self) -> RefinementRequest {
        RefinementRequest {
            filters: self.filters.clone(),
            scopes: self.scopes.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
        }
    }

    /// Encode as query-string pairs
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        for (name, value) in &self.filters {
            match value {
                Value::Array(items) => {
                    for item in items {
                        pairs.push((format!("filters[{name}][]"), scalar_to_string(item)));
                    }
                },
                other => pairs.push((format!("filters[{name}]"), scalar_to_string(other))),
            }
        }
        for scope in &self.scopes {
            pairs.push(("scopes[]".to_string(), scope.clone()));
        }
        if let Some(order) = &self.order {
            pairs.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        for include in &self.include {
            pairs.push(("include[]".to_string(), include.clone()));
        }

        pairs
    }

    /// Decode query-string pairs. Unrecognized top-level keys are ignored;
    /// malformed paging values are a bad request.
    pub fn from_query_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self, ApiError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();

        for (key, raw) in pairs {
            let (key, raw) = (key.as_ref(), raw.as_ref());

            if let Some(rest) = key.strip_prefix("filters[") {
                let (name, is_list) = match rest.strip_suffix("][]") {
                    Some(name) => (name, true),
                    None => (
                        rest.strip_suffix(']')
                            .ok_or_else(|| ApiError::BadRequest(format!("malformed parameter `{key}`")))?,
                        false,
                    ),
                };
                if name.is_empty() {
                    return Err(ApiError::BadRequest(format!("malformed parameter `{key}`")));
                }
                params.push_filter(name, parse_scalar(raw), is_list);
                continue;
            }

            match key {
                "scopes[]" | "scopes" => params.scopes.push(raw.to_string()),
                "include[]" | "include" => params.include.push(raw.to_string()),
                "order" => params.order = Some(raw.to_string()),
                "limit" => params.limit = Some(parse_count(key, raw)?),
                "offset" => params.offset = Some(parse_count(key, raw)?),
                other => tracing::debug!("ignoring parameter `{}`", other),
            }
        }

        Ok(params)
    }

    fn push_filter(&mut self, name: &str, value: Value, is_list: bool) {
        let existing = self.filters.iter_mut().find(|(n, _)| n == name);
        match (existing, is_list) {
            (Some((_, Value::Array(items))), true) => items.push(value),
            (None, true) => self.filters.push((name.to_string(), Value::Array(vec![value]))),
            (Some((_, slot)), _) => *slot = value,
            (None, false) => self.filters.push((name.to_string(), value)),
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("`{key}` must be a non-negative integer")))
}

/// Decode a query-string value into the closest JSON scalar
fn parse_scalar(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {},
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if raw.starts_with('{') || raw.starts_with('[') {
        if let Ok(structured) = serde_json::from_str(raw) {
            return structured;
        }
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_filters_and_lists() {
        let params = Params::new()
            .filter("switch", true)
            .filter("ids", json!([1, 2]))
            .scope("recent")
            .order("name desc")
            .limit(10)
            .include("author");

        assert_eq!(
            params.to_query_pairs(),
            vec![
                ("filters[switch]".to_string(), "true".to_string()),
                ("filters[ids][]".to_string(), "1".to_string()),
                ("filters[ids][]".to_string(), "2".to_string()),
                ("scopes[]".to_string(), "recent".to_string()),
                ("order".to_string(), "name desc".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("include[]".to_string(), "author".to_string()),
            ]
        );
    }

    #[test]
    fn test_decode_restores_params() {
        let params = Params::new()
            .filter("switch", true)
            .filter("blog_id", 3)
            .filter("ids", json!([1, 2]))
            .scope("recent")
            .offset(20);
        let decoded = Params::from_query_pairs(params.to_query_pairs()).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_decode_keeps_caller_order() {
        let decoded = Params::from_query_pairs([
            ("filters[recent]", "true"),
            ("filters[published]", "true"),
        ])
        .unwrap();
        let names: Vec<_> = decoded.filters.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["recent", "published"]);
    }

    #[test]
    fn test_strings_stay_strings() {
        let decoded = Params::from_query_pairs([("filters[name]", "Ada Lovelace")]).unwrap();
        assert_eq!(decoded.filters[0].1, json!("Ada Lovelace"));
    }

    #[test]
    fn test_bad_paging_is_bad_request() {
        let err = Params::from_query_pairs([("limit", "-1")]).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        let err = Params::from_query_pairs([("filters[]", "1")]).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
