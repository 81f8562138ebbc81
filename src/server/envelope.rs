//! Response envelopes
//!
//! Collections: `{"<plural>": [records], "meta": {"total", "limit", "offset"}}`.
//! Members: `{"<singular>": record}` (`null` for an empty singular
//! association).

use crate::graph::ResourceDescriptor;
use crate::query::Record;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Pagination block of a collection response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

pub fn collection(descriptor: &ResourceDescriptor, records: Vec<Record>, meta: Meta) -> Value {
    let mut body = Map::new();
    body.insert(
        descriptor.collection_key(),
        Value::Array(records.into_iter().map(Value::Object).collect()),
    );
    body.insert("meta".to_string(), json!(meta));
    Value::Object(body)
}

pub fn member(descriptor: &ResourceDescriptor, record: Option<Record>) -> Value {
    let mut body = Map::new();
    body.insert(
        descriptor.member_key().to_string(),
        record.map(Value::Object).unwrap_or(Value::Null),
    );
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_keyed_by_plural() {
        let suite = ResourceDescriptor::new("suite");
        let mut record = Record::new();
        record.insert("name".into(), json!("x"));

        let body = collection(
            &suite,
            vec![record],
            Meta {
                total: 1,
                limit: Some(25),
                offset: 0,
            },
        );
        assert_eq!(body["suites"][0]["name"], "x");
        assert_eq!(body["meta"]["total"], 1);
    }

    #[test]
    fn test_member_keyed_by_singular() {
        let case = ResourceDescriptor::new("case").record_name("results");
        assert_eq!(member(&case, None), json!({ "case": null }));
    }
}
