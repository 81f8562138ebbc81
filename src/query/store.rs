//! Persistence boundary
//!
//! The controller never talks to a database directly; it hands composed
//! [`Query`] values to a [`Store`]. [`MemoryStore`] backs tests, the CLI demo
//! and in-process clients.

use super::{loose_eq, key_to_string, Query, Record};
use crate::error::StoreError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Persistence collaborator consumed by the controller
pub trait Store: Send + Sync {
    /// Whether a model is bound under this name
    fn has_model(&self, model: &str) -> bool;

    /// Run a query, returning matching records in query order
    fn execute(&self, query: &Query) -> Result<Vec<Record>, StoreError>;

    /// Count matches, ignoring paging
    fn count(&self, query: &Query) -> Result<usize, StoreError> {
        Ok(self.execute(&query.unpaged())?.len())
    }

    /// Persist a new record, assigning the primary key when absent
    fn insert(&self, model: &str, primary_key: &str, attrs: Record) -> Result<Record, StoreError>;

    /// Merge `attrs` into the record whose primary key equals `id`
    fn update(
        &self,
        model: &str,
        primary_key: &str,
        id: &Value,
        attrs: Record,
    ) -> Result<Record, StoreError>;

    /// Remove and return the record whose primary key equals `id`
    fn delete(&self, model: &str, primary_key: &str, id: &Value) -> Result<Record, StoreError>;
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Record>,
    next_id: u64,
}

/// In-memory [`Store`] keyed by model name
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an empty model
    pub fn with_model(self, model: &str) -> Self {
        if let Ok(mut tables) = self.tables.write() {
            tables.entry(model.to_string()).or_insert_with(|| Table {
                rows: Vec::new(),
                next_id: 1,
            });
        }
        self
    }

    /// Bind every model named by `models`
    pub fn with_models<'a>(self, models: impl IntoIterator<Item = &'a str>) -> Self {
        models.into_iter().fold(self, |store, model| store.with_model(model))
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("memory store lock poisoned".to_string())
    }
}

impl Store for MemoryStore {
    fn has_model(&self, model: &str) -> bool {
        self.tables
            .read()
            .map(|tables| tables.contains_key(model))
            .unwrap_or(false)
    }

    fn execute(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        let table = tables
            .get(&query.model)
            .ok_or_else(|| StoreError::UnknownModel(query.model.clone()))?;

        let mut rows: Vec<Record> = table
            .rows
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();

        // Stable sort keeps insertion order among equal keys
        rows.sort_by(|a, b| query.compare_records(a, b));

        let rows = rows.into_iter().skip(query.offset);
        Ok(match query.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        })
    }

    fn insert(&self, model: &str, primary_key: &str, mut attrs: Record) -> Result<Record, StoreError> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;
        let table = tables
            .get_mut(model)
            .ok_or_else(|| StoreError::UnknownModel(model.to_string()))?;

        match attrs.get(primary_key).filter(|v| !v.is_null()) {
            Some(given) => {
                ensure_free(&table.rows, primary_key, given)?;
                if let Some(n) = given.as_u64() {
                    table.next_id = table.next_id.max(n.saturating_add(1));
                }
            },
            None => {
                // Saturated at u64::MAX; the collision check stops reuse
                let key = Value::from(table.next_id);
                ensure_free(&table.rows, primary_key, &key)?;
                attrs.insert(primary_key.to_string(), key);
                table.next_id = table.next_id.saturating_add(1);
            },
        }

        table.rows.push(attrs.clone());
        Ok(attrs)
    }

    fn update(
        &self,
        model: &str,
        primary_key: &str,
        id: &Value,
        attrs: Record,
    ) -> Result<Record, StoreError> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;
        let table = tables
            .get_mut(model)
            .ok_or_else(|| StoreError::UnknownModel(model.to_string()))?;

        let row = table
            .rows
            .iter_mut()
            .find(|row| row.get(primary_key).is_some_and(|k| loose_eq(k, id)))
            .ok_or_else(|| StoreError::NotFound {
                model: model.to_string(),
                id: key_to_string(id),
            })?;

        for (field, value) in attrs {
            if field != primary_key {
                row.insert(field, value);
            }
        }
        Ok(row.clone())
    }

    fn delete(&self, model: &str, primary_key: &str, id: &Value) -> Result<Record, StoreError> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;
        let table = tables
            .get_mut(model)
            .ok_or_else(|| StoreError::UnknownModel(model.to_string()))?;

        let position = table
            .rows
            .iter()
            .position(|row| row.get(primary_key).is_some_and(|k| loose_eq(k, id)))
            .ok_or_else(|| StoreError::NotFound {
                model: model.to_string(),
                id: key_to_string(id),
            })?;

        Ok(table.rows.remove(position))
    }
}

fn ensure_free(rows: &[Record], primary_key: &str, key: &Value) -> Result<(), StoreError> {
    if rows.iter().any(|row| row.get(primary_key).is_some_and(|k| loose_eq(k, key))) {
        let mut fields = crate::error::FieldErrors::new();
        fields.insert(primary_key.to_string(), vec!["has already been taken".to_string()]);
        return Err(StoreError::Invalid(fields));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Order, Predicate};
    use serde_json::json;

    fn attrs(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_insert_assigns_sequential_keys() {
        let store = MemoryStore::new().with_model("suite");
        let first = store.insert("suite", "id", attrs(json!({"name": "a"}))).unwrap();
        let second = store.insert("suite", "id", attrs(json!({"name": "b"}))).unwrap();
        assert_eq!(first["id"], json!(1));
        assert_eq!(second["id"], json!(2));
    }

    #[test]
    fn test_custom_primary_key() {
        let store = MemoryStore::new().with_model("case");
        let row = store.insert("case", "test_id", attrs(json!({"suite_id": 1}))).unwrap();
        assert_eq!(row["test_id"], json!(1));
        assert!(row.get("id").is_none());
    }

    #[test]
    fn test_largest_explicit_key_does_not_overflow() {
        let store = MemoryStore::new().with_model("suite");
        let row = store.insert("suite", "id", attrs(json!({"id": u64::MAX}))).unwrap();
        assert_eq!(row["id"], json!(u64::MAX));

        let next = store.insert("suite", "id", attrs(json!({"name": "b"})));
        assert!(matches!(next, Err(StoreError::Invalid(_))));
    }

    #[test]
    fn test_duplicate_key_is_invalid() {
        let store = MemoryStore::new().with_model("suite");
        store.insert("suite", "id", attrs(json!({"id": 7}))).unwrap();
        let err = store.insert("suite", "id", attrs(json!({"id": 7}))).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        let next = store.insert("suite", "id", attrs(json!({}))).unwrap();
        assert_eq!(next["id"], json!(8));
    }

    #[test]
    fn test_execute_filters_orders_and_pages() {
        let store = MemoryStore::new().with_model("post");
        for (title, likes) in [("a", 3), ("b", 9), ("c", 1), ("d", 9)] {
            store
                .insert("post", "id", attrs(json!({"title": title, "likes": likes})))
                .unwrap();
        }

        let query = Query::new("post")
            .apply(Predicate::new("likes", crate::query::Op::Gte, 3))
            .order_by(Order::desc("likes"))
            .limit(2);
        let rows = store.execute(&query).unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r["title"].clone()).collect();
        assert_eq!(titles, vec![json!("b"), json!("d")]);
        assert_eq!(store.count(&query).unwrap(), 3);
    }

    #[test]
    fn test_update_and_delete_missing_record() {
        let store = MemoryStore::new().with_model("post");
        let err = store
            .update("post", "id", &json!(42), Record::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(store.delete("post", "id", &json!(42)).is_err());
    }

    #[test]
    fn test_unknown_model() {
        let store = MemoryStore::new();
        assert!(!store.has_model("ghost"));
        assert_eq!(
            store.execute(&Query::new("ghost")).unwrap_err(),
            StoreError::UnknownModel("ghost".into())
        );
    }
}
