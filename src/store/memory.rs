//! In-process document store.
//!
//! DashMap-backed implementation of the store contract for tests and
//! embedders that do not need durability. Per-document atomicity comes from
//! DashMap's exclusive entry references.

use async_trait::async_trait;
use bson::{Bson, Document};
use dashmap::DashMap;

use super::{DocumentStore, StoreError};

/// In-memory store with concurrent access.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, DashMap<String, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(doc: &Document, filter: &Document) -> bool {
        filter.iter().all(|(k, v)| doc.get(k) == Some(v))
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(*v as i64),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|coll| coll.get(id).map(|doc| doc.clone())))
    }

    async fn insert(
        &self,
        collection: &str,
        id: &str,
        record: Document,
    ) -> Result<(), StoreError> {
        let coll = self
            .collections
            .entry(collection.to_string())
            .or_default();
        let result = match coll.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        };
        result
    }

    async fn atomic_increment(
        &self,
        collection: &str,
        id: &str,
        deltas: Document,
    ) -> Result<(), StoreError> {
        let not_found = || StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        };
        let coll = self.collections.get(collection).ok_or_else(not_found)?;
        let mut doc = coll.get_mut(id).ok_or_else(not_found)?;
        for (field, delta) in deltas.iter() {
            let delta = as_i64(delta).ok_or_else(|| {
                StoreError::Backend(format!("non-integer increment for field '{}'", field))
            })?;
            let current = doc.get(field).and_then(as_i64).unwrap_or(0);
            doc.insert(field.clone(), Bson::Int64(current + delta));
        }
        Ok(())
    }

    async fn compare_and_set(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: Bson,
        new: Bson,
    ) -> Result<(), StoreError> {
        let conflict = || StoreError::Conflict {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
        };
        let coll = self.collections.get(collection).ok_or_else(conflict)?;
        let mut doc = coll.get_mut(id).ok_or_else(conflict)?;
        let current = doc.get(field).cloned().unwrap_or(Bson::Null);
        if current != expected {
            return Err(conflict());
        }
        doc.insert(field, new);
        Ok(())
    }

    async fn query(&self, collection: &str, filter: Document) -> Result<Vec<Document>, StoreError> {
        let results = match self.collections.get(collection) {
            Some(coll) => coll
                .iter()
                .filter(|entry| Self::matches(entry.value(), &filter))
                .map(|entry| entry.value().clone())
                .collect(),
            None => Vec::new(),
        };
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn insert_is_a_gate() {
        let store = MemoryStore::new();
        store
            .insert("sales", "s1", doc! { "amount": 100_i64 })
            .await
            .unwrap();
        let err = store
            .insert("sales", "s1", doc! { "amount": 100_i64 })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn increments_are_applied_and_missing_fields_start_at_zero() {
        let store = MemoryStore::new();
        store
            .insert("agents", "a1", doc! { "total_sales": 0_i64 })
            .await
            .unwrap();
        store
            .atomic_increment("agents", "a1", doc! { "total_sales": 500_i64, "team_size": 1_i64 })
            .await
            .unwrap();
        let doc = store.get("agents", "a1").await.unwrap().unwrap();
        assert_eq!(doc.get_i64("total_sales").unwrap(), 500);
        assert_eq!(doc.get_i64("team_size").unwrap(), 1);
    }

    #[tokio::test]
    async fn increment_unknown_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .atomic_increment("agents", "missing", doc! { "total_sales": 1_i64 })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn compare_and_set_guards_on_expected_value() {
        let store = MemoryStore::new();
        store
            .insert("agents", "a1", doc! { "rank": 1 })
            .await
            .unwrap();
        store
            .compare_and_set("agents", "a1", "rank", Bson::Int32(1), Bson::Int32(2))
            .await
            .unwrap();
        let err = store
            .compare_and_set("agents", "a1", "rank", Bson::Int32(1), Bson::Int32(3))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn query_filters_on_equality() {
        let store = MemoryStore::new();
        store
            .insert("agents", "a1", doc! { "referred_by": "root" })
            .await
            .unwrap();
        store
            .insert("agents", "a2", doc! { "referred_by": "root" })
            .await
            .unwrap();
        store
            .insert("agents", "a3", doc! { "referred_by": "other" })
            .await
            .unwrap();
        let found = store
            .query("agents", doc! { "referred_by": "root" })
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }
}
