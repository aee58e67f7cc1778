//! MongoDB-backed document store.
//!
//! Maps the store contract onto single-document MongoDB operations:
//! duplicate-key inserts become the idempotency-gate signal, `$inc` carries
//! atomic increments, and compare-and-set is a filtered `update_one`.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures_util::StreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{Client, Collection, Database};
use tracing::{error, info};

use super::{DocumentStore, StoreError};

const DUPLICATE_KEY: i32 = 11000;

/// MongoDB store over one database; collections are addressed by name.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect and verify the database is reachable.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to MongoDB: {}", e)))?;

        let db = client.database(db_name);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Backend(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self { db })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.collection(collection)
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| StoreError::Backend(format!("Find failed: {}", e)))
    }

    async fn insert(
        &self,
        collection: &str,
        id: &str,
        mut record: Document,
    ) -> Result<(), StoreError> {
        record.insert("_id", id);
        match self.collection(collection).insert_one(record).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            Err(e) => Err(StoreError::Backend(format!("Insert failed: {}", e))),
        }
    }

    async fn atomic_increment(
        &self,
        collection: &str,
        id: &str,
        deltas: Document,
    ) -> Result<(), StoreError> {
        let result = self
            .collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$inc": deltas })
            .await
            .map_err(|e| StoreError::Backend(format!("Increment failed: {}", e)))?;

        if result.matched_count == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
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
        let result = self
            .collection(collection)
            .update_one(
                doc! { "_id": id, field: expected },
                doc! { "$set": { field: new } },
            )
            .await
            .map_err(|e| StoreError::Backend(format!("Compare-and-set failed: {}", e)))?;

        if result.matched_count == 0 {
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
                id: id.to_string(),
                field: field.to_string(),
            });
        }
        Ok(())
    }

    async fn query(&self, collection: &str, filter: Document) -> Result<Vec<Document>, StoreError> {
        let cursor = self
            .collection(collection)
            .find(filter)
            .await
            .map_err(|e| StoreError::Backend(format!("Find failed: {}", e)))?;

        let results: Vec<Document> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    // Integration tests require a running MongoDB instance; the engine's
    // behavioral suite runs against MemoryStore instead.
}
