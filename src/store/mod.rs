pub mod legacy;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::Value;

use crate::database::entities::documents;
use crate::errors::AppError;

/// Per-user collection names.
pub const MONSTERS: &str = "monsters";
pub const FEATURES: &str = "features";

/// The document-store capability the services are written against: per-user
/// collections of JSON documents with upsert semantics and a query for
/// "documents whose array field contains value X".
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, user_id: &str, doc_id: &str)
        -> Result<Option<Value>, AppError>;

    /// Upsert: creates the document if absent, replaces it otherwise.
    async fn set(&self, collection: &str, user_id: &str, doc_id: &str, doc: &Value)
        -> Result<(), AppError>;

    async fn delete(&self, collection: &str, user_id: &str, doc_id: &str)
        -> Result<(), AppError>;

    async fn list(&self, collection: &str, user_id: &str)
        -> Result<Vec<(String, Value)>, AppError>;

    async fn query_array_contains(
        &self,
        collection: &str,
        user_id: &str,
        array_field: &str,
        value: &str,
    ) -> Result<Vec<(String, Value)>, AppError>;
}

pub type SharedStore = Arc<dyn DocumentStore>;

/// Document store backed by the `documents` table.
pub struct SeaOrmDocumentStore {
    db: DatabaseConnection,
}

impl SeaOrmDocumentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_row(
        &self,
        collection: &str,
        user_id: &str,
        doc_id: &str,
    ) -> Result<Option<documents::Model>, AppError> {
        let row = documents::Entity::find()
            .filter(documents::Column::Collection.eq(collection))
            .filter(documents::Column::UserId.eq(user_id))
            .filter(documents::Column::DocId.eq(doc_id))
            .one(&self.db)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl DocumentStore for SeaOrmDocumentStore {
    async fn get(
        &self,
        collection: &str,
        user_id: &str,
        doc_id: &str,
    ) -> Result<Option<Value>, AppError> {
        match self.find_row(collection, user_id, doc_id).await? {
            Some(row) => Ok(Some(serde_json::from_str(&row.data)?)),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        collection: &str,
        user_id: &str,
        doc_id: &str,
        doc: &Value,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let payload = doc.to_string();

        match self.find_row(collection, user_id, doc_id).await? {
            Some(row) => {
                let mut row: documents::ActiveModel = row.into();
                row.data = Set(payload);
                row.updated_at = Set(now);
                row.update(&self.db).await?;
            }
            None => {
                let row = documents::ActiveModel {
                    collection: Set(collection.to_string()),
                    user_id: Set(user_id.to_string()),
                    doc_id: Set(doc_id.to_string()),
                    data: Set(payload),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                row.insert(&self.db).await?;
            }
        }

        Ok(())
    }

    async fn delete(&self, collection: &str, user_id: &str, doc_id: &str) -> Result<(), AppError> {
        documents::Entity::delete_many()
            .filter(documents::Column::Collection.eq(collection))
            .filter(documents::Column::UserId.eq(user_id))
            .filter(documents::Column::DocId.eq(doc_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn list(&self, collection: &str, user_id: &str) -> Result<Vec<(String, Value)>, AppError> {
        let rows = documents::Entity::find()
            .filter(documents::Column::Collection.eq(collection))
            .filter(documents::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            docs.push((row.doc_id, serde_json::from_str(&row.data)?));
        }
        Ok(docs)
    }

    async fn query_array_contains(
        &self,
        collection: &str,
        user_id: &str,
        array_field: &str,
        value: &str,
    ) -> Result<Vec<(String, Value)>, AppError> {
        // sqlite has no array-contains operator over JSON text; per-user
        // collections are small, so the filter runs in process.
        let docs = self.list(collection, user_id).await?;
        Ok(docs
            .into_iter()
            .filter(|(_, doc)| {
                doc.get(array_field)
                    .and_then(Value::as_array)
                    .map_or(false, |items| items.iter().any(|item| item.as_str() == Some(value)))
            })
            .collect())
    }
}
