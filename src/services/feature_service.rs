use crate::errors::AppError;
use crate::models::feature::{Feature, FeatureWithId};
use crate::store::{SharedStore, FEATURES};

/// CRUD over individual feature documents. No cascading happens here:
/// callers are responsible for keeping monster references consistent.
#[derive(Clone)]
pub struct FeatureService {
    store: SharedStore,
}

impl FeatureService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(
        &self,
        user_id: &str,
        feature_id: &str,
    ) -> Result<Option<FeatureWithId>, AppError> {
        match self.store.get(FEATURES, user_id, feature_id).await? {
            Some(doc) => Ok(Some(FeatureWithId {
                id: feature_id.to_string(),
                feature: serde_json::from_value(doc)?,
            })),
            None => Ok(None),
        }
    }

    /// Upsert: creates the document if absent.
    pub async fn save(
        &self,
        user_id: &str,
        feature_id: &str,
        feature: &Feature,
    ) -> Result<(), AppError> {
        let doc = serde_json::to_value(feature)?;
        self.store.set(FEATURES, user_id, feature_id, &doc).await
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<FeatureWithId>, AppError> {
        let docs = self.store.list(FEATURES, user_id).await?;
        let mut features = Vec::with_capacity(docs.len());
        for (id, doc) in docs {
            features.push(FeatureWithId {
                id,
                feature: serde_json::from_value(doc)?,
            });
        }
        Ok(features)
    }

    pub async fn delete(&self, user_id: &str, feature_id: &str) -> Result<(), AppError> {
        self.store.delete(FEATURES, user_id, feature_id).await
    }
}
