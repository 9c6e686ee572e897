use serde::Serialize;

use crate::errors::AppError;
use crate::models::monster::Monster;
use crate::store::{SharedStore, MONSTERS};

/// A monster document that references a given feature.
#[derive(Clone, Debug)]
pub struct Referrer {
    pub id: String,
    pub monster: Monster,
}

/// Compact referrer description for listings and scope-selection dialogs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonsterSummary {
    pub id: String,
    pub name: String,
}

#[derive(Clone)]
pub struct ReferenceService {
    store: SharedStore,
}

impl ReferenceService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Every monster whose `FeatureIds` contains `feature_id`. Computed by
    /// live query, so the result always matches the current documents.
    pub async fn find_referrers(
        &self,
        user_id: &str,
        feature_id: &str,
    ) -> Result<Vec<Referrer>, AppError> {
        let docs = self
            .store
            .query_array_contains(MONSTERS, user_id, "FeatureIds", feature_id)
            .await?;

        let mut referrers = Vec::with_capacity(docs.len());
        for (id, doc) in docs {
            referrers.push(Referrer {
                id,
                monster: serde_json::from_value(doc)?,
            });
        }
        Ok(referrers)
    }

    pub fn summarize(referrers: &[Referrer]) -> Vec<MonsterSummary> {
        referrers
            .iter()
            .map(|referrer| MonsterSummary {
                id: referrer.id.clone(),
                name: referrer
                    .monster
                    .name
                    .clone()
                    .unwrap_or_else(|| referrer.id.clone()),
            })
            .collect()
    }
}
