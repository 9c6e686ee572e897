use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::feature::{Feature, FeatureCategory, FeatureWithId};
use crate::models::monster::{FeatureEntry, Monster};
use crate::services::feature_service::FeatureService;
use crate::services::projection::project_features;
use crate::store::{SharedStore, MONSTERS};

#[derive(Clone, Debug, Serialize)]
pub struct ImportOutcome {
    pub monster_id: String,
    pub feature_ids: Vec<String>,
    pub features_created: usize,
    pub features_reused: usize,
}

/// Saves a monster submitted in embedded form, resolving each embedded entry
/// against the user's feature library. Resolution priority:
///  1. an id from the imported `FeatureIds` whose stored feature matches the
///     entry's category and name (the id is consumed);
///  2. any library feature matching name + category;
///  3. no match: a fresh feature document minted from the embedded copy.
#[derive(Clone)]
pub struct ImportService {
    store: SharedStore,
    features: FeatureService,
}

impl ImportService {
    pub fn new(store: SharedStore, features: FeatureService) -> Self {
        Self { store, features }
    }

    pub async fn import_monster(
        &self,
        user_id: &str,
        mut monster: Monster,
    ) -> Result<ImportOutcome, AppError> {
        let library = self.features.list(user_id).await?;
        let mut remaining: Vec<String> = monster.feature_ids.clone().unwrap_or_default();
        let mut resolved: Vec<FeatureWithId> = Vec::new();
        let mut created = 0;
        let mut reused = 0;

        let buckets: [(FeatureCategory, Vec<FeatureEntry>); 4] = [
            (FeatureCategory::Traits, monster.traits.clone()),
            (FeatureCategory::Actions, monster.actions.clone()),
            (FeatureCategory::Reactions, monster.reactions.clone()),
            (FeatureCategory::LegendaryActions, monster.legendary_actions.clone()),
        ];

        for (category, entries) in buckets {
            for entry in entries {
                let mut matched = None;
                if let Some(pos) = remaining.iter().position(|id| {
                    library.iter().any(|f| {
                        &f.id == id && f.feature.category == category && f.feature.name == entry.name
                    })
                }) {
                    let id = remaining.remove(pos);
                    matched = library.iter().find(|f| f.id == id).cloned();
                }
                if matched.is_none() {
                    matched = library
                        .iter()
                        .find(|f| f.feature.category == category && f.feature.name == entry.name)
                        .cloned();
                }

                match matched {
                    Some(feature) => {
                        reused += 1;
                        resolved.push(feature);
                    }
                    None => {
                        let feature = Feature {
                            name: entry.name.clone(),
                            content: entry.content.clone(),
                            usage: entry.usage.clone(),
                            category,
                        };
                        let id = Uuid::new_v4().to_string();
                        self.features.save(user_id, &id, &feature).await?;
                        created += 1;
                        resolved.push(FeatureWithId { id, feature });
                    }
                }
            }
        }

        let feature_ids: Vec<String> = resolved.iter().map(|f| f.id.clone()).collect();
        monster.feature_ids = Some(feature_ids.clone());
        let monster = project_features(monster, &resolved);

        let monster_id = Uuid::new_v4().to_string();
        let doc = serde_json::to_value(&monster)?;
        self.store.set(MONSTERS, user_id, &monster_id, &doc).await?;
        info!(
            "imported monster {} with {} features ({} new)",
            monster_id,
            resolved.len(),
            created
        );

        Ok(ImportOutcome {
            monster_id,
            feature_ids,
            features_created: created,
            features_reused: reused,
        })
    }
}
