use futures_util::future::join_all;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::feature::Feature;
use crate::models::monster::Monster;
use crate::services::projection::rebuild_embedded_arrays;
use crate::services::reference_service::ReferenceService;
use crate::store::{SharedStore, FEATURES, MONSTERS};

/// How far an edit propagates: overwrite the shared document in place so
/// every referrer sees it, or mint a forked copy for an explicit set of
/// monsters while everyone else keeps the original.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditScope {
    ApplyToAll,
    ForkForTargets(Vec<String>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Updated,
    NotFound,
    Failed,
}

/// Outcome of one monster in a fan-out batch.
#[derive(Clone, Debug, Serialize)]
pub struct TargetOutcome {
    pub monster_id: String,
    pub status: TargetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EditOutcome {
    /// The id that holds the edited content: unchanged when applied to all
    /// referrers, freshly minted for forks.
    pub feature_id: String,
    pub updated_monsters: usize,
    pub targets: Vec<TargetOutcome>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DeleteOutcome {
    pub updated_monsters: usize,
    pub feature_deleted: bool,
    pub targets: Vec<TargetOutcome>,
}

/// Coordinates scoped feature edits and deletes across every monster that
/// shares the feature, keeping the denormalized category arrays in sync.
/// Per-monster writes are independent: one failure never rolls back or
/// cancels the others, and the outcome reports each target separately.
#[derive(Clone)]
pub struct MutationService {
    store: SharedStore,
    references: ReferenceService,
}

impl MutationService {
    pub fn new(store: SharedStore, references: ReferenceService) -> Self {
        Self { store, references }
    }

    pub async fn edit(
        &self,
        user_id: &str,
        feature_id: &str,
        feature: &Feature,
        scope: EditScope,
    ) -> Result<EditOutcome, AppError> {
        match scope {
            EditScope::ApplyToAll => self.edit_all(user_id, feature_id, feature).await,
            EditScope::ForkForTargets(targets) => {
                self.edit_forked(user_id, feature_id, feature, targets).await
            }
        }
    }

    /// Overwrite the feature in place, then resync every current referrer.
    async fn edit_all(
        &self,
        user_id: &str,
        feature_id: &str,
        feature: &Feature,
    ) -> Result<EditOutcome, AppError> {
        let doc = serde_json::to_value(feature)?;
        self.store.set(FEATURES, user_id, feature_id, &doc).await?;

        let affected = self.references.find_referrers(user_id, feature_id).await?;
        let targets = join_all(
            affected
                .into_iter()
                .map(|referrer| self.resync_monster(user_id, referrer.id, referrer.monster)),
        )
        .await;

        let updated_monsters = count_updated(&targets);
        info!(
            "feature {} edited for all referrers, {} monsters resynced",
            feature_id, updated_monsters
        );
        Ok(EditOutcome {
            feature_id: feature_id.to_string(),
            updated_monsters,
            targets,
        })
    }

    /// Mint a new feature document for the edited content and swap the old
    /// id for the new one in the target monsters only.
    async fn edit_forked(
        &self,
        user_id: &str,
        feature_id: &str,
        feature: &Feature,
        target_ids: Vec<String>,
    ) -> Result<EditOutcome, AppError> {
        if target_ids.is_empty() {
            return Err(AppError::BadRequest(
                "at least one target monster is required".to_string(),
            ));
        }

        // Load the targets before minting anything: a fork aimed only at
        // missing monsters must not leave an orphan feature document behind.
        let fetched = join_all(target_ids.iter().map(|id| self.load_monster(user_id, id))).await;
        let mut targets = Vec::with_capacity(target_ids.len());
        for (id, monster) in target_ids.iter().zip(fetched) {
            targets.push((id.clone(), monster?));
        }
        if targets.iter().all(|(_, monster)| monster.is_none()) {
            let first = target_ids.into_iter().next().unwrap_or_default();
            return Err(AppError::not_found("monster", first));
        }

        let new_feature_id = Uuid::new_v4().to_string();
        let doc = serde_json::to_value(feature)?;
        self.store.set(FEATURES, user_id, &new_feature_id, &doc).await?;

        let outcomes = join_all(targets.into_iter().map(|(monster_id, monster)| {
            let new_id = new_feature_id.clone();
            async move {
                match monster {
                    None => TargetOutcome {
                        monster_id,
                        status: TargetStatus::NotFound,
                        detail: None,
                    },
                    Some(mut monster) => {
                        if let Some(ids) = monster.feature_ids.as_mut() {
                            for id in ids.iter_mut() {
                                if id == feature_id {
                                    *id = new_id.clone();
                                }
                            }
                        }
                        self.resync_monster(user_id, monster_id, monster).await
                    }
                }
            }
        }))
        .await;

        let updated_monsters = count_updated(&outcomes);
        info!(
            "feature {} forked as {} for {} monsters",
            feature_id, new_feature_id, updated_monsters
        );
        Ok(EditOutcome {
            feature_id: new_feature_id,
            updated_monsters,
            targets: outcomes,
        })
    }

    /// Remove the feature from the targeted referrers, garbage-collecting
    /// the feature document once nothing references it anymore.
    pub async fn delete(
        &self,
        user_id: &str,
        feature_id: &str,
        selected: Option<Vec<String>>,
    ) -> Result<DeleteOutcome, AppError> {
        // Resolve referrers before anything is deleted.
        let affected = self.references.find_referrers(user_id, feature_id).await?;
        let affected_count = affected.len();

        // An explicit target list is intersected with the actual referrers;
        // listed monsters that never referenced the feature are ignored.
        let targets: Vec<_> = match &selected {
            None => affected,
            Some(ids) => affected
                .into_iter()
                .filter(|referrer| ids.contains(&referrer.id))
                .collect(),
        };
        let target_count = targets.len();

        let outcomes = join_all(targets.into_iter().map(|referrer| {
            let mut monster = referrer.monster;
            if let Some(ids) = monster.feature_ids.as_mut() {
                ids.retain(|id| id != feature_id);
            }
            self.resync_monster(user_id, referrer.id, monster)
        }))
        .await;

        let remaining = affected_count - target_count;
        let feature_deleted = remaining == 0;
        if feature_deleted {
            self.store.delete(FEATURES, user_id, feature_id).await?;
            info!("feature {} deleted after its last reference was removed", feature_id);
        }

        Ok(DeleteOutcome {
            updated_monsters: count_updated(&outcomes),
            feature_deleted,
            targets: outcomes,
        })
    }

    async fn load_monster(
        &self,
        user_id: &str,
        monster_id: &str,
    ) -> Result<Option<Monster>, AppError> {
        match self.store.get(MONSTERS, user_id, monster_id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    async fn resync_monster(
        &self,
        user_id: &str,
        monster_id: String,
        monster: Monster,
    ) -> TargetOutcome {
        match self.rebuild_and_persist(user_id, &monster_id, monster).await {
            Ok(()) => TargetOutcome {
                monster_id,
                status: TargetStatus::Updated,
                detail: None,
            },
            Err(err) => {
                error!("failed to resync monster {}: {}", monster_id, err);
                TargetOutcome {
                    monster_id,
                    status: TargetStatus::Failed,
                    detail: Some(err.to_string()),
                }
            }
        }
    }

    async fn rebuild_and_persist(
        &self,
        user_id: &str,
        monster_id: &str,
        monster: Monster,
    ) -> Result<(), AppError> {
        let rebuilt = rebuild_embedded_arrays(self.store.as_ref(), user_id, monster).await?;
        let doc = serde_json::to_value(&rebuilt)?;
        self.store.set(MONSTERS, user_id, monster_id, &doc).await
    }
}

fn count_updated(targets: &[TargetOutcome]) -> usize {
    targets
        .iter()
        .filter(|target| target.status == TargetStatus::Updated)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connection::setup_database;
    use crate::models::feature::FeatureCategory;
    use crate::services::feature_service::FeatureService;
    use crate::store::SeaOrmDocumentStore;
    use anyhow::Result;
    use sea_orm::Database;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    struct Fixture {
        _db_file: NamedTempFile,
        store: SharedStore,
        features: FeatureService,
        references: ReferenceService,
        mutations: MutationService,
    }

    async fn setup() -> Result<Fixture> {
        let db_file = NamedTempFile::new()?;
        let db_url = format!("sqlite://{}?mode=rwc", db_file.path().display());
        let db = Database::connect(&db_url).await?;
        setup_database(&db).await?;

        let store: SharedStore = Arc::new(SeaOrmDocumentStore::new(db));
        let features = FeatureService::new(store.clone());
        let references = ReferenceService::new(store.clone());
        let mutations = MutationService::new(store.clone(), references.clone());
        Ok(Fixture {
            _db_file: db_file,
            store,
            features,
            references,
            mutations,
        })
    }

    fn feature(name: &str, content: &str) -> Feature {
        Feature {
            name: name.to_string(),
            content: content.to_string(),
            usage: None,
            category: FeatureCategory::Traits,
        }
    }

    async fn put_monster(fx: &Fixture, monster_id: &str, feature_ids: &[&str]) -> Result<()> {
        let mut monster = Monster::default();
        monster.name = Some(format!("Monster {}", monster_id));
        monster.feature_ids = Some(feature_ids.iter().map(|id| id.to_string()).collect());
        let monster = rebuild_embedded_arrays(fx.store.as_ref(), "gm", monster).await?;
        fx.store
            .set(MONSTERS, "gm", monster_id, &serde_json::to_value(&monster)?)
            .await?;
        Ok(())
    }

    async fn get_monster(fx: &Fixture, monster_id: &str) -> Result<Monster> {
        let doc = fx.store.get(MONSTERS, "gm", monster_id).await?.unwrap();
        Ok(serde_json::from_value(doc)?)
    }

    #[tokio::test]
    async fn edit_all_keeps_the_id_and_updates_every_referrer() -> Result<()> {
        let fx = setup().await?;
        fx.features
            .save("gm", "f1", &feature("Keen Smell", "Original content."))
            .await?;
        for monster_id in ["a", "b", "c"] {
            put_monster(&fx, monster_id, &["f1"]).await?;
        }

        let outcome = fx
            .mutations
            .edit(
                "gm",
                "f1",
                &feature("Keen Smell", "Updated content."),
                EditScope::ApplyToAll,
            )
            .await?;

        assert_eq!(outcome.feature_id, "f1");
        assert_eq!(outcome.updated_monsters, 3);

        let referrers = fx.references.find_referrers("gm", "f1").await?;
        assert_eq!(referrers.len(), 3);
        for referrer in &referrers {
            assert_eq!(referrer.monster.traits.len(), 1);
            assert_eq!(referrer.monster.traits[0].content, "Updated content.");
        }
        Ok(())
    }

    #[tokio::test]
    async fn edit_this_forks_a_private_copy() -> Result<()> {
        let fx = setup().await?;
        fx.features
            .save("gm", "f1", &feature("Keen Smell", "Original content."))
            .await?;
        put_monster(&fx, "a", &["f1"]).await?;
        put_monster(&fx, "b", &["f1"]).await?;

        let outcome = fx
            .mutations
            .edit(
                "gm",
                "f1",
                &feature("Keen Smell", "Forked content."),
                EditScope::ForkForTargets(vec!["a".to_string()]),
            )
            .await?;

        assert_ne!(outcome.feature_id, "f1");
        assert_eq!(outcome.updated_monsters, 1);

        let a = get_monster(&fx, "a").await?;
        assert_eq!(a.feature_ids.as_ref().unwrap(), &[outcome.feature_id.clone()]);
        assert_eq!(a.traits[0].content, "Forked content.");

        let b = get_monster(&fx, "b").await?;
        assert_eq!(b.feature_ids.as_ref().unwrap(), &["f1".to_string()]);
        assert_eq!(b.traits[0].content, "Original content.");

        let old_referrers = fx.references.find_referrers("gm", "f1").await?;
        assert_eq!(old_referrers.len(), 1);
        assert_eq!(old_referrers[0].id, "b");

        let new_referrers = fx
            .references
            .find_referrers("gm", &outcome.feature_id)
            .await?;
        assert_eq!(new_referrers.len(), 1);
        assert_eq!(new_referrers[0].id, "a");
        Ok(())
    }

    #[tokio::test]
    async fn fork_for_selected_moves_only_the_chosen_monsters() -> Result<()> {
        let fx = setup().await?;
        fx.features
            .save("gm", "f1", &feature("Keen Smell", "Original content."))
            .await?;
        for monster_id in ["a", "b", "c"] {
            put_monster(&fx, monster_id, &["f1"]).await?;
        }

        let outcome = fx
            .mutations
            .edit(
                "gm",
                "f1",
                &feature("Keen Smell", "Forked content."),
                EditScope::ForkForTargets(vec!["a".to_string(), "b".to_string()]),
            )
            .await?;

        assert_eq!(outcome.updated_monsters, 2);
        assert_eq!(fx.references.find_referrers("gm", "f1").await?.len(), 1);
        assert_eq!(
            fx.references
                .find_referrers("gm", &outcome.feature_id)
                .await?
                .len(),
            2
        );
        Ok(())
    }

    #[tokio::test]
    async fn fork_with_no_existing_target_mints_nothing() -> Result<()> {
        let fx = setup().await?;
        fx.features
            .save("gm", "f1", &feature("Keen Smell", "Original content."))
            .await?;

        let result = fx
            .mutations
            .edit(
                "gm",
                "f1",
                &feature("Keen Smell", "Forked content."),
                EditScope::ForkForTargets(vec!["missing".to_string()]),
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound { .. })));
        assert_eq!(fx.features.list("gm").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn delete_without_targets_garbage_collects_the_feature() -> Result<()> {
        let fx = setup().await?;
        fx.features
            .save("gm", "f1", &feature("Keen Smell", "Original content."))
            .await?;
        put_monster(&fx, "a", &["f1"]).await?;

        let outcome = fx.mutations.delete("gm", "f1", None).await?;

        assert_eq!(outcome.updated_monsters, 1);
        assert!(outcome.feature_deleted);
        assert!(fx.features.get("gm", "f1").await?.is_none());

        let a = get_monster(&fx, "a").await?;
        assert!(a.feature_ids.as_ref().unwrap().is_empty());
        assert!(a.traits.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn delete_with_explicit_targets_retains_the_feature() -> Result<()> {
        let fx = setup().await?;
        fx.features
            .save("gm", "f1", &feature("Keen Smell", "Original content."))
            .await?;
        for monster_id in ["a", "b", "c"] {
            put_monster(&fx, monster_id, &["f1"]).await?;
        }

        let outcome = fx
            .mutations
            .delete("gm", "f1", Some(vec!["a".to_string()]))
            .await?;

        assert_eq!(outcome.updated_monsters, 1);
        assert!(!outcome.feature_deleted);
        assert!(fx.features.get("gm", "f1").await?.is_some());

        let mut referrer_ids: Vec<String> = fx
            .references
            .find_referrers("gm", "f1")
            .await?
            .into_iter()
            .map(|referrer| referrer.id)
            .collect();
        referrer_ids.sort();
        assert_eq!(referrer_ids, ["b", "c"]);
        Ok(())
    }

    #[tokio::test]
    async fn delete_ignores_listed_monsters_that_are_not_referrers() -> Result<()> {
        let fx = setup().await?;
        fx.features
            .save("gm", "f1", &feature("Keen Smell", "Original content."))
            .await?;
        put_monster(&fx, "a", &["f1"]).await?;
        put_monster(&fx, "unrelated", &[]).await?;

        let outcome = fx
            .mutations
            .delete(
                "gm",
                "f1",
                Some(vec!["a".to_string(), "unrelated".to_string(), "ghost".to_string()]),
            )
            .await?;

        assert_eq!(outcome.updated_monsters, 1);
        assert!(outcome.feature_deleted);
        Ok(())
    }
}
