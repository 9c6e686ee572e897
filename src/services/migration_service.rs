use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::entities::users;
use crate::errors::AppError;
use crate::models::feature::FeatureCategory;
use crate::store::legacy::LegacyMonsterStore;
use crate::store::{SharedStore, FEATURES, MONSTERS};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub monsters_copied: usize,
    pub monsters_normalized: usize,
    pub features_created: usize,
}

/// One-shot per-user legacy migration, run on sign-in: copy monster records
/// out of the old object store, then extract embedded feature arrays into
/// standalone feature documents. Both phases are independently idempotent.
/// The whole run holds a per-user lock so concurrent sign-ins from two
/// devices cannot extract the same monster twice.
pub struct MigrationService {
    db: DatabaseConnection,
    store: SharedStore,
    legacy: Arc<dyn LegacyMonsterStore>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MigrationService {
    pub fn new(
        db: DatabaseConnection,
        store: SharedStore,
        legacy: Arc<dyn LegacyMonsterStore>,
    ) -> Self {
        Self {
            db,
            store,
            legacy,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run_for_user(&self, user_id: &str) -> Result<MigrationReport, AppError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let monsters_copied = self.copy_legacy_monsters(user_id).await?;
        let (monsters_normalized, features_created) =
            self.extract_embedded_features(user_id).await?;

        Ok(MigrationReport {
            monsters_copied,
            monsters_normalized,
            features_created,
        })
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Phase one: copy legacy records into the document store, unmodified.
    /// Presence of any monster document is the idempotency check.
    async fn copy_legacy_monsters(&self, user_id: &str) -> Result<usize, AppError> {
        if !self.store.list(MONSTERS, user_id).await?.is_empty() {
            return Ok(0);
        }

        let legacy = self.legacy.list_monsters(user_id).await?;
        if legacy.is_empty() {
            return Ok(0);
        }

        info!("copying {} legacy monsters for {}", legacy.len(), user_id);
        let mut copied = 0;
        for (monster_id, doc) in legacy {
            self.store.set(MONSTERS, user_id, &monster_id, &doc).await?;
            copied += 1;
        }
        Ok(copied)
    }

    /// Phase two: turn embedded category arrays into feature documents and
    /// rewrite each monster to reference them, gated by the per-user flag.
    async fn extract_embedded_features(&self, user_id: &str) -> Result<(usize, usize), AppError> {
        if self.features_migrated(user_id).await? {
            return Ok((0, 0));
        }

        let mut normalized = 0;
        let mut created = 0;
        for (monster_id, mut doc) in self.store.list(MONSTERS, user_id).await? {
            if !doc.is_object() {
                warn!("monster {} is not an object, skipping extraction", monster_id);
                continue;
            }
            // A FeatureIds array, even an empty one, means this monster is
            // already normalized.
            if doc.get("FeatureIds").map_or(false, Value::is_array) {
                continue;
            }

            let mut feature_ids = Vec::new();
            for category in FeatureCategory::ALL {
                let entries = match doc.get(category.as_str()).and_then(Value::as_array) {
                    Some(entries) => entries.clone(),
                    None => continue,
                };
                for entry in entries {
                    let feature_id = Uuid::new_v4().to_string();
                    let mut feature = json!({
                        "Name": entry.get("Name").cloned().unwrap_or_else(|| json!("")),
                        "Content": entry.get("Content").cloned().unwrap_or_else(|| json!("")),
                        "Category": category.as_str(),
                    });
                    if let Some(usage) = entry.get("Usage") {
                        if !usage.is_null() {
                            feature["Usage"] = usage.clone();
                        }
                    }
                    self.store.set(FEATURES, user_id, &feature_id, &feature).await?;
                    feature_ids.push(Value::String(feature_id));
                    created += 1;
                }
            }

            doc["FeatureIds"] = Value::Array(feature_ids);
            self.store.set(MONSTERS, user_id, &monster_id, &doc).await?;
            normalized += 1;
        }

        self.mark_features_migrated(user_id).await?;
        if normalized > 0 {
            info!(
                "extracted {} features from {} monsters for {}",
                created, normalized, user_id
            );
        }
        Ok((normalized, created))
    }

    async fn features_migrated(&self, user_id: &str) -> Result<bool, AppError> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(user.map(|u| u.features_migrated).unwrap_or(false))
    }

    async fn mark_features_migrated(&self, user_id: &str) -> Result<(), AppError> {
        let now = Utc::now();
        match users::Entity::find()
            .filter(users::Column::Email.eq(user_id))
            .one(&self.db)
            .await?
        {
            Some(user) => {
                let mut user: users::ActiveModel = user.into();
                user.features_migrated = Set(true);
                user.updated_at = Set(now);
                user.update(&self.db).await?;
            }
            None => {
                let user = users::ActiveModel {
                    email: Set(user_id.to_string()),
                    features_migrated: Set(true),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                user.insert(&self.db).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connection::setup_database;
    use crate::models::monster::Monster;
    use crate::services::projection::rebuild_embedded_arrays;
    use crate::store::legacy::FsLegacyStore;
    use crate::store::SeaOrmDocumentStore;
    use anyhow::Result;
    use sea_orm::Database;
    use tempfile::{NamedTempFile, TempDir};

    const USER: &str = "gm@example.com";

    struct Fixture {
        _db_file: NamedTempFile,
        _legacy_dir: TempDir,
        store: SharedStore,
        service: MigrationService,
    }

    async fn setup(legacy_monsters: &[(&str, Value)]) -> Result<Fixture> {
        let db_file = NamedTempFile::new()?;
        let db_url = format!("sqlite://{}?mode=rwc", db_file.path().display());
        let db = Database::connect(&db_url).await?;
        setup_database(&db).await?;

        let legacy_dir = tempfile::tempdir()?;
        let user_dir = legacy_dir.path().join(USER);
        std::fs::create_dir_all(&user_dir)?;
        for (monster_id, doc) in legacy_monsters {
            std::fs::write(user_dir.join(format!("{}.json", monster_id)), doc.to_string())?;
        }

        let store: SharedStore = Arc::new(SeaOrmDocumentStore::new(db.clone()));
        let legacy = Arc::new(FsLegacyStore::new(legacy_dir.path()));
        let service = MigrationService::new(db, store.clone(), legacy);
        Ok(Fixture {
            _db_file: db_file,
            _legacy_dir: legacy_dir,
            store,
            service,
        })
    }

    fn dire_wolf() -> Value {
        json!({
            "Name": "Dire Wolf",
            "Traits": [
                {"Name": "Keen Hearing and Smell", "Content": "Advantage on Perception checks."},
                {"Name": "Pack Tactics", "Content": "Advantage when an ally is adjacent."},
            ],
            "Actions": [
                {"Name": "Bite", "Content": "Melee weapon attack.", "Usage": "1/turn"},
            ],
        })
    }

    #[tokio::test]
    async fn running_twice_changes_nothing_the_second_time() -> Result<()> {
        let fx = setup(&[("m1", dire_wolf())]).await?;

        let first = fx.service.run_for_user(USER).await?;
        assert_eq!(first.monsters_copied, 1);
        assert_eq!(first.monsters_normalized, 1);
        assert_eq!(first.features_created, 3);

        let second = fx.service.run_for_user(USER).await?;
        assert_eq!(second, MigrationReport::default());

        assert_eq!(fx.store.list(FEATURES, USER).await?.len(), 3);
        let (_, doc) = fx.store.list(MONSTERS, USER).await?.remove(0);
        assert_eq!(doc["FeatureIds"].as_array().unwrap().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn extraction_preserves_category_and_entry_order() -> Result<()> {
        let fx = setup(&[("m1", dire_wolf())]).await?;
        fx.service.run_for_user(USER).await?;

        let doc = fx.store.get(MONSTERS, USER, "m1").await?.unwrap();
        let ids: Vec<String> = doc["FeatureIds"]
            .as_array()
            .unwrap()
            .iter()
            .map(|id| id.as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids.len(), 3);

        let mut names = Vec::new();
        for id in &ids {
            let feature = fx.store.get(FEATURES, USER, id).await?.unwrap();
            names.push(feature["Name"].as_str().unwrap().to_string());
        }
        assert_eq!(names, ["Keen Hearing and Smell", "Pack Tactics", "Bite"]);

        // Rebuilding from the extracted ids reproduces the legacy arrays.
        let monster: Monster = serde_json::from_value(doc)?;
        let rebuilt = rebuild_embedded_arrays(fx.store.as_ref(), USER, monster.clone()).await?;
        assert_eq!(rebuilt.traits, monster.traits);
        assert_eq!(rebuilt.actions, monster.actions);
        assert_eq!(rebuilt.actions[0].usage.as_deref(), Some("1/turn"));
        Ok(())
    }

    #[tokio::test]
    async fn monsters_already_carrying_feature_ids_are_skipped() -> Result<()> {
        let fx = setup(&[]).await?;
        fx.store
            .set(MONSTERS, USER, "m1", &json!({"Name": "Normalized", "FeatureIds": []}))
            .await?;

        let report = fx.service.run_for_user(USER).await?;
        assert_eq!(report.monsters_copied, 0);
        assert_eq!(report.monsters_normalized, 0);
        assert_eq!(report.features_created, 0);
        assert!(fx.store.list(FEATURES, USER).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_runs_extract_each_monster_once() -> Result<()> {
        let fx = setup(&[("m1", dire_wolf())]).await?;
        let service = Arc::new(fx.service);

        let first = {
            let service = service.clone();
            tokio::spawn(async move { service.run_for_user(USER).await })
        };
        let second = {
            let service = service.clone();
            tokio::spawn(async move { service.run_for_user(USER).await })
        };
        let first = first.await.expect("task panicked")?;
        let second = second.await.expect("task panicked")?;

        assert_eq!(first.features_created + second.features_created, 3);
        assert_eq!(fx.store.list(FEATURES, USER).await?.len(), 3);
        Ok(())
    }
}
