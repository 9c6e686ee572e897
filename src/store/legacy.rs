use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::errors::AppError;

/// Read side of the pre-migration object store. Only listing is needed: the
/// migration copies records out once and never writes back.
#[async_trait]
pub trait LegacyMonsterStore: Send + Sync {
    async fn list_monsters(&self, user_id: &str) -> Result<Vec<(String, Value)>, AppError>;
}

/// Legacy records on disk: one JSON file per monster under
/// `<root>/<user>/<monster-id>.json`. A missing user directory means the
/// user has no legacy data.
pub struct FsLegacyStore {
    root: PathBuf,
}

impl FsLegacyStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl LegacyMonsterStore for FsLegacyStore {
    async fn list_monsters(&self, user_id: &str) -> Result<Vec<(String, Value)>, AppError> {
        let dir = self.root.join(user_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir)
            .map_err(|err| AppError::Internal(format!("legacy store read failed: {}", err)))?;

        let mut monsters = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|err| AppError::Internal(format!("legacy store read failed: {}", err)))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let monster_id = match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(stem) => stem.to_string(),
                None => continue,
            };
            let raw = fs::read_to_string(&path)
                .map_err(|err| AppError::Internal(format!("legacy store read failed: {}", err)))?;
            match serde_json::from_str(&raw) {
                Ok(doc) => monsters.push((monster_id, doc)),
                Err(err) => warn!("skipping unreadable legacy monster {}: {}", path.display(), err),
            }
        }

        monsters.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(monsters)
    }
}
