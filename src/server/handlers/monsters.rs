use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::monster::Monster;
use crate::server::app::AppState;
use crate::server::auth::AuthUser;
use crate::services::import_service::ImportOutcome;
use crate::services::projection::rebuild_embedded_arrays;
use crate::store::MONSTERS;

#[derive(Serialize)]
pub struct MonsterWithId {
    pub id: String,
    pub monster: Monster,
}

#[derive(Serialize)]
pub struct MonsterListResponse {
    pub monsters: Vec<MonsterWithId>,
}

pub async fn list_monsters(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MonsterListResponse>, AppError> {
    let docs = state.store.list(MONSTERS, &user_id).await?;
    let mut monsters = Vec::with_capacity(docs.len());
    for (id, doc) in docs {
        monsters.push(MonsterWithId {
            id,
            monster: serde_json::from_value(doc)?,
        });
    }
    Ok(Json(MonsterListResponse { monsters }))
}

pub async fn create_monster(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(monster): Json<Monster>,
) -> Result<Json<MonsterWithId>, AppError> {
    monster.validate().map_err(AppError::validation)?;

    let id = Uuid::new_v4().to_string();
    let monster = sync_feature_arrays(&state, &user_id, monster).await?;
    let doc = serde_json::to_value(&monster)?;
    state.store.set(MONSTERS, &user_id, &id, &doc).await?;

    Ok(Json(MonsterWithId { id, monster }))
}

pub async fn get_monster(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MonsterWithId>, AppError> {
    let doc = state
        .store
        .get(MONSTERS, &user_id, &id)
        .await?
        .ok_or_else(|| AppError::not_found("monster", id.clone()))?;

    Ok(Json(MonsterWithId {
        id,
        monster: serde_json::from_value(doc)?,
    }))
}

pub async fn update_monster(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(monster): Json<Monster>,
) -> Result<Json<MonsterWithId>, AppError> {
    monster.validate().map_err(AppError::validation)?;

    if state.store.get(MONSTERS, &user_id, &id).await?.is_none() {
        return Err(AppError::not_found("monster", id.clone()));
    }

    let monster = sync_feature_arrays(&state, &user_id, monster).await?;
    let doc = serde_json::to_value(&monster)?;
    state.store.set(MONSTERS, &user_id, &id, &doc).await?;

    Ok(Json(MonsterWithId { id, monster }))
}

/// Features the monster references survive its deletion; any other monster
/// sharing them is unaffected.
pub async fn delete_monster(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.store.get(MONSTERS, &user_id, &id).await?.is_none() {
        return Err(AppError::not_found("monster", id));
    }

    state.store.delete(MONSTERS, &user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn import_monster(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(monster): Json<Monster>,
) -> Result<Json<ImportOutcome>, AppError> {
    monster.validate().map_err(AppError::validation)?;
    Ok(Json(state.imports.import_monster(&user_id, monster).await?))
}

/// Derived arrays are recomputed whenever the payload carries `FeatureIds`;
/// monsters submitted in embedded (legacy) form are stored as sent.
async fn sync_feature_arrays(
    state: &AppState,
    user_id: &str,
    monster: Monster,
) -> Result<Monster, AppError> {
    if monster.feature_ids.is_some() {
        rebuild_embedded_arrays(state.store.as_ref(), user_id, monster).await
    } else {
        Ok(monster)
    }
}
