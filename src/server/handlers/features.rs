use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::feature::{Feature, FeatureWithId};
use crate::server::app::AppState;
use crate::server::auth::AuthUser;
use crate::services::mutation_service::{DeleteOutcome, EditOutcome, EditScope};
use crate::services::reference_service::{MonsterSummary, ReferenceService};

#[derive(Serialize)]
pub struct FeatureListResponse {
    pub features: Vec<FeatureWithId>,
}

pub async fn list_features(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<FeatureListResponse>, AppError> {
    Ok(Json(FeatureListResponse {
        features: state.features.list(&user_id).await?,
    }))
}

pub async fn create_feature(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(feature): Json<Feature>,
) -> Result<Json<FeatureWithId>, AppError> {
    feature.validate().map_err(AppError::validation)?;

    let id = Uuid::new_v4().to_string();
    state.features.save(&user_id, &id, &feature).await?;

    Ok(Json(FeatureWithId { id, feature }))
}

/// The feature plus its live referrer count and referrer summaries, for the
/// usage display and the edit/delete scope dialogs.
#[derive(Serialize)]
pub struct FeatureDetailResponse {
    pub feature: FeatureWithId,
    pub monster_count: usize,
    pub monsters: Vec<MonsterSummary>,
}

pub async fn get_feature(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FeatureDetailResponse>, AppError> {
    let feature = state
        .features
        .get(&user_id, &id)
        .await?
        .ok_or_else(|| AppError::not_found("feature", id.clone()))?;

    let referrers = state.references.find_referrers(&user_id, &id).await?;

    Ok(Json(FeatureDetailResponse {
        feature,
        monster_count: referrers.len(),
        monsters: ReferenceService::summarize(&referrers),
    }))
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeParam {
    #[default]
    All,
    This,
    Selected,
}

#[derive(Deserialize)]
pub struct UpdateFeatureRequest {
    pub feature: Feature,
    #[serde(default)]
    pub scope: ScopeParam,
    #[serde(default)]
    pub monster_id: Option<String>,
    #[serde(default)]
    pub monster_ids: Option<Vec<String>>,
}

pub async fn update_feature(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateFeatureRequest>,
) -> Result<Json<EditOutcome>, AppError> {
    payload.feature.validate().map_err(AppError::validation)?;

    let scope = match payload.scope {
        ScopeParam::All => EditScope::ApplyToAll,
        ScopeParam::This => {
            let monster_id = payload.monster_id.ok_or_else(|| {
                AppError::BadRequest("monster_id is required when scope is \"this\"".to_string())
            })?;
            EditScope::ForkForTargets(vec![monster_id])
        }
        ScopeParam::Selected => {
            let monster_ids = payload.monster_ids.unwrap_or_default();
            if monster_ids.is_empty() {
                return Err(AppError::BadRequest(
                    "monster_ids is required when scope is \"selected\"".to_string(),
                ));
            }
            EditScope::ForkForTargets(monster_ids)
        }
    };

    Ok(Json(
        state
            .mutations
            .edit(&user_id, &id, &payload.feature, scope)
            .await?,
    ))
}

#[derive(Default, Deserialize)]
pub struct DeleteFeatureRequest {
    #[serde(default)]
    pub monster_ids: Option<Vec<String>>,
}

/// Without a body the delete targets every referrer; with an explicit
/// `monster_ids` list only those monsters lose the reference and the
/// feature document survives while anyone else still uses it.
pub async fn delete_feature(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    payload: Option<Json<DeleteFeatureRequest>>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let selected = payload.and_then(|Json(body)| body.monster_ids);
    Ok(Json(state.mutations.delete(&user_id, &id, selected).await?))
}
