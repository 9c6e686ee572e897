use axum::{extract::State, response::Json};

use crate::errors::AppError;
use crate::server::app::AppState;
use crate::server::auth::AuthUser;
use crate::services::migration_service::MigrationReport;

/// Sign-in hook: runs the one-shot legacy migration for the calling user.
/// Safe to call on every login; repeat runs report zero work.
pub async fn run_migration(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MigrationReport>, AppError> {
    Ok(Json(state.migration.run_for_user(&user_id).await?))
}
