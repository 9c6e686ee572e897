use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::server::handlers::{features, health, migration, monsters};
use crate::services::{
    FeatureService, ImportService, MigrationService, MutationService, ReferenceService,
};
use crate::store::legacy::FsLegacyStore;
use crate::store::{SeaOrmDocumentStore, SharedStore};

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub features: FeatureService,
    pub references: ReferenceService,
    pub mutations: MutationService,
    pub imports: ImportService,
    pub migration: Arc<MigrationService>,
}

pub async fn create_app(
    db: DatabaseConnection,
    cors_origin: Option<&str>,
    legacy_root: Option<PathBuf>,
) -> Result<Router> {
    let store: SharedStore = Arc::new(SeaOrmDocumentStore::new(db.clone()));
    let legacy = Arc::new(FsLegacyStore::new(
        legacy_root.unwrap_or_else(|| PathBuf::from("legacy-monsters")),
    ));

    let features = FeatureService::new(store.clone());
    let references = ReferenceService::new(store.clone());
    let mutations = MutationService::new(store.clone(), references.clone());
    let imports = ImportService::new(store.clone(), features.clone());
    let migration = Arc::new(MigrationService::new(db, store.clone(), legacy));

    let state = AppState {
        store,
        features,
        references,
        mutations,
        imports,
        migration,
    };

    let cors = match cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<axum::http::HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let app = Router::new()
        // Health check endpoint
        .route("/health", get(health::health_check))
        // API v1 routes
        .nest("/api/v1", api_v1_routes())
        // Add middleware
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state);

    Ok(app)
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // Monster routes
        .route("/monsters", get(monsters::list_monsters))
        .route("/monsters", post(monsters::create_monster))
        .route("/monsters/import", post(monsters::import_monster))
        .route("/monsters/:id", get(monsters::get_monster))
        .route("/monsters/:id", put(monsters::update_monster))
        .route("/monsters/:id", delete(monsters::delete_monster))
        // Feature routes
        .route("/features", get(features::list_features))
        .route("/features", post(features::create_feature))
        .route("/features/:id", get(features::get_feature))
        .route("/features/:id", put(features::update_feature))
        .route("/features/:id", delete(features::delete_feature))
        // Sign-in hook: one-shot legacy migration for the calling user
        .route("/migrate", post(migration::run_migration))
}
