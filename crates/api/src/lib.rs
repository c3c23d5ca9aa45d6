//! HTTP surface for the wash recipe engine.
//!
//! Exposes create, read, update and delete over `/wash-recipes`, with
//! structured logging (tracing) and Prometheus metrics. The router is
//! generic over the storage backends so the same app runs against the
//! in-memory stores or PostgreSQL.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use recipe_store::{
    InMemoryOrderLinks, InMemoryRecipeStore, InMemoryReferenceCatalog, OrderLinkage,
    PostgresRecipeStore, RecipeStore, ReferenceCatalog,
};
use saga::{EngineConfig, WashRecipeEngine};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::recipes::{self, AppState};

/// State backed by the in-memory stores.
pub type InMemoryState = AppState<InMemoryRecipeStore, InMemoryReferenceCatalog, InMemoryOrderLinks>;

/// State backed by PostgreSQL for every collaborator.
pub type PostgresState = AppState<PostgresRecipeStore, PostgresRecipeStore, PostgresRecipeStore>;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, R, O>(state: Arc<AppState<S, R, O>>, metrics_handle: PrometheusHandle) -> Router
where
    S: RecipeStore + Clone + 'static,
    R: ReferenceCatalog + Clone + 'static,
    O: OrderLinkage + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/wash-recipes",
            get(recipes::list::<S, R, O>).post(recipes::create::<S, R, O>),
        )
        .route(
            "/wash-recipes/{id}",
            get(recipes::get::<S, R, O>)
                .put(recipes::update::<S, R, O>)
                .delete(recipes::delete::<S, R, O>),
        )
        .route("/wash-recipes/{id}/merged", get(recipes::merged::<S, R, O>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over fresh in-memory stores.
///
/// The catalog and order linkage are returned as well so callers can seed
/// reference data and orders; they share storage with the engine's copies.
pub fn create_in_memory_state(
    config: EngineConfig,
) -> (Arc<InMemoryState>, InMemoryReferenceCatalog, InMemoryOrderLinks) {
    let catalog = InMemoryReferenceCatalog::new();
    let orders = InMemoryOrderLinks::new();
    let engine = WashRecipeEngine::new(
        InMemoryRecipeStore::new(),
        catalog.clone(),
        orders.clone(),
        config,
    );
    (Arc::new(AppState { engine }), catalog, orders)
}

/// Creates application state with PostgreSQL serving every collaborator.
pub fn create_postgres_state(store: PostgresRecipeStore, config: EngineConfig) -> Arc<PostgresState> {
    let engine = WashRecipeEngine::new(store.clone(), store.clone(), store, config);
    Arc::new(AppState { engine })
}
