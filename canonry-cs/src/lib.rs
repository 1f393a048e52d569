//! canonry-cs library - Curation Service
//!
//! HTTP surface over the curation core: works, lineage edges, lineage
//! graphs, promotions and a live event stream.

use axum::Router;
use canonry_common::catalog::WorkCatalog;
use canonry_common::config::LineageConfig;
use canonry_common::edges::EdgeRegistry;
use canonry_common::events::EventBus;
use canonry_common::lineage::LineageGraphBuilder;
use canonry_common::promotion::PromotionEngine;
use canonry_common::store::SharedStore;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: WorkCatalog,
    pub edges: EdgeRegistry,
    pub lineage: LineageGraphBuilder,
    pub promotion: PromotionEngine,
    /// Event bus feeding `/api/events`
    pub event_bus: EventBus,
    /// Default and maximum lineage depth
    pub lineage_config: LineageConfig,
}

impl AppState {
    /// Wire every component to one store and one event bus
    pub fn new(store: SharedStore, event_bus: EventBus, lineage_config: LineageConfig) -> Self {
        let notifier = Arc::new(event_bus.clone());
        Self {
            catalog: WorkCatalog::new(store.clone(), notifier.clone()),
            edges: EdgeRegistry::new(store.clone()),
            lineage: LineageGraphBuilder::new(store.clone())
                .with_depth_limit(lineage_config.max_depth),
            promotion: PromotionEngine::new(store, notifier),
            event_bus,
            lineage_config,
        }
    }
}

/// Build application router
///
/// `/health` and `/api/buildinfo` are public; only the promote route needs
/// a curator identity.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let curator_only = Router::new()
        .route("/api/works/:id/promote", post(api::promote_work))
        .layer(middleware::from_fn(api::require_curator));

    let public = Router::new()
        .route("/api/works", post(api::create_work).get(api::list_works))
        .route("/api/works/:id", get(api::get_work).delete(api::delete_work))
        .route("/api/works/:id/lineage", get(api::get_lineage))
        .route("/api/works/:id/parents", get(api::get_parents))
        .route("/api/works/:id/children", get(api::get_children))
        .route("/api/works/:id/promotions", get(api::get_promotions))
        .route("/api/edges", post(api::create_edge))
        .route("/api/events", get(api::event_stream))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes());

    Router::new()
        .merge(curator_only)
        .merge(public)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
