//! cyto-dr library - read-only dashboard data service
//!
//! Serves the Schema Store and the analyses derived from it as JSON (and the
//! boxplot as SVG). Never writes to the database.

use std::sync::Arc;

use axum::Router;
use cyto_common::config::AnalysisConfig;
use cyto_common::CytometryStore;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod pagination;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Store opened read-only
    pub store: Arc<CytometryStore>,
    /// Cohort, test and baseline settings used by the analysis endpoints
    pub analysis: Arc<AnalysisConfig>,
}

impl AppState {
    pub fn new(store: CytometryStore, analysis: AnalysisConfig) -> Self {
        Self {
            store: Arc::new(store),
            analysis: Arc::new(analysis),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let data = Router::new()
        .route("/api/summary", get(api::get_summary))
        .route("/api/tables", get(api::list_tables))
        .route("/api/table/:name", get(api::get_table_data))
        .route("/api/frequencies", get(api::get_frequencies))
        .route("/api/frequencies/average", get(api::get_average_frequencies));

    let analysis = Router::new()
        .route("/api/cohort", get(api::get_cohort))
        .route("/api/cohort/boxplot.svg", get(api::get_boxplot))
        .route("/api/statistics", get(api::get_statistics))
        .route("/api/baseline", get(api::get_baseline));

    Router::new()
        .merge(data)
        .merge(analysis)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
