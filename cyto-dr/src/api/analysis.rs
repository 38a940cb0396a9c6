//! Cohort, statistics, boxplot and baseline endpoints
//!
//! Every request recomputes from the store with the service's analysis
//! configuration.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use cyto_common::config::{CohortFilter, ComparisonTest};
use cyto_pipeline::analysis::{cohort_counts, BaselineSummary, CohortCounts, PopulationComparison};
use cyto_pipeline::{Analyzer, PipelineError};
use serde::Serialize;
use tracing::debug;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CohortResponse {
    pub filter: CohortFilter,
    #[serde(flatten)]
    pub counts: CohortCounts,
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub test: ComparisonTest,
    pub alpha: f64,
    pub results: Vec<PopulationComparison>,
}

/// GET /api/cohort
pub async fn get_cohort(State(state): State<AppState>) -> ApiResult<Json<CohortResponse>> {
    let cohort = Analyzer::new(&state.store, &state.analysis).cohort().await?;
    Ok(Json(CohortResponse {
        filter: state.analysis.cohort.clone(),
        counts: cohort_counts(&cohort),
    }))
}

/// GET /api/statistics
///
/// 404 with `NO_DATA` when the cohort lacks one of the response groups.
pub async fn get_statistics(
    State(state): State<AppState>,
) -> ApiResult<Json<StatisticsResponse>> {
    let analyzer = Analyzer::new(&state.store, &state.analysis);
    let cohort = analyzer.cohort().await?;
    let results = analyzer.compare(&cohort)?;

    Ok(Json(StatisticsResponse {
        test: state.analysis.test,
        alpha: state.analysis.alpha,
        results,
    }))
}

/// GET /api/cohort/boxplot.svg
///
/// Rendered even when there is nothing to compare; significance markers are
/// then left out.
pub async fn get_boxplot(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let analyzer = Analyzer::new(&state.store, &state.analysis);
    let cohort = analyzer.cohort().await?;
    let comparisons = match analyzer.compare(&cohort) {
        Ok(comparisons) => comparisons,
        Err(PipelineError::NoData(reason)) => {
            debug!("Boxplot without comparison: {}", reason);
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    let document = analyzer.boxplot(&cohort, &comparisons);
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], document.to_string()))
}

/// GET /api/baseline
pub async fn get_baseline(State(state): State<AppState>) -> ApiResult<Json<BaselineSummary>> {
    let analyzer = Analyzer::new(&state.store, &state.analysis);
    let overview = analyzer.data_overview().await?;
    Ok(Json(analyzer.baseline_summary(&overview).await?))
}
