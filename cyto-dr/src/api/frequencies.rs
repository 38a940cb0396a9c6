//! Relative frequency endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use cyto_pipeline::analysis::{average_by_population, PopulationAverage, RelativeFrequency};
use cyto_pipeline::Analyzer;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::pagination::Page;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FrequencyQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    /// Exact sample id
    pub sample: Option<String>,
    /// Exact population id
    pub population: Option<String>,
}

fn default_page() -> i64 {
    1
}

/// GET /api/frequencies
pub async fn get_frequencies(
    State(state): State<AppState>,
    Query(query): Query<FrequencyQuery>,
) -> ApiResult<Json<Page<RelativeFrequency>>> {
    let rows = Analyzer::new(&state.store, &state.analysis)
        .data_overview()
        .await?;

    let filtered: Vec<RelativeFrequency> = rows
        .into_iter()
        .filter(|r| query.sample.as_deref().map_or(true, |s| r.sample == s))
        .filter(|r| query.population.as_deref().map_or(true, |p| r.population == p))
        .collect();

    Ok(Json(Page::from_vec(filtered, query.page)))
}

/// GET /api/frequencies/average
///
/// Mean percentage per population across all samples, highest first.
pub async fn get_average_frequencies(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PopulationAverage>>> {
    let rows = Analyzer::new(&state.store, &state.analysis)
        .data_overview()
        .await?;
    Ok(Json(average_by_population(&rows)))
}
