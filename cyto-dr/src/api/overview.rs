//! Store summary and table row counts

use axum::{extract::State, Json};
use cyto_common::db::{StoreSummary, TableInfo};

use crate::error::ApiResult;
use crate::AppState;

/// GET /api/summary
pub async fn get_summary(State(state): State<AppState>) -> ApiResult<Json<StoreSummary>> {
    Ok(Json(state.store.summary().await?))
}

/// GET /api/tables
///
/// Row count of every schema table, in schema order.
pub async fn list_tables(State(state): State<AppState>) -> ApiResult<Json<Vec<TableInfo>>> {
    Ok(Json(state.store.table_row_counts().await?))
}
