//! Raw schema table browsing with pagination and sorting

use axum::{
    extract::{Path, Query, State},
    Json,
};
use cyto_common::db::SCHEMA_TABLES;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, ValueRef};

use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, PAGE_SIZE};
use crate::AppState;

/// Query parameters for table viewing
#[derive(Debug, Deserialize)]
pub struct TableQuery {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,

    /// Column to sort by
    pub sort: Option<String>,

    /// "asc" or "desc"
    #[serde(default = "default_order")]
    pub order: String,
}

fn default_page() -> i64 {
    1
}

fn default_order() -> String {
    "asc".to_string()
}

#[derive(Debug, Serialize)]
pub struct TableDataResponse {
    pub table_name: String,
    pub total_rows: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// GET /api/table/:name
///
/// Only the five schema tables can be browsed. Without `sort` rows come in
/// rowid order.
pub async fn get_table_data(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
    Query(query): Query<TableQuery>,
) -> ApiResult<Json<TableDataResponse>> {
    // Table and column names are interpolated into SQL, so both are checked
    // against the schema first
    if !SCHEMA_TABLES.contains(&table_name.as_str()) {
        return Err(ApiError::NotFound(format!("Unknown table: {}", table_name)));
    }
    let pool = state.store.pool();

    let total_rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table_name))
        .fetch_one(pool)
        .await?;
    let pagination = calculate_pagination(total_rows, query.page);

    let columns = table_columns(pool, &table_name).await?;
    let mut sql = format!("SELECT * FROM {}", table_name);
    if let Some(sort_column) = &query.sort {
        if !columns.contains(sort_column) {
            return Err(ApiError::BadRequest(format!("Invalid column: {}", sort_column)));
        }
        let order = if query.order.eq_ignore_ascii_case("desc") {
            "DESC"
        } else {
            "ASC"
        };
        sql.push_str(&format!(" ORDER BY {} {}", sort_column, order));
    } else {
        sql.push_str(" ORDER BY rowid");
    }
    sql.push_str(&format!(" LIMIT {} OFFSET {}", PAGE_SIZE, pagination.offset));

    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    let columns = match rows.first() {
        Some(first) => first.columns().iter().map(|c| c.name().to_string()).collect(),
        None => columns,
    };

    Ok(Json(TableDataResponse {
        table_name,
        total_rows,
        page: pagination.page,
        page_size: PAGE_SIZE,
        total_pages: pagination.total_pages,
        columns,
        rows: rows.iter().map(row_to_json).collect(),
    }))
}

/// Column names of a table, in declaration order
async fn table_columns(pool: &SqlitePool, table_name: &str) -> ApiResult<Vec<String>> {
    // PRAGMA table_info returns: (cid, name, type, notnull, dflt_value, pk)
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table_name))
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| row.try_get::<String, _>(1).map_err(ApiError::from))
        .collect()
}

/// Convert one SQLite row to JSON values, trying integer, real, then text
fn row_to_json(row: &SqliteRow) -> Vec<Value> {
    (0..row.len())
        .map(|i| match row.try_get_raw(i) {
            Ok(raw) if raw.is_null() => Value::Null,
            Ok(_) => row
                .try_get::<i64, _>(i)
                .map(|v| json!(v))
                .or_else(|_| row.try_get::<f64, _>(i).map(|v| json!(v)))
                .or_else(|_| row.try_get::<String, _>(i).map(Value::String))
                .unwrap_or(Value::Null),
            Err(_) => Value::Null,
        })
        .collect()
}
