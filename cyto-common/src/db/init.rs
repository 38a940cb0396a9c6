//! Database connection and schema initialization
//!
//! Every connection helper returns a pool capped at a single connection: the
//! store owns exactly one SQLite connection for its lifetime, and an
//! in-memory database only exists inside that connection.

use super::models::CellPopulation;
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Tables owned by the schema, children after parents
pub const SCHEMA_TABLES: [&str; 5] = [
    "projects",
    "subjects",
    "samples",
    "cell_populations",
    "cell_counts",
];

fn single_connection() -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}

/// Open (creating if needed) a database file with foreign keys enforced
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = single_connection().connect_with(options).await?;

    if newly_created {
        info!("Created new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    Ok(pool)
}

/// Open a private in-memory database with foreign keys enforced
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = single_connection().connect_with(options).await?;
    debug!("Opened in-memory database");
    Ok(pool)
}

/// Open an existing database file in read-only mode
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(Error::NotFound(format!(
            "database {} (run cyto-pipeline first to create it)",
            db_path.display()
        )));
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .read_only(true)
        .foreign_keys(true);
    let pool = single_connection().connect_with(options).await?;
    info!("Opened database read-only: {}", db_path.display());
    Ok(pool)
}

/// Create tables and indexes if absent, then upsert the population vocabulary
///
/// Idempotent: safe to run against an already initialized database.
pub async fn initialize_schema(pool: &SqlitePool, populations: &[CellPopulation]) -> Result<()> {
    create_projects_table(pool).await?;
    create_subjects_table(pool).await?;
    create_samples_table(pool).await?;
    create_cell_populations_table(pool).await?;
    create_cell_counts_table(pool).await?;

    seed_cell_populations(pool, populations).await?;

    info!("Database schema initialized");
    Ok(())
}

async fn create_projects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            project_id TEXT PRIMARY KEY,
            project_name TEXT,
            description TEXT,
            created_date DATE DEFAULT CURRENT_DATE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_subjects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            subject_id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            condition TEXT NOT NULL,
            age INTEGER,
            sex TEXT NOT NULL CHECK (sex IN ('M', 'F')),
            treatment TEXT NOT NULL,
            response TEXT CHECK (response IS NULL OR response IN ('yes', 'no')),
            FOREIGN KEY (project_id) REFERENCES projects(project_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_subjects_condition_treatment ON subjects(condition, treatment)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_samples_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS samples (
            sample_id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            sample_type TEXT NOT NULL,
            time_from_treatment_start INTEGER NOT NULL,
            collection_date DATE,
            FOREIGN KEY (subject_id) REFERENCES subjects(subject_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_samples_time_type ON samples(time_from_treatment_start, sample_type)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_cell_populations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cell_populations (
            population_id TEXT PRIMARY KEY,
            population_name TEXT,
            description TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_cell_counts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cell_counts (
            sample_id TEXT NOT NULL,
            population_id TEXT NOT NULL,
            count INTEGER NOT NULL CHECK (count >= 0),
            PRIMARY KEY (sample_id, population_id),
            FOREIGN KEY (sample_id) REFERENCES samples(sample_id),
            FOREIGN KEY (population_id) REFERENCES cell_populations(population_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cell_counts_sample ON cell_counts(sample_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Upsert the reference vocabulary; existing rows are never deleted
///
/// Updates in place: INSERT OR REPLACE would delete a population row that
/// cell counts still reference.
async fn seed_cell_populations(pool: &SqlitePool, populations: &[CellPopulation]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for population in populations {
        sqlx::query(
            r#"
            INSERT INTO cell_populations (population_id, population_name, description)
            VALUES (?, ?, ?)
            ON CONFLICT(population_id) DO UPDATE SET
                population_name = excluded.population_name,
                description = excluded.description
            "#,
        )
        .bind(&population.population_id)
        .bind(&population.population_name)
        .bind(&population.description)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    debug!("Seeded {} cell populations", populations.len());
    Ok(())
}
