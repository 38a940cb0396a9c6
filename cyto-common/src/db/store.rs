//! Schema Store: replace-load and read queries over the normalized schema

use super::init::{self, SCHEMA_TABLES};
use super::models::{
    BaselineSample, CellPopulation, CountRecord, EntityBatch, ReloadCounts, Response, StoreSummary,
    TableInfo,
};
use super::populations::PopulationVocabulary;
use crate::config::BaselineFilter;
use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

/// Owner of the single database connection and the population vocabulary
///
/// Call [`CytometryStore::initialize`] before the first load. Release the
/// connection with [`CytometryStore::close`]; dropping the store releases it
/// as well.
#[derive(Debug)]
pub struct CytometryStore {
    pool: SqlitePool,
    vocabulary: PopulationVocabulary,
}

impl CytometryStore {
    /// Open or create a store backed by a database file
    pub async fn open(db_path: &Path, vocabulary: PopulationVocabulary) -> Result<Self> {
        let pool = init::connect(db_path).await?;
        Ok(Self { pool, vocabulary })
    }

    /// Open a fresh private in-memory store
    pub async fn open_in_memory(vocabulary: PopulationVocabulary) -> Result<Self> {
        let pool = init::connect_in_memory().await?;
        Ok(Self { pool, vocabulary })
    }

    /// Open an existing store read-only, taking the vocabulary from the database
    pub async fn open_readonly(db_path: &Path) -> Result<Self> {
        let pool = init::connect_readonly(db_path).await?;
        let populations = fetch_populations(&pool).await?;
        if populations.is_empty() {
            return Err(Error::NotFound(format!(
                "cell population vocabulary in {}",
                db_path.display()
            )));
        }
        let vocabulary = PopulationVocabulary::new(populations)?;
        Ok(Self { pool, vocabulary })
    }

    /// Create tables and indexes if absent and upsert the vocabulary
    pub async fn initialize(&self) -> Result<()> {
        init::initialize_schema(&self.pool, self.vocabulary.populations()).await
    }

    pub fn vocabulary(&self) -> &PopulationVocabulary {
        &self.vocabulary
    }

    /// Connection for ad hoc read queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Release the connection
    pub async fn close(self) {
        self.pool.close().await;
        debug!("Database connection closed");
    }

    /// Replace all derived rows with `batch` in one transaction
    ///
    /// Deletes cell counts, samples, subjects and projects (children first),
    /// then inserts the batch parents first. Any failure rolls the whole
    /// operation back and leaves the previous contents in place. Cell counts
    /// are inserted with replace semantics, so a repeated (sample, population)
    /// pair keeps the last count.
    pub async fn clear_and_reload(&self, batch: &EntityBatch) -> Result<ReloadCounts> {
        let mut tx = self.pool.begin().await?;

        for table in ["cell_counts", "samples", "subjects", "projects"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }

        for project in &batch.projects {
            sqlx::query(
                r#"
                INSERT INTO projects (project_id, project_name, description, created_date)
                VALUES (?, ?, ?, COALESCE(?, CURRENT_DATE))
                "#,
            )
            .bind(&project.project_id)
            .bind(&project.project_name)
            .bind(&project.description)
            .bind(project.created_date)
            .execute(&mut *tx)
            .await?;
        }

        for subject in &batch.subjects {
            sqlx::query(
                r#"
                INSERT INTO subjects (subject_id, project_id, condition, age, sex, treatment, response)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&subject.subject_id)
            .bind(&subject.project_id)
            .bind(&subject.condition)
            .bind(subject.age)
            .bind(subject.sex.as_str())
            .bind(&subject.treatment)
            .bind(subject.response.map(|r| r.as_str()))
            .execute(&mut *tx)
            .await?;
        }

        for sample in &batch.samples {
            sqlx::query(
                r#"
                INSERT INTO samples (sample_id, subject_id, sample_type, time_from_treatment_start, collection_date)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&sample.sample_id)
            .bind(&sample.subject_id)
            .bind(&sample.sample_type)
            .bind(sample.time_from_treatment_start)
            .bind(sample.collection_date)
            .execute(&mut *tx)
            .await?;
        }

        for cell_count in &batch.cell_counts {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO cell_counts (sample_id, population_id, count)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(&cell_count.sample_id)
            .bind(&cell_count.population_id)
            .bind(cell_count.count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let counts = ReloadCounts {
            projects: batch.projects.len(),
            subjects: batch.subjects.len(),
            samples: batch.samples.len(),
            cell_counts: batch.cell_counts.len(),
        };
        info!(
            "Replace-load committed: {} projects, {} subjects, {} samples, {} cell counts",
            counts.projects, counts.subjects, counts.samples, counts.cell_counts
        );
        Ok(counts)
    }

    /// Distinct projects, subjects, samples, conditions and treatments
    pub async fn summary(&self) -> Result<StoreSummary> {
        let (num_projects, num_subjects, num_samples, num_conditions, num_treatments) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    COUNT(DISTINCT p.project_id),
                    COUNT(DISTINCT s.subject_id),
                    COUNT(DISTINCT sa.sample_id),
                    COUNT(DISTINCT s.condition),
                    COUNT(DISTINCT s.treatment)
                FROM projects p
                JOIN subjects s ON p.project_id = s.project_id
                JOIN samples sa ON s.subject_id = sa.subject_id
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreSummary {
            num_projects,
            num_subjects,
            num_samples,
            num_conditions,
            num_treatments,
        })
    }

    /// Every cell count with its sample and subject metadata
    ///
    /// Ordered by sample, then population identifier.
    pub async fn count_records(&self) -> Result<Vec<CountRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT
                cc.sample_id,
                sa.subject_id,
                s.project_id,
                s.condition,
                s.treatment,
                s.response,
                s.sex,
                s.age,
                sa.sample_type,
                sa.time_from_treatment_start,
                cc.population_id,
                cc.count
            FROM cell_counts cc
            JOIN samples sa ON cc.sample_id = sa.sample_id
            JOIN subjects s ON sa.subject_id = s.subject_id
            ORDER BY cc.sample_id, cc.population_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(count_record_from_row).collect()
    }

    /// Samples at the baseline time offset and sample type, optionally
    /// restricted by condition and treatment
    pub async fn baseline_samples(&self, filter: &BaselineFilter) -> Result<Vec<BaselineSample>> {
        let rows = sqlx::query(
            r#"
            SELECT
                s.project_id,
                s.subject_id,
                sa.sample_id,
                s.condition,
                s.treatment,
                s.response,
                s.sex,
                s.age
            FROM subjects s
            JOIN samples sa ON s.subject_id = sa.subject_id
            WHERE sa.time_from_treatment_start = ?
              AND sa.sample_type = ?
              AND (? IS NULL OR s.condition = ?)
              AND (? IS NULL OR s.treatment = ?)
            ORDER BY sa.sample_id
            "#,
        )
        .bind(filter.time_offset)
        .bind(&filter.sample_type)
        .bind(&filter.condition)
        .bind(&filter.condition)
        .bind(&filter.treatment)
        .bind(&filter.treatment)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(BaselineSample {
                    project_id: row.try_get("project_id")?,
                    subject_id: row.try_get("subject_id")?,
                    sample_id: row.try_get("sample_id")?,
                    condition: row.try_get("condition")?,
                    treatment: row.try_get("treatment")?,
                    response: parse_response(row)?,
                    sex: row.try_get::<String, _>("sex")?.parse()?,
                    age: row.try_get("age")?,
                })
            })
            .collect()
    }

    /// Reference vocabulary rows as stored
    pub async fn populations(&self) -> Result<Vec<CellPopulation>> {
        fetch_populations(&self.pool).await
    }

    /// Row count for every schema table, in schema order
    pub async fn table_row_counts(&self) -> Result<Vec<TableInfo>> {
        let mut tables = Vec::with_capacity(SCHEMA_TABLES.len());

        for name in SCHEMA_TABLES {
            let row_count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", name))
                .fetch_one(&self.pool)
                .await?;
            tables.push(TableInfo {
                name: name.to_string(),
                row_count,
            });
        }

        Ok(tables)
    }
}

async fn fetch_populations(pool: &SqlitePool) -> Result<Vec<CellPopulation>> {
    let rows = sqlx::query_as::<_, (String, Option<String>, Option<String>)>(
        "SELECT population_id, population_name, description FROM cell_populations ORDER BY rowid",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(population_id, name, description)| CellPopulation {
            population_name: name.unwrap_or_else(|| population_id.clone()),
            description: description.unwrap_or_default(),
            population_id,
        })
        .collect())
}

fn parse_response(row: &SqliteRow) -> Result<Option<Response>> {
    let response: Option<String> = row.try_get("response")?;
    response.as_deref().map(str::parse::<Response>).transpose()
}

fn count_record_from_row(row: &SqliteRow) -> Result<CountRecord> {
    Ok(CountRecord {
        sample_id: row.try_get("sample_id")?,
        subject_id: row.try_get("subject_id")?,
        project_id: row.try_get("project_id")?,
        condition: row.try_get("condition")?,
        treatment: row.try_get("treatment")?,
        response: parse_response(row)?,
        sex: row.try_get::<String, _>("sex")?.parse()?,
        age: row.try_get("age")?,
        sample_type: row.try_get("sample_type")?,
        time_from_treatment_start: row.try_get("time_from_treatment_start")?,
        population_id: row.try_get("population_id")?,
        count: row.try_get("count")?,
    })
}
