//! Loader: wide-format cell count CSV → normalized entity sets → Schema Store
//!
//! Each input row is one sample. Required columns are validated before any
//! row is parsed, and every row is parsed before the store is touched, so an
//! input error never mutates the database.

use crate::error::{PipelineError, Result};
use chrono::{NaiveDate, Utc};
use cyto_common::db::{
    CellCount, CytometryStore, EntityBatch, PopulationVocabulary, Project, Response, Sample, Sex,
    Subject,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Metadata columns every input file must carry, besides one count column per
/// population
pub const METADATA_COLUMNS: [&str; 10] = [
    "project",
    "subject",
    "condition",
    "age",
    "sex",
    "treatment",
    "response",
    "sample",
    "sample_type",
    "time_from_treatment_start",
];

/// Description given to every project; the input format carries none
pub const PROJECT_DESCRIPTION: &str = "Cytometry analysis project";

/// One parsed input row
#[derive(Debug, Clone, PartialEq)]
pub struct InputRow {
    /// Line in the source file, for error context
    pub line: u64,
    pub project: String,
    pub subject: String,
    pub condition: String,
    pub age: Option<i64>,
    pub sex: Sex,
    pub treatment: String,
    pub response: Option<Response>,
    pub sample: String,
    pub sample_type: String,
    pub time_from_treatment_start: i64,
    /// Counts in vocabulary order
    pub counts: Vec<i64>,
}

/// Outcome of a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub source_rows: usize,
    pub cell_count_records: usize,
    pub projects: usize,
    pub subjects: usize,
    pub samples: usize,
}

/// All required columns, metadata first, then population ids
pub fn required_columns(vocabulary: &PopulationVocabulary) -> Vec<String> {
    METADATA_COLUMNS
        .iter()
        .copied()
        .chain(vocabulary.ids())
        .map(str::to_string)
        .collect()
}

/// Parse the input file
pub fn read_rows(path: &Path, vocabulary: &PopulationVocabulary) -> Result<Vec<InputRow>> {
    if !path.is_file() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }
    let file = std::fs::File::open(path)?;
    read_rows_from_reader(file, vocabulary)
}

/// Parse CSV input from any reader
pub fn read_rows_from_reader<R: Read>(
    reader: R,
    vocabulary: &PopulationVocabulary,
) -> Result<Vec<InputRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let index: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

    let required = required_columns(vocabulary);
    let missing: Vec<String> = required
        .iter()
        .filter(|column| !index.contains_key(column.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::MissingColumns(missing));
    }

    let column = |name: &str| index[name];
    let count_columns: Vec<(&str, usize)> = vocabulary.ids().map(|id| (id, column(id))).collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |name: &str| record.get(column(name)).unwrap_or("");

        let malformed = |message: String| PipelineError::MalformedRow { line, message };
        let text = |name: &str| -> Result<String> {
            let value = field(name);
            if value.is_empty() {
                Err(malformed(format!("column '{}' is empty", name)))
            } else {
                Ok(value.to_string())
            }
        };
        let integer = |name: &str, value: &str| -> Result<i64> {
            value.parse::<i64>().map_err(|_| {
                malformed(format!(
                    "column '{}': expected an integer, got '{}'",
                    name, value
                ))
            })
        };

        let age = match field("age") {
            "" => None,
            value => Some(integer("age", value)?),
        };
        let sex = field("sex")
            .parse::<Sex>()
            .map_err(|e| malformed(e.to_string()))?;
        let response =
            Response::parse_optional(field("response")).map_err(|e| malformed(e.to_string()))?;
        let time_from_treatment_start = integer(
            "time_from_treatment_start",
            field("time_from_treatment_start"),
        )?;

        let mut counts = Vec::with_capacity(count_columns.len());
        for &(population_id, idx) in &count_columns {
            let value = record.get(idx).unwrap_or("");
            let count = integer(population_id, value)?;
            if count < 0 {
                return Err(malformed(format!(
                    "column '{}': count must not be negative, got {}",
                    population_id, count
                )));
            }
            counts.push(count);
        }

        rows.push(InputRow {
            line,
            project: text("project")?,
            subject: text("subject")?,
            condition: text("condition")?,
            age,
            sex,
            treatment: text("treatment")?,
            response,
            sample: text("sample")?,
            sample_type: text("sample_type")?,
            time_from_treatment_start,
            counts,
        });
    }

    debug!("Parsed {} input rows", rows.len());
    Ok(rows)
}

/// Reshape parsed rows into the four entity sets
///
/// Projects and subjects are deduplicated by identifier in first-seen order.
/// A subject id repeated with different metadata is rejected. Samples are
/// one per row; counts are reshaped wide-to-long.
pub fn normalize(
    rows: &[InputRow],
    vocabulary: &PopulationVocabulary,
    created_date: NaiveDate,
) -> Result<EntityBatch> {
    let mut batch = EntityBatch::default();
    let mut seen_projects = HashSet::new();
    let mut subject_index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        if seen_projects.insert(row.project.as_str()) {
            batch.projects.push(Project {
                project_id: row.project.clone(),
                project_name: row.project.clone(),
                description: PROJECT_DESCRIPTION.to_string(),
                created_date: Some(created_date),
            });
        }

        let subject = Subject {
            subject_id: row.subject.clone(),
            project_id: row.project.clone(),
            condition: row.condition.clone(),
            age: row.age,
            sex: row.sex,
            treatment: row.treatment.clone(),
            response: row.response,
        };
        match subject_index.get(row.subject.as_str()) {
            Some(&i) if batch.subjects[i] != subject => {
                return Err(PipelineError::MalformedRow {
                    line: row.line,
                    message: format!(
                        "subject '{}' appears with conflicting metadata",
                        row.subject
                    ),
                });
            }
            Some(_) => {}
            None => {
                subject_index.insert(row.subject.as_str(), batch.subjects.len());
                batch.subjects.push(subject);
            }
        }

        batch.samples.push(Sample {
            sample_id: row.sample.clone(),
            subject_id: row.subject.clone(),
            sample_type: row.sample_type.clone(),
            time_from_treatment_start: row.time_from_treatment_start,
            collection_date: None,
        });

        batch
            .cell_counts
            .extend(vocabulary.ids().zip(&row.counts).map(|(population_id, &count)| {
                CellCount {
                    sample_id: row.sample.clone(),
                    population_id: population_id.to_string(),
                    count,
                }
            }));
    }

    Ok(batch)
}

/// Loads input files into a Schema Store
pub struct Loader<'a> {
    store: &'a CytometryStore,
}

impl<'a> Loader<'a> {
    pub fn new(store: &'a CytometryStore) -> Self {
        Self { store }
    }

    /// Parse, normalize and replace-load one input file
    pub async fn load(&self, path: &Path) -> Result<LoadReport> {
        let vocabulary = self.store.vocabulary();

        let rows = read_rows(path, vocabulary)?;
        info!("Loaded {} rows from {}", rows.len(), path.display());

        let batch = normalize(&rows, vocabulary, Utc::now().date_naive())?;
        let written = self.store.clear_and_reload(&batch).await?;

        let report = LoadReport {
            source_rows: rows.len(),
            cell_count_records: written.cell_counts,
            projects: written.projects,
            subjects: written.subjects,
            samples: written.samples,
        };
        info!(
            "Successfully loaded {} samples with {} cell count records",
            report.source_rows, report.cell_count_records
        );
        Ok(report)
    }
}
