//! Relative frequency of each population within each sample

use crate::error::{PipelineError, Result};
use cyto_common::config::ZeroTotalPolicy;
use cyto_common::db::{CountRecord, Response, Sex};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// One (sample, population) row with its share of the sample total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelativeFrequency {
    pub sample: String,
    pub total_count: i64,
    pub population: String,
    pub count: i64,
    pub percentage: f64,
    pub project: String,
    pub subject: String,
    pub condition: String,
    pub treatment: String,
    pub response: Option<Response>,
    pub sex: Sex,
    pub age: Option<i64>,
    pub sample_type: String,
    pub time_from_treatment_start: i64,
}

/// Mean percentage of one population across samples
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationAverage {
    pub population: String,
    pub mean_percentage: f64,
    pub samples: usize,
}

/// Compute relative frequencies for every sample
///
/// Output is ordered by sample id, then by the order of `records` within a
/// sample. Samples whose counts sum to zero are handled per `policy`.
pub fn relative_frequencies(
    records: &[CountRecord],
    policy: ZeroTotalPolicy,
) -> Result<Vec<RelativeFrequency>> {
    let mut by_sample: BTreeMap<&str, Vec<&CountRecord>> = BTreeMap::new();
    for record in records {
        by_sample
            .entry(record.sample_id.as_str())
            .or_default()
            .push(record);
    }

    let mut rows = Vec::with_capacity(records.len());
    for (sample_id, sample_records) in by_sample {
        let total: i64 = sample_records.iter().map(|r| r.count).sum();
        if total == 0 {
            match policy {
                ZeroTotalPolicy::Skip => {
                    warn!("Skipping sample {}: total cell count is zero", sample_id);
                    continue;
                }
                ZeroTotalPolicy::Fail => {
                    return Err(PipelineError::ZeroTotal(sample_id.to_string()));
                }
                ZeroTotalPolicy::Zero => {}
            }
        }

        rows.extend(sample_records.into_iter().map(|r| RelativeFrequency {
            sample: r.sample_id.clone(),
            total_count: total,
            population: r.population_id.clone(),
            count: r.count,
            percentage: if total == 0 {
                0.0
            } else {
                r.count as f64 / total as f64 * 100.0
            },
            project: r.project_id.clone(),
            subject: r.subject_id.clone(),
            condition: r.condition.clone(),
            treatment: r.treatment.clone(),
            response: r.response,
            sex: r.sex,
            age: r.age,
            sample_type: r.sample_type.clone(),
            time_from_treatment_start: r.time_from_treatment_start,
        }));
    }

    Ok(rows)
}

/// Mean percentage per population, highest first
pub fn average_by_population(rows: &[RelativeFrequency]) -> Vec<PopulationAverage> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for row in rows {
        let entry = sums.entry(row.population.as_str()).or_insert((0.0, 0));
        entry.0 += row.percentage;
        entry.1 += 1;
    }

    let mut averages: Vec<PopulationAverage> = sums
        .into_iter()
        .map(|(population, (sum, samples))| PopulationAverage {
            population: population.to_string(),
            mean_percentage: sum / samples as f64,
            samples,
        })
        .collect();
    averages.sort_by(|a, b| b.mean_percentage.total_cmp(&a.mean_percentage));
    averages
}
