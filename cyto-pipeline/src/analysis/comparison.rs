//! Responder vs non-responder comparison per population

use super::frequency::RelativeFrequency;
use super::stats::{self, TestOutcome};
use crate::error::{PipelineError, Result};
use cyto_common::config::ComparisonTest;
use cyto_common::db::{PopulationVocabulary, Response};
use serde::Serialize;
use tracing::debug;

/// Comparison result for one population
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationComparison {
    pub population: String,
    pub test: ComparisonTest,
    pub statistic: f64,
    pub p_value: f64,
    pub effect_size: f64,
    pub significant: bool,
    pub responders_mean: f64,
    pub responders_std: Option<f64>,
    pub non_responders_mean: f64,
    pub non_responders_std: Option<f64>,
    pub n_responders: usize,
    pub n_non_responders: usize,
}

/// Compare responder and non-responder percentages for every population
///
/// Populations are reported in vocabulary order; a population with no cohort
/// rows is left out. Rows without a response label take no part.
pub fn compare_groups(
    cohort: &[RelativeFrequency],
    vocabulary: &PopulationVocabulary,
    test: ComparisonTest,
    alpha: f64,
) -> Result<Vec<PopulationComparison>> {
    if cohort.is_empty() {
        return Err(PipelineError::NoData("cohort is empty".to_string()));
    }

    let has = |label: Response| cohort.iter().any(|r| r.response == Some(label));
    if !has(Response::Yes) || !has(Response::No) {
        return Err(PipelineError::NoData(
            "cohort needs both responders and non-responders".to_string(),
        ));
    }

    let mut results = Vec::new();
    for population in vocabulary.ids() {
        let group = |label: Response| -> Vec<f64> {
            cohort
                .iter()
                .filter(|r| r.population == population && r.response == Some(label))
                .map(|r| r.percentage)
                .collect()
        };
        let responders = group(Response::Yes);
        let non_responders = group(Response::No);

        if responders.is_empty() && non_responders.is_empty() {
            debug!("No cohort rows for population {}", population);
            continue;
        }
        if responders.is_empty() || non_responders.is_empty() {
            return Err(PipelineError::NoData(format!(
                "population {} is missing one response group",
                population
            )));
        }

        let TestOutcome { statistic, p_value } = match test {
            ComparisonTest::MannWhitney => stats::mann_whitney_u(&responders, &non_responders)?,
            ComparisonTest::WelchT => stats::welch_t_test(&responders, &non_responders)?,
        };
        let n_total = responders.len() + non_responders.len();

        results.push(PopulationComparison {
            population: population.to_string(),
            test,
            statistic,
            p_value,
            effect_size: stats::effect_size(p_value, n_total),
            significant: p_value < alpha,
            responders_mean: stats::mean(&responders).unwrap_or(0.0),
            responders_std: stats::sample_std(&responders),
            non_responders_mean: stats::mean(&non_responders).unwrap_or(0.0),
            non_responders_std: stats::sample_std(&non_responders),
            n_responders: responders.len(),
            n_non_responders: non_responders.len(),
        });
    }

    Ok(results)
}
