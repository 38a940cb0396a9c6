//! Cohort extraction over relative frequency rows

use super::frequency::RelativeFrequency;
use cyto_common::config::CohortFilter;
use cyto_common::db::Response;
use serde::Serialize;
use std::collections::BTreeMap;

/// Sample counts of an extracted cohort
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CohortCounts {
    pub samples: usize,
    pub responders: usize,
    pub non_responders: usize,
}

/// Whether a row belongs to the cohort
pub fn matches(filter: &CohortFilter, row: &RelativeFrequency) -> bool {
    let text_matches = |expected: &Option<String>, actual: &str| {
        expected.as_deref().map_or(true, |e| e == actual)
    };

    text_matches(&filter.condition, &row.condition)
        && text_matches(&filter.treatment, &row.treatment)
        && text_matches(&filter.sample_type, &row.sample_type)
        && filter
            .time_from_treatment_start
            .map_or(true, |t| t == row.time_from_treatment_start)
        && (!filter.require_response || row.response.is_some())
}

/// Rows matching the filter, in input order
pub fn extract_cohort(rows: &[RelativeFrequency], filter: &CohortFilter) -> Vec<RelativeFrequency> {
    rows.iter().filter(|r| matches(filter, r)).cloned().collect()
}

/// Count distinct samples in a cohort, split by response label
pub fn cohort_counts(cohort: &[RelativeFrequency]) -> CohortCounts {
    let samples: BTreeMap<&str, Option<Response>> = cohort
        .iter()
        .map(|r| (r.sample.as_str(), r.response))
        .collect();

    CohortCounts {
        samples: samples.len(),
        responders: samples
            .values()
            .filter(|r| **r == Some(Response::Yes))
            .count(),
        non_responders: samples
            .values()
            .filter(|r| **r == Some(Response::No))
            .count(),
    }
}
