//! Analysis Engine
//!
//! Reads the Schema Store and derives:
//! - relative frequencies for every sample
//! - the configured cohort and its responder comparison
//! - the boxplot of that comparison
//! - the baseline summary

pub mod baseline;
pub mod cohort;
pub mod comparison;
pub mod frequency;
pub mod plot;
pub mod stats;

pub use baseline::{summarize_baseline, BaselineGroup, BaselineSummary, PopulationMean};
pub use cohort::{cohort_counts, extract_cohort, CohortCounts};
pub use comparison::{compare_groups, PopulationComparison};
pub use frequency::{
    average_by_population, relative_frequencies, PopulationAverage, RelativeFrequency,
};
pub use plot::render_boxplot;
pub use stats::TestOutcome;

use crate::error::{PipelineError, Result};
use cyto_common::config::{AnalysisConfig, CohortFilter};
use cyto_common::CytometryStore;
use svg::Document;
use tracing::{info, warn};

/// Everything one analysis run produces
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub overview: Vec<RelativeFrequency>,
    pub cohort: Vec<RelativeFrequency>,
    pub cohort_counts: CohortCounts,
    pub comparisons: Vec<PopulationComparison>,
    pub baseline: BaselineSummary,
    pub boxplot: Document,
}

/// Analysis over one store with one configuration
pub struct Analyzer<'a> {
    store: &'a CytometryStore,
    config: &'a AnalysisConfig,
}

impl<'a> Analyzer<'a> {
    pub fn new(store: &'a CytometryStore, config: &'a AnalysisConfig) -> Self {
        Self { store, config }
    }

    /// Relative frequency of every population in every sample
    pub async fn data_overview(&self) -> Result<Vec<RelativeFrequency>> {
        let records = self.store.count_records().await?;
        relative_frequencies(&records, self.config.zero_total)
    }

    /// Frequency rows of the configured cohort
    pub async fn cohort(&self) -> Result<Vec<RelativeFrequency>> {
        let overview = self.data_overview().await?;
        Ok(extract_cohort(&overview, &self.config.cohort))
    }

    /// Run the configured test on a cohort
    pub fn compare(&self, cohort: &[RelativeFrequency]) -> Result<Vec<PopulationComparison>> {
        compare_groups(
            cohort,
            self.store.vocabulary(),
            self.config.test,
            self.config.alpha,
        )
    }

    /// Baseline summary, reusing already computed frequencies
    pub async fn baseline_summary(
        &self,
        overview: &[RelativeFrequency],
    ) -> Result<BaselineSummary> {
        let samples = self.store.baseline_samples(&self.config.baseline).await?;
        Ok(summarize_baseline(
            &self.config.baseline,
            &samples,
            overview,
            self.store.vocabulary(),
        ))
    }

    pub fn boxplot(
        &self,
        cohort: &[RelativeFrequency],
        comparisons: &[PopulationComparison],
    ) -> Document {
        render_boxplot(
            cohort,
            comparisons,
            self.store.vocabulary(),
            &plot_title(&self.config.cohort),
        )
    }

    /// Run every analysis
    ///
    /// A cohort with nothing to compare, or too few samples for the configured
    /// test, yields an empty comparison table rather than failing the run.
    pub async fn run(&self) -> Result<AnalysisReport> {
        let overview = self.data_overview().await?;
        info!("Computed {} relative frequency rows", overview.len());

        let cohort = extract_cohort(&overview, &self.config.cohort);
        let counts = cohort_counts(&cohort);
        info!(
            "Cohort has {} samples ({} responders, {} non-responders)",
            counts.samples, counts.responders, counts.non_responders
        );

        let comparisons = match self.compare(&cohort) {
            Ok(comparisons) => comparisons,
            Err(PipelineError::NoData(reason) | PipelineError::InsufficientData(reason)) => {
                warn!("Skipping statistical comparison: {}", reason);
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        for c in comparisons.iter().filter(|c| c.significant) {
            info!(
                "{}: {} statistic {:.2}, p = {:.4}",
                c.population,
                c.test.as_str(),
                c.statistic,
                c.p_value
            );
        }

        let baseline = self.baseline_summary(&overview).await?;
        info!(
            "Baseline: {} samples from {} subjects",
            baseline.total_samples, baseline.unique_subjects
        );

        let boxplot = self.boxplot(&cohort, &comparisons);

        Ok(AnalysisReport {
            overview,
            cohort,
            cohort_counts: counts,
            comparisons,
            baseline,
            boxplot,
        })
    }
}

/// Title naming the cohort selection
pub fn plot_title(filter: &CohortFilter) -> String {
    let parts: Vec<&str> = [&filter.condition, &filter.treatment, &filter.sample_type]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .collect();
    if parts.is_empty() {
        "Cell Population Frequencies: Responders vs Non-Responders".to_string()
    } else {
        format!(
            "Cell Population Frequencies: Responders vs Non-Responders ({})",
            parts.join(" / ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_title() {
        assert_eq!(
            plot_title(&CohortFilter::default()),
            "Cell Population Frequencies: Responders vs Non-Responders (melanoma / miraclib / PBMC)"
        );
        assert_eq!(
            plot_title(&CohortFilter::any()),
            "Cell Population Frequencies: Responders vs Non-Responders"
        );
    }
}
