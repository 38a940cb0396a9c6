//! Output artifacts of one pipeline run

use crate::analysis::AnalysisReport;
use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

pub const DATA_OVERVIEW_FILE: &str = "part2_data_overview.csv";
pub const COHORT_DATA_FILE: &str = "part3_cohort_data.csv";
pub const STATISTICAL_RESULTS_FILE: &str = "part3_statistical_results.csv";
pub const BOXPLOT_FILE: &str = "part3_boxplot.svg";
pub const BASELINE_FILE: &str = "part4_baseline_analysis.txt";

/// Writes analysis results into one directory
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write all artifacts, creating the directory if needed
    ///
    /// Returns the written paths. A table with no rows is written as an empty
    /// file.
    pub fn write_all(&self, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.dir)?;

        let written = vec![
            self.write_csv(DATA_OVERVIEW_FILE, &report.overview)?,
            self.write_csv(COHORT_DATA_FILE, &report.cohort)?,
            self.write_csv(STATISTICAL_RESULTS_FILE, &report.comparisons)?,
            self.write_boxplot(report)?,
            self.write_baseline(report)?,
        ];

        info!("Wrote {} output files to {}", written.len(), self.dir.display());
        Ok(written)
    }

    fn write_csv<T: Serialize>(&self, name: &str, rows: &[T]) -> Result<PathBuf> {
        let path = self.dir.join(name);
        let mut writer = csv::Writer::from_path(&path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        debug!("Wrote {} rows to {}", rows.len(), path.display());
        Ok(path)
    }

    fn write_boxplot(&self, report: &AnalysisReport) -> Result<PathBuf> {
        let path = self.dir.join(BOXPLOT_FILE);
        svg::save(&path, &report.boxplot)
            .map_err(|e| PipelineError::Render(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }

    fn write_baseline(&self, report: &AnalysisReport) -> Result<PathBuf> {
        let path = self.dir.join(BASELINE_FILE);
        fs::write(&path, report.baseline.render_text())?;
        Ok(path)
    }
}
