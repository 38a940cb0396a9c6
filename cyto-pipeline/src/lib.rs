//! # Cytometry Pipeline
//!
//! Loads a wide-format cell count CSV into the Schema Store, then derives
//! relative frequencies, a responder comparison, a boxplot and a baseline
//! summary.

pub mod analysis;
pub mod error;
pub mod loader;
pub mod output;

pub use analysis::{AnalysisReport, Analyzer};
pub use error::{PipelineError, Result};
pub use loader::{LoadReport, Loader};
pub use output::OutputWriter;
