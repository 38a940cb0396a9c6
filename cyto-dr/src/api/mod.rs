//! HTTP API handlers for cyto-dr

pub mod analysis;
pub mod frequencies;
pub mod health;
pub mod overview;
pub mod table;

pub use analysis::{get_baseline, get_boxplot, get_cohort, get_statistics};
pub use frequencies::{get_average_frequencies, get_frequencies};
pub use health::health_routes;
pub use overview::{get_summary, list_tables};
pub use table::get_table_data;
