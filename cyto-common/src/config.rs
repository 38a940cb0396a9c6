//! Configuration loading and config file resolution
//!
//! Bootstrap configuration comes from a TOML file. Every field has a built-in
//! default, so a missing file is not an error unless it was asked for
//! explicitly. Binaries layer command-line arguments (and their environment
//! variables) on top of what is loaded here.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `CYTO_CONFIG` environment variable
//! 3. `<config_dir>/cytometry/config.toml`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CYTO_CONFIG";

/// Top-level configuration shared by the pipeline and the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Wide-format cell count CSV
    pub input_path: PathBuf,

    /// Directory receiving the derived tables, plot and summary
    pub output_dir: PathBuf,

    pub logging: LoggingConfig,
    pub analysis: AnalysisConfig,
    pub dashboard: DashboardConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("cytometry_data.db"),
            input_path: PathBuf::from("data/cell-count.csv"),
            output_dir: PathBuf::from("output"),
            logging: LoggingConfig::default(),
            analysis: AnalysisConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Statistical test used for the responder comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonTest {
    /// Two-sided Mann-Whitney U (rank based)
    #[default]
    MannWhitney,
    /// Two-sided Welch's unequal-variance t-test
    WelchT,
}

impl ComparisonTest {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MannWhitney => "mann_whitney",
            Self::WelchT => "welch_t",
        }
    }
}

/// What to do with a sample whose population counts sum to zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroTotalPolicy {
    /// Drop the sample from the frequency table and log a warning
    #[default]
    Skip,
    /// Keep the sample with every percentage set to zero
    Zero,
    /// Abort the analysis
    Fail,
}

/// Metadata predicate selecting the comparison cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortFilter {
    pub condition: Option<String>,
    pub treatment: Option<String>,
    pub sample_type: Option<String>,
    pub time_from_treatment_start: Option<i64>,
    /// Exclude subjects without a response label
    pub require_response: bool,
}

impl Default for CohortFilter {
    fn default() -> Self {
        Self {
            condition: Some("melanoma".to_string()),
            treatment: Some("miraclib".to_string()),
            sample_type: Some("PBMC".to_string()),
            time_from_treatment_start: None,
            require_response: true,
        }
    }
}

impl CohortFilter {
    /// Filter that accepts every row
    pub fn any() -> Self {
        Self {
            condition: None,
            treatment: None,
            sample_type: None,
            time_from_treatment_start: None,
            require_response: false,
        }
    }
}

/// Selection of baseline samples for the baseline summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineFilter {
    pub time_offset: i64,
    pub sample_type: String,
    pub condition: Option<String>,
    pub treatment: Option<String>,
}

impl Default for BaselineFilter {
    fn default() -> Self {
        Self {
            time_offset: 0,
            sample_type: "PBMC".to_string(),
            condition: Some("melanoma".to_string()),
            treatment: Some("miraclib".to_string()),
        }
    }
}

/// Analysis constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub test: ComparisonTest,
    /// Significance threshold applied to raw p-values
    pub alpha: f64,
    pub zero_total: ZeroTotalPolicy,
    pub cohort: CohortFilter,
    pub baseline: BaselineFilter,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            test: ComparisonTest::default(),
            alpha: 0.05,
            zero_total: ZeroTotalPolicy::default(),
            cohort: CohortFilter::default(),
            baseline: BaselineFilter::default(),
        }
    }
}

/// Dashboard service bind address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read config {} failed: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration following the resolution priority
    ///
    /// An explicitly requested file (argument or environment) must exist.
    /// The platform default file is optional: when absent, built-in defaults
    /// are used and a warning is logged.
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_config_path(cli_arg) {
            info!("Loading configuration from {}", path.display());
            return Self::from_file(&path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            _ => {
                warn!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values no analysis can run with
    pub fn validate(&self) -> Result<()> {
        let alpha = self.analysis.alpha;
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(Error::Config(format!(
                "analysis.alpha must lie in (0, 1), got {}",
                alpha
            )));
        }
        if self.analysis.baseline.sample_type.trim().is_empty() {
            return Err(Error::Config(
                "analysis.baseline.sample_type must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Config file named on the command line or in `CYTO_CONFIG`
pub fn explicit_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    std::env::var(CONFIG_ENV_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// Platform config file location (`~/.config/cytometry/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cytometry").join("config.toml"))
}
