//! Database models

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subject sex, stored as `M` / `F`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
        }
    }
}

impl FromStr for Sex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "M" => Ok(Self::Male),
            "F" => Ok(Self::Female),
            other => Err(Error::InvalidInput(format!(
                "sex must be 'M' or 'F', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treatment response label, stored as `yes` / `no`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
    Yes,
    No,
}

impl Response {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }

    /// Parse an optional label; an empty cell means "no response recorded"
    pub fn parse_optional(s: &str) -> Result<Option<Self>> {
        if s.trim().is_empty() {
            Ok(None)
        } else {
            s.parse().map(Some)
        }
    }
}

impl FromStr for Response {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            other => Err(Error::InvalidInput(format!(
                "response must be 'yes', 'no' or empty, got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,
    pub project_name: String,
    pub description: String,
    /// None lets the database default (CURRENT_DATE) apply
    pub created_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub subject_id: String,
    pub project_id: String,
    pub condition: String,
    pub age: Option<i64>,
    pub sex: Sex,
    pub treatment: String,
    pub response: Option<Response>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub sample_id: String,
    pub subject_id: String,
    pub sample_type: String,
    /// Days relative to treatment start; negative before treatment
    pub time_from_treatment_start: i64,
    pub collection_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPopulation {
    pub population_id: String,
    pub population_name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCount {
    pub sample_id: String,
    pub population_id: String,
    pub count: i64,
}

/// Entity sets committed together by a replace-load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityBatch {
    pub projects: Vec<Project>,
    pub subjects: Vec<Subject>,
    pub samples: Vec<Sample>,
    pub cell_counts: Vec<CellCount>,
}

/// Rows written by a replace-load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReloadCounts {
    pub projects: usize,
    pub subjects: usize,
    pub samples: usize,
    pub cell_counts: usize,
}

/// Aggregate counts across projects, subjects and samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub num_projects: i64,
    pub num_subjects: i64,
    pub num_samples: i64,
    pub num_conditions: i64,
    pub num_treatments: i64,
}

/// One cell count joined with its sample and subject metadata
#[derive(Debug, Clone, PartialEq)]
pub struct CountRecord {
    pub sample_id: String,
    pub subject_id: String,
    pub project_id: String,
    pub condition: String,
    pub treatment: String,
    pub response: Option<Response>,
    pub sex: Sex,
    pub age: Option<i64>,
    pub sample_type: String,
    pub time_from_treatment_start: i64,
    pub population_id: String,
    pub count: i64,
}

/// One sample matched by a baseline query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineSample {
    pub project_id: String,
    pub subject_id: String,
    pub sample_id: String,
    pub condition: String,
    pub treatment: String,
    pub response: Option<Response>,
    pub sex: Sex,
    pub age: Option<i64>,
}

/// Row count of one schema table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub row_count: i64,
}
