//! Cell population reference vocabulary
//!
//! The vocabulary decides which count columns the loader requires and which
//! rows `initialize()` seeds into `cell_populations`.

use super::models::CellPopulation;
use crate::{Error, Result};
use std::collections::HashSet;

/// Populations tracked by the standard cytometry panel
const DEFAULT_POPULATIONS: [(&str, &str, &str); 5] = [
    ("b_cell", "B Cell", "B lymphocytes"),
    ("cd8_t_cell", "CD8+ T Cell", "Cytotoxic T lymphocytes"),
    ("cd4_t_cell", "CD4+ T Cell", "Helper T lymphocytes"),
    ("nk_cell", "NK Cell", "Natural killer cells"),
    ("monocyte", "Monocyte", "Monocytes/macrophages"),
];

/// Ordered set of cell populations with unique identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationVocabulary {
    populations: Vec<CellPopulation>,
}

impl PopulationVocabulary {
    pub fn new(populations: Vec<CellPopulation>) -> Result<Self> {
        if populations.is_empty() {
            return Err(Error::InvalidInput(
                "population vocabulary must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for population in &populations {
            if population.population_id.trim().is_empty() {
                return Err(Error::InvalidInput(
                    "population identifier must not be empty".to_string(),
                ));
            }
            if !seen.insert(population.population_id.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate population identifier '{}'",
                    population.population_id
                )));
            }
        }

        Ok(Self { populations })
    }

    pub fn populations(&self) -> &[CellPopulation] {
        &self.populations
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.populations.iter().map(|p| p.population_id.as_str())
    }

    pub fn contains(&self, population_id: &str) -> bool {
        self.ids().any(|id| id == population_id)
    }

    /// Position of a population in vocabulary order
    pub fn position(&self, population_id: &str) -> Option<usize> {
        self.ids().position(|id| id == population_id)
    }

    pub fn len(&self) -> usize {
        self.populations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.populations.is_empty()
    }
}

impl Default for PopulationVocabulary {
    fn default() -> Self {
        Self {
            populations: DEFAULT_POPULATIONS
                .iter()
                .map(|(id, name, description)| CellPopulation {
                    population_id: id.to_string(),
                    population_name: name.to_string(),
                    description: description.to_string(),
                })
                .collect(),
        }
    }
}
