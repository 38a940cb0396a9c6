//! Descriptive summary of baseline samples

use super::frequency::RelativeFrequency;
use cyto_common::config::BaselineFilter;
use cyto_common::db::{BaselineSample, PopulationVocabulary};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write;

/// Mean percentage of one population within a baseline group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationMean {
    pub population: String,
    pub mean_percentage: f64,
}

/// Aggregates for one (condition, treatment) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineGroup {
    pub condition: String,
    pub treatment: String,
    pub samples: usize,
    pub subjects: usize,
    pub mean_age: Option<f64>,
    pub mean_percentages: Vec<PopulationMean>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineSummary {
    pub filter: BaselineFilter,
    pub total_samples: usize,
    pub unique_subjects: usize,
    pub samples_by_project: BTreeMap<String, usize>,
    /// Distinct subjects per response label; subjects without one count as `unknown`
    pub subjects_by_response: BTreeMap<String, usize>,
    pub subjects_by_sex: BTreeMap<String, usize>,
    pub groups: Vec<BaselineGroup>,
}

/// Summarize the baseline samples selected by `filter`
///
/// `frequencies` supplies per-sample percentages; baseline samples with no
/// frequency rows (e.g. skipped zero-total samples) still count towards the
/// sample and subject tallies.
pub fn summarize_baseline(
    filter: &BaselineFilter,
    samples: &[BaselineSample],
    frequencies: &[RelativeFrequency],
    vocabulary: &PopulationVocabulary,
) -> BaselineSummary {
    let mut samples_by_project = BTreeMap::new();
    for sample in samples {
        *samples_by_project
            .entry(sample.project_id.clone())
            .or_insert(0) += 1;
    }

    // One entry per subject; metadata is per subject so the first sample wins
    let mut subjects: BTreeMap<&str, &BaselineSample> = BTreeMap::new();
    for sample in samples {
        subjects.entry(sample.subject_id.as_str()).or_insert(sample);
    }

    let mut subjects_by_response = BTreeMap::new();
    let mut subjects_by_sex = BTreeMap::new();
    for subject in subjects.values() {
        let response = subject
            .response
            .map_or("unknown", |r| r.as_str())
            .to_string();
        *subjects_by_response.entry(response).or_insert(0) += 1;
        *subjects_by_sex
            .entry(subject.sex.as_str().to_string())
            .or_insert(0) += 1;
    }

    let mut percentages: HashMap<(&str, &str), f64> = HashMap::new();
    for row in frequencies {
        percentages.insert((row.sample.as_str(), row.population.as_str()), row.percentage);
    }

    let mut grouped: BTreeMap<(&str, &str), Vec<&BaselineSample>> = BTreeMap::new();
    for sample in samples {
        grouped
            .entry((sample.condition.as_str(), sample.treatment.as_str()))
            .or_default()
            .push(sample);
    }

    let groups = grouped
        .into_iter()
        .map(|((condition, treatment), members)| {
            let mut ages: BTreeMap<&str, Option<i64>> = BTreeMap::new();
            for member in &members {
                ages.insert(member.subject_id.as_str(), member.age);
            }
            let known_ages: Vec<f64> = ages.values().flatten().map(|a| *a as f64).collect();

            let mean_percentages = vocabulary
                .ids()
                .filter_map(|population| {
                    let values: Vec<f64> = members
                        .iter()
                        .filter_map(|m| {
                            percentages
                                .get(&(m.sample_id.as_str(), population))
                                .copied()
                        })
                        .collect();
                    super::stats::mean(&values).map(|mean_percentage| PopulationMean {
                        population: population.to_string(),
                        mean_percentage,
                    })
                })
                .collect();

            BaselineGroup {
                condition: condition.to_string(),
                treatment: treatment.to_string(),
                samples: members.len(),
                subjects: ages.len(),
                mean_age: super::stats::mean(&known_ages),
                mean_percentages,
            }
        })
        .collect();

    BaselineSummary {
        filter: filter.clone(),
        total_samples: samples.len(),
        unique_subjects: subjects.len(),
        samples_by_project,
        subjects_by_response,
        subjects_by_sex,
        groups,
    }
}

impl BaselineSummary {
    /// Flat text report
    pub fn render_text(&self) -> String {
        let describe = |value: &Option<String>| value.clone().unwrap_or_else(|| "any".to_string());
        let title = format!(
            "Baseline Analysis: condition {}, treatment {}, sample type {}, time offset {}",
            describe(&self.filter.condition),
            describe(&self.filter.treatment),
            self.filter.sample_type,
            self.filter.time_offset
        );

        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = writeln!(out, "{}", title);
        let _ = writeln!(out, "{}\n", "=".repeat(title.len()));
        let _ = writeln!(out, "Total samples: {}", self.total_samples);
        let _ = writeln!(out, "Unique subjects: {}", self.unique_subjects);

        let mut section = |heading: &str, counts: &BTreeMap<String, usize>| {
            let _ = writeln!(out, "\n{}:", heading);
            for (key, count) in counts {
                let _ = writeln!(out, "  {}: {}", key, count);
            }
        };
        section("Samples by project", &self.samples_by_project);
        section("Subjects by response", &self.subjects_by_response);
        section("Subjects by sex", &self.subjects_by_sex);

        for group in &self.groups {
            let _ = writeln!(out, "\nGroup {} / {}:", group.condition, group.treatment);
            let _ = writeln!(out, "  Samples: {}", group.samples);
            let _ = writeln!(out, "  Subjects: {}", group.subjects);
            match group.mean_age {
                Some(age) => {
                    let _ = writeln!(out, "  Mean age: {:.1}", age);
                }
                None => {
                    let _ = writeln!(out, "  Mean age: n/a");
                }
            }
            for mean in &group.mean_percentages {
                let _ = writeln!(out, "  {}: {:.2}%", mean.population, mean.mean_percentage);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cyto_common::db::{Response, Sex};

    fn baseline(
        project: &str,
        subject: &str,
        sample: &str,
        response: Option<Response>,
        sex: Sex,
        age: Option<i64>,
    ) -> BaselineSample {
        BaselineSample {
            project_id: project.to_string(),
            subject_id: subject.to_string(),
            sample_id: sample.to_string(),
            condition: "melanoma".to_string(),
            treatment: "miraclib".to_string(),
            response,
            sex,
            age,
        }
    }

    fn frequency(sample: &str, population: &str, percentage: f64) -> RelativeFrequency {
        RelativeFrequency {
            sample: sample.to_string(),
            total_count: 100,
            population: population.to_string(),
            count: percentage as i64,
            percentage,
            project: "P1".to_string(),
            subject: "S".to_string(),
            condition: "melanoma".to_string(),
            treatment: "miraclib".to_string(),
            response: None,
            sex: Sex::Male,
            age: None,
            sample_type: "PBMC".to_string(),
            time_from_treatment_start: 0,
        }
    }

    fn fixture() -> BaselineSummary {
        let samples = vec![
            baseline("P1", "S1", "X1", Some(Response::Yes), Sex::Female, Some(60)),
            baseline("P1", "S2", "X2", Some(Response::No), Sex::Male, Some(40)),
            baseline("P2", "S3", "X3", None, Sex::Male, None),
            // Second baseline sample of S1
            baseline("P2", "S1", "X4", Some(Response::Yes), Sex::Female, Some(60)),
        ];
        let frequencies = vec![
            frequency("X1", "b_cell", 10.0),
            frequency("X2", "b_cell", 20.0),
            frequency("X3", "b_cell", 30.0),
            frequency("X4", "b_cell", 40.0),
            frequency("X1", "nk_cell", 50.0),
        ];
        summarize_baseline(
            &BaselineFilter::default(),
            &samples,
            &frequencies,
            &PopulationVocabulary::default(),
        )
    }

    #[test]
    fn test_tallies() {
        let summary = fixture();

        assert_eq!(summary.total_samples, 4);
        assert_eq!(summary.unique_subjects, 3);
        assert_eq!(summary.samples_by_project["P1"], 2);
        assert_eq!(summary.samples_by_project["P2"], 2);
        assert_eq!(summary.subjects_by_response["yes"], 1);
        assert_eq!(summary.subjects_by_response["no"], 1);
        assert_eq!(summary.subjects_by_response["unknown"], 1);
        assert_eq!(summary.subjects_by_sex["M"], 2);
        assert_eq!(summary.subjects_by_sex["F"], 1);
    }

    #[test]
    fn test_group_means() {
        let summary = fixture();
        assert_eq!(summary.groups.len(), 1);

        let group = &summary.groups[0];
        assert_eq!(group.samples, 4);
        assert_eq!(group.subjects, 3);
        assert_relative_eq!(group.mean_age.unwrap(), 50.0);

        assert_eq!(group.mean_percentages.len(), 2);
        assert_eq!(group.mean_percentages[0].population, "b_cell");
        assert_relative_eq!(group.mean_percentages[0].mean_percentage, 25.0);
        assert_eq!(group.mean_percentages[1].population, "nk_cell");
        assert_relative_eq!(group.mean_percentages[1].mean_percentage, 50.0);
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize_baseline(
            &BaselineFilter::default(),
            &[],
            &[],
            &PopulationVocabulary::default(),
        );
        assert_eq!(summary.total_samples, 0);
        assert!(summary.groups.is_empty());

        let text = summary.render_text();
        assert!(text.contains("Total samples: 0"));
    }

    #[test]
    fn test_render_text() {
        let text = fixture().render_text();

        assert!(text.starts_with(
            "Baseline Analysis: condition melanoma, treatment miraclib, sample type PBMC, time offset 0"
        ));
        assert!(text.contains("Unique subjects: 3"));
        assert!(text.contains("Samples by project:\n  P1: 2\n  P2: 2\n"));
        assert!(text.contains("Subjects by sex:\n  F: 1\n  M: 2\n"));
        assert!(text.contains("Group melanoma / miraclib:"));
        assert!(text.contains("  Mean age: 50.0"));
        assert!(text.contains("  b_cell: 25.00%"));
    }
}
