//! End-to-end tests: CSV → Schema Store → analysis → output files

use approx::assert_relative_eq;
use cyto_common::config::{AnalysisConfig, CohortFilter, ComparisonTest};
use cyto_common::{CytometryStore, PopulationVocabulary};
use cyto_pipeline::analysis::{cohort_counts, compare_groups};
use cyto_pipeline::output::{
    BASELINE_FILE, BOXPLOT_FILE, COHORT_DATA_FILE, DATA_OVERVIEW_FILE, STATISTICAL_RESULTS_FILE,
};
use cyto_pipeline::{Analyzer, Loader, OutputWriter, PipelineError};
use std::path::PathBuf;
use tempfile::TempDir;

const HEADER: &str = "project,subject,condition,age,sex,treatment,response,sample,sample_type,time_from_treatment_start,b_cell,cd8_t_cell,cd4_t_cell,nk_cell,monocyte";

fn write_csv(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("cell-count.csv");
    std::fs::write(&path, format!("{}\n{}", HEADER, body)).unwrap();
    path
}

async fn fresh_store() -> CytometryStore {
    let store = CytometryStore::open_in_memory(PopulationVocabulary::default())
        .await
        .unwrap();
    store.initialize().await.unwrap();
    store
}

/// Six melanoma/miraclib PBMC baseline samples, three per response group,
/// plus one carcinoma sample and one late melanoma sample
const COHORT_ROWS: &str = "\
P1,S1,melanoma,57,F,miraclib,yes,X1,PBMC,0,100,200,300,150,250
P1,S2,melanoma,61,M,miraclib,yes,X2,PBMC,0,120,180,310,140,250
P1,S3,melanoma,45,F,miraclib,yes,X3,PBMC,0,110,190,290,160,250
P2,S4,melanoma,70,M,miraclib,no,X4,PBMC,0,300,100,200,150,250
P2,S5,melanoma,66,M,miraclib,no,X5,PBMC,0,320,110,190,130,250
P2,S6,melanoma,52,F,miraclib,no,X6,PBMC,0,310,90,210,140,250
P2,S7,carcinoma,48,F,phauximab,,X7,WB,0,1,1,1,1,1
P1,S1,melanoma,57,F,miraclib,yes,X8,PBMC,7,100,100,100,100,100
";

#[tokio::test]
async fn test_single_sample_percentages() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "P1,S1,melanoma,57,F,drugA,yes,X1,PBMC,0,100,200,300,150,250\n");
    let store = fresh_store().await;

    let report = Loader::new(&store).load(&csv).await.unwrap();
    assert_eq!(report.source_rows, 1);
    assert_eq!(report.cell_count_records, 5);
    assert_eq!(report.projects, 1);

    let summary = store.summary().await.unwrap();
    assert_eq!(summary.num_projects, 1);
    assert_eq!(summary.num_subjects, 1);
    assert_eq!(summary.num_samples, 1);

    let config = AnalysisConfig::default();
    let overview = Analyzer::new(&store, &config).data_overview().await.unwrap();
    assert_eq!(overview.len(), 5);

    let expected = [
        ("b_cell", 10.0),
        ("cd8_t_cell", 20.0),
        ("cd4_t_cell", 30.0),
        ("nk_cell", 15.0),
        ("monocyte", 25.0),
    ];
    for (population, percentage) in expected {
        let row = overview.iter().find(|r| r.population == population).unwrap();
        assert_eq!(row.sample, "X1");
        assert_eq!(row.total_count, 1000);
        assert_relative_eq!(row.percentage, percentage, epsilon = 1e-9);
    }
}

#[tokio::test]
async fn test_missing_column_leaves_store_empty() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("no-sex.csv");
    std::fs::write(
        &csv,
        "project,subject,condition,age,treatment,response,sample,sample_type,time_from_treatment_start,b_cell,cd8_t_cell,cd4_t_cell,nk_cell,monocyte\n\
         P1,S1,melanoma,57,drugA,yes,X1,PBMC,0,100,200,300,150,250\n",
    )
    .unwrap();
    let store = fresh_store().await;

    let err = Loader::new(&store).load(&csv).await.unwrap_err();
    match err {
        PipelineError::MissingColumns(columns) => assert_eq!(columns, vec!["sex".to_string()]),
        other => panic!("Expected MissingColumns, got {:?}", other),
    }
    assert_eq!(store.summary().await.unwrap().num_subjects, 0);
}

#[tokio::test]
async fn test_failed_load_keeps_previous_data() {
    let dir = TempDir::new().unwrap();
    let store = fresh_store().await;

    let good = write_csv(&dir, COHORT_ROWS);
    Loader::new(&store).load(&good).await.unwrap();
    let before = store.count_records().await.unwrap();

    let bad = write_csv(&dir, "P1,S1,melanoma,57,F,miraclib,yes,X1,PBMC,zero,1,2,3,4,5\n");
    let err = Loader::new(&store).load(&bad).await.unwrap_err();
    assert!(matches!(err, PipelineError::MalformedRow { line: 2, .. }));

    assert_eq!(store.count_records().await.unwrap(), before);
}

#[tokio::test]
async fn test_missing_input_file() {
    let store = fresh_store().await;
    let err = Loader::new(&store)
        .load(std::path::Path::new("/nonexistent/cell-count.csv"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingInput(_)));
}

#[tokio::test]
async fn test_reload_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, COHORT_ROWS);
    let store = fresh_store().await;
    let loader = Loader::new(&store);

    let first_report = loader.load(&csv).await.unwrap();
    let first = store.count_records().await.unwrap();
    let second_report = loader.load(&csv).await.unwrap();
    let second = store.count_records().await.unwrap();

    assert_eq!(first_report, second_report);
    assert_eq!(first, second);
    assert_eq!(second.len(), 8 * 5);

    let summary = store.summary().await.unwrap();
    assert_eq!(summary.num_projects, 2);
    assert_eq!(summary.num_subjects, 7);
    assert_eq!(summary.num_samples, 8);
    assert_eq!(summary.num_conditions, 2);
    assert_eq!(summary.num_treatments, 2);
}

#[tokio::test]
async fn test_two_subject_comparison() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(
        &dir,
        "P1,S1,melanoma,57,F,miraclib,yes,X1,PBMC,0,100,200,300,150,250\n\
         P1,S2,melanoma,62,M,miraclib,no,X2,PBMC,0,300,100,200,250,150\n",
    );
    let store = fresh_store().await;
    Loader::new(&store).load(&csv).await.unwrap();

    let config = AnalysisConfig::default();
    let analyzer = Analyzer::new(&store, &config);
    let cohort = analyzer.cohort().await.unwrap();
    assert_eq!(cohort.len(), 10);

    let results = analyzer.compare(&cohort).unwrap();
    assert_eq!(results.len(), 5);
    for result in &results {
        assert!((0.0..=1.0).contains(&result.p_value), "{:?}", result);
        assert!(result.statistic.is_finite(), "{:?}", result);
    }
}

#[tokio::test]
async fn test_identical_groups_policy() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(
        &dir,
        "P1,S1,melanoma,57,F,miraclib,yes,X1,PBMC,0,100,100,100,100,100\n\
         P1,S2,melanoma,58,F,miraclib,yes,X2,PBMC,0,100,100,100,100,100\n\
         P1,S3,melanoma,59,M,miraclib,no,X3,PBMC,0,100,100,100,100,100\n\
         P1,S4,melanoma,60,M,miraclib,no,X4,PBMC,0,100,100,100,100,100\n",
    );
    let store = fresh_store().await;
    Loader::new(&store).load(&csv).await.unwrap();

    for test in [ComparisonTest::MannWhitney, ComparisonTest::WelchT] {
        let config = AnalysisConfig {
            test,
            ..AnalysisConfig::default()
        };
        let analyzer = Analyzer::new(&store, &config);
        let cohort = analyzer.cohort().await.unwrap();
        let results = analyzer.compare(&cohort).unwrap();

        assert_eq!(results.len(), 5);
        for result in &results {
            assert_eq!(result.p_value, 1.0, "{:?}", result);
            assert!(!result.significant);
        }
    }
}

#[tokio::test]
async fn test_cohort_selection() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, COHORT_ROWS);
    let store = fresh_store().await;
    Loader::new(&store).load(&csv).await.unwrap();

    let config = AnalysisConfig::default();
    let cohort = Analyzer::new(&store, &config).cohort().await.unwrap();
    let counts = cohort_counts(&cohort);
    // X7 is carcinoma; X8 is a melanoma PBMC sample at day 7, still in the cohort
    assert_eq!(counts.samples, 7);
    assert_eq!(counts.responders, 4);
    assert_eq!(counts.non_responders, 3);

    let baseline_only = AnalysisConfig {
        cohort: CohortFilter {
            time_from_treatment_start: Some(0),
            ..CohortFilter::default()
        },
        ..AnalysisConfig::default()
    };
    let cohort = Analyzer::new(&store, &baseline_only).cohort().await.unwrap();
    assert_eq!(cohort_counts(&cohort).samples, 6);

    let results = compare_groups(
        &cohort,
        store.vocabulary(),
        ComparisonTest::MannWhitney,
        0.05,
    )
    .unwrap();
    let b_cell = results.iter().find(|r| r.population == "b_cell").unwrap();
    // Responders all sit at 10-12 % B cells, non-responders at 30-32 %
    assert_relative_eq!(b_cell.statistic, 0.0);
    assert_relative_eq!(b_cell.p_value, 0.1, epsilon = 1e-12);
    assert!(b_cell.responders_mean < b_cell.non_responders_mean);
}

#[tokio::test]
async fn test_baseline_summary() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, COHORT_ROWS);
    let store = fresh_store().await;
    Loader::new(&store).load(&csv).await.unwrap();

    let config = AnalysisConfig::default();
    let analyzer = Analyzer::new(&store, &config);
    let overview = analyzer.data_overview().await.unwrap();
    let baseline = analyzer.baseline_summary(&overview).await.unwrap();

    assert_eq!(baseline.total_samples, 6);
    assert_eq!(baseline.unique_subjects, 6);
    assert_eq!(baseline.samples_by_project["P1"], 3);
    assert_eq!(baseline.samples_by_project["P2"], 3);
    assert_eq!(baseline.subjects_by_response["yes"], 3);
    assert_eq!(baseline.subjects_by_response["no"], 3);
    assert_eq!(baseline.groups.len(), 1);
    assert_eq!(baseline.groups[0].mean_percentages.len(), 5);
}

#[tokio::test]
async fn test_run_writes_all_outputs() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, COHORT_ROWS);
    let store = fresh_store().await;
    Loader::new(&store).load(&csv).await.unwrap();

    let config = AnalysisConfig::default();
    let report = Analyzer::new(&store, &config).run().await.unwrap();
    assert_eq!(report.overview.len(), 40);
    assert_eq!(report.comparisons.len(), 5);

    let out_dir = dir.path().join("output").join("nested");
    let written = OutputWriter::new(&out_dir).write_all(&report).unwrap();
    assert_eq!(written.len(), 5);
    for name in [
        DATA_OVERVIEW_FILE,
        COHORT_DATA_FILE,
        STATISTICAL_RESULTS_FILE,
        BOXPLOT_FILE,
        BASELINE_FILE,
    ] {
        assert!(out_dir.join(name).is_file(), "{} not written", name);
    }

    let overview = std::fs::read_to_string(out_dir.join(DATA_OVERVIEW_FILE)).unwrap();
    assert!(overview.starts_with("sample,total_count,population,count,percentage,"));
    assert_eq!(overview.lines().count(), 41);

    let stats = std::fs::read_to_string(out_dir.join(STATISTICAL_RESULTS_FILE)).unwrap();
    assert!(stats.starts_with("population,test,statistic,p_value,"));
    assert!(stats.contains("mann_whitney"));

    let svg = std::fs::read_to_string(out_dir.join(BOXPLOT_FILE)).unwrap();
    assert!(svg.contains("<svg"));

    let baseline = std::fs::read_to_string(out_dir.join(BASELINE_FILE)).unwrap();
    assert!(baseline.contains("Total samples: 6"));
}

#[tokio::test]
async fn test_run_with_empty_cohort_still_writes() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "P2,S7,carcinoma,48,F,phauximab,,X7,WB,0,1,1,1,1,1\n");
    let store = fresh_store().await;
    Loader::new(&store).load(&csv).await.unwrap();

    let config = AnalysisConfig::default();
    let report = Analyzer::new(&store, &config).run().await.unwrap();
    assert!(report.cohort.is_empty());
    assert!(report.comparisons.is_empty());
    assert_eq!(report.baseline.total_samples, 0);

    let written = OutputWriter::new(dir.path().join("out"))
        .write_all(&report)
        .unwrap();
    assert_eq!(written.len(), 5);
}

#[tokio::test]
async fn test_run_with_single_responder_under_welch_still_writes() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(
        &dir,
        "P1,S1,melanoma,57,F,miraclib,yes,X1,PBMC,0,100,200,300,150,250\n\
         P2,S4,melanoma,70,M,miraclib,no,X4,PBMC,0,300,100,200,150,250\n\
         P2,S5,melanoma,66,M,miraclib,no,X5,PBMC,0,320,110,190,130,250\n",
    );
    let store = fresh_store().await;
    Loader::new(&store).load(&csv).await.unwrap();

    let config = AnalysisConfig {
        test: ComparisonTest::WelchT,
        ..AnalysisConfig::default()
    };
    let analyzer = Analyzer::new(&store, &config);

    // Welch needs two values per group
    let cohort = analyzer.cohort().await.unwrap();
    assert!(matches!(
        analyzer.compare(&cohort),
        Err(PipelineError::InsufficientData(_))
    ));

    let report = analyzer.run().await.unwrap();
    assert_eq!(report.overview.len(), 15);
    assert_eq!(report.cohort_counts.responders, 1);
    assert!(report.comparisons.is_empty());
    assert_eq!(report.baseline.total_samples, 3);

    let out_dir = dir.path().join("out");
    let written = OutputWriter::new(&out_dir).write_all(&report).unwrap();
    assert_eq!(written.len(), 5);
    let baseline = std::fs::read_to_string(out_dir.join(BASELINE_FILE)).unwrap();
    assert!(baseline.contains("Total samples: 3"));
}
