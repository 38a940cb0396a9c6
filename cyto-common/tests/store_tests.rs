//! Tests for the replace-load and read queries of the Schema Store

use cyto_common::config::BaselineFilter;
use cyto_common::db::{
    CellCount, CytometryStore, EntityBatch, PopulationVocabulary, Project, Response, Sample, Sex,
    Subject,
};

async fn fresh_store() -> CytometryStore {
    let store = CytometryStore::open_in_memory(PopulationVocabulary::default())
        .await
        .unwrap();
    store.initialize().await.unwrap();
    store
}

fn project(id: &str) -> Project {
    Project {
        project_id: id.to_string(),
        project_name: id.to_string(),
        description: "Cytometry analysis project".to_string(),
        created_date: None,
    }
}

fn subject(id: &str, project_id: &str, response: Option<Response>) -> Subject {
    Subject {
        subject_id: id.to_string(),
        project_id: project_id.to_string(),
        condition: "melanoma".to_string(),
        age: Some(57),
        sex: Sex::Female,
        treatment: "miraclib".to_string(),
        response,
    }
}

fn sample(id: &str, subject_id: &str, time: i64) -> Sample {
    Sample {
        sample_id: id.to_string(),
        subject_id: subject_id.to_string(),
        sample_type: "PBMC".to_string(),
        time_from_treatment_start: time,
        collection_date: None,
    }
}

fn counts(sample_id: &str, values: [i64; 5]) -> Vec<CellCount> {
    PopulationVocabulary::default()
        .ids()
        .zip(values)
        .map(|(population_id, count)| CellCount {
            sample_id: sample_id.to_string(),
            population_id: population_id.to_string(),
            count,
        })
        .collect()
}

fn two_sample_batch() -> EntityBatch {
    let mut cell_counts = counts("X1", [100, 200, 300, 150, 250]);
    cell_counts.extend(counts("X2", [10, 20, 30, 40, 50]));

    EntityBatch {
        projects: vec![project("P1")],
        subjects: vec![
            subject("S1", "P1", Some(Response::Yes)),
            subject("S2", "P1", Some(Response::No)),
        ],
        samples: vec![sample("X1", "S1", 0), sample("X2", "S2", 7)],
        cell_counts,
    }
}

async fn row_count(store: &CytometryStore, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_reload_and_summary() {
    let store = fresh_store().await;

    let written = store.clear_and_reload(&two_sample_batch()).await.unwrap();
    assert_eq!(written.projects, 1);
    assert_eq!(written.subjects, 2);
    assert_eq!(written.samples, 2);
    assert_eq!(written.cell_counts, 10);

    let summary = store.summary().await.unwrap();
    assert_eq!(summary.num_projects, 1);
    assert_eq!(summary.num_subjects, 2);
    assert_eq!(summary.num_samples, 2);
    assert_eq!(summary.num_conditions, 1);
    assert_eq!(summary.num_treatments, 1);
}

#[tokio::test]
async fn test_summary_of_empty_store_is_zero() {
    let store = fresh_store().await;
    let summary = store.summary().await.unwrap();
    assert_eq!(summary.num_subjects, 0);
    assert_eq!(summary.num_samples, 0);
}

#[tokio::test]
async fn test_reload_twice_replaces_rather_than_accumulates() {
    let store = fresh_store().await;
    let batch = two_sample_batch();

    store.clear_and_reload(&batch).await.unwrap();
    let first = store.count_records().await.unwrap();

    store.clear_and_reload(&batch).await.unwrap();
    let second = store.count_records().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(row_count(&store, "cell_counts").await, 10);
    assert_eq!(row_count(&store, "samples").await, 2);
    assert_eq!(row_count(&store, "cell_populations").await, 5);
}

#[tokio::test]
async fn test_duplicate_cell_count_overwrites() {
    let store = fresh_store().await;
    let mut batch = two_sample_batch();
    batch.cell_counts.push(CellCount {
        sample_id: "X1".to_string(),
        population_id: "b_cell".to_string(),
        count: 999,
    });

    store.clear_and_reload(&batch).await.unwrap();

    assert_eq!(row_count(&store, "cell_counts").await, 10);
    let count: i64 = sqlx::query_scalar(
        "SELECT count FROM cell_counts WHERE sample_id = 'X1' AND population_id = 'b_cell'",
    )
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(count, 999);
}

#[tokio::test]
async fn test_failed_reload_leaves_prior_data_intact() {
    let store = fresh_store().await;
    store.clear_and_reload(&two_sample_batch()).await.unwrap();
    let before = store.count_records().await.unwrap();

    // Sample referencing a subject that does not exist
    let mut broken = two_sample_batch();
    broken.samples.push(sample("X3", "S_MISSING", 0));

    let err = store.clear_and_reload(&broken).await.unwrap_err();
    assert!(err.is_integrity(), "Expected integrity error, got {:?}", err);

    let after = store.count_records().await.unwrap();
    assert_eq!(before, after, "Rollback should keep the previous load");
    assert_eq!(store.summary().await.unwrap().num_samples, 2);
}

#[tokio::test]
async fn test_duplicate_sample_rejected() {
    let store = fresh_store().await;
    let mut batch = two_sample_batch();
    batch.samples.push(sample("X1", "S1", 14));

    let err = store.clear_and_reload(&batch).await.unwrap_err();
    assert!(err.is_integrity());
    assert_eq!(row_count(&store, "samples").await, 0);
}

#[tokio::test]
async fn test_unknown_population_rejected() {
    let store = fresh_store().await;
    let mut batch = two_sample_batch();
    batch.cell_counts.push(CellCount {
        sample_id: "X1".to_string(),
        population_id: "neutrophil".to_string(),
        count: 5,
    });

    let err = store.clear_and_reload(&batch).await.unwrap_err();
    assert!(err.is_integrity());
}

#[tokio::test]
async fn test_count_records_join_metadata() {
    let store = fresh_store().await;
    store.clear_and_reload(&two_sample_batch()).await.unwrap();

    let records = store.count_records().await.unwrap();
    assert_eq!(records.len(), 10);

    let first = &records[0];
    assert_eq!(first.sample_id, "X1");
    assert_eq!(first.population_id, "b_cell");
    assert_eq!(first.count, 100);
    assert_eq!(first.subject_id, "S1");
    assert_eq!(first.project_id, "P1");
    assert_eq!(first.condition, "melanoma");
    assert_eq!(first.treatment, "miraclib");
    assert_eq!(first.response, Some(Response::Yes));
    assert_eq!(first.sex, Sex::Female);
    assert_eq!(first.sample_type, "PBMC");
    assert_eq!(first.time_from_treatment_start, 0);

    // Ordered by sample, then population id
    assert!(records[..5].iter().all(|r| r.sample_id == "X1"));
    let ids: Vec<&str> = records[..5].iter().map(|r| r.population_id.as_str()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[tokio::test]
async fn test_baseline_samples_filter() {
    let store = fresh_store().await;
    store.clear_and_reload(&two_sample_batch()).await.unwrap();

    let baseline = store
        .baseline_samples(&BaselineFilter::default())
        .await
        .unwrap();
    assert_eq!(baseline.len(), 1);
    assert_eq!(baseline[0].sample_id, "X1");
    assert_eq!(baseline[0].response, Some(Response::Yes));

    let other_condition = BaselineFilter {
        condition: Some("carcinoma".to_string()),
        ..BaselineFilter::default()
    };
    assert!(store
        .baseline_samples(&other_condition)
        .await
        .unwrap()
        .is_empty());

    let any_condition = BaselineFilter {
        time_offset: 7,
        condition: None,
        treatment: None,
        ..BaselineFilter::default()
    };
    let day_seven = store.baseline_samples(&any_condition).await.unwrap();
    assert_eq!(day_seven.len(), 1);
    assert_eq!(day_seven[0].sample_id, "X2");
}

#[tokio::test]
async fn test_table_row_counts() {
    let store = fresh_store().await;
    store.clear_and_reload(&two_sample_batch()).await.unwrap();

    let tables = store.table_row_counts().await.unwrap();
    let lookup = |name: &str| {
        tables
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.row_count)
            .unwrap()
    };
    assert_eq!(lookup("projects"), 1);
    assert_eq!(lookup("subjects"), 2);
    assert_eq!(lookup("samples"), 2);
    assert_eq!(lookup("cell_populations"), 5);
    assert_eq!(lookup("cell_counts"), 10);
}

#[tokio::test]
async fn test_created_date_defaults_to_today() {
    let store = fresh_store().await;
    store.clear_and_reload(&two_sample_batch()).await.unwrap();

    let created: Option<String> =
        sqlx::query_scalar("SELECT created_date FROM projects WHERE project_id = 'P1'")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert!(created.is_some());
}
