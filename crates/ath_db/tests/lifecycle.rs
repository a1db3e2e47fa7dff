use std::collections::BTreeMap;

use ath_db::{AthDb, DbError, SampleFilter};
use ath_ids::UploadId;
use ath_protocol::{
    DateInterval, GroupStats, NumMissingValues, PlotDescriptor, Report, SampleStatus, TimesScalar,
};
use chrono::NaiveDate;
use tempfile::TempDir;

fn report() -> Report {
    let scalar = TimesScalar {
        review_time: 25.0,
        merge_time: 42.5,
        total_time: 67.5,
    };
    let stats = GroupStats {
        mean: scalar,
        mode: scalar,
        median: scalar,
        count: 4,
    };
    Report {
        total_num_observations: 4,
        teams: vec!["A".to_string(), "B".to_string()],
        date_interval: DateInterval {
            begin: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 1, 4).unwrap(),
        },
        stats,
        per_team: BTreeMap::from([("A".to_string(), stats), ("B".to_string(), stats)]),
        num_prs_without_review: 1,
        num_prs_without_ci: 1,
        num_missing_values: NumMissingValues::default(),
    }
}

fn plots(n: usize) -> Vec<PlotDescriptor> {
    (0..n)
        .map(|i| PlotDescriptor {
            name: format!("plot_{}", i),
            file_name: format!("abc123/plot_{}.png", i),
            url: format!("http://localhost:9000/plots/abc123/plot_{}.png", i),
        })
        .collect()
}

async fn sample_in(db: &AthDb, status: SampleStatus) -> ath_ids::SampleId {
    let upload_id = UploadId::new();
    let sample = db.create_sample(&upload_id).await.unwrap();
    db.record_upload_finished(&upload_id, "abc123").await.unwrap();

    let path = [
        SampleStatus::Uploading,
        SampleStatus::Parsing,
        SampleStatus::Processing,
        SampleStatus::Rendering,
    ];
    for pair in path.windows(2) {
        if pair[0] == status {
            break;
        }
        db.transition_sample(&sample.id, pair[0], pair[1]).await.unwrap();
    }
    sample.id
}

#[tokio::test]
async fn full_lifecycle_persists_report_and_plots() {
    let tmp = TempDir::new().unwrap();
    let db = AthDb::open(tmp.path().join("ath.sqlite")).await.unwrap();
    let sample_id = sample_in(&db, SampleStatus::Processing).await;

    let stored = db.store_report(&sample_id, &report()).await.unwrap();
    assert_eq!(stored.report, report());
    assert_eq!(
        db.get_sample(&sample_id).await.unwrap().unwrap().status,
        SampleStatus::Rendering
    );

    let visualization = db.store_visualization(&sample_id, &plots(8)).await.unwrap();
    let names: Vec<_> = visualization.plots.iter().map(|p| p.name.as_str()).collect();
    let expected: Vec<_> = (0..8).map(|i| format!("plot_{}", i)).collect();
    assert_eq!(names, expected);

    let detail = db.get_sample_detail(&sample_id).await.unwrap().unwrap();
    assert_eq!(detail.sample.status, SampleStatus::Done);
    assert!(detail.summary_statistics.is_some());
    assert_eq!(detail.visualization.unwrap().plots.len(), 8);
}

#[tokio::test]
async fn report_requires_processing_state() {
    let tmp = TempDir::new().unwrap();
    let db = AthDb::open(tmp.path().join("ath.sqlite")).await.unwrap();
    let sample_id = sample_in(&db, SampleStatus::Parsing).await;

    let err = db.store_report(&sample_id, &report()).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidState(_)));

    // The insert rolled back with the failed transition.
    assert!(db.get_summary_statistics(&sample_id).await.unwrap().is_none());
}

#[tokio::test]
async fn second_report_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let db = AthDb::open(tmp.path().join("ath.sqlite")).await.unwrap();
    let sample_id = sample_in(&db, SampleStatus::Processing).await;

    db.store_report(&sample_id, &report()).await.unwrap();
    let err = db.store_report(&sample_id, &report()).await.unwrap_err();
    assert!(err.is_constraint(), "{}", err);
}

#[tokio::test]
async fn visualization_rolls_back_without_rendering_state() {
    let tmp = TempDir::new().unwrap();
    let db = AthDb::open(tmp.path().join("ath.sqlite")).await.unwrap();
    let sample_id = sample_in(&db, SampleStatus::Processing).await;

    let err = db.store_visualization(&sample_id, &plots(8)).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidState(_)));
    assert!(db.get_visualization(&sample_id).await.unwrap().is_none());

    let listed = db.list_samples(&SampleFilter::default()).await.unwrap();
    assert_eq!(listed[0].sample.status, SampleStatus::Processing);
}
