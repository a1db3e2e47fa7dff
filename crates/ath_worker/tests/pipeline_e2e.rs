//! Pipeline runs against a real SQLite database and an in-memory blob store.

use std::sync::Arc;
use std::time::Duration;

use ath_db::{AthDb, JobStatus};
use ath_ids::{SampleId, UploadId};
use ath_protocol::{RenderingFormat, SampleStatus};
use ath_worker::{
    Artifact, BlobStore, MemoryBlobStore, PipelineConfig, PipelineError, ProcessOutcome,
    SampleProcessor, Worker, WorkerConfig,
};
use tempfile::TempDir;
use tokio::sync::Notify;

const DATASET: &str = "team,review_time,merge_time,date\n\
                       A,0,100,2023-01-01\n\
                       A,50,50,2023-01-02\n\
                       B,30,0,2023-01-03\n\
                       B,20,20,2023-01-04\n";

struct Harness {
    _tmp: TempDir,
    db: AthDb,
    store: Arc<MemoryBlobStore>,
}

impl Harness {
    async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let db = AthDb::open(tmp.path().join("ath.sqlite")).await.unwrap();
        Self {
            _tmp: tmp,
            db,
            store: Arc::new(MemoryBlobStore::new("http://localhost:9000")),
        }
    }

    fn processor(&self, format: RenderingFormat) -> SampleProcessor {
        let store: Arc<dyn BlobStore> = self.store.clone();
        SampleProcessor::new(
            self.db.clone(),
            store,
            PipelineConfig {
                csvs_bucket: "csvs".to_string(),
                plots_bucket: "plots".to_string(),
                rendering_format: format,
                chunk_size: 1024,
            },
        )
    }

    /// An uploaded sample whose CSV is stored under `key`.
    async fn uploaded_sample(&self, key: &str, csv: &str) -> SampleId {
        let upload_id = UploadId::new();
        let sample = self.db.create_sample(&upload_id).await.unwrap();
        self.store.put("csvs", key, csv.as_bytes()).unwrap();
        self.db.record_upload_finished(&upload_id, key).await.unwrap();
        sample.id
    }
}

#[tokio::test]
async fn reference_dataset_reaches_done() {
    let h = Harness::new().await;
    let sample_id = h.uploaded_sample("abc123", DATASET).await;

    let outcome = h
        .processor(RenderingFormat::Png)
        .process(&sample_id)
        .await
        .unwrap();

    let ProcessOutcome::Done { report, plots } = outcome else {
        panic!("expected a finished run, got {outcome:?}");
    };
    assert_eq!(report.total_num_observations, 4);
    assert_eq!(report.teams.len(), 2);
    assert_eq!(report.num_prs_without_review, 1);
    assert_eq!(report.num_prs_without_ci, 1);
    assert_eq!(report.stats.mean.total_time, 67.5);
    assert_eq!(report.per_team["A"].count, 2);
    assert_eq!(report.per_team["B"].count, 2);

    assert_eq!(plots.len(), 8);
    for (plot, artifact) in plots.iter().zip(Artifact::ALL.iter()) {
        assert_eq!(plot.name, artifact.name());
        assert_eq!(plot.file_name, format!("abc123/{}.png", artifact.name()));
        assert_eq!(
            plot.url,
            format!("http://localhost:9000/plots/abc123/{}.png", artifact.name())
        );
        assert!(!h.store.get("plots", &plot.file_name).unwrap().is_empty());
    }

    let detail = h.db.get_sample_detail(&sample_id).await.unwrap().unwrap();
    assert_eq!(detail.sample.status, SampleStatus::Done);
    assert_eq!(detail.sample.parsing_error, None);
    assert_eq!(detail.summary_statistics.unwrap().report, report);
    assert_eq!(detail.visualization.unwrap().plots, plots);
}

#[tokio::test]
async fn unparseable_dataset_fails_without_artifacts() {
    let h = Harness::new().await;
    let sample_id = h
        .uploaded_sample("broken", "team,review_time,merge_time,date\nA,soon,1,2023-01-01\n")
        .await;

    let outcome = h
        .processor(RenderingFormat::Png)
        .process(&sample_id)
        .await
        .unwrap();
    assert!(matches!(outcome, ProcessOutcome::ParseFailed { .. }));

    let detail = h.db.get_sample_detail(&sample_id).await.unwrap().unwrap();
    assert_eq!(detail.sample.status, SampleStatus::Failed);
    let message = detail.sample.parsing_error.unwrap();
    assert!(message.contains("review_time"), "{message}");
    assert!(detail.summary_statistics.is_none());
    assert!(detail.visualization.is_none());
    assert!(h.store.keys("plots").is_empty());
}

#[tokio::test]
async fn overflowing_total_time_is_a_parse_failure() {
    let h = Harness::new().await;
    let sample_id = h
        .uploaded_sample(
            "huge",
            "team,review_time,merge_time,date\nA,9223372036854775807,1,2023-01-01\n",
        )
        .await;

    let outcome = h
        .processor(RenderingFormat::Svg)
        .process(&sample_id)
        .await
        .unwrap();
    assert!(matches!(outcome, ProcessOutcome::ParseFailed { .. }));

    let detail = h.db.get_sample_detail(&sample_id).await.unwrap().unwrap();
    assert_eq!(detail.sample.status, SampleStatus::Failed);
    assert!(detail.summary_statistics.is_none());
}

#[tokio::test]
async fn missing_dataset_object_is_a_parse_failure() {
    let h = Harness::new().await;
    let upload_id = UploadId::new();
    let sample = h.db.create_sample(&upload_id).await.unwrap();
    h.db.record_upload_finished(&upload_id, "never-stored").await.unwrap();

    let outcome = h
        .processor(RenderingFormat::Svg)
        .process(&sample.id)
        .await
        .unwrap();

    assert!(matches!(outcome, ProcessOutcome::ParseFailed { .. }));
    let sample = h.db.get_sample(&sample.id).await.unwrap().unwrap();
    assert_eq!(sample.status, SampleStatus::Failed);
}

#[tokio::test]
async fn sample_without_file_is_a_bad_sample() {
    let h = Harness::new().await;
    let sample = h.db.create_sample(&UploadId::new()).await.unwrap();

    let err = h
        .processor(RenderingFormat::Svg)
        .process(&sample.id)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::BadSample(_)));

    let sample = h.db.get_sample(&sample.id).await.unwrap().unwrap();
    assert_eq!(sample.status, SampleStatus::Uploading);
}

#[tokio::test]
async fn statistics_failure_leaves_sample_processing() {
    let h = Harness::new().await;
    // Parses fine, but there is no date to build an interval from.
    let sample_id = h
        .uploaded_sample("dateless", "team,review_time,merge_time,date\nA,1,2,\n")
        .await;

    let err = h
        .processor(RenderingFormat::Svg)
        .process(&sample_id)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Statistics(_)));

    let detail = h.db.get_sample_detail(&sample_id).await.unwrap().unwrap();
    assert_eq!(detail.sample.status, SampleStatus::Processing);
    assert_eq!(detail.sample.parsing_error, None);
    assert!(detail.summary_statistics.is_none());
}

#[tokio::test]
async fn second_run_of_a_finished_sample_is_rejected() {
    let h = Harness::new().await;
    let sample_id = h.uploaded_sample("twice", DATASET).await;
    let processor = h.processor(RenderingFormat::Svg);

    processor.process(&sample_id).await.unwrap();
    let err = processor.process(&sample_id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Db(ath_db::DbError::InvalidState(_))));
    assert_eq!(h.store.keys("plots").len(), 8);
}

#[tokio::test]
async fn no_outlier_charts_drop_exactly_the_outlier_rows() {
    let h = Harness::new().await;
    let sample_id = h.uploaded_sample("svgs", DATASET).await;
    h.processor(RenderingFormat::Svg)
        .process(&sample_id)
        .await
        .unwrap();

    let pie = |artifact: Artifact| {
        let bytes = h
            .store
            .get("plots", &format!("svgs/{}.svg", artifact.name()))
            .unwrap();
        String::from_utf8(bytes).unwrap()
    };
    // Two rows per team overall; one per team once zero times are dropped.
    assert_eq!(pie(Artifact::PrsByTeamWithOutliers).matches("(2 PRs)").count(), 2);
    assert_eq!(pie(Artifact::PrsByTeamNoOutliers).matches("(1 PRs)").count(), 2);
}

#[tokio::test]
async fn worker_drains_the_queue() {
    let h = Harness::new().await;
    let first = h.uploaded_sample("one", DATASET).await;
    let second = h
        .uploaded_sample("two", "team,review_time,merge_time,date\nA,x,1,2023-01-01\n")
        .await;
    h.db.enqueue_job(&first).await.unwrap();
    h.db.enqueue_job(&second).await.unwrap();

    let wake = Arc::new(Notify::new());
    let handle = Worker::spawn(
        WorkerConfig {
            concurrency: 2,
            poll_interval: Duration::from_millis(20),
        },
        h.processor(RenderingFormat::Svg),
        Arc::clone(&wake),
    );
    wake.notify_one();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let stats = h.db.queue_stats().await.unwrap();
        if stats.completed == 2 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "queue not drained: {stats:?}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    handle.shutdown().await.unwrap();

    let first = h.db.get_sample(&first).await.unwrap().unwrap();
    let second = h.db.get_sample(&second).await.unwrap().unwrap();
    assert_eq!(first.status, SampleStatus::Done);
    assert_eq!(second.status, SampleStatus::Failed);

    let jobs = h.db.list_jobs_for_sample(&first.id).await.unwrap();
    assert_eq!(jobs[0].status, JobStatus::Completed);
}

#[tokio::test]
async fn worker_records_stage_failures_on_the_job() {
    let h = Harness::new().await;
    let sample_id = h
        .uploaded_sample("dateless", "team,review_time,merge_time,date\nA,1,2,\n")
        .await;
    h.db.enqueue_job(&sample_id).await.unwrap();

    let handle = Worker::spawn(
        WorkerConfig {
            concurrency: 1,
            poll_interval: Duration::from_millis(20),
        },
        h.processor(RenderingFormat::Svg),
        Arc::new(Notify::new()),
    );

    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    while h.db.queue_stats().await.unwrap().failed == 0 {
        assert!(tokio::time::Instant::now() < deadline, "job never failed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    handle.shutdown().await.unwrap();

    let jobs = h.db.list_jobs_for_sample(&sample_id).await.unwrap();
    assert_eq!(jobs[0].status, JobStatus::Failed);
    assert!(jobs[0].error_message.as_deref().unwrap().contains("no dates"));
    let sample = h.db.get_sample(&sample_id).await.unwrap().unwrap();
    assert_eq!(sample.status, SampleStatus::Processing);
}
