#[cfg(test)]
mod tests {
    use crate::{
        memory::{MemorySource, MemoryTarget},
        utils::*,
    };
    use connectors::{
        file::csv::writer::ExportColumns,
        sql::base::target::{TableSpec, TargetStore},
    };
    use engine_core::{metrics::Metrics, progress::ProgressObserver};
    use engine_processing::{
        batch_update::{BatchUpdateRunner, partition},
        consumer::{
            components::writer::BatchWriter,
            live::{BatchWorker, WorkerEvent},
        },
        dump::{DumpOptions, dump_collection},
        error::{BatchUpdateError, TransferError},
        producer::live::ScanEnd,
        retry::is_duplicate_key,
        scheduler::TransferPhase,
    };
    use model::{
        core::{distance::DistanceMetric, identifiers::PointId},
        execution::job::{BatchUpdateJob, ColumnMapping, IdColumnType, TargetSchema, TransferMode},
        records::{batch::Batch, record::Record},
    };
    use serde_json::{Value, json};
    use std::{
        collections::HashSet,
        sync::{Arc, Mutex},
    };
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct RecordingObserver {
        advances: Mutex<Vec<(u64, u64)>>,
        finished: Mutex<bool>,
    }

    impl ProgressObserver for RecordingObserver {
        fn on_advance(&self, delta: u64, done: u64) {
            self.advances.lock().unwrap().push((delta, done));
        }

        fn on_finish(&self, _done: u64) {
            *self.finished.lock().unwrap() = true;
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn transfers_250_records_in_three_fetches() {
        let source = Arc::new(source_with(numeric_records(250)));
        let target = MemoryTarget::new();
        let observer = Arc::new(RecordingObserver::default());

        let report = scheduler(&source, &target, create_job(100, 1))
            .with_observer(observer.clone())
            .run()
            .await;

        assert!(report.is_success(), "unexpected failure: {:?}", report.error);
        assert_eq!(report.phase, TransferPhase::Done);
        assert_eq!(report.fetch_outcome, Some(ScanEnd::Exhausted));
        assert_eq!(report.records_written, 250);
        assert_eq!(report.batches, 3);
        assert_eq!(source.data_fetch_limits(), vec![100, 100, 50]);
        assert_eq!(target.row_count(TABLE), 250);

        let dones: Vec<u64> = observer
            .advances
            .lock()
            .unwrap()
            .iter()
            .map(|(_, done)| *done)
            .collect();
        assert_eq!(dones, vec![100, 200, 250]);
        assert!(*observer.finished.lock().unwrap());
        assert!(logs_contain("Batch written successfully"));
    }

    #[tokio::test]
    async fn every_record_lands_exactly_once() {
        for count in [1u64, 99, 257] {
            for batch_size in [1usize, 7, 100, 1000] {
                for workers in [1usize, 3, 8] {
                    let source = Arc::new(source_with(numeric_records(count)));
                    let target = MemoryTarget::new();

                    let report = scheduler(&source, &target, create_job(batch_size, workers))
                        .run()
                        .await;

                    assert!(
                        report.is_success(),
                        "n={count} b={batch_size} w={workers}: {:?}",
                        report.error
                    );
                    assert_eq!(report.records_written, count);
                    let expected: Vec<PointId> = (1..=count).map(PointId::Num).collect();
                    assert_eq!(target.ids(TABLE), expected);
                    assert!(source.data_fetch_limits().iter().all(|l| *l <= batch_size));
                }
            }
        }
    }

    #[tokio::test]
    async fn created_table_matches_collection() {
        let source = Arc::new(source_with(numeric_records(10)));
        let target = MemoryTarget::new();

        let report = scheduler(&source, &target, create_job(100, 1)).run().await;
        assert!(report.is_success());

        let table = target.table(TABLE).unwrap();
        let spec = table.spec.unwrap();
        assert_eq!(spec.id_type, IdColumnType::UnsignedBigInt);
        assert_eq!(spec.dimension, DIMENSION);
        assert_eq!(spec.distance, DistanceMetric::Cosine);

        let row = target.row(TABLE, &PointId::Num(3)).unwrap();
        assert_eq!(row["vector"], json!([3.0, 1.5, -3.0, 1.0]));
        assert_eq!(row["payload"], json!({ "title": "doc-3", "rank": 3 }));
    }

    #[tokio::test]
    async fn string_ids_get_a_varchar_column() {
        let source = Arc::new(source_with(uuid_records(20)));
        let target = MemoryTarget::new();

        let report = scheduler(&source, &target, create_job(8, 2)).run().await;
        assert!(report.is_success(), "{:?}", report.error);

        let spec = target.table(TABLE).unwrap().spec.unwrap();
        assert_eq!(spec.id_type, IdColumnType::Varchar(36));
        assert_eq!(target.row_count(TABLE), 20);
    }

    #[tokio::test]
    async fn explicit_id_type_skips_sampling() {
        let source = Arc::new(source_with(uuid_records(5)));
        let target = MemoryTarget::new();
        let job = create_job(10, 1).with_id_type(Some(IdColumnType::Varchar(64)));

        let report = scheduler(&source, &target, job).run().await;
        assert!(report.is_success());
        assert!(source.calls().iter().all(|c| c.with_vector));
        assert_eq!(
            target.table(TABLE).unwrap().spec.unwrap().id_type,
            IdColumnType::Varchar(64)
        );
    }

    #[tokio::test]
    async fn update_mode_only_touches_existing_rows() {
        let source = Arc::new(source_with(numeric_records(200)));
        let target = MemoryTarget::new().with_table(TABLE, &["id", "vector", "payload"]);
        for id in (2..=200).step_by(2) {
            target.put_row(
                TABLE,
                PointId::Num(id),
                vec![("vector", json!([0.0, 0.0, 0.0, 0.0])), ("payload", Value::Null)],
            );
        }

        let report = scheduler(&source, &target, update_job(64, 3)).run().await;
        assert!(report.is_success(), "{:?}", report.error);
        assert_eq!(report.mode, TransferMode::Update);
        assert_eq!(target.row_count(TABLE), 100);
        assert!(target.row(TABLE, &PointId::Num(1)).is_none());

        let row = target.row(TABLE, &PointId::Num(10)).unwrap();
        assert_eq!(row["vector"], json!([10.0, 5.0, -10.0, 1.0]));
        assert_eq!(row["payload"]["title"], json!("doc-10"));
        let first_pass = target.table(TABLE).unwrap().rows;

        let again = scheduler(&source, &target, update_job(64, 3)).run().await;
        assert!(again.is_success());
        assert_eq!(target.table(TABLE).unwrap().rows, first_pass);
    }

    #[tokio::test]
    async fn update_without_payload_column_keeps_attributes() {
        let source = Arc::new(source_with(numeric_records(3)));
        let target = MemoryTarget::new().with_table(TABLE, &["id", "vector"]);
        target.put_row(
            TABLE,
            PointId::Num(2),
            vec![("vector", json!([])), ("payload", json!("kept"))],
        );

        let mut job = update_job(10, 1);
        job.schema = TargetSchema::new(TABLE).with_payload_column(None);

        let report = scheduler(&source, &target, job).run().await;
        assert!(report.is_success(), "{:?}", report.error);
        let row = target.row(TABLE, &PointId::Num(2)).unwrap();
        assert_eq!(row["payload"], json!("kept"));
        assert_eq!(row["vector"], json!([2.0, 1.0, -2.0, 1.0]));
    }

    #[tokio::test]
    async fn update_mode_requires_the_columns() {
        let source = Arc::new(source_with(numeric_records(3)));
        let target = MemoryTarget::new().with_table(TABLE, &["ID", "Vector"]);

        let report = scheduler(&source, &target, update_job(10, 1)).run().await;
        assert_eq!(report.phase, TransferPhase::Failed);
        assert_eq!(report.reached, TransferPhase::Bootstrap);
        match report.error {
            Some(TransferError::MissingColumns { columns, .. }) => assert_eq!(columns, "payload"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_mode_requires_the_table() {
        let source = Arc::new(source_with(numeric_records(3)));
        let target = MemoryTarget::new();

        let report = scheduler(&source, &target, update_job(10, 1)).run().await;
        assert!(matches!(report.error, Some(TransferError::TableNotFound { .. })));
    }

    #[tokio::test]
    async fn existing_table_is_kept_unless_dropped() {
        let source = Arc::new(source_with(numeric_records(5)));
        let target = MemoryTarget::new().with_table(TABLE, &["id"]);
        target.put_row(TABLE, PointId::Num(99), vec![]);

        let report = scheduler(&source, &target, create_job(10, 1)).run().await;
        assert!(matches!(report.error, Some(TransferError::TableExists { .. })));
        assert_eq!(target.ids(TABLE), vec![PointId::Num(99)]);

        let report = scheduler(&source, &target, create_job(10, 1).with_drop_table(true))
            .run()
            .await;
        assert!(report.is_success());
        assert_eq!(target.row_count(TABLE), 5);
        assert!(target.row(TABLE, &PointId::Num(99)).is_none());
    }

    #[tokio::test]
    async fn missing_and_empty_collections_are_rejected() {
        let source = Arc::new(
            MemorySource::new().with_collection("empty", DIMENSION, "Cosine", Vec::new()),
        );
        let target = MemoryTarget::new();

        let mut job = create_job(10, 1);
        job.collection = "nope".into();
        let report = scheduler(&source, &target, job).run().await;
        assert_eq!(report.reached, TransferPhase::Init);
        assert!(matches!(
            report.error,
            Some(TransferError::CollectionNotFound { ref collection }) if collection == "nope"
        ));

        let mut job = create_job(10, 1);
        job.collection = "empty".into();
        let report = scheduler(&source, &target, job).run().await;
        assert!(matches!(report.error, Some(TransferError::EmptyCollection { .. })));
        assert!(target.table(TABLE).is_none());
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn unsupported_distance_is_rejected() {
        let source = Arc::new(MemorySource::new().with_collection(
            COLLECTION,
            DIMENSION,
            "Dot",
            numeric_records(3),
        ));
        let target = MemoryTarget::new();

        let report = scheduler(&source, &target, create_job(10, 1)).run().await;
        assert!(matches!(
            report.error,
            Some(TransferError::UnsupportedDistance { ref distance, .. }) if distance == "Dot"
        ));
        assert!(target.table(TABLE).is_none());
    }

    #[tokio::test]
    async fn mixed_id_kinds_need_an_explicit_type() {
        let mut records = numeric_records(3);
        records.extend(uuid_records(3));
        let source = Arc::new(source_with(records));
        let target = MemoryTarget::new();

        let report = scheduler(&source, &target, create_job(10, 1)).run().await;
        assert!(matches!(report.error, Some(TransferError::MixedIdTypes { .. })));
    }

    #[traced_test]
    #[tokio::test]
    async fn oversized_pages_shrink_and_stay_small() {
        let source = Arc::new(source_with(numeric_records(2000)).with_max_page(300));
        let target = MemoryTarget::new();

        let report = scheduler(&source, &target, create_job(1000, 1)).run().await;

        assert!(report.is_success(), "{:?}", report.error);
        assert_eq!(report.records_written, 2000);
        assert_eq!(report.final_batch_size, 250);
        assert_eq!(report.metrics.shrink_count, 2);

        let limits = source.data_fetch_limits();
        assert_eq!(&limits[..3], &[1000, 500, 250]);
        assert!(limits[3..].iter().all(|l| *l == 250));
        assert!(logs_contain("Batch size reduced"));
    }

    #[tokio::test]
    async fn shrinking_stops_at_the_floor() {
        let source = Arc::new(source_with(numeric_records(500)).with_max_page(50));
        let target = MemoryTarget::new();

        let report = scheduler(&source, &target, create_job(400, 1)).run().await;

        assert!(!report.is_success());
        assert_eq!(report.phase, TransferPhase::Done);
        assert!(matches!(report.fetch_outcome, Some(ScanEnd::Failed(_))));
        assert_eq!(report.records_written, 0);
        assert_eq!(target.row_count(TABLE), 0);
        assert!(source.data_fetch_limits().iter().all(|l| *l >= 100));
    }

    #[tokio::test]
    async fn transient_fetch_errors_are_retried() {
        let source = Arc::new(source_with(numeric_records(30)));
        let target = MemoryTarget::new();
        let job = create_job(10, 1).with_id_type(Some(IdColumnType::BigInt));
        source.fail_next_scrolls(2);

        let report = scheduler(&source, &target, job).run().await;
        assert!(report.is_success(), "{:?}", report.error);
        assert_eq!(report.records_written, 30);
        assert_eq!(report.metrics.fetch_retries, 2);
    }

    #[tokio::test]
    async fn fetch_failures_past_the_retry_budget_stop_the_scan() {
        let source = Arc::new(source_with(numeric_records(30)));
        let target = MemoryTarget::new();
        let job = create_job(10, 1).with_id_type(Some(IdColumnType::BigInt));
        source.fail_next_scrolls(10);

        let report = scheduler(&source, &target, job).run().await;
        assert!(!report.is_success());
        assert!(matches!(report.fetch_outcome, Some(ScanEnd::Failed(_))));
        assert_eq!(report.records_written, 0);
    }

    #[tokio::test]
    async fn transient_write_errors_are_retried() {
        let source = Arc::new(source_with(numeric_records(40)));
        let target = MemoryTarget::new();
        target.fail_next_writes(2);

        let report = scheduler(&source, &target, create_job(20, 1)).run().await;
        assert!(report.is_success(), "{:?}", report.error);
        assert_eq!(report.metrics.write_retries, 2);
        assert_eq!(target.row_count(TABLE), 40);
    }

    #[tokio::test]
    async fn each_worker_owns_one_session() {
        let source = Arc::new(source_with(numeric_records(400)));
        let target = MemoryTarget::new();

        let report = scheduler(&source, &target, create_job(10, 4)).run().await;
        assert!(report.is_success());
        assert_eq!(target.sessions_opened(), 4);

        let sessions: HashSet<usize> = target.writes().iter().map(|(s, _)| *s).collect();
        assert!(sessions.iter().all(|s| *s < 4));
        assert_eq!(target.writes().iter().map(|(_, n)| n).sum::<usize>(), 400);
    }

    #[tokio::test]
    async fn cancelled_run_writes_nothing_more() {
        let source = Arc::new(source_with(numeric_records(100)));
        let target = MemoryTarget::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = scheduler(&source, &target, create_job(10, 2))
            .with_cancel_token(cancel)
            .run()
            .await;

        assert_eq!(report.fetch_outcome, Some(ScanEnd::Cancelled));
        assert!(!report.is_success());
        assert_eq!(report.records_written, 0);
        assert!(source.data_fetch_limits().is_empty());
    }

    fn batch_of(records: Vec<Record>) -> Batch {
        Batch {
            id: "batch-under-test".into(),
            seq: 0,
            records,
            cursor: None,
            next: None,
            ts: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_ids_fail_without_retry() {
        let target = MemoryTarget::new().with_table(TABLE, &["id", "vector", "payload"]);
        target.put_row(TABLE, PointId::Num(2), vec![]);
        let metrics = Metrics::new();
        let mut writer = BatchWriter::new(
            target.session().await.unwrap(),
            TargetSchema::new(TABLE),
            TransferMode::Create,
            no_wait_retry(),
            metrics.clone(),
        );

        let err = writer
            .write_batch(&batch_of(numeric_records(3)))
            .await
            .unwrap_err();

        match err {
            TransferError::Write { source, batch_id, .. } => {
                assert!(is_duplicate_key(&source));
                assert_eq!(batch_id, "batch-under-test");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(metrics.snapshot().write_retries, 0);
        assert_eq!(metrics.snapshot().failure_count, 1);
        assert_eq!(target.ids(TABLE), vec![PointId::Num(2)]);
    }

    async fn failing_worker(
        id: usize,
        target: &MemoryTarget,
        batch: Batch,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> usize {
        let writer = BatchWriter::new(
            target.session().await.unwrap(),
            TargetSchema::new(TABLE),
            TransferMode::Create,
            no_wait_retry(),
            Metrics::new(),
        );
        let (batch_tx, batch_rx) = mpsc::channel(1);
        batch_tx.send(batch).await.unwrap();
        drop(batch_tx);
        let queue = Arc::new(tokio::sync::Mutex::new(batch_rx));
        BatchWorker::new(id, writer, queue, events, CancellationToken::new())
            .run()
            .await
    }

    #[tokio::test]
    async fn worker_failures_arrive_in_the_order_they_happened() {
        let target = MemoryTarget::new().with_table(TABLE, &["id", "vector", "payload"]);
        target.put_row(TABLE, PointId::Num(2), vec![]);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        // The higher-numbered worker fails first.
        let first = batch_of(numeric_records(3));
        assert_eq!(failing_worker(3, &target, first, events_tx.clone()).await, 0);
        let second = batch_of(numeric_records(2));
        assert_eq!(failing_worker(0, &target, second, events_tx).await, 0);

        let mut failed = Vec::new();
        while let Some(event) = events_rx.recv().await {
            match event {
                WorkerEvent::Failed { worker, error } => {
                    assert!(matches!(error, TransferError::Write { .. }));
                    failed.push(worker);
                }
                WorkerEvent::Written(ack) => panic!("unexpected ack {ack:?}"),
            }
        }
        assert_eq!(failed, vec![3, 0]);
    }

    #[tokio::test]
    async fn concurrent_write_failure_fails_the_run() {
        let source = Arc::new(source_with(numeric_records(200)));
        let target = MemoryTarget::new();
        target.fail_next_writes(usize::MAX / 2);

        let report = scheduler(&source, &target, create_job(20, 3)).run().await;
        assert!(!report.is_success());
        assert_eq!(report.phase, TransferPhase::Failed);
        match report.error {
            Some(TransferError::Write { table, .. }) => assert_eq!(table, TABLE),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(target.row_count(TABLE), 0);
    }

    const SOURCE_TABLE: &str = "documents";
    const TARGET_TABLE: &str = "documents_vec";

    fn backfill_fixture(rows: u64) -> MemoryTarget {
        let target = MemoryTarget::new()
            .with_table(SOURCE_TABLE, &["id", "embedding", "title"])
            .with_table(TARGET_TABLE, &["doc_id", "vec", "label"]);
        for id in 1..=rows {
            target.put_row(
                SOURCE_TABLE,
                PointId::Num(id),
                vec![
                    ("embedding", json!([id as f32, 0.5])),
                    ("title", json!(format!("t{id}"))),
                ],
            );
            target.put_row(
                TARGET_TABLE,
                PointId::Num(id),
                vec![("vec", Value::Null), ("label", Value::Null)],
            );
        }
        target
    }

    fn backfill_job(batch_size: usize, workers: usize) -> BatchUpdateJob {
        BatchUpdateJob {
            source_table: SOURCE_TABLE.into(),
            source_id_column: "id".into(),
            target_table: TARGET_TABLE.into(),
            target_id_column: "doc_id".into(),
            column_mapping: vec![
                "embedding:vec".parse::<ColumnMapping>().unwrap(),
                "title:label".parse::<ColumnMapping>().unwrap(),
            ],
            batch_size,
            workers,
            compact: false,
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn batch_update_splits_into_three_pages() {
        let target = backfill_fixture(10_500);
        let runner = BatchUpdateRunner::new(Arc::new(target.clone()), backfill_job(5000, 1));

        let report = runner.run().await.unwrap();

        assert_eq!(report.pages, 3);
        assert_eq!(report.pages_done, 3);
        assert_eq!(report.source_rows, 10_500);
        assert!(report.rows_updated <= 10_500);
        assert_eq!(report.rows_updated, 10_500);
        assert_eq!(target.range_calls(), vec![1, 2, 3]);

        let row = target.row(TARGET_TABLE, &PointId::Num(7777)).unwrap();
        assert_eq!(row["vec"], json!([7777.0, 0.5]));
        assert_eq!(row["label"], json!("t7777"));
        assert!(logs_contain("Batch update finished"));
    }

    #[tokio::test]
    async fn partitions_cover_the_table_without_overlap() {
        let target = backfill_fixture(1234);
        let ranges = partition(&target, &backfill_job(100, 1)).await.unwrap();

        let sizes: Vec<u64> = ranges.iter().map(|r| r.page_size).collect();
        assert_eq!(sizes.len(), 13);
        assert!(sizes[..12].iter().all(|s| *s == 100));
        assert_eq!(sizes[12], 34);

        let mut previous_end: Option<u64> = None;
        for (i, range) in ranges.iter().enumerate() {
            assert_eq!(range.page_num, i as u64 + 1);
            let start: u64 = range.start_key.parse().unwrap();
            let end: u64 = range.end_key.parse().unwrap();
            assert!(start <= end);
            if let Some(prev) = previous_end {
                assert_eq!(start, prev + 1);
            }
            previous_end = Some(end);
        }
        assert_eq!(ranges.first().unwrap().start_key, "1");
        assert_eq!(previous_end, Some(1234));
    }

    #[tokio::test]
    async fn batch_update_with_workers_updates_every_row() {
        let target = backfill_fixture(1000);
        let runner = BatchUpdateRunner::new(Arc::new(target.clone()), backfill_job(64, 4));

        let report = runner.run().await.unwrap();
        assert_eq!(report.pages, 16);
        assert_eq!(report.rows_updated, 1000);
        assert!(!report.cancelled);
        assert!(
            target
                .table(TARGET_TABLE)
                .unwrap()
                .rows
                .values()
                .all(|row| row["label"] != Value::Null)
        );
    }

    #[tokio::test]
    async fn repeated_batch_update_counts_matched_rows() {
        let target = backfill_fixture(250);
        let first = BatchUpdateRunner::new(Arc::new(target.clone()), backfill_job(100, 1))
            .run()
            .await
            .unwrap();
        let second = BatchUpdateRunner::new(Arc::new(target.clone()), backfill_job(100, 1))
            .run()
            .await
            .unwrap();

        assert_eq!(first.rows_updated, 250);
        assert_eq!(second.rows_updated, 250);
    }

    #[tokio::test]
    async fn failed_page_aborts_the_batch_update() {
        let target = backfill_fixture(300);
        target.fail_page(2);
        let runner = BatchUpdateRunner::new(Arc::new(target.clone()), backfill_job(100, 1));

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, BatchUpdateError::Page { page_num: 2, .. }));
        assert_eq!(target.range_calls(), vec![1, 2]);
        assert_eq!(
            target.row(TARGET_TABLE, &PointId::Num(250)).unwrap()["label"],
            Value::Null
        );
    }

    #[tokio::test]
    async fn batch_update_checks_columns_and_compacts() {
        let target = backfill_fixture(10);

        let mut job = backfill_job(5, 1);
        job.column_mapping.push("missing:label".parse().unwrap());
        let err = BatchUpdateRunner::new(Arc::new(target.clone()), job)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BatchUpdateError::ColumnNotFound { ref column, .. } if column == "missing"
        ));

        let mut job = backfill_job(5, 1);
        job.compact = true;
        BatchUpdateRunner::new(Arc::new(target.clone()), job)
            .run()
            .await
            .unwrap();
        assert_eq!(target.compacted(), vec![TARGET_TABLE.to_string()]);
    }

    #[tokio::test]
    async fn dump_writes_a_csv_with_limit() {
        let source: Arc<MemorySource> = Arc::new(source_with(numeric_records(250)));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("midlib.csv");

        let mut options = DumpOptions::new(COLLECTION, &path)
            .with_limit(Some(120))
            .with_batch_size(100);
        options.reader = options.reader.with_retry(no_wait_retry());

        let report = dump_collection(source.clone(), options, None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.records, 120);
        assert_eq!(report.outcome, ScanEnd::LimitReached);
        assert_eq!(source.data_fetch_limits(), vec![100, 20]);

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,vector,payload"));
        assert_eq!(lines.count(), 120);
        assert_eq!(report.bytes, text.len() as u64);
    }

    #[tokio::test]
    async fn dump_from_offset_without_vectors() {
        let source: Arc<MemorySource> = Arc::new(source_with(numeric_records(250)));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.csv");

        let columns = ExportColumns {
            include_vectors: false,
            include_payload: false,
            id_header: "point_id".into(),
            ..ExportColumns::default()
        };
        let mut options = DumpOptions::new(COLLECTION, &path)
            .with_offset(Some(PointId::Num(201)))
            .with_columns(columns);
        options.reader = options.reader.with_retry(no_wait_retry());

        let report = dump_collection(source.clone(), options, None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.records, 50);
        assert_eq!(report.outcome, ScanEnd::Exhausted);
        assert_eq!(source.calls()[0].cursor, Some(PointId::Num(201)));
        assert!(source.calls().iter().all(|c| !c.with_vector));

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "point_id");
        assert_eq!(lines[1], "201");
        assert_eq!(lines.last(), Some(&"250"));
    }

    #[tokio::test]
    async fn dump_of_missing_collection_fails() {
        let source: Arc<MemorySource> = Arc::new(MemorySource::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.csv");

        let err = dump_collection(
            source,
            DumpOptions::new("absent", &path),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("absent"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn snapshot_recovery_is_forwarded() {
        let source = MemorySource::new();
        let vs: &dyn connectors::source::VectorSource = &source;
        vs.recover_snapshot("midlib", "https://snapshots.qdrant.io/midlib.snapshot")
            .await
            .unwrap();
        assert_eq!(
            source.recovered(),
            vec![(
                "midlib".to_string(),
                "https://snapshots.qdrant.io/midlib.snapshot".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn memory_target_rejects_duplicate_create() {
        let target = MemoryTarget::new();
        let spec = TableSpec {
            schema: TargetSchema::new(TABLE),
            id_type: IdColumnType::BigInt,
            dimension: 3,
            distance: DistanceMetric::L2,
        };
        target.create_vector_table(&spec).await.unwrap();
        assert!(target.create_vector_table(&spec).await.is_err());
        assert_eq!(
            target.column_names(TABLE).await.unwrap(),
            vec!["id", "vector", "payload", "created_at", "updated_at"]
        );
    }
}
