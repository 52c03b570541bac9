use crate::{
    benchmark::Benchmark,
    commands::{Commands, ModeArg, QdrantArgs, TiDbArgs},
    error::CliError,
    output::ProgressBarObserver,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::{
    file::csv::writer::ExportColumns,
    source::VectorSource,
    sql::base::target::TargetStore,
};
use engine_core::progress::ProgressObserver;
use engine_processing::{
    batch_update::BatchUpdateRunner,
    dump::{DumpOptions, dump_collection},
    producer::live::ScanEnd,
    scheduler::TransferScheduler,
};
use model::{
    core::identifiers::PointId,
    execution::job::{
        BatchUpdateJob, ColumnMapping, IdColumnType, TargetSchema, TransferJob, TransferMode,
    },
};
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod benchmark;
mod commands;
mod conn;
mod error;
mod output;
mod sample;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "vec2tidb",
    version,
    about = "Migrate vector data from Qdrant to TiDB"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match run(cli.command, shutdown.cancel_token()).await {
        Ok(()) => ExitCode::Success,
        Err(CliError::ShutdownRequested) => ExitCode::ShutdownRequested,
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("Error: {err}");
            ExitCode::GeneralError
        }
    };
    let code = if shutdown.is_shutdown_requested() {
        ExitCode::ShutdownRequested
    } else {
        code
    };

    std::process::exit(code.as_i32());
}

async fn run(command: Commands, cancel: CancellationToken) -> Result<(), CliError> {
    match command {
        Commands::Migrate {
            qdrant,
            tidb,
            mode,
            table_name,
            id_column,
            id_column_type,
            vector_column,
            payload_column,
            batch_size,
            workers,
            drop_table,
            id_sample_size,
        } => {
            let schema = target_schema(
                mode,
                &qdrant.qdrant_collection_name,
                table_name,
                id_column,
                vector_column,
                payload_column,
            )?;
            let id_type = id_column_type
                .as_deref()
                .map(str::parse::<IdColumnType>)
                .transpose()?;

            let mut job = TransferJob::new(&qdrant.qdrant_collection_name, mode.into(), schema)
                .with_batch_size(batch_size)
                .with_workers(workers)
                .with_drop_table(drop_table)
                .with_id_type(id_type);
            job.id_sample_size = id_sample_size;
            job.validate()?;

            migrate(&qdrant, &tidb, job, cancel).await
        }
        Commands::Dump {
            qdrant,
            output_file,
            limit,
            offset,
            no_vectors,
            no_payload,
            batch_size,
            buffer_size,
            id_header,
            vector_header,
            payload_header,
        } => {
            let columns = ExportColumns {
                include_vectors: !no_vectors,
                include_payload: !no_payload,
                id_header,
                vector_header,
                payload_header,
            };
            let options = DumpOptions::new(&qdrant.qdrant_collection_name, output_file)
                .with_limit(limit)
                .with_offset(offset.as_deref().map(PointId::parse))
                .with_columns(columns)
                .with_batch_size(batch_size)
                .with_buffer_size(buffer_size);

            dump(&qdrant, options, cancel).await
        }
        Commands::BatchUpdate {
            tidb,
            source_table,
            source_id_column,
            target_table,
            target_id_column,
            column_mapping,
            batch_size,
            workers,
            compact,
        } => {
            let column_mapping = column_mapping
                .iter()
                .map(|m| m.parse::<ColumnMapping>())
                .collect::<Result<Vec<_>, _>>()?;
            let job = BatchUpdateJob {
                source_table,
                source_id_column,
                target_table,
                target_id_column,
                column_mapping,
                batch_size,
                workers,
                compact,
            };
            job.validate()?;

            batch_update(&tidb, job, cancel).await
        }
        Commands::LoadSample {
            qdrant,
            dataset,
            snapshot_uri,
        } => {
            let uri = sample::resolve_snapshot_uri(dataset, snapshot_uri.as_deref());
            let client = conn::qdrant_client(&qdrant)?;
            let collection = &qdrant.qdrant_collection_name;

            println!("Loading sample collection from {uri}...");
            client.recover_snapshot(collection, &uri).await?;
            println!("Collection '{collection}' is being recovered in the background");
            Ok(())
        }
        Commands::Benchmark {
            qdrant,
            tidb,
            workers,
            batch_sizes,
            table_prefix,
            cleanup_tables,
        } => {
            if workers.is_empty() || batch_sizes.is_empty() {
                return Err(CliError::InvalidArgument(
                    "--workers and --batch-sizes need at least one value".into(),
                ));
            }
            if workers.iter().chain(batch_sizes.iter()).any(|v| *v == 0) {
                return Err(CliError::InvalidArgument(
                    "worker counts and batch sizes must be at least 1".into(),
                ));
            }

            benchmark(
                &qdrant,
                &tidb,
                workers,
                batch_sizes,
                table_prefix,
                cleanup_tables,
                cancel,
            )
            .await
        }
    }
}

/// Resolves column names: create mode fills in defaults, update mode
/// requires the table, id and vector columns to be named.
fn target_schema(
    mode: ModeArg,
    collection: &str,
    table_name: Option<String>,
    id_column: Option<String>,
    vector_column: Option<String>,
    payload_column: Option<String>,
) -> Result<TargetSchema, CliError> {
    match mode {
        ModeArg::Create => {
            let mut schema = TargetSchema::new(table_name.unwrap_or_else(|| collection.to_string()));
            if let Some(id) = id_column {
                schema = schema.with_id_column(id);
            }
            if let Some(vector) = vector_column {
                schema = schema.with_vector_column(vector);
            }
            if payload_column.is_some() {
                schema = schema.with_payload_column(payload_column);
            }
            Ok(schema)
        }
        ModeArg::Update => {
            let required = |value: Option<String>, flag: &str| {
                value.ok_or_else(|| {
                    CliError::InvalidArgument(format!("Option --{flag} is required for update mode"))
                })
            };
            let table = required(table_name, "table-name")?;
            let id = required(id_column, "id-column")?;
            let vector = required(vector_column, "vector-column")?;
            Ok(TargetSchema::new(table)
                .with_id_column(id)
                .with_vector_column(vector)
                .with_payload_column(payload_column))
        }
    }
}

async fn migrate(
    qdrant: &QdrantArgs,
    tidb: &TiDbArgs,
    job: TransferJob,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let source = conn::qdrant_client(qdrant)?;
    let target = conn::tidb_adapter(tidb).await?;
    let observer: Arc<dyn ProgressObserver> = Arc::new(ProgressBarObserver::new("migrate"));

    let scheduler = TransferScheduler::new(source, target.clone(), job)
        .with_observer(observer)
        .with_cancel_token(cancel);

    let profile = scheduler.profile().await?;
    output::print_migration_summary(scheduler.job(), &profile);
    if scheduler.job().mode == TransferMode::Create && scheduler.job().drop_table {
        info!(table = %scheduler.job().schema.table, "Existing table will be dropped");
    }

    let report = scheduler.run_with_profile(profile).await;
    output::print_transfer_report(&report);
    close_target(target.as_ref()).await;

    if let Some(err) = report.error {
        return Err(err.into());
    }
    match report.fetch_outcome {
        Some(ScanEnd::Cancelled) => Err(CliError::ShutdownRequested),
        Some(ScanEnd::Failed(reason)) => Err(CliError::Incomplete(reason)),
        _ => Ok(()),
    }
}

async fn dump(
    qdrant: &QdrantArgs,
    options: DumpOptions,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let source: Arc<dyn VectorSource> = conn::qdrant_client(qdrant)?;
    let observer: Arc<dyn ProgressObserver> = Arc::new(ProgressBarObserver::new("dump"));
    let path: PathBuf = options.output.clone();
    info!(collection = %options.collection, path = %path.display(), "Exporting collection");

    let report = dump_collection(source, options, Some(observer), cancel).await?;
    output::print_dump_report(&report);

    match report.outcome {
        ScanEnd::Cancelled => Err(CliError::ShutdownRequested),
        ScanEnd::Failed(reason) => Err(CliError::Incomplete(reason)),
        _ => Ok(()),
    }
}

async fn batch_update(
    tidb: &TiDbArgs,
    job: BatchUpdateJob,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    output::print_batch_update_plan(&job);
    let target = conn::tidb_adapter(tidb).await?;
    let observer: Arc<dyn ProgressObserver> = Arc::new(ProgressBarObserver::new("update"));

    let result = BatchUpdateRunner::new(target.clone(), job)
        .with_observer(observer)
        .with_cancel_token(cancel)
        .run()
        .await;
    close_target(target.as_ref()).await;

    let report = result?;
    output::print_batch_update_report(&report);
    if report.cancelled {
        return Err(CliError::ShutdownRequested);
    }
    Ok(())
}

async fn benchmark(
    qdrant: &QdrantArgs,
    tidb: &TiDbArgs,
    workers: Vec<usize>,
    batch_sizes: Vec<usize>,
    table_prefix: String,
    cleanup_tables: bool,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let source = conn::qdrant_client(qdrant)?;
    let target = conn::tidb_adapter(tidb).await?;
    let bench = Benchmark {
        source,
        target: target.clone(),
        collection: qdrant.qdrant_collection_name.clone(),
        workers,
        batch_sizes,
        table_prefix,
        cancel: cancel.clone(),
    };

    let profile = bench.profile().await?;
    println!("{}", "=".repeat(60));
    println!("Collection: {}", profile.collection);
    println!("Vectors: {}", profile.total);
    println!("Dimensions: {}", profile.dimension);
    println!("Distance: {}", profile.distance);
    println!("{}", "=".repeat(60));

    let results = bench.run(&profile).await;

    println!();
    println!("{}", "=".repeat(80));
    println!("BENCHMARK RESULTS");
    println!("{}", "=".repeat(80));
    for line in benchmark::format_results(&results, profile.total) {
        println!("{line}");
    }

    if cleanup_tables {
        let dropped = bench.cleanup(&results).await;
        println!("\nDropped {dropped} of {} benchmark tables", results.len());
    }

    match benchmark::best_result(&results) {
        Some(best) => {
            let secs = best.elapsed.map(|d| d.as_secs_f64()).unwrap_or_default();
            println!(
                "\nBest performance: {} workers, batch size {} ({:.2}s, {:.0} records/s)",
                best.workers,
                best.batch_size,
                secs,
                profile.total as f64 / secs.max(f64::EPSILON)
            );
        }
        None => println!("\nAll runs failed. Check the database connections."),
    }
    close_target(target.as_ref()).await;

    if cancel.is_cancelled() {
        return Err(CliError::ShutdownRequested);
    }
    Ok(())
}

async fn close_target(target: &dyn TargetStore) {
    if let Err(err) = target.close().await {
        warn!(error = %err, "Failed to close TiDB connection pool");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_mode_fills_in_defaults() {
        let schema = target_schema(ModeArg::Create, "midlib", None, None, None, None).unwrap();
        assert_eq!(schema.table, "midlib");
        assert_eq!(schema.id_column, "id");
        assert_eq!(schema.vector_column, "vector");
        assert_eq!(schema.payload_column.as_deref(), Some("payload"));
    }

    #[test]
    fn update_mode_requires_names() {
        let err = target_schema(
            ModeArg::Update,
            "midlib",
            Some("docs".into()),
            None,
            Some("embedding".into()),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("--id-column"));

        let schema = target_schema(
            ModeArg::Update,
            "midlib",
            Some("docs".into()),
            Some("doc_id".into()),
            Some("embedding".into()),
            None,
        )
        .unwrap();
        assert_eq!(schema.payload_column, None);
        assert_eq!(schema.id_column, "doc_id");
    }
}
