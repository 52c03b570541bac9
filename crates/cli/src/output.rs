use engine_core::progress::ProgressObserver;
use engine_processing::{
    batch_update::BatchUpdateReport, bootstrap::SourceProfile, dump::DumpReport,
    scheduler::TransferReport,
};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use model::execution::job::{BatchUpdateJob, IdColumnType, TransferJob, TransferMode};

const RULE_WIDTH: usize = 64;

/// Progress bar on stderr, shown once the engine reports a total.
pub struct ProgressBarObserver {
    bar: ProgressBar,
}

impl ProgressBarObserver {
    pub fn new(prefix: &str) -> Self {
        let style = ProgressStyle::default_bar()
            .template(
                "{prefix} {spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}, {eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        let bar = ProgressBar::hidden().with_style(style);
        bar.set_prefix(prefix.to_string());
        Self { bar }
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_start(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
    }

    fn on_advance(&self, _delta: u64, done: u64) {
        self.bar.set_position(done);
    }

    fn on_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn on_finish(&self, _done: u64) {
        self.bar.finish();
    }
}

/// Lines describing what a migration is about to do.
pub fn migration_summary(job: &TransferJob, profile: &SourceProfile) -> Vec<String> {
    let id_type = match (job.mode, profile.id_type) {
        (TransferMode::Create, id_type) => id_type.unwrap_or(IdColumnType::UnsignedBigInt).sql_type(),
        (TransferMode::Update, _) => "existing".to_string(),
    };
    let payload = job.schema.payload_column.as_deref().unwrap_or("-");

    vec![
        "=".repeat(RULE_WIDTH),
        "Source database: Qdrant".to_string(),
        "Source collection:".to_string(),
        format!("  - Name           : {}", profile.collection),
        format!("  - Vector Count   : {}", profile.total),
        format!("  - Dimension      : {}", profile.dimension),
        format!("  - Distance Metric: {}", profile.distance),
        String::new(),
        "Target database: TiDB".to_string(),
        "Target table:".to_string(),
        format!("  - Name           : {}", job.schema.table),
        format!("  - ID Column      : {} ({id_type})", job.schema.id_column),
        format!("  - Vector Column  : {}", job.schema.vector_column),
        format!("  - Payload Column : {payload}"),
        String::new(),
        format!("Mode: {}, batch size: {}, workers: {}", job.mode, job.batch_size, job.workers),
        "=".repeat(RULE_WIDTH),
    ]
}

pub fn print_migration_summary(job: &TransferJob, profile: &SourceProfile) {
    for line in migration_summary(job, profile) {
        println!("{line}");
    }
}

pub fn print_transfer_report(report: &TransferReport) {
    println!();
    if report.is_success() {
        println!(
            "Migration completed successfully! Migrated {} points from Qdrant to TiDB.",
            report.records_written
        );
    } else {
        println!(
            "Migration stopped in phase {}: {} of {} points written.",
            report.reached, report.records_written, report.source_total
        );
    }
    println!(
        "  {} batches in {:.2}s ({:.0} records/s), final batch size {}",
        report.batches,
        report.elapsed.as_secs_f64(),
        report.throughput(),
        report.final_batch_size
    );
    let m = &report.metrics;
    if m.fetch_retries + m.write_retries + m.shrink_count > 0 {
        println!(
            "  fetch retries: {}, write retries: {}, batch shrinks: {}",
            m.fetch_retries, m.write_retries, m.shrink_count
        );
    }
}

pub fn print_dump_report(report: &DumpReport) {
    println!(
        "Exported {} records to {} ({} bytes) in {:.2}s [{}]",
        report.records,
        report.output.display(),
        report.bytes,
        report.elapsed.as_secs_f64(),
        report.outcome
    );
}

pub fn print_batch_update_plan(job: &BatchUpdateJob) {
    let mapping: Vec<String> = job
        .column_mapping
        .iter()
        .map(|m| format!("{} -> {}", m.source, m.target))
        .collect();
    println!("{}", "=".repeat(RULE_WIDTH));
    println!(
        "Source: {}.{}  Target: {}.{}",
        job.source_table, job.source_id_column, job.target_table, job.target_id_column
    );
    println!("Columns: {}", mapping.join(", "));
    println!("Batch size: {}, workers: {}", job.batch_size, job.workers);
    println!("{}", "=".repeat(RULE_WIDTH));
}

pub fn print_batch_update_report(report: &BatchUpdateReport) {
    println!(
        "Updated {} records of {} in {} / {} pages in {:.2}s ({:.0} records/s)",
        report.rows_updated,
        report.target_table,
        report.pages_done,
        report.pages,
        report.elapsed.as_secs_f64(),
        report.throughput()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        core::distance::DistanceMetric,
        execution::job::{IdColumnType, TargetSchema},
    };

    fn profile(id_type: Option<IdColumnType>) -> SourceProfile {
        SourceProfile {
            collection: "midlib".into(),
            total: 1234,
            dimension: 512,
            distance: DistanceMetric::Cosine,
            id_type,
        }
    }

    #[test]
    fn summary_lists_source_and_target() {
        let job = TransferJob::new("midlib", TransferMode::Create, TargetSchema::new("midlib"))
            .with_workers(4);
        let lines = migration_summary(&job, &profile(Some(IdColumnType::Varchar(36))));

        assert!(lines.contains(&"  - Vector Count   : 1234".to_string()));
        assert!(lines.contains(&"  - Distance Metric: cosine".to_string()));
        assert!(lines.contains(&"  - ID Column      : id (VARCHAR(36))".to_string()));
        assert!(lines.contains(&"Mode: create, batch size: 100, workers: 4".to_string()));
    }

    #[test]
    fn summary_without_payload_column() {
        let schema = TargetSchema::new("docs").with_payload_column(None);
        let job = TransferJob::new("midlib", TransferMode::Update, schema);
        let lines = migration_summary(&job, &profile(None));

        assert!(lines.contains(&"  - Payload Column : -".to_string()));
        assert!(lines.contains(&"  - ID Column      : id (existing)".to_string()));
    }
}
