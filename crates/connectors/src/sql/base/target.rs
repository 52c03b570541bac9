use crate::sql::base::error::DbError;
use async_trait::async_trait;
use model::{
    core::distance::DistanceMetric,
    execution::job::{BatchUpdateJob, IdColumnType, TargetSchema},
    pagination::range::PartitionRange,
    records::record::Record,
};

/// Everything needed to create a vector table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub schema: TargetSchema,
    pub id_type: IdColumnType,
    pub dimension: usize,
    pub distance: DistanceMetric,
}

/// Administrative side of the target store plus a factory for write sessions.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Checks out a dedicated session. Callers keep it for their whole
    /// lifetime and never share it with another task.
    async fn session(&self) -> Result<Box<dyn TargetSession>, DbError>;

    async fn table_exists(&self, table: &str) -> Result<bool, DbError>;

    /// Column names of `table` in ordinal order; empty if the table is missing.
    async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError>;

    async fn row_count(&self, table: &str) -> Result<u64, DbError>;

    async fn drop_table(&self, table: &str) -> Result<(), DbError>;

    async fn create_vector_table(&self, spec: &TableSpec) -> Result<(), DbError>;

    async fn compact_table(&self, table: &str) -> Result<(), DbError>;

    /// Consecutive key ranges of `batch_size` rows each, in ascending order.
    async fn table_pagination(
        &self,
        table: &str,
        id_column: &str,
        batch_size: usize,
    ) -> Result<Vec<PartitionRange>, DbError>;

    async fn close(&self) -> Result<(), DbError> {
        Ok(())
    }
}

/// A single connection-bound unit of write work.
#[async_trait]
pub trait TargetSession: Send {
    /// Inserts all records in one transaction; any duplicate id fails the call.
    async fn insert_records(
        &mut self,
        schema: &TargetSchema,
        records: &[Record],
    ) -> Result<u64, DbError>;

    /// Updates matched rows in one transaction and returns the affected row
    /// count. Unknown ids are skipped.
    async fn update_records(
        &mut self,
        schema: &TargetSchema,
        records: &[Record],
    ) -> Result<u64, DbError>;

    /// Runs the bulk update statement for one range; returns affected rows.
    async fn update_range(
        &mut self,
        job: &BatchUpdateJob,
        range: &PartitionRange,
    ) -> Result<u64, DbError>;
}
