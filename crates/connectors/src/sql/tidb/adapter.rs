use crate::sql::{
    base::{
        error::{ConnectorError, DbError},
        query::{
            compact_sql, count_rows_sql, create_vector_table_sql, drop_table_sql, insert_columns,
            insert_sql, range_update_sql, table_pagination_sql, update_sql,
        },
        target::{TableSpec, TargetSession, TargetStore},
    },
    tidb::params::{TiDbParam, TiDbParamStore},
};
use async_trait::async_trait;
use model::{
    execution::job::{BatchUpdateJob, TargetSchema},
    pagination::range::PartitionRange,
    records::record::Record,
};
use mysql_async::{Conn, Opts, OptsBuilder, Params, Pool, TxOpts, prelude::*};
use tracing::{debug, info};

const QUERY_TABLE_EXISTS_SQL: &str = include_str!("sql/table_exists.sql");
const QUERY_TABLE_COLUMNS_SQL: &str = include_str!("sql/table_columns.sql");

/// Upper bound on placeholders in one prepared statement.
const MAX_PLACEHOLDERS: usize = 65_535;

/// Accepts SQLAlchemy style URLs (`mysql+pymysql://`) and `tidb://` as well
/// as plain `mysql://` URLs.
pub fn normalize_url(url: &str) -> Result<String, ConnectorError> {
    let trimmed = url.trim();
    let (scheme, rest) = trimmed
        .split_once("://")
        .ok_or_else(|| ConnectorError::InvalidUrl(url.to_string()))?;

    let driver = scheme.split('+').next().unwrap_or(scheme).to_lowercase();
    match driver.as_str() {
        "mysql" | "tidb" => Ok(format!("mysql://{rest}")),
        _ => Err(ConnectorError::InvalidUrl(url.to_string())),
    }
}

/// Pool options for `url`. Affected-row counts report matched rows, so an
/// update that rewrites identical values still counts.
pub fn pool_opts(url: &str) -> Result<Opts, ConnectorError> {
    let normalized = normalize_url(url)?;
    let opts = Opts::from_url(&normalized)
        .map_err(|e| ConnectorError::InvalidUrl(format!("{url}: {e}")))?;
    Ok(OptsBuilder::from_opts(opts).client_found_rows(true).into())
}

#[derive(Clone)]
pub struct TiDbAdapter {
    pool: Pool,
}

impl TiDbAdapter {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let pool = Pool::new(pool_opts(url)?);

        // Fail early on unreachable servers instead of on the first batch.
        let mut conn = pool.get_conn().await?;
        conn.ping().await?;
        drop(conn);

        info!("Connected to TiDB");
        Ok(TiDbAdapter { pool })
    }

    async fn conn(&self) -> Result<Conn, DbError> {
        Ok(self.pool.get_conn().await?)
    }
}

#[async_trait]
impl TargetStore for TiDbAdapter {
    async fn session(&self) -> Result<Box<dyn TargetSession>, DbError> {
        let conn = self.conn().await?;
        debug!(connection_id = conn.id(), "Checked out target session");
        Ok(Box::new(TiDbSession { conn }))
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let mut conn = self.conn().await?;
        let count: Option<u64> = conn.exec_first(QUERY_TABLE_EXISTS_SQL, (table,)).await?;
        Ok(count.unwrap_or(0) > 0)
    }

    async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError> {
        let mut conn = self.conn().await?;
        let columns: Vec<String> = conn.exec(QUERY_TABLE_COLUMNS_SQL, (table,)).await?;
        Ok(columns)
    }

    async fn row_count(&self, table: &str) -> Result<u64, DbError> {
        let mut conn = self.conn().await?;
        let count: Option<u64> = conn.query_first(count_rows_sql(table)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn drop_table(&self, table: &str) -> Result<(), DbError> {
        let mut conn = self.conn().await?;
        conn.query_drop(drop_table_sql(table)).await?;
        info!(table, "Dropped table");
        Ok(())
    }

    async fn create_vector_table(&self, spec: &TableSpec) -> Result<(), DbError> {
        let sql = create_vector_table_sql(spec);
        debug!(sql = %sql, "Creating vector table");
        let mut conn = self.conn().await?;
        conn.query_drop(sql).await?;
        info!(
            table = %spec.schema.table,
            dimension = spec.dimension,
            distance = %spec.distance,
            id_type = %spec.id_type,
            "Created vector table"
        );
        Ok(())
    }

    async fn compact_table(&self, table: &str) -> Result<(), DbError> {
        let mut conn = self.conn().await?;
        conn.query_drop(compact_sql(table)).await?;
        info!(table, "Compacted table");
        Ok(())
    }

    async fn table_pagination(
        &self,
        table: &str,
        id_column: &str,
        batch_size: usize,
    ) -> Result<Vec<PartitionRange>, DbError> {
        let sql = table_pagination_sql(table, id_column, batch_size);
        let mut conn = self.conn().await?;
        let ranges = conn
            .query_map(
                sql,
                |(page_num, start_key, end_key, page_size): (u64, String, String, u64)| {
                    PartitionRange::new(page_num, start_key, end_key, page_size)
                },
            )
            .await?;
        Ok(ranges)
    }

    async fn close(&self) -> Result<(), DbError> {
        self.pool.clone().disconnect().await?;
        Ok(())
    }
}

/// A checked-out connection used by exactly one worker.
pub struct TiDbSession {
    conn: Conn,
}

#[async_trait]
impl TargetSession for TiDbSession {
    async fn insert_records(
        &mut self,
        schema: &TargetSchema,
        records: &[Record],
    ) -> Result<u64, DbError> {
        if records.is_empty() {
            return Ok(0);
        }

        let rows_per_stmt = (MAX_PLACEHOLDERS / insert_columns(schema).len()).max(1);
        let mut tx = self.conn.start_transaction(TxOpts::default()).await?;
        let mut written = 0;

        for chunk in records.chunks(rows_per_stmt) {
            let sql = insert_sql(schema, chunk.len())?;
            let params = TiDbParamStore::for_insert(schema, chunk).params();
            tx.exec_drop(sql, params).await?;
            written += tx.affected_rows();
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn update_records(
        &mut self,
        schema: &TargetSchema,
        records: &[Record],
    ) -> Result<u64, DbError> {
        if records.is_empty() {
            return Ok(0);
        }

        let sql = update_sql(schema);
        let mut tx = self.conn.start_transaction(TxOpts::default()).await?;
        let stmt = tx.prep(sql).await?;
        let mut affected = 0;

        for record in records {
            let params = TiDbParamStore::for_update(schema, record).params();
            tx.exec_drop(&stmt, params).await?;
            affected += tx.affected_rows();
        }

        tx.commit().await?;
        Ok(affected)
    }

    async fn update_range(
        &mut self,
        job: &BatchUpdateJob,
        range: &PartitionRange,
    ) -> Result<u64, DbError> {
        let sql = range_update_sql(job)?;
        let params = Params::Positional(vec![
            TiDbParam::text(&range.start_key).into_inner(),
            TiDbParam::text(&range.end_key).into_inner(),
        ]);
        self.conn.exec_drop(sql, params).await?;
        Ok(self.conn.affected_rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_driver_suffixes() {
        assert_eq!(
            normalize_url("mysql+pymysql://root:@localhost:4000/test").unwrap(),
            "mysql://root:@localhost:4000/test"
        );
        assert_eq!(
            normalize_url("tidb://u:p@gateway01.tidbcloud.com:4000/db").unwrap(),
            "mysql://u:p@gateway01.tidbcloud.com:4000/db"
        );
        assert!(normalize_url("postgres://localhost/db").is_err());
        assert!(normalize_url("localhost:4000").is_err());
    }

    #[test]
    fn pool_counts_matched_rows() {
        let opts = pool_opts("mysql+pymysql://root:@localhost:4000/test").unwrap();
        assert!(opts.client_found_rows());
        assert_eq!(opts.db_name(), Some("test"));
        assert!(pool_opts("sqlite:///tmp/x.db").is_err());
    }
}
