//! SQL text builders for the TiDB target.
//!
//! Every identifier goes through [`quote_identifier`]; every value is bound as
//! a positional parameter.

use crate::sql::base::{error::DbError, target::TableSpec};
use model::execution::job::{BatchUpdateJob, TargetSchema};

/// Wraps an identifier in backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_identifier(table))
}

pub fn compact_sql(table: &str) -> String {
    format!("ALTER TABLE {} COMPACT", quote_identifier(table))
}

pub fn count_rows_sql(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", quote_identifier(table))
}

/// Name of the vector index created alongside the table.
pub fn vector_index_name(table: &str, vector_column: &str) -> String {
    format!("vec_idx_{table}_on_{vector_column}")
}

pub fn create_vector_table_sql(spec: &TableSpec) -> String {
    let schema = &spec.schema;
    let vector = quote_identifier(&schema.vector_column);

    let mut columns = vec![
        format!(
            "{} {} PRIMARY KEY",
            quote_identifier(&schema.id_column),
            spec.id_type.sql_type()
        ),
        format!("{vector} VECTOR({})", spec.dimension),
    ];
    if let Some(payload) = &schema.payload_column {
        columns.push(format!("{} JSON", quote_identifier(payload)));
    }
    columns.push("`created_at` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP".to_string());
    columns.push(
        "`updated_at` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP"
            .to_string(),
    );
    columns.push(format!(
        "VECTOR INDEX {} (({}({vector})))",
        quote_identifier(&vector_index_name(&schema.table, &schema.vector_column)),
        spec.distance.index_function()
    ));

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        quote_identifier(&schema.table),
        columns.join(",\n    ")
    )
}

/// Columns written per record by an insert, in placeholder order.
pub fn insert_columns(schema: &TargetSchema) -> Vec<&str> {
    let mut cols = vec![schema.id_column.as_str(), schema.vector_column.as_str()];
    if let Some(payload) = &schema.payload_column {
        cols.push(payload.as_str());
    }
    cols
}

/// Multi-row `INSERT` with one placeholder tuple per record.
pub fn insert_sql(schema: &TargetSchema, rows: usize) -> Result<String, DbError> {
    if rows == 0 {
        return Err(DbError::QueryBuildError(format!(
            "insert into '{}' needs at least one row",
            schema.table
        )));
    }

    let columns = insert_columns(schema);
    let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![tuple.as_str(); rows].join(", ");

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_identifier(&schema.table),
        columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", "),
        values
    ))
}

/// Per-record update by id. Placeholders: vector, [payload,] id.
pub fn update_sql(schema: &TargetSchema) -> String {
    let mut assignments = vec![format!("{} = ?", quote_identifier(&schema.vector_column))];
    if let Some(payload) = &schema.payload_column {
        assignments.push(format!("{} = ?", quote_identifier(payload)));
    }

    format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_identifier(&schema.table),
        assignments.join(", "),
        quote_identifier(&schema.id_column)
    )
}

/// Splits `table` into consecutive pages of `batch_size` rows ordered by
/// `id_column`. Keys come back as text so any orderable id type works.
pub fn table_pagination_sql(table: &str, id_column: &str, batch_size: usize) -> String {
    let id = quote_identifier(id_column);
    format!(
        "SELECT CAST(FLOOR((row_num - 1) / {batch_size}) + 1 AS UNSIGNED) AS page_num, \
         CAST(MIN(t1.{id}) AS CHAR) AS start_key, \
         CAST(MAX(t1.{id}) AS CHAR) AS end_key, \
         COUNT(*) AS page_size \
         FROM (SELECT {id}, ROW_NUMBER() OVER (ORDER BY {id}) AS row_num FROM {table}) t1 \
         GROUP BY page_num ORDER BY page_num",
        table = quote_identifier(table),
    )
}

/// Set-based update of one key range. Placeholders: start_key, end_key.
pub fn range_update_sql(job: &BatchUpdateJob) -> Result<String, DbError> {
    if job.column_mapping.is_empty() {
        return Err(DbError::QueryBuildError(format!(
            "no columns mapped from '{}' to '{}'",
            job.source_table, job.target_table
        )));
    }

    let source_id = quote_identifier(&job.source_id_column);
    let mut select_cols = vec![format!("s.{source_id}")];
    let mut assignments = Vec::with_capacity(job.column_mapping.len());
    for mapping in &job.column_mapping {
        let src = quote_identifier(&mapping.source);
        let col = format!("s.{src}");
        if !select_cols.contains(&col) {
            select_cols.push(col);
        }
        assignments.push(format!("t.{} = s.{src}", quote_identifier(&mapping.target)));
    }

    Ok(format!(
        "WITH update_source AS (\
         SELECT {cols} FROM {source} s WHERE s.{source_id} >= ? AND s.{source_id} <= ?\
         ) UPDATE {target} AS t JOIN update_source s ON s.{source_id} = t.{target_id} SET {sets}",
        cols = select_cols.join(", "),
        source = quote_identifier(&job.source_table),
        target = quote_identifier(&job.target_table),
        target_id = quote_identifier(&job.target_id_column),
        sets = assignments.join(", "),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        core::distance::DistanceMetric,
        execution::job::{ColumnMapping, IdColumnType},
    };

    fn schema() -> TargetSchema {
        TargetSchema::new("docs")
    }

    #[test]
    fn quotes_backticks() {
        assert_eq!(quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn create_table_carries_metric_index() {
        let spec = TableSpec {
            schema: schema(),
            id_type: IdColumnType::Varchar(36),
            dimension: 384,
            distance: DistanceMetric::L2,
        };
        let sql = create_vector_table_sql(&spec);
        assert!(sql.starts_with("CREATE TABLE `docs` ("));
        assert!(sql.contains("`id` VARCHAR(36) PRIMARY KEY"));
        assert!(sql.contains("`vector` VECTOR(384)"));
        assert!(sql.contains("`payload` JSON"));
        assert!(sql.contains("ON UPDATE CURRENT_TIMESTAMP"));
        assert!(sql.contains("VECTOR INDEX `vec_idx_docs_on_vector` ((VEC_L2_DISTANCE(`vector`)))"));
    }

    #[test]
    fn create_table_without_payload_column() {
        let spec = TableSpec {
            schema: schema().with_payload_column(None),
            id_type: IdColumnType::UnsignedBigInt,
            dimension: 3,
            distance: DistanceMetric::Cosine,
        };
        let sql = create_vector_table_sql(&spec);
        assert!(sql.contains("`id` BIGINT UNSIGNED PRIMARY KEY"));
        assert!(!sql.contains("JSON"));
        assert!(sql.contains("VEC_COSINE_DISTANCE"));
    }

    #[test]
    fn insert_has_one_tuple_per_row() {
        let sql = insert_sql(&schema(), 2).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `docs` (`id`, `vector`, `payload`) VALUES (?, ?, ?), (?, ?, ?)"
        );
        assert!(insert_sql(&schema(), 0).is_err());
    }

    #[test]
    fn update_skips_payload_when_unmapped() {
        assert_eq!(
            update_sql(&schema()),
            "UPDATE `docs` SET `vector` = ?, `payload` = ? WHERE `id` = ?"
        );
        assert_eq!(
            update_sql(&schema().with_payload_column(None)),
            "UPDATE `docs` SET `vector` = ? WHERE `id` = ?"
        );
    }

    #[test]
    fn range_update_joins_on_ids() {
        let job = BatchUpdateJob {
            source_table: "src".into(),
            source_id_column: "id".into(),
            target_table: "dst".into(),
            target_id_column: "doc_id".into(),
            column_mapping: vec![ColumnMapping {
                source: "embedding".into(),
                target: "vec".into(),
            }],
            batch_size: 5000,
            workers: 1,
            compact: false,
        };
        let sql = range_update_sql(&job).unwrap();
        assert!(sql.starts_with("WITH update_source AS (SELECT s.`id`, s.`embedding` FROM `src` s"));
        assert!(sql.contains("WHERE s.`id` >= ? AND s.`id` <= ?"));
        assert!(sql.ends_with("UPDATE `dst` AS t JOIN update_source s ON s.`id` = t.`doc_id` SET t.`vec` = s.`embedding`"));
    }

    #[test]
    fn pagination_groups_by_row_number() {
        let sql = table_pagination_sql("src", "id", 5000);
        assert!(sql.contains("FLOOR((row_num - 1) / 5000) + 1"));
        assert!(sql.contains("ROW_NUMBER() OVER (ORDER BY `id`)"));
        assert!(sql.ends_with("GROUP BY page_num ORDER BY page_num"));
    }
}
