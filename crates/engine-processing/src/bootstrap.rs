use crate::{
    error::TransferError,
    producer::components::reader::{CursorReader, FetchOutcome},
};
use connectors::{
    source::VectorSource,
    sql::base::target::{TableSpec, TargetStore},
};
use model::{
    core::{distance::DistanceMetric, identifiers::PointId},
    execution::job::{IdColumnType, TransferJob, TransferMode},
};
use std::collections::HashSet;
use tracing::{info, warn};

/// What the scheduler learned about the source before moving data.
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub collection: String,
    pub total: u64,
    pub dimension: usize,
    pub distance: DistanceMetric,
    /// Only resolved in create mode.
    pub id_type: Option<IdColumnType>,
}

/// Picks the id column type for a sample of ids.
///
/// Integers map to `BIGINT UNSIGNED`; strings to `VARCHAR(n)` with `n` the longest id
/// in the sample. Later ids may be longer than anything sampled, which is why
/// an explicit override exists.
pub fn infer_id_type(
    collection: &str,
    ids: &[PointId],
) -> Result<Option<IdColumnType>, TransferError> {
    let Some(first) = ids.first() else {
        return Ok(None);
    };

    if ids.iter().any(|id| id.is_numeric() != first.is_numeric()) {
        return Err(TransferError::MixedIdTypes {
            collection: collection.to_string(),
        });
    }

    if first.is_numeric() {
        return Ok(Some(IdColumnType::UnsignedBigInt));
    }

    let longest = ids.iter().map(PointId::text_len).max().unwrap_or(1).max(1);
    Ok(Some(IdColumnType::Varchar(longest)))
}

/// Validates the source and gathers everything bootstrap needs.
pub async fn profile_source(
    source: &dyn VectorSource,
    sampler: &mut CursorReader,
    job: &TransferJob,
) -> Result<SourceProfile, TransferError> {
    let total = sampler.check_preconditions().await?;

    let info = source
        .collection_info(&job.collection)
        .await
        .map_err(|source| TransferError::Source {
            collection: job.collection.clone(),
            operation: "collection_info",
            source,
        })?;

    let distance: DistanceMetric =
        info.distance
            .parse()
            .map_err(|_| TransferError::UnsupportedDistance {
                collection: job.collection.clone(),
                distance: info.distance.clone(),
            })?;

    let id_type = match (job.mode, job.id_type_override) {
        (TransferMode::Update, _) => None,
        (TransferMode::Create, Some(explicit)) => Some(explicit),
        (TransferMode::Create, None) => {
            let ids = sample_ids(sampler, job.id_sample_size).await?;
            let inferred = infer_id_type(&job.collection, &ids)?;
            info!(
                collection = %job.collection,
                sampled = ids.len(),
                id_type = ?inferred,
                "Inferred id column type"
            );
            inferred
        }
    };

    Ok(SourceProfile {
        collection: job.collection.clone(),
        total,
        dimension: info.dimension,
        distance,
        id_type,
    })
}

async fn sample_ids(
    sampler: &mut CursorReader,
    sample_size: usize,
) -> Result<Vec<PointId>, TransferError> {
    match sampler.fetch(None, sample_size.max(1)).await? {
        FetchOutcome::Page(page) => Ok(page.records.into_iter().map(|r| r.id).collect()),
        FetchOutcome::Exhausted => Ok(Vec::new()),
        FetchOutcome::Failed(reason) => {
            warn!(reason = %reason, "Could not sample ids");
            Ok(Vec::new())
        }
    }
}

/// Creates the target table (create mode) or verifies it (update mode).
pub async fn prepare_target(
    target: &dyn TargetStore,
    job: &TransferJob,
    profile: &SourceProfile,
) -> Result<(), TransferError> {
    let table = &job.schema.table;
    let db_err = |source| TransferError::Bootstrap {
        table: table.clone(),
        source,
    };

    match job.mode {
        TransferMode::Create => {
            if job.drop_table {
                target.drop_table(table).await.map_err(db_err)?;
            } else if target.table_exists(table).await.map_err(db_err)? {
                return Err(TransferError::TableExists {
                    table: table.clone(),
                });
            }

            let id_type = profile.id_type.unwrap_or(IdColumnType::UnsignedBigInt);
            let spec = TableSpec {
                schema: job.schema.clone(),
                id_type,
                dimension: profile.dimension,
                distance: profile.distance,
            };
            target.create_vector_table(&spec).await.map_err(db_err)?;
        }
        TransferMode::Update => {
            if !target.table_exists(table).await.map_err(db_err)? {
                return Err(TransferError::TableNotFound {
                    table: table.clone(),
                });
            }

            let existing: HashSet<String> = target
                .column_names(table)
                .await
                .map_err(db_err)?
                .into_iter()
                .map(|c| c.to_lowercase())
                .collect();
            let missing: Vec<&str> = job
                .schema
                .required_columns()
                .into_iter()
                .filter(|c| !existing.contains(&c.to_lowercase()))
                .collect();
            if !missing.is_empty() {
                return Err(TransferError::MissingColumns {
                    table: table.clone(),
                    columns: missing.join(", "),
                });
            }
            info!(table = %table, "Target table verified");
        }
    }

    Ok(())
}
