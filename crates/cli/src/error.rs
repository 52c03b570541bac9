use connectors::{
    error::SourceError,
    sql::base::error::{ConnectorError, DbError},
};
use engine_processing::error::{BatchUpdateError, DumpError, TransferError};
use model::execution::errors::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid option value: {0}")]
    Model(#[from] ModelError),

    #[error("Qdrant error: {0}")]
    Source(#[from] SourceError),

    #[error("Failed to connect to TiDB: {0}")]
    Connector(#[from] ConnectorError),

    #[error("TiDB error: {0}")]
    Db(#[from] DbError),

    #[error("Migration failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Batch update failed: {0}")]
    BatchUpdate(#[from] BatchUpdateError),

    #[error("Export failed: {0}")]
    Dump(#[from] DumpError),

    /// The run ended before every record was read.
    #[error("Migration incomplete: {0}")]
    Incomplete(String),

    #[error("Shutdown requested")]
    ShutdownRequested,
}
