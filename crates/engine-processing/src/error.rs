use connectors::{error::SourceError, file::csv::error::FileError, sql::base::error::DbError};
use model::execution::errors::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid transfer job: {0}")]
    InvalidJob(#[from] ModelError),

    #[error("Collection '{collection}' does not exist")]
    CollectionNotFound { collection: String },

    #[error("Collection '{collection}' is empty; nothing to transfer")]
    EmptyCollection { collection: String },

    #[error("Source call '{operation}' failed for collection '{collection}': {source}")]
    Source {
        collection: String,
        operation: &'static str,
        #[source]
        source: SourceError,
    },

    #[error("Collection '{collection}' uses distance '{distance}'; only cosine and L2 are supported")]
    UnsupportedDistance { collection: String, distance: String },

    #[error("Collection '{collection}' mixes integer and string point ids; pass an explicit id column type")]
    MixedIdTypes { collection: String },

    #[error("Table '{table}' already exists; drop it first or use update mode")]
    TableExists { table: String },

    #[error("Table '{table}' does not exist")]
    TableNotFound { table: String },

    #[error("Table '{table}' is missing columns: {columns}")]
    MissingColumns { table: String, columns: String },

    #[error("Failed to prepare table '{table}': {source}")]
    Bootstrap {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("Failed to open a session on the target: {0}")]
    Session(#[source] DbError),

    #[error("Failed to write batch '{batch_id}' to table '{table}': {source}")]
    Write {
        batch_id: String,
        table: String,
        #[source]
        source: DbError,
    },

    #[error("The batch channel was closed unexpectedly")]
    ChannelClosed,

    #[error("Worker task failed: {0}")]
    Worker(String),
}

#[derive(Error, Debug)]
pub enum BatchUpdateError {
    #[error("Invalid batch update job: {0}")]
    InvalidJob(#[from] ModelError),

    #[error("Table '{table}' does not exist")]
    TableNotFound { table: String },

    #[error("Column '{column}' does not exist in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("Target call failed for table '{table}': {source}")]
    Db {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("Update of page {page_num} ({start_key}..={end_key}) failed: {source}")]
    Page {
        page_num: u64,
        start_key: String,
        end_key: String,
        #[source]
        source: DbError,
    },

    #[error("Worker task failed: {0}")]
    Worker(String),
}

#[derive(Error, Debug)]
pub enum DumpError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("Failed to write export file: {0}")]
    File(#[from] FileError),
}
