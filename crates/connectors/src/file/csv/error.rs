use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV writing error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Failed to encode field: {0}")]
    EncodeError(String),
}
