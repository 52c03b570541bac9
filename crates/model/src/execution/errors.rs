use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid distance metric '{0}': expected 'cosine' or 'l2'")]
    InvalidDistance(String),

    #[error("invalid id column type '{0}': expected BIGINT or VARCHAR(n)")]
    InvalidIdType(String),

    #[error("invalid transfer mode '{0}': expected 'create' or 'update'")]
    InvalidMode(String),

    #[error("invalid column mapping '{0}': expected SOURCE:TARGET")]
    InvalidMapping(String),

    #[error("invalid job configuration: {0}")]
    InvalidJob(String),
}
