pub mod error;
pub mod file;
pub mod qdrant;
pub mod source;
pub mod sql;
