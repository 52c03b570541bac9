pub mod errors;
pub mod job;
