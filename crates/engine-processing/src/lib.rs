pub mod batch_update;
pub mod bootstrap;
pub mod consumer;
pub mod dump;
pub mod error;
pub mod producer;
pub mod retry;
pub mod scheduler;
