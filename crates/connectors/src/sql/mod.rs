pub mod base;
pub mod tidb;
