pub mod distance;
pub mod identifiers;
