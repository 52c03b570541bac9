use crate::core::identifiers::PointId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque continuation token of a scroll scan.
///
/// A cursor is only meaningful inside the scan that produced it. Qdrant
/// encodes it as the id of the next point, but callers must never inspect it
/// beyond passing it back to the source.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Cursor(PointId);

impl Cursor {
    pub fn new(position: PointId) -> Self {
        Cursor(position)
    }

    pub fn position(&self) -> &PointId {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
