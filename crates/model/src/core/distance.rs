use crate::execution::errors::ModelError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Similarity function backing the vector index of the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Cosine,
    L2,
}

impl DistanceMetric {
    /// TiDB distance function used in the vector index definition.
    pub fn index_function(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "VEC_COSINE_DISTANCE",
            DistanceMetric::L2 => "VEC_L2_DISTANCE",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = ModelError;

    /// Accepts the engine's own names as well as Qdrant's (`Cosine`, `Euclid`).
    /// `Dot` and `Manhattan` have no TiDB vector index and are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" | "euclid" | "euclidean" => Ok(DistanceMetric::L2),
            other => Err(ModelError::InvalidDistance(other.to_string())),
        }
    }
}
