use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a point in the source collection.
///
/// Qdrant accepts either unsigned integers or UUID strings, and the two kinds
/// never compare equal. Integers order before strings so that a mixed
/// collection still has a total order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl PointId {
    pub fn is_numeric(&self) -> bool {
        matches!(self, PointId::Num(_))
    }

    /// Length of the identifier as it would be stored in a text column.
    pub fn text_len(&self) -> usize {
        match self {
            PointId::Num(n) => n.to_string().len(),
            PointId::Uuid(s) => s.chars().count(),
        }
    }

    /// Parses a user supplied id. Anything that is a valid `u64` is numeric.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<u64>() {
            Ok(n) => PointId::Num(n),
            Err(_) => PointId::Uuid(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Uuid(s) => f.write_str(s),
        }
    }
}

impl From<u64> for PointId {
    fn from(n: u64) -> Self {
        PointId::Num(n)
    }
}

impl From<&str> for PointId {
    fn from(s: &str) -> Self {
        PointId::Uuid(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_deserialize_as_num() {
        let id: PointId = serde_json::from_str("42").unwrap();
        assert_eq!(id, PointId::Num(42));

        let id: PointId = serde_json::from_str(r#""5c56c793-69f3-4fbf-87e6-c4bf54c28c26""#).unwrap();
        assert_eq!(id.text_len(), 36);
        assert!(!id.is_numeric());
    }

    #[test]
    fn parse_prefers_numbers() {
        assert_eq!(PointId::parse(" 17 "), PointId::Num(17));
        assert_eq!(PointId::parse("abc"), PointId::Uuid("abc".into()));
    }

    #[test]
    fn integers_order_before_strings() {
        let mut ids = vec![PointId::from("a"), PointId::Num(9), PointId::Num(1)];
        ids.sort();
        assert_eq!(ids, vec![PointId::Num(1), PointId::Num(9), PointId::from("a")]);
    }
}
