use crate::core::identifiers::PointId;
use serde::{Deserialize, Serialize};

/// A single point moved from the source collection to the target table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: PointId,
    /// Empty when the scan was issued without vectors.
    pub vector: Vec<f32>,
    pub payload: Option<serde_json::Value>,
}

impl Record {
    pub fn new(id: impl Into<PointId>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// JSON array text accepted by a TiDB `VECTOR` column, e.g. `[0.1,0.2]`.
    pub fn vector_literal(&self) -> String {
        serde_json::to_string(&self.vector).unwrap_or_else(|_| "[]".to_string())
    }

    /// JSON text for the attribute column; a missing payload is the JSON `null`.
    pub fn payload_literal(&self) -> String {
        match &self.payload {
            None => "null".to_string(),
            Some(value) => value.to_string(),
        }
    }

    /// Rough in-memory footprint, used for throughput metrics.
    pub fn size_bytes(&self) -> usize {
        let id = self.id.text_len();
        let vector = self.vector.len() * std::mem::size_of::<f32>();
        let payload = self.payload.as_ref().map(|p| p.to_string().len()).unwrap_or(0);
        id + vector + payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literals_are_json_text() {
        let record = Record::new(7, vec![0.5, 1.0]).with_payload(json!({"k": "v"}));
        assert_eq!(record.vector_literal(), "[0.5,1.0]");
        assert_eq!(record.payload_literal(), r#"{"k":"v"}"#);
    }

    #[test]
    fn missing_payload_is_json_null() {
        assert_eq!(Record::new(1, vec![]).payload_literal(), "null");
        let record = Record::new(2, vec![]).with_payload(serde_json::Value::Null);
        assert_eq!(record.payload_literal(), "null");
    }
}
