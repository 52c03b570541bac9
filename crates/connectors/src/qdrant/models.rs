//! Request and response bodies of the Qdrant REST API subset used here.

use model::{core::identifiers::PointId, records::record::Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Envelope wrapping every Qdrant response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub result: T,
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    #[serde(default)]
    pub time: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ExistsResult {
    pub exists: bool,
}

#[derive(Debug, Serialize)]
pub struct CountRequest {
    pub exact: bool,
}

#[derive(Debug, Deserialize)]
pub struct CountResult {
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct CollectionDescription {
    pub config: CollectionConfig,
}

#[derive(Debug, Deserialize)]
pub struct CollectionConfig {
    pub params: CollectionParams,
}

#[derive(Debug, Deserialize)]
pub struct CollectionParams {
    pub vectors: VectorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorParams {
    pub size: usize,
    pub distance: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum VectorsConfig {
    Single(VectorParams),
    Named(HashMap<String, VectorParams>),
}

#[derive(Debug, Serialize)]
pub struct ScrollRequestBody {
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<PointId>,
    pub with_payload: bool,
    pub with_vector: bool,
}

#[derive(Debug, Deserialize)]
pub struct ScrollResult {
    pub points: Vec<RawPoint>,
    #[serde(default)]
    pub next_page_offset: Option<PointId>,
}

#[derive(Debug, Deserialize)]
pub struct RawPoint {
    pub id: PointId,
    #[serde(default)]
    pub vector: Option<RawVector>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawVector {
    Dense(Vec<f32>),
    Named(serde_json::Map<String, serde_json::Value>),
}

#[derive(Debug, Serialize)]
pub struct RecoverSnapshotRequest<'a> {
    pub location: &'a str,
}

impl RawPoint {
    /// Converts to a [`Record`]; only single unnamed dense vectors are supported.
    pub fn into_record(self) -> Result<Record, String> {
        let vector = match self.vector {
            None => Vec::new(),
            Some(RawVector::Dense(values)) => values,
            Some(RawVector::Named(map)) => {
                let names = map.keys().cloned().collect::<Vec<_>>().join(", ");
                return Err(format!(
                    "point {} carries named vectors [{names}]",
                    self.id
                ));
            }
        };

        Ok(Record {
            id: self.id,
            vector,
            payload: self.payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_scroll_response() {
        let body = json!({
            "result": {
                "points": [
                    {"id": 1, "vector": [0.1, 0.2], "payload": {"city": "Berlin"}},
                    {"id": "5c56c793-69f3-4fbf-87e6-c4bf54c28c26", "vector": [0.3, 0.4]}
                ],
                "next_page_offset": 3
            },
            "status": "ok",
            "time": 0.001
        });

        let resp: ApiResponse<ScrollResult> = serde_json::from_value(body).unwrap();
        assert_eq!(resp.result.next_page_offset, Some(PointId::Num(3)));

        let records = resp
            .result
            .points
            .into_iter()
            .map(RawPoint::into_record)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].payload, Some(json!({"city": "Berlin"})));
        assert_eq!(records[1].payload, None);
    }

    #[test]
    fn rejects_named_vectors() {
        let point: RawPoint =
            serde_json::from_value(json!({"id": 9, "vector": {"image": [0.1]}})).unwrap();
        let err = point.into_record().unwrap_err();
        assert!(err.contains("image"));
    }

    #[test]
    fn decodes_single_vector_config() {
        let body = json!({
            "config": {"params": {"vectors": {"size": 384, "distance": "Cosine"}}}
        });
        let desc: CollectionDescription = serde_json::from_value(body).unwrap();
        match desc.config.params.vectors {
            VectorsConfig::Single(params) => {
                assert_eq!(params.size, 384);
                assert_eq!(params.distance, "Cosine");
            }
            VectorsConfig::Named(_) => panic!("expected a single vector config"),
        }
    }

    #[test]
    fn scroll_body_omits_missing_offset() {
        let body = ScrollRequestBody {
            limit: 100,
            offset: None,
            with_payload: true,
            with_vector: false,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("offset").is_none());
        assert_eq!(value["limit"], 100);
    }
}
