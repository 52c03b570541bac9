use crate::{
    error::SourceError,
    qdrant::models::{
        ApiResponse, CollectionDescription, CountRequest, CountResult, ExistsResult, RawPoint,
        RecoverSnapshotRequest, ScrollRequestBody, ScrollResult, VectorsConfig,
    },
    source::{CollectionInfo, ScrollRequest, VectorSource},
};
use async_trait::async_trait;
use model::pagination::{cursor::Cursor, page::ScrollPage};
use reqwest::{Method, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, info};

const API_KEY_HEADER: &str = "api-key";

/// Thin REST client over the subset of the Qdrant API needed for transfers.
#[derive(Clone)]
pub struct QdrantClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl QdrantClient {
    pub fn new(url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, SourceError> {
        let base_url = Url::parse(url).map_err(|e| SourceError::InvalidUrl(format!("{url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::InvalidUrl(url.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| SourceError::Transport {
                endpoint: url.to_string(),
                source,
            })?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<B, T>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T, SourceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let endpoint = url.path().to_string();
        let mut request = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|source| SourceError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;

        let status = response.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::PayloadTooLarge { endpoint, message });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|source| SourceError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;
        let envelope: ApiResponse<T> =
            serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode {
                endpoint,
                message: e.to_string(),
            })?;
        Ok(envelope.result)
    }
}

#[async_trait]
impl VectorSource for QdrantClient {
    async fn collection_exists(&self, collection: &str) -> Result<bool, SourceError> {
        let url = self.endpoint(&["collections", collection, "exists"])?;
        let result: ExistsResult = self.send::<(), _>(Method::GET, url, None).await?;
        Ok(result.exists)
    }

    async fn count(&self, collection: &str) -> Result<u64, SourceError> {
        let url = self.endpoint(&["collections", collection, "points", "count"])?;
        let result: CountResult = self
            .send(Method::POST, url, Some(&CountRequest { exact: true }))
            .await?;
        Ok(result.count)
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, SourceError> {
        let url = self.endpoint(&["collections", collection])?;
        let desc: CollectionDescription = self.send::<(), _>(Method::GET, url, None).await?;

        match desc.config.params.vectors {
            VectorsConfig::Single(params) => Ok(CollectionInfo {
                dimension: params.size,
                distance: params.distance,
            }),
            VectorsConfig::Named(map) => {
                let mut names: Vec<_> = map.into_keys().collect();
                names.sort();
                Err(SourceError::UnsupportedVector {
                    collection: collection.to_string(),
                    message: format!("named vectors are not supported: [{}]", names.join(", ")),
                })
            }
        }
    }

    async fn scroll(
        &self,
        collection: &str,
        request: &ScrollRequest,
    ) -> Result<ScrollPage, SourceError> {
        let url = self.endpoint(&["collections", collection, "points", "scroll"])?;
        let body = ScrollRequestBody {
            limit: request.limit,
            offset: request.cursor.as_ref().map(|c| c.position().clone()),
            with_payload: request.with_payload,
            with_vector: request.with_vector,
        };

        let result: ScrollResult = self.send(Method::POST, url, Some(&body)).await?;
        let records = result
            .points
            .into_iter()
            .map(RawPoint::into_record)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| SourceError::UnsupportedVector {
                collection: collection.to_string(),
                message,
            })?;

        debug!(
            collection,
            requested = request.limit,
            received = records.len(),
            has_next = result.next_page_offset.is_some(),
            "Scrolled page"
        );

        Ok(ScrollPage::new(records, result.next_page_offset.map(Cursor::new)))
    }

    async fn recover_snapshot(
        &self,
        collection: &str,
        location: &str,
    ) -> Result<(), SourceError> {
        let mut url = self.endpoint(&["collections", collection, "snapshots", "recover"])?;
        url.query_pairs_mut().append_pair("wait", "false");

        let _: serde_json::Value = self
            .send(Method::PUT, url, Some(&RecoverSnapshotRequest { location }))
            .await?;
        info!(collection, location, "Snapshot recovery requested");
        Ok(())
    }
}
