use crate::error::SourceError;
use async_trait::async_trait;
use model::pagination::{cursor::Cursor, page::ScrollPage};

/// Vector configuration of a source collection, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub dimension: usize,
    /// Raw distance name (e.g. `Cosine`, `Euclid`); validated by the engine.
    pub distance: String,
}

#[derive(Debug, Clone)]
pub struct ScrollRequest {
    /// `None` starts a new scan.
    pub cursor: Option<Cursor>,
    pub limit: usize,
    pub with_vector: bool,
    pub with_payload: bool,
}

impl ScrollRequest {
    pub fn new(cursor: Option<Cursor>, limit: usize) -> Self {
        Self {
            cursor,
            limit,
            with_vector: true,
            with_payload: true,
        }
    }
}

/// Read contract of a cursor-paginated vector store.
#[async_trait]
pub trait VectorSource: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> Result<bool, SourceError>;

    async fn count(&self, collection: &str) -> Result<u64, SourceError>;

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, SourceError>;

    /// Returns at most `request.limit` records plus the continuation cursor.
    async fn scroll(
        &self,
        collection: &str,
        request: &ScrollRequest,
    ) -> Result<ScrollPage, SourceError>;

    /// Asks the store to restore `collection` from a snapshot; does not wait.
    async fn recover_snapshot(&self, collection: &str, location: &str)
    -> Result<(), SourceError>;
}
