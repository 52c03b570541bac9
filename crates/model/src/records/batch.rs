use crate::{pagination::cursor::Cursor, records::record::Record};

#[derive(Debug, Clone)]
pub struct Batch {
    pub id: String,
    pub seq: usize,
    pub records: Vec<Record>,
    pub cursor: Option<Cursor>, // cursor the batch was fetched from (None = start of scan)
    pub next: Option<Cursor>,   // continuation returned with the batch (None = end of scan)
    pub ts: chrono::DateTime<chrono::Utc>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }

    pub fn size_bytes(&self) -> usize {
        self.records.iter().map(|r| r.size_bytes()).sum()
    }
}
