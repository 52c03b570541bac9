use crate::{pagination::cursor::Cursor, records::record::Record};

/// Result of one scroll call against the source.
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub records: Vec<Record>,
    pub next: Option<Cursor>,
}

impl ScrollPage {
    pub fn new(records: Vec<Record>, next: Option<Cursor>) -> Self {
        Self { records, next }
    }

    /// An empty page without continuation marks the end of the collection.
    pub fn is_exhausted(&self) -> bool {
        self.records.is_empty() && self.next.is_none()
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }
}
