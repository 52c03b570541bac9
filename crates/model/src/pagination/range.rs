use serde::{Deserialize, Serialize};

/// A contiguous key interval of the source table, driving one bulk update.
///
/// Keys are kept as text, exactly as the database renders the ordering
/// column; the update statement compares them against the column directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRange {
    pub page_num: u64,
    pub start_key: String,
    pub end_key: String,
    pub page_size: u64,
}

impl PartitionRange {
    pub fn new(
        page_num: u64,
        start_key: impl Into<String>,
        end_key: impl Into<String>,
        page_size: u64,
    ) -> Self {
        Self {
            page_num,
            start_key: start_key.into(),
            end_key: end_key.into(),
            page_size,
        }
    }
}

/// Sum of all page sizes, i.e. the row count at partition time.
pub fn total_rows(ranges: &[PartitionRange]) -> u64 {
    ranges.iter().map(|r| r.page_size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_add_up() {
        let ranges = vec![
            PartitionRange::new(1, "1", "5000", 5000),
            PartitionRange::new(2, "5001", "10000", 5000),
            PartitionRange::new(3, "10001", "10500", 500),
        ];
        assert_eq!(total_rows(&ranges), 10_500);
    }
}
