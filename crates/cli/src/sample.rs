use clap::ValueEnum;

const SNAPSHOT_BASE: &str = "https://snapshots.qdrant.io";

/// Public Qdrant snapshots that can be loaded as sample collections.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Midlib,
    QdrantDocs,
    PrefixCache,
}

impl Dataset {
    fn snapshot_file(&self) -> &'static str {
        match self {
            Dataset::Midlib => "midlib.snapshot",
            Dataset::QdrantDocs => "qdrant-docs-04-05.snapshot",
            Dataset::PrefixCache => "prefix-cache.snapshot",
        }
    }

    pub fn snapshot_uri(&self) -> String {
        format!("{SNAPSHOT_BASE}/{}", self.snapshot_file())
    }
}

/// An explicit URI wins over the dataset's default location.
pub fn resolve_snapshot_uri(dataset: Dataset, explicit: Option<&str>) -> String {
    match explicit.map(str::trim).filter(|uri| !uri.is_empty()) {
        Some(uri) => uri.to_string(),
        None => dataset.snapshot_uri(),
    }
}
