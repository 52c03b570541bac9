use crate::sample::Dataset;
use clap::{Args, Subcommand, ValueEnum};
use model::execution::job::TransferMode;
use std::path::PathBuf;

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
pub const DEFAULT_TIDB_URL: &str = "mysql+pymysql://root:@localhost:4000/test";

#[derive(Args, Debug, Clone)]
pub struct QdrantArgs {
    #[arg(long, env = "QDRANT_API_URL", default_value = DEFAULT_QDRANT_URL)]
    pub qdrant_api_url: String,

    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    pub qdrant_api_key: Option<String>,

    #[arg(long, env = "QDRANT_COLLECTION_NAME")]
    pub qdrant_collection_name: String,

    #[arg(long, default_value_t = 60, help = "HTTP timeout for Qdrant requests, in seconds")]
    pub qdrant_timeout: u64,
}

#[derive(Args, Debug, Clone)]
pub struct TiDbArgs {
    #[arg(
        long,
        env = "TIDB_DATABASE_URL",
        default_value = DEFAULT_TIDB_URL,
        hide_env_values = true
    )]
    pub tidb_database_url: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Create a new table and insert every point
    Create,
    /// Update an existing table by matching ids
    Update,
}

impl From<ModeArg> for TransferMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Create => TransferMode::Create,
            ModeArg::Update => TransferMode::Update,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Migrate vector data from a Qdrant collection to a TiDB table
    Migrate {
        #[command(flatten)]
        qdrant: QdrantArgs,

        #[command(flatten)]
        tidb: TiDbArgs,

        #[arg(long, value_enum, default_value_t = ModeArg::Create)]
        mode: ModeArg,

        #[arg(
            long,
            help = "Target table; required in update mode, defaults to the collection name in create mode"
        )]
        table_name: Option<String>,

        #[arg(long, help = "Id column; required in update mode, defaults to 'id'")]
        id_column: Option<String>,

        #[arg(
            long,
            help = "Id column type, e.g. BIGINT or VARCHAR(64); inferred from sampled ids when omitted"
        )]
        id_column_type: Option<String>,

        #[arg(long, help = "Vector column; required in update mode, defaults to 'vector'")]
        vector_column: Option<String>,

        #[arg(
            long,
            help = "Payload column; optional in update mode, defaults to 'payload' in create mode"
        )]
        payload_column: Option<String>,

        #[arg(long, default_value_t = 100)]
        batch_size: usize,

        #[arg(long, default_value_t = 1, help = "Number of concurrent write workers")]
        workers: usize,

        #[arg(long, help = "Drop the target table if it exists")]
        drop_table: bool,

        #[arg(long, default_value_t = 100, help = "Number of ids sampled to infer the id column type")]
        id_sample_size: usize,
    },

    /// Export a Qdrant collection to a CSV file
    Dump {
        #[command(flatten)]
        qdrant: QdrantArgs,

        #[arg(long, short = 'o')]
        output_file: PathBuf,

        #[arg(long, help = "Maximum number of records to export")]
        limit: Option<u64>,

        #[arg(long, help = "Point id to start the export from")]
        offset: Option<String>,

        #[arg(long)]
        no_vectors: bool,

        #[arg(long)]
        no_payload: bool,

        #[arg(long, default_value_t = 500)]
        batch_size: usize,

        #[arg(long, default_value_t = 10_000, help = "Capacity of the file write buffer, in bytes")]
        buffer_size: usize,

        #[arg(long, default_value = "id")]
        id_header: String,

        #[arg(long, default_value = "vector")]
        vector_header: String,

        #[arg(long, default_value = "payload")]
        payload_header: String,
    },

    /// Backfill columns of one TiDB table from another, range by range
    BatchUpdate {
        #[command(flatten)]
        tidb: TiDbArgs,

        #[arg(long)]
        source_table: String,

        #[arg(long, default_value = "id")]
        source_id_column: String,

        #[arg(long)]
        target_table: String,

        #[arg(long, default_value = "id")]
        target_id_column: String,

        #[arg(
            long,
            required = true,
            value_delimiter = ',',
            help = "Column pairs as source:target, comma separated or repeated"
        )]
        column_mapping: Vec<String>,

        #[arg(long, default_value_t = model::execution::job::DEFAULT_BATCH_UPDATE_SIZE)]
        batch_size: usize,

        #[arg(long, default_value_t = 1)]
        workers: usize,

        #[arg(long, help = "Compact the target table before updating")]
        compact: bool,
    },

    /// Ask Qdrant to recover a sample collection from a snapshot
    LoadSample {
        #[command(flatten)]
        qdrant: QdrantArgs,

        #[arg(long, value_enum, default_value_t = Dataset::Midlib)]
        dataset: Dataset,

        #[arg(long, env = "SNAPSHOT_URI", help = "Overrides the dataset's snapshot location")]
        snapshot_uri: Option<String>,
    },

    /// Time create-mode migrations across worker counts and batch sizes
    Benchmark {
        #[command(flatten)]
        qdrant: QdrantArgs,

        #[command(flatten)]
        tidb: TiDbArgs,

        #[arg(long, value_delimiter = ',', default_values_t = vec![1usize, 2, 4, 8])]
        workers: Vec<usize>,

        #[arg(long, value_delimiter = ',', default_values_t = vec![100usize, 500, 1000])]
        batch_sizes: Vec<usize>,

        #[arg(long, default_value = "benchmark_test")]
        table_prefix: String,

        #[arg(long, help = "Drop the benchmark tables afterwards")]
        cleanup_tables: bool,
    },
}
