use crate::execution::errors::ModelError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_UPDATE_SIZE: usize = 5000;
pub const DEFAULT_ID_SAMPLE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMode {
    /// Build a new table and insert every record.
    Create,
    /// Overwrite columns of existing rows matched by id; never inserts.
    Update,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Create => f.write_str("create"),
            TransferMode::Update => f.write_str("update"),
        }
    }
}

impl FromStr for TransferMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "create" => Ok(TransferMode::Create),
            "update" => Ok(TransferMode::Update),
            other => Err(ModelError::InvalidMode(other.to_string())),
        }
    }
}

/// SQL type of the target id column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdColumnType {
    BigInt,
    /// Holds every numeric point id, which may exceed `i64::MAX`.
    UnsignedBigInt,
    Varchar(usize),
}

impl IdColumnType {
    pub fn sql_type(&self) -> String {
        match self {
            IdColumnType::BigInt => "BIGINT".to_string(),
            IdColumnType::UnsignedBigInt => "BIGINT UNSIGNED".to_string(),
            IdColumnType::Varchar(len) => format!("VARCHAR({len})"),
        }
    }
}

impl fmt::Display for IdColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_type())
    }
}

impl FromStr for IdColumnType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(' ', "");
        match normalized.as_str() {
            "BIGINT" => return Ok(IdColumnType::BigInt),
            "BIGINTUNSIGNED" => return Ok(IdColumnType::UnsignedBigInt),
            _ => {}
        }

        normalized
            .strip_prefix("VARCHAR(")
            .and_then(|rest| rest.strip_suffix(')'))
            .and_then(|len| len.parse::<usize>().ok())
            .filter(|len| *len > 0)
            .map(IdColumnType::Varchar)
            .ok_or_else(|| ModelError::InvalidIdType(s.to_string()))
    }
}

/// Column layout of the target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSchema {
    pub table: String,
    pub id_column: String,
    pub vector_column: String,
    /// When absent, update mode leaves attributes untouched and create mode
    /// builds the table without an attribute column.
    pub payload_column: Option<String>,
}

impl TargetSchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_column: "id".to_string(),
            vector_column: "vector".to_string(),
            payload_column: Some("payload".to_string()),
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn with_vector_column(mut self, column: impl Into<String>) -> Self {
        self.vector_column = column.into();
        self
    }

    pub fn with_payload_column(mut self, column: Option<String>) -> Self {
        self.payload_column = column;
        self
    }

    /// Columns that must exist before an update-mode run.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut cols = vec![self.id_column.as_str(), self.vector_column.as_str()];
        if let Some(payload) = &self.payload_column {
            cols.push(payload.as_str());
        }
        cols
    }
}

/// Configuration snapshot of one collection-to-table transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferJob {
    pub collection: String,
    pub mode: TransferMode,
    pub schema: TargetSchema,
    pub batch_size: usize,
    pub workers: usize,
    pub drop_table: bool,
    /// Skips id-type inference when set.
    pub id_type_override: Option<IdColumnType>,
    pub id_sample_size: usize,
}

impl TransferJob {
    pub fn new(collection: impl Into<String>, mode: TransferMode, schema: TargetSchema) -> Self {
        Self {
            collection: collection.into(),
            mode,
            schema,
            batch_size: DEFAULT_BATCH_SIZE,
            workers: 1,
            drop_table: false,
            id_type_override: None,
            id_sample_size: DEFAULT_ID_SAMPLE_SIZE,
        }
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_drop_table(mut self, drop: bool) -> Self {
        self.drop_table = drop;
        self
    }

    pub fn with_id_type(mut self, id_type: Option<IdColumnType>) -> Self {
        self.id_type_override = id_type;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.collection.trim().is_empty() {
            return Err(ModelError::InvalidJob("collection name is empty".into()));
        }
        if self.schema.table.trim().is_empty() {
            return Err(ModelError::InvalidJob("target table name is empty".into()));
        }
        if self.batch_size == 0 {
            return Err(ModelError::InvalidJob("batch size must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(ModelError::InvalidJob("worker count must be at least 1".into()));
        }
        if self.mode == TransferMode::Update && self.drop_table {
            return Err(ModelError::InvalidJob(
                "drop-table is only valid in create mode".into(),
            ));
        }
        Ok(())
    }
}

/// A `source column -> target column` pair of a batch update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source: String,
    pub target: String,
}

impl FromStr for ColumnMapping {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((source, target)) if !source.trim().is_empty() && !target.trim().is_empty() => {
                Ok(ColumnMapping {
                    source: source.trim().to_string(),
                    target: target.trim().to_string(),
                })
            }
            _ => Err(ModelError::InvalidMapping(s.to_string())),
        }
    }
}

/// Configuration of a range-partitioned backfill between two tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUpdateJob {
    pub source_table: String,
    pub source_id_column: String,
    pub target_table: String,
    pub target_id_column: String,
    pub column_mapping: Vec<ColumnMapping>,
    pub batch_size: usize,
    pub workers: usize,
    pub compact: bool,
}

impl BatchUpdateJob {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.column_mapping.is_empty() {
            return Err(ModelError::InvalidJob("column mapping is empty".into()));
        }
        if self.batch_size == 0 {
            return Err(ModelError::InvalidJob("batch size must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(ModelError::InvalidJob("worker count must be at least 1".into()));
        }
        Ok(())
    }
}
