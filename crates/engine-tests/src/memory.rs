//! In-memory stand-ins for the vector store and the SQL target.

use async_trait::async_trait;
use connectors::{
    error::SourceError,
    source::{CollectionInfo, ScrollRequest, VectorSource},
    sql::base::{
        error::DbError,
        target::{TableSpec, TargetSession, TargetStore},
    },
};
use model::{
    core::identifiers::PointId,
    execution::job::{BatchUpdateJob, TargetSchema},
    pagination::{cursor::Cursor, page::ScrollPage, range::PartitionRange},
    records::record::Record,
};
use mysql_async::ServerError;
use serde_json::{Value, json};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

#[derive(Debug, Clone)]
pub struct ScrollCall {
    pub collection: String,
    pub limit: usize,
    pub cursor: Option<PointId>,
    pub with_vector: bool,
}

#[derive(Debug, Clone)]
struct MemoryCollection {
    dimension: usize,
    distance: String,
    points: BTreeMap<PointId, Record>,
}

/// A Qdrant-like collection store. Pages are ordered by id and the
/// continuation cursor is the id of the first record of the next page.
#[derive(Default)]
pub struct MemorySource {
    collections: Mutex<HashMap<String, MemoryCollection>>,
    calls: Mutex<Vec<ScrollCall>>,
    recovered: Mutex<Vec<(String, String)>>,
    /// Scrolls asking for more than this many records fail as too large.
    max_page: Mutex<Option<usize>>,
    transient_failures: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(
        self,
        name: &str,
        dimension: usize,
        distance: &str,
        records: Vec<Record>,
    ) -> Self {
        let points = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        self.collections.lock().unwrap().insert(
            name.to_string(),
            MemoryCollection {
                dimension,
                distance: distance.to_string(),
                points,
            },
        );
        self
    }

    pub fn with_max_page(self, max: usize) -> Self {
        *self.max_page.lock().unwrap() = Some(max);
        self
    }

    pub fn fail_next_scrolls(&self, n: usize) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<ScrollCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Limits of scrolls that fetched vectors, i.e. excluding id sampling.
    pub fn data_fetch_limits(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter(|c| c.with_vector)
            .map(|c| c.limit)
            .collect()
    }

    pub fn recovered(&self) -> Vec<(String, String)> {
        self.recovered.lock().unwrap().clone()
    }

    fn endpoint(collection: &str, action: &str) -> String {
        format!("/collections/{collection}/{action}")
    }
}

#[async_trait]
impl VectorSource for MemorySource {
    async fn collection_exists(&self, collection: &str) -> Result<bool, SourceError> {
        Ok(self.collections.lock().unwrap().contains_key(collection))
    }

    async fn count(&self, collection: &str) -> Result<u64, SourceError> {
        let collections = self.collections.lock().unwrap();
        match collections.get(collection) {
            Some(c) => Ok(c.points.len() as u64),
            None => Err(SourceError::Status {
                endpoint: Self::endpoint(collection, "points/count"),
                status: 404,
                body: format!("Collection `{collection}` doesn't exist!"),
            }),
        }
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, SourceError> {
        let collections = self.collections.lock().unwrap();
        match collections.get(collection) {
            Some(c) => Ok(CollectionInfo {
                dimension: c.dimension,
                distance: c.distance.clone(),
            }),
            None => Err(SourceError::Status {
                endpoint: Self::endpoint(collection, ""),
                status: 404,
                body: format!("Collection `{collection}` doesn't exist!"),
            }),
        }
    }

    async fn scroll(
        &self,
        collection: &str,
        request: &ScrollRequest,
    ) -> Result<ScrollPage, SourceError> {
        self.calls.lock().unwrap().push(ScrollCall {
            collection: collection.to_string(),
            limit: request.limit,
            cursor: request.cursor.as_ref().map(|c| c.position().clone()),
            with_vector: request.with_vector,
        });

        let endpoint = Self::endpoint(collection, "points/scroll");
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SourceError::Status {
                endpoint,
                status: 503,
                body: "service unavailable".into(),
            });
        }
        let max_page = *self.max_page.lock().unwrap();
        if max_page.is_some_and(|max| request.limit > max) {
            return Err(SourceError::PayloadTooLarge {
                endpoint,
                message: format!("Message too long ({} points)", request.limit),
            });
        }

        let collections = self.collections.lock().unwrap();
        let Some(c) = collections.get(collection) else {
            return Err(SourceError::Status {
                endpoint,
                status: 404,
                body: format!("Collection `{collection}` doesn't exist!"),
            });
        };

        let mut iter: Box<dyn Iterator<Item = (&PointId, &Record)>> = match &request.cursor {
            Some(cursor) => Box::new(c.points.range(cursor.position().clone()..)),
            None => Box::new(c.points.iter()),
        };

        let mut records = Vec::with_capacity(request.limit);
        for (_, record) in iter.by_ref().take(request.limit) {
            let mut record = record.clone();
            if !request.with_vector {
                record.vector.clear();
            }
            if !request.with_payload {
                record.payload = None;
            }
            records.push(record);
        }
        let next = iter.next().map(|(id, _)| Cursor::new(id.clone()));

        Ok(ScrollPage::new(records, next))
    }

    async fn recover_snapshot(&self, collection: &str, location: &str) -> Result<(), SourceError> {
        self.recovered
            .lock()
            .unwrap()
            .push((collection.to_string(), location.to_string()));
        Ok(())
    }
}

pub type MemoryRow = HashMap<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<String>,
    pub rows: BTreeMap<PointId, MemoryRow>,
    pub spec: Option<TableSpec>,
}

#[derive(Default)]
struct TargetState {
    tables: HashMap<String, MemoryTable>,
    compacted: Vec<String>,
    range_calls: Vec<u64>,
    /// `(session id, rows)` for every committed write.
    writes: Vec<(usize, usize)>,
}

/// A SQL-like target keyed by id. Every write is all-or-nothing.
#[derive(Clone, Default)]
pub struct MemoryTarget {
    state: Arc<Mutex<TargetState>>,
    sessions_opened: Arc<AtomicUsize>,
    write_failures: Arc<AtomicUsize>,
    failing_page: Arc<Mutex<Option<u64>>>,
}

pub fn server_error(code: u16, state: &str, message: &str) -> DbError {
    DbError::MySql(mysql_async::Error::Server(ServerError {
        code,
        message: message.to_string(),
        state: state.to_string(),
    }))
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, columns: &[&str]) -> Self {
        self.state.lock().unwrap().tables.insert(
            name.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                ..MemoryTable::default()
            },
        );
        self
    }

    pub fn put_row(&self, table: &str, id: PointId, values: Vec<(&str, Value)>) {
        let mut state = self.state.lock().unwrap();
        let table = state.tables.entry(table.to_string()).or_default();
        let row = table.rows.entry(id).or_default();
        for (column, value) in values {
            row.insert(column.to_string(), value);
        }
    }

    pub fn table(&self, table: &str) -> Option<MemoryTable> {
        self.state.lock().unwrap().tables.get(table).cloned()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.table(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn ids(&self, table: &str) -> Vec<PointId> {
        self.table(table)
            .map(|t| t.rows.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn row(&self, table: &str, id: &PointId) -> Option<MemoryRow> {
        self.table(table).and_then(|t| t.rows.get(id).cloned())
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<(usize, usize)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn range_calls(&self) -> Vec<u64> {
        self.state.lock().unwrap().range_calls.clone()
    }

    pub fn compacted(&self) -> Vec<String> {
        self.state.lock().unwrap().compacted.clone()
    }

    /// The next `n` writes fail with a deadlock error.
    pub fn fail_next_writes(&self, n: usize) {
        self.write_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_page(&self, page_num: u64) {
        *self.failing_page.lock().unwrap() = Some(page_num);
    }

    fn take_write_failure(&self) -> Option<DbError> {
        self.write_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| server_error(1213, "40001", "Deadlock found when trying to get lock"))
    }
}

#[async_trait]
impl TargetStore for MemoryTarget {
    async fn session(&self) -> Result<Box<dyn TargetSession>, DbError> {
        let id = self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            id,
            target: self.clone(),
        }))
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        Ok(self.state.lock().unwrap().tables.contains_key(table))
    }

    async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError> {
        Ok(self.table(table).map(|t| t.columns).unwrap_or_default())
    }

    async fn row_count(&self, table: &str) -> Result<u64, DbError> {
        Ok(MemoryTarget::row_count(self, table) as u64)
    }

    async fn drop_table(&self, table: &str) -> Result<(), DbError> {
        self.state.lock().unwrap().tables.remove(table);
        Ok(())
    }

    async fn create_vector_table(&self, spec: &TableSpec) -> Result<(), DbError> {
        let mut state = self.state.lock().unwrap();
        let name = &spec.schema.table;
        if state.tables.contains_key(name) {
            return Err(server_error(1050, "42S01", &format!("Table '{name}' already exists")));
        }

        let mut columns = vec![spec.schema.id_column.clone(), spec.schema.vector_column.clone()];
        if let Some(payload) = &spec.schema.payload_column {
            columns.push(payload.clone());
        }
        columns.push("created_at".into());
        columns.push("updated_at".into());

        state.tables.insert(
            name.clone(),
            MemoryTable {
                columns,
                rows: BTreeMap::new(),
                spec: Some(spec.clone()),
            },
        );
        Ok(())
    }

    async fn compact_table(&self, table: &str) -> Result<(), DbError> {
        self.state.lock().unwrap().compacted.push(table.to_string());
        Ok(())
    }

    async fn table_pagination(
        &self,
        table: &str,
        _id_column: &str,
        batch_size: usize,
    ) -> Result<Vec<PartitionRange>, DbError> {
        let ids = self.ids(table);
        Ok(ids
            .chunks(batch_size.max(1))
            .enumerate()
            .filter_map(|(i, chunk)| {
                let first = chunk.first()?;
                let last = chunk.last()?;
                Some(PartitionRange::new(
                    i as u64 + 1,
                    first.to_string(),
                    last.to_string(),
                    chunk.len() as u64,
                ))
            })
            .collect())
    }
}

pub struct MemorySession {
    id: usize,
    target: MemoryTarget,
}

#[async_trait]
impl TargetSession for MemorySession {
    async fn insert_records(
        &mut self,
        schema: &TargetSchema,
        records: &[Record],
    ) -> Result<u64, DbError> {
        if let Some(err) = self.target.take_write_failure() {
            return Err(err);
        }

        let mut state = self.target.state.lock().unwrap();
        let table = state
            .tables
            .get_mut(&schema.table)
            .ok_or_else(|| server_error(1146, "42S02", "Table doesn't exist"))?;

        let mut seen = std::collections::HashSet::new();
        for record in records {
            if table.rows.contains_key(&record.id) || !seen.insert(record.id.clone()) {
                return Err(server_error(
                    1062,
                    "23000",
                    &format!("Duplicate entry '{}' for key 'PRIMARY'", record.id),
                ));
            }
        }

        for record in records {
            table.rows.insert(record.id.clone(), vector_row(schema, record));
        }
        state.writes.push((self.id, records.len()));
        Ok(records.len() as u64)
    }

    async fn update_records(
        &mut self,
        schema: &TargetSchema,
        records: &[Record],
    ) -> Result<u64, DbError> {
        if let Some(err) = self.target.take_write_failure() {
            return Err(err);
        }

        let mut state = self.target.state.lock().unwrap();
        let table = state
            .tables
            .get_mut(&schema.table)
            .ok_or_else(|| server_error(1146, "42S02", "Table doesn't exist"))?;

        let mut affected = 0;
        for record in records {
            if let Some(row) = table.rows.get_mut(&record.id) {
                row.extend(vector_row(schema, record));
                affected += 1;
            }
        }
        state.writes.push((self.id, records.len()));
        Ok(affected)
    }

    async fn update_range(
        &mut self,
        job: &BatchUpdateJob,
        range: &PartitionRange,
    ) -> Result<u64, DbError> {
        let mut state = self.target.state.lock().unwrap();
        state.range_calls.push(range.page_num);

        if *self.target.failing_page.lock().unwrap() == Some(range.page_num) {
            return Err(server_error(1105, "HY000", "injected page failure"));
        }

        let start = PointId::parse(&range.start_key);
        let end = PointId::parse(&range.end_key);
        let source_rows: Vec<(PointId, MemoryRow)> = state
            .tables
            .get(&job.source_table)
            .map(|t| {
                t.rows
                    .range(start..=end)
                    .map(|(id, row)| (id.clone(), row.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let target = state
            .tables
            .get_mut(&job.target_table)
            .ok_or_else(|| server_error(1146, "42S02", "Table doesn't exist"))?;

        let mut affected = 0;
        for (id, source_row) in source_rows {
            if let Some(target_row) = target.rows.get_mut(&id) {
                for mapping in &job.column_mapping {
                    let value = source_row.get(&mapping.source).cloned().unwrap_or(Value::Null);
                    target_row.insert(mapping.target.clone(), value);
                }
                affected += 1;
            }
        }
        Ok(affected)
    }
}

fn vector_row(schema: &TargetSchema, record: &Record) -> MemoryRow {
    let mut row = MemoryRow::new();
    row.insert(schema.vector_column.clone(), json!(record.vector));
    if let Some(payload) = &schema.payload_column {
        row.insert(payload.clone(), record.payload.clone().unwrap_or(Value::Null));
    }
    row
}
