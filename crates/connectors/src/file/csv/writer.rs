use crate::file::csv::error::FileError;
use csv::{Writer, WriterBuilder};
use model::records::record::Record;
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Which fields of a record go into the export, and under which headers.
#[derive(Debug, Clone)]
pub struct ExportColumns {
    pub include_vectors: bool,
    pub include_payload: bool,
    pub id_header: String,
    pub vector_header: String,
    pub payload_header: String,
}

impl Default for ExportColumns {
    fn default() -> Self {
        Self {
            include_vectors: true,
            include_payload: true,
            id_header: "id".to_string(),
            vector_header: "vector".to_string(),
            payload_header: "payload".to_string(),
        }
    }
}

impl ExportColumns {
    pub fn headers(&self) -> Vec<&str> {
        let mut headers = vec![self.id_header.as_str()];
        if self.include_vectors {
            headers.push(self.vector_header.as_str());
        }
        if self.include_payload {
            headers.push(self.payload_header.as_str());
        }
        headers
    }
}

/// Streams records into a CSV file, one row per record.
pub struct CsvExportWriter {
    path: PathBuf,
    columns: ExportColumns,
    inner: Writer<BufWriter<File>>,
    rows: usize,
}

impl CsvExportWriter {
    /// Creates (or truncates) `path`, creating missing parent directories,
    /// and writes the header row.
    pub fn create(
        path: impl AsRef<Path>,
        columns: ExportColumns,
        buffer_size: usize,
    ) -> Result<Self, FileError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                FileError::PermissionDenied(path.display().to_string())
            }
            _ => FileError::IoError(e),
        })?;

        let mut inner = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::with_capacity(buffer_size.max(8 * 1024), file));
        inner.write_record(columns.headers())?;

        debug!(path = %path.display(), headers = ?columns.headers(), "Opened CSV export");
        Ok(Self {
            path,
            columns,
            inner,
            rows: 0,
        })
    }

    pub fn write_records(&mut self, records: &[Record]) -> Result<usize, FileError> {
        for record in records {
            let mut fields = Vec::with_capacity(3);
            fields.push(record.id.to_string());
            if self.columns.include_vectors {
                fields.push(record.vector_literal());
            }
            if self.columns.include_payload {
                fields.push(payload_field(record));
            }
            self.inner.write_record(&fields)?;
        }
        self.rows += records.len();
        Ok(records.len())
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes buffered rows and returns the size of the file on disk.
    pub fn finish(mut self) -> Result<u64, FileError> {
        self.inner.flush()?;
        let bytes = fs::metadata(&self.path)?.len();
        debug!(path = %self.path.display(), rows = self.rows, bytes, "Closed CSV export");
        Ok(bytes)
    }
}

/// Empty string when there is nothing worth exporting.
fn payload_field(record: &Record) -> String {
    match &record.payload {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::Object(map)) if map.is_empty() => String::new(),
        Some(value) => value.to_string(),
    }
}
