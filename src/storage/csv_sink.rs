use crate::config::SchemaVariant;
use crate::storage::schema::{self, COL_COMPANY_NAME};
use crate::storage::traits::{AppendOutcome, RecordSink, StorageError, StorageResult};
use crate::storage::CompanyRecord;
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// CSV-backed record sink
///
/// Rows for one call are encoded in memory first and land in the file with
/// a single write, so a failed encode never leaves half a batch behind.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
    schema: SchemaVariant,
}

impl CsvSink {
    /// Creates a sink writing to `path` with the given column layout
    ///
    /// Nothing is touched on disk until the first append.
    pub fn new(path: impl Into<PathBuf>, schema: SchemaVariant) -> Self {
        Self {
            path: path.into(),
            schema,
        }
    }

    /// Fails unless the existing header matches the configured layout
    fn check_header(&self) -> StorageResult<()> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;

        let mut first = csv::StringRecord::new();
        reader.read_record(&mut first)?;

        let found: Vec<&str> = first
            .iter()
            .map(|header| header.trim_start_matches('\u{feff}').trim())
            .collect();
        let expected = schema::columns(self.schema);

        if found.as_slice() != expected {
            return Err(StorageError::SchemaMismatch {
                path: self.path.display().to_string(),
                expected: expected.join(","),
                found: found.join(","),
            });
        }

        Ok(())
    }
}

impl RecordSink for CsvSink {
    /// Appends records, writing the header first when the file is missing or empty
    ///
    /// An empty batch leaves the destination untouched. Existing content must
    /// carry the header of the configured layout; a last row without its line
    /// break is terminated before the new rows.
    fn append(&mut self, records: &[CompanyRecord]) -> StorageResult<AppendOutcome> {
        if records.is_empty() {
            return Ok(AppendOutcome::Appended { rows: 0 });
        }

        let needs_header = !has_content(&self.path)?;
        let mut buffer = Vec::new();
        if !needs_header {
            self.check_header()?;
            if !ends_with_line_break(&self.path)? {
                buffer.push(b'\n');
            }
        }
        buffer.extend(encode(records, self.schema, needs_header)?);

        create_parent_dir(&self.path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&buffer)?;
        file.flush()?;
        file.sync_all()?;

        let rows = records.len();
        if needs_header {
            Ok(AppendOutcome::Created { rows })
        } else {
            Ok(AppendOutcome::Appended { rows })
        }
    }

    fn load_names(&self) -> StorageResult<Vec<String>> {
        if !has_content(&self.path)? {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;

        let index = reader
            .headers()?
            .iter()
            .position(|header| header.trim_start_matches('\u{feff}').trim() == COL_COMPANY_NAME)
            .ok_or_else(|| StorageError::MissingColumn {
                column: COL_COMPANY_NAME.to_string(),
                path: self.path.display().to_string(),
            })?;

        let mut names = Vec::new();
        for row in reader.records() {
            let row = row?;
            if let Some(name) = row.get(index) {
                names.push(name.to_string());
            }
        }

        Ok(names)
    }

    /// Writes the whole snapshot to a temporary file and renames it into place
    fn write_snapshot(&self, records: &[CompanyRecord], path: &Path) -> StorageResult<()> {
        let buffer = encode(records, self.schema, true)?;

        create_parent_dir(path)?;
        let tmp_path = path.with_extension("csv.tmp");
        fs::write(&tmp_path, &buffer)?;
        fs::rename(&tmp_path, path)?;

        Ok(())
    }

    fn destination(&self) -> &Path {
        &self.path
    }
}

/// Builds the timestamped path of a backup snapshot
///
/// The file name is `<prefix>_<YYYYmmdd_HHMMSS>.csv` inside `dir`.
pub fn snapshot_path(dir: &Path, prefix: &str, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("{}_{}.csv", prefix, at.format("%Y%m%d_%H%M%S")))
}

fn encode(
    records: &[CompanyRecord],
    schema: SchemaVariant,
    with_header: bool,
) -> StorageResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    if with_header {
        writer.write_record(schema::columns(schema))?;
    }

    for record in records {
        writer.write_record(schema::row(record, schema))?;
    }

    writer
        .into_inner()
        .map_err(|e| StorageError::Io(e.into_error()))
}

fn has_content(path: &Path) -> StorageResult<bool> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len() > 0),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn ends_with_line_break(path: &Path) -> StorageResult<bool> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(matches!(last[0], b'\n' | b'\r'))
}

fn create_parent_dir(path: &Path) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
