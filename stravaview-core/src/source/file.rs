//! CSV file source

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{RawTable, RawValue};

use super::ActivitySource;

/// Reads a CSV export (for example Strava's `activities.csv`).
///
/// The first record is the header. Rows may be ragged; missing cells read
/// as null and surplus cells are dropped.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActivitySource for FileSource {
    fn load(&self) -> Result<RawTable> {
        let file = File::open(&self.path).map_err(|e| {
            Error::Source(format!("failed to open {}: {}", self.path.display(), e))
        })?;
        let table = read_csv(file)?;
        tracing::info!(
            path = %self.path.display(),
            columns = table.columns().len(),
            rows = table.row_count(),
            "Loaded activities from CSV"
        );
        Ok(table)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Parse CSV text into a raw table.
pub(crate) fn read_csv<R: Read>(reader: R) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(RawValue::from).collect());
    }

    Ok(RawTable::from_rows(headers, rows))
}
