//! CSV implementation of [`Sink`].

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{Record, Sink, SinkError, SinkResult};

/// Appends records to CSV files.
///
/// Destinations are file paths, resolved against `base_dir` when relative.
#[derive(Debug, Clone, Default)]
pub struct CsvSink {
    base_dir: Option<PathBuf>,
}

impl CsvSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, destination: &str) -> PathBuf {
        let path = Path::new(destination);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Header of an existing, non-empty file.
    fn existing_header(path: &Path) -> SinkResult<Option<Vec<String>>> {
        if !path.exists() || fs::metadata(path)?.len() == 0 {
            return Ok(None);
        }
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let header = reader.headers()?.iter().map(str::to_string).collect();
        Ok(Some(header))
    }
}

impl Sink for CsvSink {
    fn append_row(&self, destination: &str, record: &Record) -> SinkResult<()> {
        if record.is_empty() {
            return Err(SinkError::EmptyRecord);
        }

        let path = self.resolve(destination);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let header = Self::existing_header(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        let columns: Vec<String> = match header {
            Some(columns) => {
                for name in record.names() {
                    if !columns.iter().any(|c| c == name) {
                        warn!(field = name, path = %path.display(), "field not in log header, dropped");
                    }
                }
                columns
            }
            None => {
                let columns: Vec<String> = record.names().map(str::to_string).collect();
                writer.write_record(&columns)?;
                info!(path = %path.display(), "created narrative log");
                columns
            }
        };

        writer.write_record(columns.iter().map(|c| record.get(c).unwrap_or("")))?;
        writer.flush()?;
        Ok(())
    }
}
