//! Append-only tabular log for finished runs.

mod csv_sink;

use thiserror::Error;

pub use csv_sink::CsvSink;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("refusing to append a record with no fields")]
    EmptyRecord,
}

/// One row of named fields, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. A repeated name replaces the earlier value in place.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Writes records to a persistent log.
///
/// Creating the destination writes a header row derived from the record's
/// field names; later appends never rewrite earlier rows.
pub trait Sink {
    fn append_row(&self, destination: &str, record: &Record) -> SinkResult<()>;
}
