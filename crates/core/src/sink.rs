//! Downstream ingestion seam and a JSON Lines implementation of it.

use crate::types::ExtractionRecord;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

/// Why a sink refused a record.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("record rejected: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A consumer of extraction records that reports success per record.
pub trait RecordSink {
    fn accept(&self, record: &ExtractionRecord) -> Result<(), SinkError>;

    /// Flush buffered output. The default does nothing.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Per-record delivery results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SinkReport {
    pub accepted: usize,
    pub rejected: Vec<SinkRejection>,
    /// Set when the final flush failed. Every record accepted before it is
    /// then reported as rejected, since none is known to be persisted.
    pub flush_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkRejection {
    pub source: String,
    pub error: String,
}

/// Hand every record to the sink, continuing past rejections.
pub fn deliver(records: &[ExtractionRecord], sink: &dyn RecordSink) -> SinkReport {
    let mut report = SinkReport::default();
    let mut accepted = Vec::new();
    for record in records {
        match sink.accept(record) {
            Ok(()) => accepted.push(record.source.as_str()),
            Err(e) => {
                log::warn!("Sink rejected {}: {}", record.source, e);
                report.rejected.push(SinkRejection {
                    source: record.source.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    match sink.flush() {
        Ok(()) => report.accepted = accepted.len(),
        Err(e) => {
            log::error!(
                "Failed to flush sink; {} accepted records are not persisted: {}",
                accepted.len(),
                e
            );
            let error = format!("flush failed: {}", e);
            report.rejected.extend(accepted.into_iter().map(|source| SinkRejection {
                source: source.to_string(),
                error: error.clone(),
            }));
            report.flush_error = Some(e.to_string());
        }
    }
    report
}

/// Appends one JSON object per record to a file.
pub struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Open (or create) a file for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn with_writer<T>(
        &self,
        f: impl FnOnce(&mut BufWriter<File>) -> Result<T, SinkError>,
    ) -> Result<T, SinkError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::Rejected("sink writer poisoned".into()))?;
        f(&mut *writer)
    }
}

impl RecordSink for JsonLinesSink {
    fn accept(&self, record: &ExtractionRecord) -> Result<(), SinkError> {
        if record.content.trim().is_empty() {
            return Err(SinkError::Rejected("empty content".into()));
        }
        let line = serde_json::to_string(record)?;
        self.with_writer(|w| {
            w.write_all(line.as_bytes())?;
            w.write_all(b"\n")?;
            Ok(())
        })
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.with_writer(|w| Ok(w.flush()?))
    }
}
