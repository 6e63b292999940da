//! Trace ingestion for replayed workloads.
//!
//! Traces are compact JSONL: one object per line with an arrival time in
//! seconds and the prefill/decode token counts.
//!
//! ```text
//! {"arrived_at": 0.0, "num_prefill_tokens": 512, "num_decode_tokens": 128}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use dispatchsim_schedulers::Request;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Failed to read trace file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse JSON at line {line}: {source}")]
    JsonParse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Invalid record at line {line}: {reason}")]
    Validation { line: usize, reason: String },
    #[error("Failed to serialize trace record: {0}")]
    Serialize(serde_json::Error),
}

/// One line of a compact trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Arrival time in seconds.
    pub arrived_at: f64,
    pub num_prefill_tokens: u32,
    pub num_decode_tokens: u32,
}

impl From<&Request> for TraceRecord {
    fn from(req: &Request) -> Self {
        Self {
            arrived_at: req.arrived_at(),
            num_prefill_tokens: req.input_size(),
            num_decode_tokens: req.output_size(),
        }
    }
}

/// Load a trace file, sorted by arrival time.
pub fn load_trace(path: &Path) -> Result<Vec<TraceRecord>, TraceError> {
    let file = std::fs::File::open(path)?;
    parse_trace(BufReader::new(file))
}

/// Parse compact JSONL from any buffered reader.
///
/// Records are stably sorted by arrival, so equal timestamps keep file order.
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceRecord>, TraceError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line_num = idx + 1;
        let record: TraceRecord =
            serde_json::from_str(trimmed).map_err(|e| TraceError::JsonParse {
                line: line_num,
                source: e,
            })?;
        if !(record.arrived_at.is_finite() && record.arrived_at >= 0.0) {
            return Err(TraceError::Validation {
                line: line_num,
                reason: format!("arrived_at must be finite and >= 0, got {}", record.arrived_at),
            });
        }
        records.push(record);
    }

    records.sort_by(|a, b| a.arrived_at.total_cmp(&b.arrived_at));
    Ok(records)
}

/// Write requests as compact JSONL.
pub fn write_trace(requests: &[Request], path: &Path) -> Result<(), TraceError> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    for req in requests {
        serde_json::to_writer(&mut writer, &TraceRecord::from(req))
            .map_err(TraceError::Serialize)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}
