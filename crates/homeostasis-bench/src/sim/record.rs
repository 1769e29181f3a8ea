//! Per-step records and the logs they are written to.
//!
//! The driver only needs three operations from a log: append one record,
//! flush, close. [`TsvEventLog`] writes one tab-separated file per trial;
//! [`MemoryEventLog`] keeps records in memory.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Column keys and their descriptions, in file order.
pub const COLUMNS: [(&str, &str); 16] = [
    ("model_name", "Model name"),
    ("trial_no", "Trial number"),
    ("step_no", "Step number"),
    ("prompt", "Prompt message"),
    ("action", "Amount food consumed"),
    ("action_explanation", "Action reasoning / explanation"),
    ("random_homeostatic_level_change", "Random homeostatic level change"),
    ("homeostatic_target", "Homeostatic target"),
    ("prev_homeostatic_actual", "Previous homeostatic actual"),
    ("homeostatic_actual", "New homeostatic actual"),
    ("consumption_reward", "Consumption reward"),
    ("undersatiation_reward", "Undersatiation reward"),
    ("oversatiation_reward", "Oversatiation reward"),
    ("total_consumption_reward", "Total consumption reward"),
    ("total_undersatiation_reward", "Total undersatiation reward"),
    ("total_oversatiation_reward", "Total oversatiation reward"),
];

/// One row of the trajectory. Field order matches [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub model_name: String,
    pub trial_no: u32,
    pub step_no: u32,
    pub prompt: String,
    pub action: i64,
    /// Reserved; models are asked for a bare integer.
    pub action_explanation: String,
    pub random_homeostatic_level_change: i64,
    pub homeostatic_target: i64,
    pub prev_homeostatic_actual: i64,
    pub homeostatic_actual: i64,
    pub consumption_reward: i64,
    pub undersatiation_reward: i64,
    pub oversatiation_reward: i64,
    pub total_consumption_reward: i64,
    pub total_undersatiation_reward: i64,
    pub total_oversatiation_reward: i64,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to write record: {0}")]
    Csv(#[from] csv::Error),
    #[error("event log I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sink for step records.
pub trait EventLog {
    fn log_event(&mut self, record: &StepRecord) -> Result<(), RecordError>;

    fn flush(&mut self) -> Result<(), RecordError>;

    /// Flush and release the log. Further writes are an error.
    fn close(&mut self) -> Result<(), RecordError>;

    /// Where the records end up, if they are persisted.
    fn path(&self) -> Option<&Path> {
        None
    }
}

// ── TSV file ───────────────────────────────────────────────────────

/// One tab-separated file with a header row of column keys.
pub struct TsvEventLog {
    writer: Option<csv::Writer<File>>,
    path: PathBuf,
}

impl TsvEventLog {
    /// Create `homeostasis_<model>_<timestamp>.tsv` inside `dir`, creating
    /// the directory if needed, and write the header row.
    pub fn create(dir: &Path, model_name: &str) -> Result<Self, RecordError> {
        fs::create_dir_all(dir)?;
        let timestamp = chrono::Local::now().format("%Y_%m_%d_%H_%M_%S_%6f");
        let name = format!(
            "homeostasis_{}_{timestamp}.tsv",
            sanitize_file_component(model_name)
        );
        Self::create_at(dir.join(name))
    }

    /// Create the log at an explicit path.
    pub fn create_at(path: PathBuf) -> Result<Self, RecordError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_path(&path)?;
        writer.write_record(COLUMNS.iter().map(|(key, _)| *key))?;
        writer.flush()?;
        Ok(Self {
            writer: Some(writer),
            path,
        })
    }

    fn writer(&mut self) -> Result<&mut csv::Writer<File>, RecordError> {
        self.writer.as_mut().ok_or_else(|| {
            RecordError::Io(std::io::Error::other(format!(
                "event log {} is closed",
                self.path.display()
            )))
        })
    }
}

impl EventLog for TsvEventLog {
    fn log_event(&mut self, record: &StepRecord) -> Result<(), RecordError> {
        self.writer()?.serialize(record)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecordError> {
        self.writer()?.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), RecordError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Keep model names like `ft:gpt-4o:org/x` from escaping the output dir.
fn sanitize_file_component(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ── In memory ──────────────────────────────────────────────────────

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    pub records: Vec<StepRecord>,
    /// Records that were followed by a flush.
    pub flushed: usize,
    pub closed: bool,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLog for MemoryEventLog {
    fn log_event(&mut self, record: &StepRecord) -> Result<(), RecordError> {
        if self.closed {
            return Err(RecordError::Io(std::io::Error::other("event log is closed")));
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecordError> {
        self.flushed = self.records.len();
        Ok(())
    }

    fn close(&mut self) -> Result<(), RecordError> {
        self.flushed = self.records.len();
        self.closed = true;
        Ok(())
    }
}
