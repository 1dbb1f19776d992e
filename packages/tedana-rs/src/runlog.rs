//! Per-run log written next to the outputs as `tedana_<timestamp>.tsv`

use crate::error::{Result, TedanaError};
use crate::types::{Diagnostic, DiagnosticLevel};
use chrono::{DateTime, Local};
use log::Level;

pub const LOG_COLUMNS: [&str; 4] = ["Timestamp", "Module", "Level", "Message"];

#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub module: String,
    pub level: Level,
    pub message: String,
}

/// Collects the records of one workflow run. Every record is also forwarded
/// to the `log` facade.
#[derive(Debug, Clone)]
pub struct RunLog {
    started: DateTime<Local>,
    records: Vec<LogRecord>,
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            started: Local::now(),
            records: Vec::new(),
        }
    }

    pub fn started(&self) -> DateTime<Local> {
        self.started
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn record(&mut self, level: Level, module: &str, message: impl Into<String>) {
        let message = message.into();
        log::log!(target: module, level, "{}", message);
        self.records.push(LogRecord {
            timestamp: Local::now(),
            module: module.to_string(),
            level,
            message,
        });
    }

    pub fn info(&mut self, module: &str, message: impl Into<String>) {
        self.record(Level::Info, module, message);
    }

    pub fn warn(&mut self, module: &str, message: impl Into<String>) {
        self.record(Level::Warn, module, message);
    }

    pub fn debug(&mut self, module: &str, message: impl Into<String>) {
        self.record(Level::Debug, module, message);
    }

    /// Copy diagnostics into the log without re-emitting them to the facade.
    pub fn extend_diagnostics(&mut self, module: &str, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            let level = match diagnostic.level {
                DiagnosticLevel::Info => Level::Info,
                DiagnosticLevel::Warning => Level::Warn,
            };
            self.records.push(LogRecord {
                timestamp: Local::now(),
                module: module.to_string(),
                level,
                message: diagnostic.message.clone(),
            });
        }
    }

    pub fn to_tsv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());
        writer.write_record(LOG_COLUMNS)?;
        for record in &self.records {
            writer.write_record([
                record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
                record.module.clone(),
                record.level.to_string(),
                record.message.clone(),
            ])?;
        }
        writer
            .into_inner()
            .map_err(|e| TedanaError::IoError(e.into_error()))
    }
}
