//! Output context shared by every command.
//!
//! The result channel (stdout) carries envelopes only; everything
//! human-readable goes through `tracing` to the log channel (stderr). Each
//! command emits exactly one document envelope, or, in stream mode, one
//! envelope per record.

use domainclaw_core::envelope::EnvelopeWriter;
use domainclaw_core::error::{AppError, Result};
use tracing::error;

/// Document (one envelope) or stream (one envelope per record).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Document,
    Stream,
}

pub struct Context {
    pub mode: OutputMode,
    pub quiet: bool,
    pub request_id: String,
    writer: EnvelopeWriter<std::io::Stdout>,
}

impl Context {
    pub fn new(mode: OutputMode, quiet: bool, request_id: String) -> Self {
        Self {
            mode,
            quiet,
            request_id,
            writer: EnvelopeWriter::new(std::io::stdout()),
        }
    }

    /// Emit a single result document.
    pub fn emit(&mut self, command: &str, result: serde_json::Value) -> Result<()> {
        self.writer.emit(command, &self.request_id, result)
    }

    /// Emit per-item records: one envelope per record in stream mode, a
    /// single `{results: [...]}` document otherwise. Record order follows
    /// the input.
    pub fn emit_records(&mut self, command: &str, records: Vec<serde_json::Value>) -> Result<()> {
        match self.mode {
            OutputMode::Stream => self.writer.emit_stream(command, &self.request_id, records),
            OutputMode::Document => self.emit(command, serde_json::json!({"results": records})),
        }
    }

    /// Emit an error envelope and log it on the error channel.
    pub fn emit_error(&mut self, command: &str, err: &AppError) {
        if let Err(emit_err) = self.writer.emit_error(command, &self.request_id, err) {
            error!(error = %emit_err, "failed writing error envelope");
        }
        if !self.quiet {
            error!(command, error = %err, "command failed");
        }
    }

    /// Emit either a result document or an error envelope, propagating the
    /// error so the exit code reflects it.
    pub fn finish(&mut self, command: &str, result: Result<serde_json::Value>) -> Result<()> {
        match result {
            Ok(value) => self.emit(command, value),
            Err(err) => {
                self.emit_error(command, &err);
                Err(err)
            }
        }
    }
}
