//! The operation ledger — append-only NDJSON spend accounting.
//!
//! One serialized record per operation state change. Readers scan the whole
//! file; a corrupt record fails the read with the offending line number, so
//! callers can never silently under-count spend. Reservation and
//! finalization writes go through [`Ledger::mutate`], which holds the file
//! lock for the full read-mutate-write cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use domainclaw_core::error::{AppError, ErrorKind, Result};

use crate::lock::with_locked_file;
use std::path::PathBuf;

/// What kind of mutation an entry accounts for. Only purchases and renewals
/// count against the daily caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Purchase,
    Renew,
    Other,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Purchase => "purchase",
            OperationKind::Renew => "renew",
            OperationKind::Other => "other",
        }
    }

    /// Whether entries of this kind participate in daily spend/count caps.
    pub fn counts_toward_caps(self) -> bool {
        matches!(self, OperationKind::Purchase | OperationKind::Renew)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One ledger record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub operation_id: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    pub amount: f64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub status: OperationStatus,
}

impl Operation {
    /// Whether this entry falls inside the UTC calendar day of `now` and
    /// counts toward the caps (purchase/renew, pending or succeeded).
    pub fn counts_on_day(&self, now: DateTime<Utc>) -> bool {
        self.kind.counts_toward_caps()
            && matches!(
                self.status,
                OperationStatus::Pending | OperationStatus::Succeeded
            )
            && self.created_at.date_naive() == now.date_naive()
    }
}

/// Handle to the on-disk ledger file.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read every record. A missing file is an empty ledger; a corrupt
    /// record is an error naming the line.
    pub fn read(&self) -> Result<Vec<Operation>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append one record without rewriting the file. Used for best-effort
    /// audit entries; reservations and finalizations use [`Ledger::mutate`].
    pub fn append(&self, op: &Operation) -> Result<()> {
        use std::io::Write;
        let mut options = std::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        let mut line = serde_json::to_string(op)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Run `mutate` over the full record list while holding the ledger's
    /// exclusive lock, then rewrite the file. This is the only path for
    /// reservations (appending a pending entry) and finalizations
    /// (overwriting the pending entry in place), which keeps at most one
    /// record per operation id after finalize.
    pub fn mutate<T>(&self, mutate: impl FnOnce(&mut Vec<Operation>) -> Result<T>) -> Result<T> {
        with_locked_file(&self.path, |current| {
            let mut ops = parse(current)?;
            let out = mutate(&mut ops)?;
            let mut next = String::new();
            for op in &ops {
                next.push_str(&serde_json::to_string(op)?);
                next.push('\n');
            }
            Ok((next, out))
        })
    }
}

fn parse(content: &str) -> Result<Vec<Operation>> {
    let mut ops = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let op: Operation = serde_json::from_str(line).map_err(|e| {
            AppError::wrap(
                ErrorKind::Internal,
                format!("corrupt operation ledger record at line {}", idx + 1),
                e,
            )
        })?;
        ops.push(op);
    }
    Ok(ops)
}
