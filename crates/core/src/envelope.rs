//! Envelope output — the stable serialized record on the result channel.
//!
//! Two modes: **document** emits a single envelope with a `result` field,
//! **stream** emits one envelope per record on its own line (NDJSON). The
//! separation of channels is a correctness contract: envelopes go to the
//! result channel only, and everything human-readable (logs, warnings,
//! update notices) goes to the log channel only; downstream agents parse
//! the result channel alone.
//!
//! Keyed collections are emitted with keys in sorted order so test fixtures
//! and agent-side diffing stay stable. String contents are written verbatim
//! (serde_json does not HTML-escape), preserving URLs and quotes.

use std::io::Write;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};

/// The outer record emitted for every command.
///
/// `result` and `error` are mutually exclusive; exactly one is present.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub command: &'a str,
    pub timestamp_utc: String,
    pub request_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a AppError>,
}

/// Writes envelopes to the result channel.
pub struct EnvelopeWriter<W: Write> {
    out: W,
}

impl<W: Write> EnvelopeWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Emit a single success envelope (document mode).
    pub fn emit(&mut self, command: &str, request_id: &str, result: serde_json::Value) -> Result<()> {
        self.write_envelope(Envelope {
            command,
            timestamp_utc: now_utc(),
            request_id,
            result: Some(normalize(result)),
            error: None,
        })
    }

    /// Emit a single error envelope (document mode).
    pub fn emit_error(&mut self, command: &str, request_id: &str, error: &AppError) -> Result<()> {
        self.write_envelope(Envelope {
            command,
            timestamp_utc: now_utc(),
            request_id,
            result: None,
            error: Some(error),
        })
    }

    /// Emit one envelope per record, each on its own line (stream mode).
    /// Records are written in input order.
    pub fn emit_stream(
        &mut self,
        command: &str,
        request_id: &str,
        records: Vec<serde_json::Value>,
    ) -> Result<()> {
        for record in records {
            self.write_envelope(Envelope {
                command,
                timestamp_utc: now_utc(),
                request_id,
                result: Some(normalize(record)),
                error: None,
            })?;
        }
        Ok(())
    }

    fn write_envelope(&mut self, env: Envelope<'_>) -> Result<()> {
        let line = serde_json::to_string(&env)?;
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Rebuild a value with every object's keys in sorted order, recursively.
fn normalize(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(String, serde_json::Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                out.insert(k, normalize(v));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(normalize).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn emit_to_string(
        f: impl FnOnce(&mut EnvelopeWriter<&mut Vec<u8>>) -> Result<()>,
    ) -> String {
        let mut buf = Vec::new();
        let mut w = EnvelopeWriter::new(&mut buf);
        f(&mut w).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn document_round_trips_supplied_fields() {
        let out = emit_to_string(|w| {
            w.emit(
                "domains check",
                "req-123",
                json!({"domain": "example.com", "available": true}),
            )
        });
        let parsed: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(parsed["command"], "domains check");
        assert_eq!(parsed["request_id"], "req-123");
        assert_eq!(parsed["result"]["domain"], "example.com");
        assert!(parsed.get("error").is_none());
        // RFC3339 with trailing Z
        let ts = parsed["timestamp_utc"].as_str().unwrap();
        assert!(ts.ends_with('Z') && ts.contains('T'), "timestamp: {ts}");
    }

    #[test]
    fn error_envelope_excludes_result() {
        let err = AppError::confirmation("confirmation token expired");
        let out = emit_to_string(|w| w.emit_error("domains buy", "req-9", &err));
        let parsed: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert!(parsed.get("result").is_none());
        assert_eq!(parsed["error"]["code"], "confirmation_error");
        assert_eq!(parsed["error"]["message"], "confirmation token expired");
    }

    #[test]
    fn stream_mode_preserves_record_order() {
        let out = emit_to_string(|w| {
            w.emit_stream(
                "domains check-bulk",
                "req-7",
                vec![json!({"index": 0}), json!({"index": 1}), json!({"index": 2})],
            )
        });
        let lines: Vec<&str> = out.trim().lines().collect();
        assert_eq!(lines.len(), 3);
        for (i, line) in lines.iter().enumerate() {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(parsed["result"]["index"], i as u64);
            assert_eq!(parsed["command"], "domains check-bulk");
        }
    }

    #[test]
    fn object_keys_are_emitted_sorted() {
        let out = emit_to_string(|w| {
            w.emit(
                "settings show",
                "r",
                json!({"zulu": 1, "alpha": {"nested_z": 1, "nested_a": 2}, "mike": 3}),
            )
        });
        let alpha = out.find("\"alpha\"").unwrap();
        let mike = out.find("\"mike\"").unwrap();
        let zulu = out.find("\"zulu\"").unwrap();
        assert!(alpha < mike && mike < zulu, "top-level keys unsorted: {out}");
        let nested_a = out.find("\"nested_a\"").unwrap();
        let nested_z = out.find("\"nested_z\"").unwrap();
        assert!(nested_a < nested_z, "nested keys unsorted: {out}");
    }

    #[test]
    fn strings_are_not_html_escaped() {
        let out = emit_to_string(|w| {
            w.emit(
                "orders list",
                "r",
                json!({"url": "https://example.com/a?b=1&c=<2>"}),
            )
        });
        assert!(out.contains("https://example.com/a?b=1&c=<2>"), "escaped: {out}");
    }
}
