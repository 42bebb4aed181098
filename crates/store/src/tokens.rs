//! The confirmation-token store — a single JSON document of priced intents.
//!
//! All mutations run under the file's exclusive lock via
//! [`TokenFile::mutate`]; reads that precede writes happen inside the same
//! cycle. The token engine in the policy crate layers issue/validate/consume
//! semantics on top.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use domainclaw_core::error::{AppError, ErrorKind, Result};

use crate::lock::with_locked_file;
use std::path::PathBuf;

/// A single-use token certifying a priced intent
/// (domain, quoted price, currency, operation key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmToken {
    pub token_id: String,
    pub domain: String,
    pub quoted_price: f64,
    pub currency: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub operation_key: String,
}

impl ConfirmToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// The serialized document shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenStore {
    #[serde(default)]
    pub tokens: Vec<ConfirmToken>,
}

/// Handle to the on-disk token file.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the store without taking the lock. For inspection only: any
    /// read that feeds a write must go through [`TokenFile::mutate`].
    pub fn load(&self) -> Result<TokenStore> {
        match std::fs::read(&self.path) {
            Ok(bytes) => parse(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TokenStore::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Run `mutate` over the store while holding the exclusive lock, then
    /// rewrite and fsync the document.
    pub fn mutate<T>(&self, mutate: impl FnOnce(&mut TokenStore) -> Result<T>) -> Result<T> {
        with_locked_file(&self.path, |current| {
            let mut store = if current.trim().is_empty() {
                TokenStore::default()
            } else {
                parse(current.as_bytes())?
            };
            let out = mutate(&mut store)?;
            let mut next = serde_json::to_string_pretty(&store)?;
            next.push('\n');
            Ok((next, out))
        })
    }
}

fn parse(bytes: &[u8]) -> Result<TokenStore> {
    serde_json::from_slice(bytes)
        .map_err(|e| AppError::wrap(ErrorKind::Internal, "corrupt confirmation token store", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(id: &str, now: DateTime<Utc>) -> ConfirmToken {
        ConfirmToken {
            token_id: id.into(),
            domain: "example.com".into(),
            quoted_price: 12.99,
            currency: "USD".into(),
            issued_at: now,
            expires_at: now + Duration::minutes(10),
            used: false,
            operation_key: "opkey-1".into(),
        }
    }

    #[test]
    fn missing_file_loads_empty_store() {
        let tmp = tempfile::tempdir().unwrap();
        let file = TokenFile::new(tmp.path().join("confirm_tokens.json"));
        assert!(file.load().unwrap().tokens.is_empty());
    }

    #[test]
    fn mutate_persists_the_document() {
        let tmp = tempfile::tempdir().unwrap();
        let file = TokenFile::new(tmp.path().join("confirm_tokens.json"));
        let now = Utc::now();
        file.mutate(|store| {
            store.tokens.push(token("tok-1", now));
            Ok(())
        })
        .unwrap();

        let loaded = file.load().unwrap();
        assert_eq!(loaded.tokens.len(), 1);
        assert_eq!(loaded.tokens[0].token_id, "tok-1");
        assert!(!loaded.tokens[0].used);
    }

    #[test]
    fn corrupt_document_fails_the_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("confirm_tokens.json");
        std::fs::write(&path, b"[{]").unwrap();
        let file = TokenFile::new(&path);
        let err = file.load().unwrap_err();
        assert!(err.message.contains("token store"));
    }

    #[test]
    fn expiry_is_strict_after() {
        let now = Utc::now();
        let t = token("tok-1", now);
        assert!(!t.is_expired(now + Duration::minutes(10)));
        assert!(t.is_expired(now + Duration::minutes(10) + Duration::seconds(1)));
    }
}
