//! Confirmation token engine — issue, validate, consume priced intents.
//!
//! A token binds (domain, quoted price, currency, operation key) for ten
//! minutes and is consumable exactly once. Validation and consumption are
//! split on purpose: a transient provider failure after consumption would
//! orphan the priced intent, so the purchase pipeline validates first,
//! executes, and only marks the token used after a verified successful
//! mutation. Retries of the same intent reuse the same operation key until
//! then.
//!
//! Every operation runs inside the token store's locked
//! load-mutate-save cycle and starts by pruning expired tokens. Used tokens
//! are kept until their expiry so an immediate replay reports "already
//! used" rather than "not found"; either way the replay fails.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use domainclaw_core::error::{AppError, Result};
use domainclaw_store::{ConfirmToken, TokenFile};

use crate::hex;

/// Token lifetime from issue.
pub const TOKEN_TTL: Duration = Duration::minutes(10);

/// Issue/validate/consume operations over one token file.
#[derive(Debug, Clone)]
pub struct TokenEngine {
    file: TokenFile,
}

impl TokenEngine {
    pub fn new(file: TokenFile) -> Self {
        Self { file }
    }

    /// Issue a token for a priced intent. Prunes expired tokens first.
    pub fn issue(
        &self,
        domain: &str,
        price: f64,
        currency: &str,
        operation_key: &str,
        now: DateTime<Utc>,
    ) -> Result<ConfirmToken> {
        let token = ConfirmToken {
            token_id: token_id(domain, operation_key, now),
            domain: domain.to_string(),
            quoted_price: price,
            currency: currency.to_string(),
            issued_at: now,
            expires_at: now + TOKEN_TTL,
            used: false,
            operation_key: operation_key.to_string(),
        };
        let issued = token.clone();
        self.file.mutate(move |store| {
            store.tokens.retain(|t| !t.is_expired(now));
            store.tokens.push(token);
            Ok(())
        })?;
        Ok(issued)
    }

    /// Locate a token and verify it is consumable for `domain` at `now`.
    /// Returns the snapshot WITHOUT marking it used.
    pub fn validate(
        &self,
        token_id: &str,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<ConfirmToken> {
        self.file.mutate(|store| {
            let found = store.tokens.iter().find(|t| t.token_id == token_id).cloned();
            store.tokens.retain(|t| !t.is_expired(now));
            let token = found.ok_or_else(not_found)?;
            check_consumable(&token, domain, now)?;
            Ok(token)
        })
    }

    /// Burn a token. Only called after a verified successful provider
    /// mutation; the same checks as validate apply so a raced consumer
    /// gets a confirmation error, never a second success.
    pub fn mark_used(
        &self,
        token_id: &str,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<ConfirmToken> {
        self.file.mutate(|store| {
            store.tokens.retain(|t| !t.is_expired(now));
            let token = store
                .tokens
                .iter_mut()
                .find(|t| t.token_id == token_id)
                .ok_or_else(not_found)?;
            check_consumable(token, domain, now)?;
            token.used = true;
            Ok(token.clone())
        })
    }
}

fn not_found() -> AppError {
    AppError::confirmation("confirmation token not found")
}

fn check_consumable(token: &ConfirmToken, domain: &str, now: DateTime<Utc>) -> Result<()> {
    if token.domain != domain {
        return Err(AppError::confirmation("token domain mismatch")
            .with_detail("token_domain", token.domain.clone()));
    }
    if token.used {
        return Err(AppError::confirmation("confirmation token already used"));
    }
    if token.is_expired(now) {
        return Err(AppError::confirmation("confirmation token expired"));
    }
    Ok(())
}

/// Opaque 128-bit hex id derived from the intent and issue instant.
fn token_id(domain: &str, operation_key: &str, now: DateTime<Utc>) -> String {
    let raw = Sha256::digest(
        format!(
            "{domain}|{operation_key}|{}",
            now.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
        )
        .as_bytes(),
    );
    hex(&raw[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainclaw_core::ErrorKind;

    fn engine() -> (tempfile::TempDir, TokenEngine) {
        let tmp = tempfile::tempdir().unwrap();
        let engine = TokenEngine::new(TokenFile::new(tmp.path().join("confirm_tokens.json")));
        (tmp, engine)
    }

    #[test]
    fn issue_returns_a_ten_minute_token() {
        let (_tmp, engine) = engine();
        let now = Utc::now();
        let token = engine.issue("example.com", 12.99, "USD", "opkey-1", now).unwrap();
        assert_eq!(token.token_id.len(), 32); // 128 bits hex
        assert_eq!(token.expires_at, now + TOKEN_TTL);
        assert!(!token.used);
        assert_eq!(token.operation_key, "opkey-1");
    }

    #[test]
    fn validate_does_not_consume() {
        let (_tmp, engine) = engine();
        let now = Utc::now();
        let token = engine.issue("example.com", 12.99, "USD", "opkey-1", now).unwrap();
        engine.validate(&token.token_id, "example.com", now).unwrap();
        let again = engine.validate(&token.token_id, "example.com", now).unwrap();
        assert!(!again.used);
    }

    #[test]
    fn mark_used_consumes_exactly_once() {
        let (_tmp, engine) = engine();
        let now = Utc::now();
        let token = engine.issue("example.com", 12.99, "USD", "opkey-1", now).unwrap();
        let burned = engine.mark_used(&token.token_id, "example.com", now).unwrap();
        assert!(burned.used);

        let err = engine.mark_used(&token.token_id, "example.com", now).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Confirmation);
        assert_eq!(err.message, "confirmation token already used");

        let err = engine.validate(&token.token_id, "example.com", now).unwrap_err();
        assert_eq!(err.message, "confirmation token already used");
    }

    #[test]
    fn domain_mismatch_is_rejected() {
        let (_tmp, engine) = engine();
        let now = Utc::now();
        let token = engine.issue("example.com", 12.99, "USD", "opkey-1", now).unwrap();
        let err = engine.validate(&token.token_id, "other.com", now).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Confirmation);
        assert_eq!(err.message, "token domain mismatch");
    }

    #[test]
    fn expired_token_is_rejected_then_pruned() {
        let (_tmp, engine) = engine();
        let now = Utc::now();
        let token = engine.issue("example.com", 12.99, "USD", "opkey-1", now).unwrap();

        let later = now + TOKEN_TTL + Duration::seconds(1);
        let err = engine.validate(&token.token_id, "example.com", later).unwrap_err();
        assert_eq!(err.message, "confirmation token expired");

        // The expired token was pruned during that access.
        let err = engine.validate(&token.token_id, "example.com", later).unwrap_err();
        assert_eq!(err.message, "confirmation token not found");
    }

    #[test]
    fn unknown_token_is_not_found() {
        let (_tmp, engine) = engine();
        let err = engine
            .validate("ffffffffffffffffffffffffffffffff", "example.com", Utc::now())
            .unwrap_err();
        assert_eq!(err.message, "confirmation token not found");
    }

    #[test]
    fn issue_prunes_expired_tokens() {
        let (_tmp, engine) = engine();
        let now = Utc::now();
        engine.issue("old.com", 9.99, "USD", "opkey-old", now - Duration::hours(1)).unwrap();
        engine.issue("new.com", 9.99, "USD", "opkey-new", now).unwrap();

        let stored = engine.file.load().unwrap();
        assert_eq!(stored.tokens.len(), 1);
        assert_eq!(stored.tokens[0].domain, "new.com");
    }

    #[test]
    fn concurrent_consumers_observe_one_success() {
        let (_tmp, engine) = engine();
        let now = Utc::now();
        let token = engine.issue("example.com", 12.99, "USD", "opkey-1", now).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            let id = token.token_id.clone();
            handles.push(std::thread::spawn(move || {
                engine.mark_used(&id, "example.com", Utc::now()).is_ok()
            }));
        }
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }
}
