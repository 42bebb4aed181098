//! The operation reservation engine — atomic reserve-then-finalize over the
//! locked ledger.
//!
//! Reserving appends a `pending` entry after proving, under the lock, that
//! the operation id has never succeeded, is not already in flight, and fits
//! today's caps. Finalizing rewrites that entry in place to `succeeded` or
//! `failed`, re-checking the caps against the provider-returned amount. The
//! pair gives exactly-once execution under retries: a crashed invocation
//! leaves a pending entry that blocks duplicate spends until an operator
//! resolves it.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

use domainclaw_config::Settings;
use domainclaw_core::error::{AppError, Result};
use domainclaw_policy::budget::check_totals_with_candidate;
use domainclaw_store::{Ledger, Operation, OperationKind, OperationStatus};

/// Deterministic short hash identifying an intent to mutate.
///
/// The UTC day stamp scopes dedupe to a single day on purpose: a legitimate
/// re-attempt tomorrow derives a fresh key, while retries today collapse
/// onto one ledger entry and one provider idempotency header.
pub fn operation_key(
    kind: OperationKind,
    domain: &str,
    amount: f64,
    now: DateTime<Utc>,
) -> String {
    let raw = Sha256::digest(
        format!(
            "{}|{}|{:.2}|{}",
            kind.as_str(),
            domain,
            amount,
            now.format("%Y-%m-%d")
        )
        .as_bytes(),
    );
    let mut out = String::with_capacity(32);
    for b in &raw[..16] {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Atomically reserve budget for an operation.
///
/// Returns `true` when the operation already succeeded (nothing written);
/// errors with rate-limited when a pending entry for the same id exists,
/// and with budget when today's caps would be violated.
pub fn reserve(
    ledger: &Ledger,
    settings: &Settings,
    kind: OperationKind,
    domain: &str,
    amount: f64,
    currency: &str,
    operation_id: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    ledger.mutate(|ops| {
        let mut spend = 0.0;
        let mut count = 0u32;
        for op in ops.iter() {
            if op.operation_id == operation_id {
                match op.status {
                    OperationStatus::Succeeded => return Ok(true),
                    OperationStatus::Pending => {
                        return Err(AppError::rate_limited("operation already in progress")
                            .with_detail("operation_id", operation_id));
                    }
                    OperationStatus::Failed => {}
                }
            }
            if op.counts_on_day(now) {
                spend += op.amount;
                count += 1;
            }
        }

        check_totals_with_candidate(settings, spend, count, amount)?;

        ops.push(Operation {
            operation_id: operation_id.to_string(),
            kind,
            domain: domain.to_string(),
            amount,
            currency: currency.to_string(),
            created_at: now,
            status: OperationStatus::Pending,
        });
        Ok(false)
    })
}

/// Atomically finalize a reservation.
///
/// The pending entry is overwritten in place, never duplicated. When the
/// outcome is `succeeded` the daily caps are re-checked against the *other*
/// same-day entries plus the provider-returned amount; a violation records
/// the entry as `failed` and surfaces a budget error after the write.
pub fn finalize(
    ledger: &Ledger,
    settings: &Settings,
    operation_id: &str,
    amount: f64,
    currency: &str,
    status: OperationStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    let policy_violation = ledger.mutate(|ops| {
        let index = ops
            .iter()
            .rposition(|op| op.operation_id == operation_id);
        let index = match index {
            Some(i) => i,
            None => {
                // No reservation to overwrite; keep an audit trail anyway.
                ops.push(Operation {
                    operation_id: operation_id.to_string(),
                    kind: OperationKind::Other,
                    domain: String::new(),
                    amount,
                    currency: currency.to_string(),
                    created_at: now,
                    status,
                });
                return Ok(None);
            }
        };

        let mut final_status = status;
        let mut violation = None;
        if status == OperationStatus::Succeeded {
            let day = ops[index].created_at;
            let mut spend = 0.0;
            let mut count = 0u32;
            for (i, op) in ops.iter().enumerate() {
                if i == index || !op.counts_on_day(day) {
                    continue;
                }
                spend += op.amount;
                count += 1;
            }
            if let Err(err) = check_totals_with_candidate(settings, spend, count, amount) {
                violation = Some(err);
                final_status = OperationStatus::Failed;
            }
        }

        let op = &mut ops[index];
        op.amount = amount;
        if !currency.trim().is_empty() {
            op.currency = currency.to_string();
        }
        op.status = final_status;
        Ok(violation)
    })?;

    match policy_violation {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Ledger, Settings) {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(tmp.path().join("operations.jsonl"));
        (tmp, ledger, Settings::default())
    }

    #[test]
    fn operation_key_is_stable_within_a_day() {
        let now = Utc::now();
        let a = operation_key(OperationKind::Purchase, "example.com", 12.99, now);
        let b = operation_key(OperationKind::Purchase, "example.com", 12.99, now);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn operation_key_varies_by_inputs() {
        let now = Utc::now();
        let base = operation_key(OperationKind::Purchase, "example.com", 12.99, now);
        assert_ne!(base, operation_key(OperationKind::Renew, "example.com", 12.99, now));
        assert_ne!(base, operation_key(OperationKind::Purchase, "other.com", 12.99, now));
        assert_ne!(base, operation_key(OperationKind::Purchase, "example.com", 13.00, now));
        assert_ne!(
            base,
            operation_key(
                OperationKind::Purchase,
                "example.com",
                12.99,
                now + chrono::Duration::days(1)
            )
        );
    }

    #[test]
    fn reserve_appends_a_pending_entry() {
        let (_tmp, ledger, settings) = setup();
        let now = Utc::now();
        let already = reserve(
            &ledger, &settings, OperationKind::Purchase, "example.com", 12.99, "USD", "op-1", now,
        )
        .unwrap();
        assert!(!already);

        let ops = ledger.read().unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].status, OperationStatus::Pending);
        assert_eq!(ops[0].operation_id, "op-1");
    }

    #[test]
    fn reserve_blocks_while_pending() {
        let (_tmp, ledger, settings) = setup();
        let now = Utc::now();
        reserve(&ledger, &settings, OperationKind::Purchase, "example.com", 12.99, "USD", "op-1", now)
            .unwrap();
        let err = reserve(
            &ledger, &settings, OperationKind::Purchase, "example.com", 12.99, "USD", "op-1", now,
        )
        .unwrap_err();
        assert_eq!(err.kind, domainclaw_core::ErrorKind::RateLimited);
        assert_eq!(err.message, "operation already in progress");
        assert_eq!(ledger.read().unwrap().len(), 1);
    }

    #[test]
    fn reserve_reports_already_succeeded_without_writing() {
        let (_tmp, ledger, settings) = setup();
        let now = Utc::now();
        reserve(&ledger, &settings, OperationKind::Purchase, "example.com", 12.99, "USD", "op-1", now)
            .unwrap();
        finalize(&ledger, &settings, "op-1", 12.99, "USD", OperationStatus::Succeeded, now).unwrap();

        let already = reserve(
            &ledger, &settings, OperationKind::Purchase, "example.com", 12.99, "USD", "op-1", now,
        )
        .unwrap();
        assert!(already);
        assert_eq!(ledger.read().unwrap().len(), 1);
    }

    #[test]
    fn reserve_enforces_daily_count_cap() {
        let (_tmp, ledger, mut settings) = setup();
        settings.max_domains_per_day = 2;
        let now = Utc::now();
        for (i, d) in ["a.com", "b.com"].iter().enumerate() {
            reserve(
                &ledger,
                &settings,
                OperationKind::Purchase,
                d,
                40.0,
                "USD",
                &format!("op-{i}"),
                now,
            )
            .unwrap();
            finalize(&ledger, &settings, &format!("op-{i}"), 40.0, "USD", OperationStatus::Succeeded, now)
                .unwrap();
        }
        let err = reserve(
            &ledger, &settings, OperationKind::Purchase, "c.com", 10.0, "USD", "op-2x", now,
        )
        .unwrap_err();
        assert_eq!(err.kind, domainclaw_core::ErrorKind::Budget);
        // Ledger unchanged by the rejected reservation.
        assert_eq!(ledger.read().unwrap().len(), 2);
    }

    #[test]
    fn pending_entries_consume_budget() {
        let (_tmp, ledger, settings) = setup(); // 100 USD/day
        let now = Utc::now();
        reserve(&ledger, &settings, OperationKind::Purchase, "a.com", 60.0, "USD", "op-a", now)
            .unwrap();
        let err = reserve(
            &ledger, &settings, OperationKind::Purchase, "b.com", 50.0, "USD", "op-b", now,
        )
        .unwrap_err();
        assert_eq!(err.kind, domainclaw_core::ErrorKind::Budget);
    }

    #[test]
    fn finalize_overwrites_the_pending_entry() {
        let (_tmp, ledger, settings) = setup();
        let now = Utc::now();
        reserve(&ledger, &settings, OperationKind::Purchase, "a.com", 12.99, "USD", "op-1", now)
            .unwrap();
        finalize(&ledger, &settings, "op-1", 13.49, "USD", OperationStatus::Succeeded, now).unwrap();

        let ops = ledger.read().unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].status, OperationStatus::Succeeded);
        assert_eq!(ops[0].amount, 13.49);
    }

    #[test]
    fn finalize_without_reservation_inserts_audit_entry() {
        let (_tmp, ledger, settings) = setup();
        let now = Utc::now();
        finalize(&ledger, &settings, "op-ghost", 9.99, "USD", OperationStatus::Failed, now).unwrap();
        let ops = ledger.read().unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OperationKind::Other);
        assert_eq!(ops[0].status, OperationStatus::Failed);
    }

    #[test]
    fn finalize_recheck_downgrades_over_cap_success() {
        let (_tmp, ledger, settings) = setup(); // 100 USD/day
        let now = Utc::now();
        // An existing success consumes most of the budget.
        reserve(&ledger, &settings, OperationKind::Purchase, "a.com", 90.0, "USD", "op-a", now)
            .unwrap();
        finalize(&ledger, &settings, "op-a", 90.0, "USD", OperationStatus::Succeeded, now).unwrap();

        // The new reservation fits at its quoted price...
        reserve(&ledger, &settings, OperationKind::Purchase, "b.com", 5.0, "USD", "op-b", now)
            .unwrap();
        // ...but the provider charged more than quoted.
        let err = finalize(&ledger, &settings, "op-b", 25.0, "USD", OperationStatus::Succeeded, now)
            .unwrap_err();
        assert_eq!(err.kind, domainclaw_core::ErrorKind::Budget);

        let ops = ledger.read().unwrap();
        let op_b = ops.iter().find(|o| o.operation_id == "op-b").unwrap();
        assert_eq!(op_b.status, OperationStatus::Failed);
        assert_eq!(op_b.amount, 25.0);
    }

    #[test]
    fn at_most_one_succeeded_entry_per_operation_id() {
        let (_tmp, ledger, settings) = setup();
        let now = Utc::now();
        reserve(&ledger, &settings, OperationKind::Purchase, "a.com", 10.0, "USD", "op-1", now)
            .unwrap();
        finalize(&ledger, &settings, "op-1", 10.0, "USD", OperationStatus::Succeeded, now).unwrap();
        // A retried invocation sees already_succeeded and never re-finalizes.
        assert!(reserve(
            &ledger, &settings, OperationKind::Purchase, "a.com", 10.0, "USD", "op-1", now
        )
        .unwrap());
        let succeeded: Vec<_> = ledger
            .read()
            .unwrap()
            .into_iter()
            .filter(|o| o.operation_id == "op-1" && o.status == OperationStatus::Succeeded)
            .collect();
        assert_eq!(succeeded.len(), 1);
    }

    #[test]
    fn concurrent_reservations_admit_exactly_one() {
        let (_tmp, ledger, settings) = setup();
        let now = Utc::now();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            let settings = settings.clone();
            handles.push(std::thread::spawn(move || {
                reserve(
                    &ledger,
                    &settings,
                    OperationKind::Purchase,
                    "example.com",
                    12.99,
                    "USD",
                    "op-race",
                    now,
                )
                .is_ok()
            }));
        }
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(ledger.read().unwrap().len(), 1);
    }
}
