//! Budget checks — pure functions over a settings snapshot and a ledger
//! snapshot.
//!
//! Daily aggregation counts purchase/renew entries created within the UTC
//! calendar day of `now` with status pending or succeeded. Counting pending
//! entries means an in-flight reservation already consumes budget, so two
//! racing invocations cannot both pass the cap.

use chrono::{DateTime, Utc};

use domainclaw_config::Settings;
use domainclaw_core::error::{AppError, Result};
use domainclaw_store::Operation;

/// Reject non-USD quotes and prices above the per-domain cap.
pub fn check_price(settings: &Settings, price: f64, currency: &str) -> Result<()> {
    if currency != "USD" {
        return Err(AppError::validation("only USD prices are supported")
            .with_detail("currency", currency));
    }
    if price > settings.max_price_per_domain {
        return Err(AppError::budget("price exceeds max_price_per_domain")
            .with_detail("price", price)
            .with_detail("max_price_per_domain", settings.max_price_per_domain));
    }
    Ok(())
}

/// Sum of amounts and count of entries that consume today's budget.
pub fn daily_totals(ops: &[Operation], now: DateTime<Utc>) -> (f64, u32) {
    let mut spend = 0.0;
    let mut count = 0;
    for op in ops {
        if op.counts_on_day(now) {
            spend += op.amount;
            count += 1;
        }
    }
    (spend, count)
}

/// Reject a candidate price that would push today's spend or domain count
/// over the configured caps.
pub fn check_daily_caps(
    settings: &Settings,
    ops: &[Operation],
    now: DateTime<Utc>,
    candidate_price: f64,
) -> Result<()> {
    let (spend, count) = daily_totals(ops, now);
    check_totals_with_candidate(settings, spend, count, candidate_price)
}

/// Cap check over precomputed aggregates; shared with the reservation
/// engine, which aggregates under the ledger lock.
pub fn check_totals_with_candidate(
    settings: &Settings,
    spend: f64,
    count: u32,
    candidate_price: f64,
) -> Result<()> {
    if spend + candidate_price > settings.max_daily_spend {
        return Err(AppError::budget("daily spend cap exceeded")
            .with_detail("attempted_total", spend + candidate_price)
            .with_detail("max_daily_spend", settings.max_daily_spend));
    }
    if count + 1 > settings.max_domains_per_day {
        return Err(AppError::budget("daily domain count cap exceeded")
            .with_detail("attempted_total", count + 1)
            .with_detail("max_domains_per_day", settings.max_domains_per_day));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domainclaw_core::ErrorKind;
    use domainclaw_store::{OperationKind, OperationStatus};

    fn op(kind: OperationKind, status: OperationStatus, amount: f64, at: DateTime<Utc>) -> Operation {
        Operation {
            operation_id: format!("op-{amount}"),
            kind,
            domain: "example.com".into(),
            amount,
            currency: "USD".into(),
            created_at: at,
            status,
        }
    }

    #[test]
    fn non_usd_is_a_validation_error() {
        let err = check_price(&Settings::default(), 5.0, "EUR").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.details["currency"], "EUR");
    }

    #[test]
    fn price_over_cap_is_a_budget_error() {
        let err = check_price(&Settings::default(), 25.01, "USD").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Budget);
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn price_at_cap_passes() {
        assert!(check_price(&Settings::default(), 25.0, "USD").is_ok());
    }

    #[test]
    fn daily_totals_count_pending_and_succeeded_purchases() {
        let now = Utc::now();
        let ops = vec![
            op(OperationKind::Purchase, OperationStatus::Succeeded, 40.0, now),
            op(OperationKind::Renew, OperationStatus::Pending, 15.0, now),
            op(OperationKind::Purchase, OperationStatus::Failed, 99.0, now),
            op(OperationKind::Other, OperationStatus::Succeeded, 7.0, now),
            op(
                OperationKind::Purchase,
                OperationStatus::Succeeded,
                30.0,
                now - Duration::days(1),
            ),
        ];
        let (spend, count) = daily_totals(&ops, now);
        assert_eq!(spend, 55.0);
        assert_eq!(count, 2);
    }

    #[test]
    fn spend_cap_is_enforced() {
        let now = Utc::now();
        let settings = Settings::default(); // 100/day
        let ops = vec![op(OperationKind::Purchase, OperationStatus::Succeeded, 95.0, now)];
        let err = check_daily_caps(&settings, &ops, now, 10.0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Budget);
        assert_eq!(err.details["attempted_total"], 105.0);
        assert!(check_daily_caps(&settings, &ops, now, 5.0).is_ok());
    }

    #[test]
    fn count_cap_is_enforced() {
        let now = Utc::now();
        let mut settings = Settings::default();
        settings.max_domains_per_day = 2;
        let ops = vec![
            op(OperationKind::Purchase, OperationStatus::Succeeded, 40.0, now),
            op(OperationKind::Purchase, OperationStatus::Succeeded, 40.0, now),
        ];
        let err = check_daily_caps(&settings, &ops, now, 10.0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Budget);
        assert_eq!(err.details["max_domains_per_day"], 2);
    }

    #[test]
    fn empty_ledger_passes_caps() {
        assert!(check_daily_caps(&Settings::default(), &[], Utc::now(), 12.99).is_ok());
    }
}
