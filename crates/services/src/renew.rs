//! Renewal workflow.
//!
//! Defaults to dry-run unless the caller explicitly approves. Approved
//! renewals reserve against a fixed estimate, route v2-then-v1 (v2 needs a
//! consent block built from the customer-scoped domain detail), finalize
//! with the provider-returned amount, and annotate the result with the API
//! version that served it. Invalid-payment answers get an operator-readable
//! remediation hint.

use chrono::Utc;
use serde_json::json;

use domainclaw_core::error::{AppError, Result};
use domainclaw_core::registrar::{CustomerRegistrar, RenewOutcome};
use domainclaw_policy::budget::check_price;
use domainclaw_rate::retry;
use domainclaw_store::{OperationKind, OperationStatus};

use crate::reservation::{finalize, operation_key, reserve};
use crate::router::{ApiVersion, build_renew_v2_request, enrich_renew_error, v2_then_v1};
use crate::{RETRY_ATTEMPTS, Service};

/// Reservation estimate for a standard renewal; the finalize re-check
/// replaces it with the provider-returned amount.
const RENEW_PRICE_ESTIMATE: f64 = 12.99;
const RENEW_CURRENCY: &str = "USD";

impl Service {
    pub async fn renew(
        &self,
        domain: &str,
        years: u32,
        dry_run: bool,
        auto_approve: bool,
    ) -> Result<serde_json::Value> {
        // Without explicit approval the renewal stays a dry run.
        let dry_run = dry_run || !auto_approve;
        let settings = &self.runtime.settings;
        check_price(settings, RENEW_PRICE_ESTIMATE, RENEW_CURRENCY)?;

        if dry_run {
            return Ok(json!({
                "domain": domain,
                "years": years,
                "dry_run": true,
                "price": RENEW_PRICE_ESTIMATE,
                "currency": RENEW_CURRENCY,
            }));
        }

        let now = Utc::now();
        let op_key = operation_key(OperationKind::Renew, domain, RENEW_PRICE_ESTIMATE, now);
        let ledger = self.runtime.ledger();
        let already = reserve(
            &ledger,
            settings,
            OperationKind::Renew,
            domain,
            RENEW_PRICE_ESTIMATE,
            RENEW_CURRENCY,
            &op_key,
            now,
        )?;
        if already {
            return Ok(json!({
                "domain": domain,
                "already_renewed": true,
                "price": RENEW_PRICE_ESTIMATE,
                "currency": RENEW_CURRENCY,
            }));
        }

        let deadline = self.runtime.deadline;
        let key = op_key.as_str();
        let executed = retry(deadline, RETRY_ATTEMPTS, || async move {
            self.runtime.limiter.acquire(deadline).await?;
            self.routed_renew(domain, years, key).await
        })
        .await;

        let (mut outcome, version) = match executed {
            Ok(pair) => pair,
            Err(err) => {
                self.finalize_quietly(&op_key, RENEW_PRICE_ESTIMATE, RENEW_CURRENCY, OperationStatus::Failed);
                return Err(enrich_renew_error(err));
            }
        };

        if outcome.price == 0.0 {
            outcome.price = RENEW_PRICE_ESTIMATE;
        }
        if outcome.currency.is_empty() {
            outcome.currency = RENEW_CURRENCY.to_string();
        }
        if let Err(err) = check_price(settings, outcome.price, &outcome.currency) {
            self.finalize_quietly(&op_key, outcome.price, &outcome.currency, OperationStatus::Failed);
            return Err(err);
        }

        finalize(
            &ledger,
            settings,
            &op_key,
            outcome.price,
            &outcome.currency,
            OperationStatus::Succeeded,
            Utc::now(),
        )?;

        Ok(json!({
            "domain": domain,
            "years": years,
            "dry_run": false,
            "price": outcome.price,
            "currency": outcome.currency,
            "order_id": outcome.order_id,
            "api_version": version.as_str(),
        }))
    }

    /// One renew attempt through the capability router.
    async fn routed_renew(
        &self,
        domain: &str,
        years: u32,
        op_key: &str,
    ) -> Result<(RenewOutcome, ApiVersion)> {
        let settings = &self.runtime.settings;
        let eligible =
            settings.v2_ready() || !settings.shopper_id.trim().is_empty();
        match &self.customer {
            Some(api) if eligible => {
                v2_then_v1(
                    true,
                    || self.renew_v2_candidates(api.as_ref(), domain, years, op_key),
                    || self.client.renew(domain, years, op_key),
                )
                .await
            }
            _ => self
                .client
                .renew(domain, years, op_key)
                .await
                .map(|r| (r, ApiVersion::V1)),
        }
    }

    /// Try the v2 renew with each identity candidate: the stored customer
    /// id first, then the shopper id for endpoints that accept it.
    async fn renew_v2_candidates(
        &self,
        api: &dyn CustomerRegistrar,
        domain: &str,
        years: u32,
        op_key: &str,
    ) -> Result<RenewOutcome> {
        let candidates = self.renew_customer_candidates();
        if candidates.is_empty() {
            return Err(AppError::validation("v2 renew requires customer_id or shopper_id"));
        }
        let mut last_err: Option<AppError> = None;
        for customer_id in candidates {
            let request = match build_renew_v2_request(api, &customer_id, domain, years).await {
                Ok(request) => request,
                Err(err) => {
                    last_err = Some(err);
                    continue;
                }
            };
            match api.renew_v2(&customer_id, domain, &request, op_key).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err
            .unwrap_or_else(|| AppError::validation("v2 renew requires customer_id or shopper_id")))
    }

    fn renew_customer_candidates(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(2);
        for candidate in [
            self.runtime.settings.customer_id.trim(),
            self.runtime.settings.shopper_id.trim(),
        ] {
            if !candidate.is_empty() && !out.iter().any(|c| c == candidate) {
                out.push(candidate.to_string());
            }
        }
        out
    }
}
