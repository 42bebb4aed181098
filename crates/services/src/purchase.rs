//! Purchase workflows: dry-run, token-confirmed, and gated auto mode.
//!
//! Dry-run quotes the price, runs policy, and issues a confirmation token
//! bound to the priced intent. Confirm validates the token, reserves budget
//! atomically, executes under retry with the operation key as idempotency
//! header, re-checks the provider-returned price, finalizes, and only then
//! burns the token, so a transient failure leaves the token valid for a
//! retry of the same intent. Auto mode replaces the token with the safety
//! gate and follows the same reserve/execute/finalize pipeline.

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tracing::warn;

use domainclaw_core::error::{AppError, Result};
use domainclaw_core::registrar::PurchaseOutcome;
use domainclaw_policy::budget::{check_daily_caps, check_price};
use domainclaw_policy::safety::require_auto_enabled;
use domainclaw_rate::retry;
use domainclaw_store::{OperationKind, OperationStatus};

use crate::reservation::{finalize, operation_key, reserve};
use crate::{RETRY_ATTEMPTS, Service};

impl Service {
    /// Quote a purchase and issue a confirmation token for it.
    pub async fn purchase_dry_run(&self, domain: &str, years: u32) -> Result<serde_json::Value> {
        let avail = self.availability(domain).await?;
        if !avail.available {
            return Err(AppError::validation("domain is not available")
                .with_detail("domain", domain));
        }
        let settings = &self.runtime.settings;
        check_price(settings, avail.price, &avail.currency)?;
        let now = Utc::now();
        check_daily_caps(settings, &self.runtime.ledger().read()?, now, avail.price)?;

        let op_key = operation_key(OperationKind::Purchase, domain, avail.price, now);
        let token = self
            .runtime
            .tokens()
            .issue(domain, avail.price, &avail.currency, &op_key, now)?;

        Ok(json!({
            "domain": domain,
            "years": years,
            "price": avail.price,
            "currency": avail.currency,
            "requires_confirmation": true,
            "confirmation_token": token.token_id,
            "token_expires_at": token.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }))
    }

    /// Execute a purchase certified by a confirmation token.
    pub async fn purchase_confirm(
        &self,
        domain: &str,
        token_id: &str,
        years: u32,
    ) -> Result<PurchaseOutcome> {
        let now = Utc::now();
        let token = self.runtime.tokens().validate(token_id, domain, now)?;
        let settings = &self.runtime.settings;
        check_price(settings, token.quoted_price, &token.currency)?;

        let ledger = self.runtime.ledger();
        let already = reserve(
            &ledger,
            settings,
            OperationKind::Purchase,
            domain,
            token.quoted_price,
            &token.currency,
            &token.operation_key,
            now,
        )?;
        if already {
            self.burn_token(token_id, domain);
            return Ok(PurchaseOutcome {
                domain: domain.to_string(),
                price: token.quoted_price,
                currency: token.currency,
                already_bought: true,
                ..Default::default()
            });
        }

        let deadline = self.runtime.deadline;
        let op_key = token.operation_key.as_str();
        let executed = retry(deadline, RETRY_ATTEMPTS, || async move {
            self.runtime.limiter.acquire(deadline).await?;
            self.client.purchase(domain, years, op_key).await
        })
        .await;

        let mut result = match executed {
            Ok(result) => result,
            Err(err) => {
                self.finalize_quietly(
                    &token.operation_key,
                    token.quoted_price,
                    &token.currency,
                    OperationStatus::Failed,
                );
                return Err(err);
            }
        };

        // Providers occasionally omit echo fields; fall back to the quote.
        if result.price == 0.0 {
            result.price = token.quoted_price;
        }
        if result.currency.is_empty() {
            result.currency = token.currency.clone();
        }

        // The charged amount may differ from the quote; re-check it.
        if let Err(err) = check_price(settings, result.price, &result.currency) {
            self.finalize_quietly(
                &token.operation_key,
                result.price,
                &result.currency,
                OperationStatus::Failed,
            );
            return Err(err);
        }

        finalize(
            &ledger,
            settings,
            &token.operation_key,
            result.price,
            &result.currency,
            OperationStatus::Succeeded,
            Utc::now(),
        )?;
        self.burn_token(token_id, domain);
        Ok(result)
    }

    /// Unattended purchase behind the acknowledgment gate.
    pub async fn purchase_auto(&self, domain: &str, years: u32) -> Result<PurchaseOutcome> {
        let settings = &self.runtime.settings;
        require_auto_enabled(settings.auto_purchase_enabled, &settings.acknowledgment_hash)?;

        let avail = self.availability(domain).await?;
        if !avail.available {
            return Err(AppError::validation("domain is not available")
                .with_detail("domain", domain));
        }
        check_price(settings, avail.price, &avail.currency)?;

        let now = Utc::now();
        let op_key = operation_key(OperationKind::Purchase, domain, avail.price, now);
        let ledger = self.runtime.ledger();
        let already = reserve(
            &ledger,
            settings,
            OperationKind::Purchase,
            domain,
            avail.price,
            &avail.currency,
            &op_key,
            now,
        )?;
        if already {
            return Ok(PurchaseOutcome {
                domain: domain.to_string(),
                price: avail.price,
                currency: avail.currency,
                already_bought: true,
                ..Default::default()
            });
        }

        let deadline = self.runtime.deadline;
        let key = op_key.as_str();
        let executed = retry(deadline, RETRY_ATTEMPTS, || async move {
            self.runtime.limiter.acquire(deadline).await?;
            self.client.purchase(domain, years, key).await
        })
        .await;

        let mut result = match executed {
            Ok(result) => result,
            Err(err) => {
                self.finalize_quietly(&op_key, avail.price, &avail.currency, OperationStatus::Failed);
                return Err(err);
            }
        };

        if result.price == 0.0 {
            result.price = avail.price;
        }
        if result.currency.is_empty() {
            result.currency = avail.currency.clone();
        }
        if let Err(err) = check_price(settings, result.price, &result.currency) {
            self.finalize_quietly(&op_key, result.price, &result.currency, OperationStatus::Failed);
            return Err(err);
        }

        finalize(
            &ledger,
            settings,
            &op_key,
            result.price,
            &result.currency,
            OperationStatus::Succeeded,
            Utc::now(),
        )?;
        Ok(result)
    }

    /// Mark a token used after a verified successful mutation. Failure to
    /// burn is logged, never surfaced: the purchase already happened and
    /// the ledger entry blocks a duplicate spend either way.
    pub(crate) fn burn_token(&self, token_id: &str, domain: &str) {
        if let Err(err) = self.runtime.tokens().mark_used(token_id, domain, Utc::now()) {
            warn!(error = %err, token_id, "failed marking confirmation token used");
        }
    }

    /// Best-effort failure finalization on an error path that is about to
    /// surface a more interesting error.
    pub(crate) fn finalize_quietly(
        &self,
        operation_id: &str,
        amount: f64,
        currency: &str,
        status: OperationStatus,
    ) {
        if let Err(err) = finalize(
            &self.runtime.ledger(),
            &self.runtime.settings,
            operation_id,
            amount,
            currency,
            status,
            Utc::now(),
        ) {
            warn!(error = %err, operation_id, "failed finalizing operation");
        }
    }
}
