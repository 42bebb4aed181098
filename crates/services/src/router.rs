//! Capability routing between the v2 and v1 provider surfaces.
//!
//! The customer-scoped v2 shape is preferred whenever a customer id is
//! available; any v2 failure falls back to v1 transparently. When both
//! fail, the v1 error is surfaced, since v1 is the authoritative baseline
//! shape. Every routed response is annotated with the version that
//! actually served it.

use std::future::Future;

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use domainclaw_core::error::{AppError, ErrorKind, Result};
use domainclaw_core::registrar::{CustomerRegistrar, RenewConsent, RenewRequestV2};

/// Which provider surface served a routed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

impl ApiVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
        }
    }
}

/// Run the v2 shape when eligible, falling back to v1 on any v2 error.
pub async fn v2_then_v1<T, F2, F1, Fut2, Fut1>(
    use_v2: bool,
    run_v2: F2,
    run_v1: F1,
) -> Result<(T, ApiVersion)>
where
    F2: FnOnce() -> Fut2,
    F1: FnOnce() -> Fut1,
    Fut2: Future<Output = Result<T>>,
    Fut1: Future<Output = Result<T>>,
{
    if !use_v2 {
        return run_v1().await.map(|v| (v, ApiVersion::V1));
    }
    match run_v2().await {
        Ok(v) => Ok((v, ApiVersion::V2)),
        Err(v2_err) => {
            debug!(error = %v2_err, "v2 route failed, retrying via v1");
            match run_v1().await {
                Ok(v) => Ok((v, ApiVersion::V1)),
                Err(v1_err) => Err(v1_err),
            }
        }
    }
}

/// Build the v2 renew request from the customer-scoped domain detail.
///
/// v2 renewal requires a consent block carrying the exact renewal price in
/// integer micro-units plus the domain's current expiration. If the detail
/// response lacks either, the caller abandons v2 and renews via v1.
pub async fn build_renew_v2_request(
    client: &dyn CustomerRegistrar,
    customer_id: &str,
    domain: &str,
    years: u32,
) -> Result<RenewRequestV2> {
    let detail = client.domain_detail_v2(customer_id, domain, &[]).await?;

    let expires = detail
        .get("expiresAt")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or_default();
    if expires.is_empty() {
        return Err(AppError::provider(
            "v2 renew requires domain expiration from domain detail response",
        ));
    }

    let renewal = detail
        .get("renewal")
        .and_then(|v| v.as_object())
        .ok_or_else(|| {
            AppError::provider("v2 renew requires renewal pricing from domain detail response")
        })?;
    let price_micros = renewal
        .get("price")
        .and_then(price_micros)
        .filter(|p| *p > 0)
        .ok_or_else(|| {
            AppError::provider(
                "v2 renew requires valid renewal price in micro-units from domain detail response",
            )
        })?;
    let currency = renewal
        .get("currency")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("USD")
        .to_uppercase();

    let agreed_by = std::env::var("DOMAINCLAW_AGREED_BY_IP")
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "127.0.0.1".to_string());

    Ok(RenewRequestV2 {
        expires: expires.to_string(),
        consent: RenewConsent {
            price: price_micros,
            currency,
            agreed_by,
            agreed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        },
        period: (years > 0).then_some(years),
    })
}

/// Parse an integer micro-unit price; fractional values are rejected.
fn price_micros(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)
        }
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Whether a provider failure is the registrar's invalid-payment answer.
pub fn is_invalid_payment_info(err: &AppError) -> bool {
    if err.kind != ErrorKind::Provider {
        return false;
    }
    err.details
        .get("provider")
        .and_then(|v| v.as_object())
        .and_then(|p| p.get("code"))
        .and_then(|c| c.as_str())
        .map(|c| c.trim().eq_ignore_ascii_case("INVALID_PAYMENT_INFO"))
        .unwrap_or(false)
}

/// Attach an operator-readable remediation hint to invalid-payment renew
/// failures; all other errors pass through untouched.
pub fn enrich_renew_error(err: AppError) -> AppError {
    if !is_invalid_payment_info(&err) {
        return err;
    }
    let mut details = err.details.clone();
    details.insert(
        "remediation".into(),
        "Fund your Good As Gold balance or update your default payment profile, then retry renewal."
            .into(),
    );
    AppError::provider(
        "renewal failed: invalid payment info. Fund Good As Gold or update the payment profile.",
    )
    .with_details(details)
    .with_cause(err)
}
