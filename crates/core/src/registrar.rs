//! Registrar capability surface — the abstraction over the provider API.
//!
//! A [`Registrar`] knows how to execute the baseline (v1) workflows against
//! the registrar HTTP API. The customer-scoped v2 surface is an optional
//! capability ([`CustomerRegistrar`]); callers test for it and branch, so a
//! minimal client (or a scripted test double) only has to implement the
//! baseline trait.
//!
//! All monetary values that cross this boundary have been passed through
//! [`normalize_price`], which folds the provider's micro-unit encoding into
//! major units while preserving the raw amount for auditing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One entry from the domain suggestion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub domain: String,
    #[serde(default)]
    pub score: f64,
}

/// Availability answer for a single domain.
///
/// `definitive` distinguishes an authoritative answer (single lookups use the
/// FULL check type) from the fast-path answer bulk queries get.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Availability {
    pub domain: String,
    pub available: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub definitive: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub price: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub price_raw: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub price_unit: String,
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

/// Outcome of a purchase mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PurchaseOutcome {
    pub domain: String,
    pub price: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub order_id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub already_bought: bool,
}

/// Outcome of a renew mutation (v1 or v2 shape).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenewOutcome {
    pub domain: String,
    pub price: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub order_id: String,
}

/// Consent block required by the v2 renew shape. Price is in integer
/// micro-units exactly as reported by the domain detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewConsent {
    pub price: i64,
    pub currency: String,
    #[serde(rename = "agreedBy")]
    pub agreed_by: String,
    #[serde(rename = "agreedAt")]
    pub agreed_at: String,
}

/// Full request payload for the v2 renew shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewRequestV2 {
    pub expires: String,
    pub consent: RenewConsent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,
}

/// One domain from the portfolio listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioDomain {
    pub domain: String,
    #[serde(default)]
    pub expires: String,
}

/// A DNS record in either direction (read or write).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

/// Pagination echo attached to list responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next: String,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub label: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderPricing {
    pub total: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub total_raw: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub total_unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<OrderItem>,
    pub pricing: OrderPricing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersPage {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionProduct {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub product_group_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionBilling {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub renew_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expires_at: String,
    pub renewable: bool,
    pub renew_auto: bool,
    pub product: SubscriptionProduct,
    pub billing: SubscriptionBilling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionsPage {
    pub subscriptions: Vec<Subscription>,
    pub pagination: Pagination,
}

/// The baseline (v1) capability set.
///
/// Mutating calls take an `idempotency_key`, the operation key derived by
/// the reservation engine, which the client forwards as the provider's
/// idempotency header.
#[async_trait]
pub trait Registrar: Send + Sync {
    async fn suggest(&self, query: &str, tlds: &[String], limit: u32) -> Result<Vec<Suggestion>>;

    /// Single-domain availability with a definitive (FULL) check.
    async fn available(&self, domain: &str) -> Result<Availability>;

    /// Bulk availability with the fast-path check; answers may be
    /// non-definitive and should be re-queried singly before purchase.
    async fn available_bulk(&self, domains: &[String]) -> Result<Vec<Availability>>;

    async fn purchase(
        &self,
        domain: &str,
        years: u32,
        idempotency_key: &str,
    ) -> Result<PurchaseOutcome>;

    async fn renew(&self, domain: &str, years: u32, idempotency_key: &str)
        -> Result<RenewOutcome>;

    async fn list_domains(&self) -> Result<Vec<PortfolioDomain>>;

    async fn list_orders(&self, limit: u32, offset: u32) -> Result<OrdersPage>;

    async fn list_subscriptions(&self, limit: u32, offset: u32) -> Result<SubscriptionsPage>;

    async fn get_nameservers(&self, domain: &str) -> Result<Vec<String>>;

    async fn get_records(&self, domain: &str) -> Result<Vec<DnsRecord>>;

    async fn set_nameservers(&self, domain: &str, nameservers: &[String]) -> Result<()>;

    async fn set_records(&self, domain: &str, records: &[DnsRecord]) -> Result<()>;
}

/// The optional customer-scoped (v2) capability set, plus identity
/// resolution and a small generic passthrough for extended endpoints.
#[async_trait]
pub trait CustomerRegistrar: Send + Sync {
    async fn resolve_customer_id(&self, shopper_id: &str) -> Result<String>;

    async fn domain_detail_v2(
        &self,
        customer_id: &str,
        domain: &str,
        includes: &[String],
    ) -> Result<serde_json::Map<String, serde_json::Value>>;

    async fn domain_detail_v1(
        &self,
        domain: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>>;

    async fn renew_v2(
        &self,
        customer_id: &str,
        domain: &str,
        request: &RenewRequestV2,
        idempotency_key: &str,
    ) -> Result<RenewOutcome>;

    async fn set_nameservers_v2(
        &self,
        customer_id: &str,
        domain: &str,
        nameservers: &[String],
    ) -> Result<()>;

    async fn v2_get(&self, path: &str, query: &[(String, String)]) -> Result<serde_json::Value>;

    async fn v2_post(
        &self,
        path: &str,
        body: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<serde_json::Value>;

    async fn v2_put(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value>;

    async fn v2_patch(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value>;
}

/// A provider-reported monetary value after normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPrice {
    /// Major units (USD).
    pub price: f64,
    /// The amount exactly as the provider reported it.
    pub raw: f64,
    /// `"micros"`, `"usd"`, or `""` when the field was absent.
    pub unit: &'static str,
}

impl NormalizedPrice {
    const NONE: NormalizedPrice = NormalizedPrice {
        price: 0.0,
        raw: 0.0,
        unit: "",
    };

    /// Multiplier that recovers the raw amount from the normalized price.
    pub fn unit_scale(&self) -> f64 {
        if self.unit == "micros" {
            1_000_000.0
        } else {
            1.0
        }
    }
}

const MICROS_PER_UNIT: f64 = 1_000_000.0;

/// Normalize a monetary field from a provider response.
///
/// The registrar commonly reports prices in integer micro-units; whole-number
/// values at or above one million are treated as micros and divided down.
/// Anything else is taken as major units. The raw amount and unit are kept so
/// envelopes stay auditable against provider records.
pub fn normalize_price(value: &serde_json::Value) -> NormalizedPrice {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return classify(i as f64);
            }
            if let Some(f) = n.as_f64() {
                return classify(f);
            }
            NormalizedPrice::NONE
        }
        serde_json::Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return NormalizedPrice::NONE;
            }
            if let Ok(i) = s.parse::<i64>() {
                return classify(i as f64);
            }
            if let Ok(f) = s.parse::<f64>() {
                return classify(f);
            }
            NormalizedPrice::NONE
        }
        _ => NormalizedPrice::NONE,
    }
}

fn classify(v: f64) -> NormalizedPrice {
    if is_whole_number(v) && v >= MICROS_PER_UNIT {
        NormalizedPrice {
            price: v / MICROS_PER_UNIT,
            raw: v,
            unit: "micros",
        }
    } else {
        NormalizedPrice {
            price: v,
            raw: v,
            unit: "usd",
        }
    }
}

fn is_whole_number(v: f64) -> bool {
    (v - v.round()).abs() < 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn micro_units_are_divided_down() {
        let p = normalize_price(&json!(12_990_000));
        assert_eq!(p.price, 12.99);
        assert_eq!(p.raw, 12_990_000.0);
        assert_eq!(p.unit, "micros");
    }

    #[test]
    fn small_integers_are_major_units() {
        let p = normalize_price(&json!(13));
        assert_eq!(p.price, 13.0);
        assert_eq!(p.unit, "usd");
    }

    #[test]
    fn fractional_values_are_major_units() {
        let p = normalize_price(&json!(12.99));
        assert_eq!(p.price, 12.99);
        assert_eq!(p.raw, 12.99);
        assert_eq!(p.unit, "usd");
    }

    #[test]
    fn large_fractional_values_stay_major_units() {
        // A non-integer value can never be a micro count.
        let p = normalize_price(&json!(1_000_000.5));
        assert_eq!(p.price, 1_000_000.5);
        assert_eq!(p.unit, "usd");
    }

    #[test]
    fn string_amounts_parse_both_ways() {
        assert_eq!(normalize_price(&json!("10990000")).price, 10.99);
        assert_eq!(normalize_price(&json!("9.99")).price, 9.99);
        assert_eq!(normalize_price(&json!("  ")).unit, "");
        assert_eq!(normalize_price(&json!("free")).unit, "");
    }

    #[test]
    fn absent_values_normalize_to_empty() {
        let p = normalize_price(&serde_json::Value::Null);
        assert_eq!(p.price, 0.0);
        assert_eq!(p.raw, 0.0);
        assert_eq!(p.unit, "");
    }

    #[test]
    fn round_trip_via_unit_scale() {
        // price * unit_scale recovers the raw provider amount.
        for v in [
            json!(12_990_000),
            json!(1_000_000),
            json!(12.99),
            json!(42),
            json!("8450000"),
        ] {
            let p = normalize_price(&v);
            assert!(
                (p.price * p.unit_scale() - p.raw).abs() < 1e-6,
                "round trip failed for {v}"
            );
        }
    }

    #[test]
    fn exact_million_boundary_is_micros() {
        let p = normalize_price(&json!(1_000_000));
        assert_eq!(p.price, 1.0);
        assert_eq!(p.unit, "micros");
    }

    #[test]
    fn availability_serialization_skips_empty_fields() {
        let a = Availability {
            domain: "example.com".into(),
            available: true,
            definitive: true,
            price: 12.99,
            currency: "USD".into(),
            price_raw: 12_990_000.0,
            price_unit: "micros".into(),
        };
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["price_unit"], "micros");

        let bare = Availability {
            domain: "taken.com".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("price").is_none());
        assert!(json.get("currency").is_none());
    }
}
