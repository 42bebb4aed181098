//! The registrar HTTP client.
//!
//! Implements both capability traits over reqwest. Every request carries the
//! static `sso-key` authorization header and `Accept: application/json`;
//! mutating calls add the idempotency header with the caller's operation
//! key. Response bodies are read through a size-bounded reader with
//! per-endpoint caps so a misbehaving upstream cannot balloon memory.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use domainclaw_config::Credentials;
use domainclaw_core::error::{AppError, Result};
use domainclaw_core::registrar::*;

use crate::allowlist::validate_base_url;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(20);

/// Single-item endpoints.
const SMALL_LIMIT: u64 = 2 << 20;
/// Bulk endpoints: batch availability, portfolio, orders, subscriptions.
const BULK_LIMIT: u64 = 50 << 20;
/// Error bodies regardless of endpoint.
const ERROR_LIMIT: u64 = 1 << 20;

const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

/// HTTP implementation of the registrar capability surface.
pub struct RegistrarClient {
    base: Url,
    auth_header: String,
    http: reqwest::Client,
}

impl RegistrarClient {
    /// Construct a client. The base URL must pass the host allow-list.
    pub fn new(base_url: &str, credentials: &Credentials) -> Result<Self> {
        let base = validate_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::internal("failed building HTTP client").with_cause(e))?;
        Ok(Self {
            base,
            auth_header: format!("sso-key {}:{}", credentials.api_key, credentials.api_secret),
            http,
        })
    }

    /// Build a URL from path segments (percent-encoded) and query pairs.
    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| AppError::validation("base URL cannot carry paths"))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Execute one request and return the bounded response body.
    async fn call(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
        idempotency_key: Option<&str>,
        limit: u64,
    ) -> Result<Vec<u8>> {
        debug!(method = %method, path = url.path(), "registrar request");
        let mut request = self
            .http
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| {
            AppError::provider("provider request failed")
                .retryable(true)
                .with_cause(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return read_bounded(response, limit).await;
        }

        // Error bodies are bounded separately and parsed best-effort.
        let raw = read_bounded(response, ERROR_LIMIT).await.unwrap_or_default();
        let details: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&raw).unwrap_or_default();
        let code = status.as_u16();
        warn!(status = code, "registrar returned non-success status");
        if code == 429 {
            return Err(AppError::rate_limited("provider rate limited").with_details(details));
        }
        if code == 401 || code == 403 {
            return Err(AppError::auth("provider authentication failed").with_details(details));
        }
        Err(AppError::provider("provider returned non-success status")
            .with_detail("status", code)
            .with_detail("provider", serde_json::Value::Object(details)))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        limit: u64,
    ) -> Result<T> {
        let url = self.url(segments, query)?;
        let bytes = self.call(Method::GET, url, None, None, limit).await?;
        decode(&bytes)
    }
}

pub(crate) async fn read_bounded(response: reqwest::Response, limit: u64) -> Result<Vec<u8>> {
    let mut stream = response.bytes_stream();
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            AppError::provider("failed reading provider response")
                .retryable(true)
                .with_cause(e)
        })?;
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(AppError::provider("provider response exceeded size limit")
                .with_detail("limit_bytes", limit));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| AppError::provider("failed decoding provider response").with_cause(e))
}

fn decode_value(bytes: &[u8]) -> Result<serde_json::Value> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(serde_json::Value::Null);
    }
    decode(bytes)
}

// ── wire shapes ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AvailabilityRaw {
    #[serde(default)]
    domain: String,
    #[serde(default)]
    available: bool,
    #[serde(default)]
    definitive: bool,
    #[serde(default)]
    price: serde_json::Value,
    #[serde(default)]
    currency: String,
}

fn normalize_availability(raw: AvailabilityRaw) -> Availability {
    let price = normalize_price(&raw.price);
    Availability {
        domain: raw.domain,
        available: raw.available,
        definitive: raw.definitive,
        price: price.price,
        currency: raw.currency,
        price_raw: price.raw,
        price_unit: price.unit.to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PaginationRaw {
    first: String,
    last: String,
    next: String,
    total: u64,
}

impl PaginationRaw {
    fn into_page(self, limit: u32, offset: u32) -> Pagination {
        Pagination {
            first: self.first,
            last: self.last,
            next: self.next,
            total: self.total,
            limit,
            offset,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OrdersRaw {
    #[serde(default)]
    orders: Vec<OrderRaw>,
    #[serde(default)]
    pagination: PaginationRaw,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct OrderRaw {
    order_id: String,
    created_at: String,
    currency: String,
    items: Vec<OrderItemRaw>,
    pricing: OrderPricingRaw,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrderItemRaw {
    label: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrderPricingRaw {
    total: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SubscriptionsRaw {
    #[serde(default)]
    subscriptions: Vec<SubscriptionRaw>,
    #[serde(default)]
    pagination: PaginationRaw,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SubscriptionRaw {
    subscription_id: String,
    status: String,
    label: String,
    created_at: String,
    expires_at: String,
    renewable: bool,
    renew_auto: bool,
    product: SubscriptionProductRaw,
    billing: SubscriptionBillingRaw,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SubscriptionProductRaw {
    namespace: String,
    product_group_key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SubscriptionBillingRaw {
    status: String,
    renew_at: String,
}

// ── baseline capability ─────────────────────────────────────────────────

#[async_trait]
impl Registrar for RegistrarClient {
    async fn suggest(&self, query: &str, tlds: &[String], limit: u32) -> Result<Vec<Suggestion>> {
        let mut pairs = vec![("query", query.to_string())];
        if limit > 0 {
            pairs.push(("limit", limit.to_string()));
        }
        if !tlds.is_empty() {
            pairs.push(("tlds", tlds.join(",")));
        }
        self.get_json(&["v1", "domains", "suggest"], &pairs, SMALL_LIMIT)
            .await
    }

    async fn available(&self, domain: &str) -> Result<Availability> {
        // FULL gives a definitive answer for single lookups and avoids
        // FAST-mode ambiguity.
        let raw: AvailabilityRaw = self
            .get_json(
                &["v1", "domains", "available"],
                &[("domain", domain.to_string()), ("checkType", "FULL".into())],
                SMALL_LIMIT,
            )
            .await?;
        Ok(normalize_availability(raw))
    }

    async fn available_bulk(&self, domains: &[String]) -> Result<Vec<Availability>> {
        let body = serde_json::json!({"domains": domains, "checkType": "FAST"});
        let url = self.url(&["v1", "domains", "available"], &[])?;
        let bytes = self
            .call(Method::POST, url, Some(&body), None, BULK_LIMIT)
            .await?;
        let raw: Vec<AvailabilityRaw> = decode(&bytes)?;
        Ok(raw.into_iter().map(normalize_availability).collect())
    }

    async fn purchase(
        &self,
        domain: &str,
        years: u32,
        idempotency_key: &str,
    ) -> Result<PurchaseOutcome> {
        let body = serde_json::json!({"domain": domain, "period": years});
        let url = self.url(&["v1", "domains", "purchase"], &[])?;
        let bytes = self
            .call(Method::POST, url, Some(&body), Some(idempotency_key), SMALL_LIMIT)
            .await?;
        decode(&bytes)
    }

    async fn renew(
        &self,
        domain: &str,
        years: u32,
        idempotency_key: &str,
    ) -> Result<RenewOutcome> {
        let body = serde_json::json!({"period": years});
        let url = self.url(&["v1", "domains", domain, "renew"], &[])?;
        let bytes = self
            .call(Method::POST, url, Some(&body), Some(idempotency_key), SMALL_LIMIT)
            .await?;
        decode(&bytes)
    }

    async fn list_domains(&self) -> Result<Vec<PortfolioDomain>> {
        self.get_json(&["v1", "domains"], &[], BULK_LIMIT).await
    }

    async fn list_orders(&self, limit: u32, offset: u32) -> Result<OrdersPage> {
        let raw: OrdersRaw = self
            .get_json(
                &["v1", "orders"],
                &[("limit", limit.to_string()), ("offset", offset.to_string())],
                BULK_LIMIT,
            )
            .await?;
        let orders = raw
            .orders
            .into_iter()
            .map(|o| {
                let total = normalize_price(&o.pricing.total);
                Order {
                    order_id: o.order_id,
                    created_at: o.created_at,
                    currency: o.currency,
                    items: o.items.into_iter().map(|i| OrderItem { label: i.label }).collect(),
                    pricing: OrderPricing {
                        total: total.price,
                        total_raw: total.raw,
                        total_unit: total.unit.to_string(),
                    },
                }
            })
            .collect();
        Ok(OrdersPage {
            orders,
            pagination: raw.pagination.into_page(limit, offset),
        })
    }

    async fn list_subscriptions(&self, limit: u32, offset: u32) -> Result<SubscriptionsPage> {
        let raw: SubscriptionsRaw = self
            .get_json(
                &["v1", "subscriptions"],
                &[("limit", limit.to_string()), ("offset", offset.to_string())],
                BULK_LIMIT,
            )
            .await?;
        let subscriptions = raw
            .subscriptions
            .into_iter()
            .map(|s| Subscription {
                subscription_id: s.subscription_id,
                status: s.status,
                label: s.label,
                created_at: s.created_at,
                expires_at: s.expires_at,
                renewable: s.renewable,
                renew_auto: s.renew_auto,
                product: SubscriptionProduct {
                    namespace: s.product.namespace,
                    product_group_key: s.product.product_group_key,
                },
                billing: SubscriptionBilling {
                    status: s.billing.status,
                    renew_at: s.billing.renew_at,
                },
            })
            .collect();
        Ok(SubscriptionsPage {
            subscriptions,
            pagination: raw.pagination.into_page(limit, offset),
        })
    }

    async fn get_nameservers(&self, domain: &str) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct DetailNs {
            #[serde(default, rename = "nameServers")]
            name_servers: Vec<String>,
        }
        let detail: DetailNs = self
            .get_json(&["v1", "domains", domain], &[], SMALL_LIMIT)
            .await?;
        Ok(detail.name_servers)
    }

    async fn get_records(&self, domain: &str) -> Result<Vec<DnsRecord>> {
        self.get_json(&["v1", "domains", domain, "records"], &[], SMALL_LIMIT)
            .await
    }

    async fn set_nameservers(&self, domain: &str, nameservers: &[String]) -> Result<()> {
        let body = serde_json::json!({"nameServers": nameservers});
        let url = self.url(&["v1", "domains", domain], &[])?;
        self.call(Method::PATCH, url, Some(&body), None, SMALL_LIMIT)
            .await?;
        Ok(())
    }

    async fn set_records(&self, domain: &str, records: &[DnsRecord]) -> Result<()> {
        let body = serde_json::to_value(records)?;
        let url = self.url(&["v1", "domains", domain, "records"], &[])?;
        self.call(Method::PUT, url, Some(&body), None, SMALL_LIMIT)
            .await?;
        Ok(())
    }
}

// ── customer-scoped capability ──────────────────────────────────────────

#[async_trait]
impl CustomerRegistrar for RegistrarClient {
    async fn resolve_customer_id(&self, shopper_id: &str) -> Result<String> {
        if shopper_id.trim().is_empty() {
            return Err(AppError::validation("shopper_id is required"));
        }
        #[derive(Deserialize)]
        struct ShopperRaw {
            #[serde(default, rename = "customerId")]
            customer_id: String,
        }
        let raw: ShopperRaw = self
            .get_json(
                &["v1", "shoppers", shopper_id],
                &[("includes", "customerId".into())],
                SMALL_LIMIT,
            )
            .await?;
        if raw.customer_id.trim().is_empty() {
            return Err(AppError::provider("customerId not present in shopper response"));
        }
        Ok(raw.customer_id)
    }

    async fn domain_detail_v2(
        &self,
        customer_id: &str,
        domain: &str,
        includes: &[String],
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let pairs: Vec<(&str, String)> = includes
            .iter()
            .filter(|i| !i.trim().is_empty())
            .map(|i| ("includes", i.clone()))
            .collect();
        self.get_json(
            &["v2", "customers", customer_id, "domains", domain],
            &pairs,
            SMALL_LIMIT,
        )
        .await
    }

    async fn domain_detail_v1(
        &self,
        domain: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        self.get_json(&["v1", "domains", domain], &[], SMALL_LIMIT)
            .await
    }

    async fn renew_v2(
        &self,
        customer_id: &str,
        domain: &str,
        request: &RenewRequestV2,
        idempotency_key: &str,
    ) -> Result<RenewOutcome> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct RenewV2Raw {
            price: serde_json::Value,
            currency: String,
            #[serde(rename = "orderId")]
            order_id: String,
        }
        let body = serde_json::to_value(request)?;
        let url = self.url(
            &["v2", "customers", customer_id, "domains", domain, "renew"],
            &[],
        )?;
        let bytes = self
            .call(Method::POST, url, Some(&body), Some(idempotency_key), SMALL_LIMIT)
            .await?;
        let raw: RenewV2Raw = decode(&bytes)?;
        let price = normalize_price(&raw.price);
        Ok(RenewOutcome {
            domain: domain.to_string(),
            price: price.price,
            currency: raw.currency,
            order_id: raw.order_id,
        })
    }

    async fn set_nameservers_v2(
        &self,
        customer_id: &str,
        domain: &str,
        nameservers: &[String],
    ) -> Result<()> {
        let body = serde_json::json!({"nameServers": nameservers});
        let url = self.url(
            &["v2", "customers", customer_id, "domains", domain, "nameServers"],
            &[],
        )?;
        self.call(Method::PUT, url, Some(&body), None, SMALL_LIMIT)
            .await?;
        Ok(())
    }

    async fn v2_get(&self, path: &str, query: &[(String, String)]) -> Result<serde_json::Value> {
        let url = self.extended_url(path, query)?;
        let bytes = self.call(Method::GET, url, None, None, SMALL_LIMIT).await?;
        decode_value(&bytes)
    }

    async fn v2_post(
        &self,
        path: &str,
        body: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<serde_json::Value> {
        let url = self.extended_url(path, &[])?;
        let idem = (!idempotency_key.is_empty()).then_some(idempotency_key);
        let bytes = self
            .call(Method::POST, url, Some(body), idem, SMALL_LIMIT)
            .await?;
        decode_value(&bytes)
    }

    async fn v2_put(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = self.extended_url(path, &[])?;
        let bytes = self.call(Method::PUT, url, Some(body), None, SMALL_LIMIT).await?;
        decode_value(&bytes)
    }

    async fn v2_patch(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = self.extended_url(path, &[])?;
        let bytes = self
            .call(Method::PATCH, url, Some(body), None, SMALL_LIMIT)
            .await?;
        decode_value(&bytes)
    }
}

impl RegistrarClient {
    /// Resolve a caller-supplied extended endpoint path against the base.
    fn extended_url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|_| AppError::validation("invalid endpoint path").with_detail("path", path))?;
        if url.host_str() != self.base.host_str() {
            return Err(AppError::validation("endpoint path must stay on the registrar host"));
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> RegistrarClient {
        RegistrarClient::new(
            "https://api.ote-godaddy.com",
            &Credentials {
                api_key: "key".into(),
                api_secret: "secret".into(),
            },
        )
        .unwrap()
    }

    #[test]
    fn construction_rejects_disallowed_hosts() {
        let creds = Credentials {
            api_key: "k".into(),
            api_secret: "s".into(),
        };
        assert!(RegistrarClient::new("https://api.godaddy.com", &creds).is_ok());
        assert!(RegistrarClient::new("https://untrusted.example.com", &creds).is_err());
        assert!(RegistrarClient::new("http://api.godaddy.com", &creds).is_err());
    }

    #[test]
    fn auth_header_uses_sso_key_scheme() {
        let c = client();
        assert_eq!(c.auth_header, "sso-key key:secret");
    }

    #[test]
    fn url_builder_escapes_path_segments() {
        let c = client();
        let url = c
            .url(&["v1", "domains", "weird domain.com", "renew"], &[])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.ote-godaddy.com/v1/domains/weird%20domain.com/renew"
        );
    }

    #[test]
    fn url_builder_appends_query_pairs() {
        let c = client();
        let url = c
            .url(
                &["v1", "domains", "available"],
                &[("domain", "a.com".into()), ("checkType", "FULL".into())],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.ote-godaddy.com/v1/domains/available?domain=a.com&checkType=FULL"
        );
    }

    #[test]
    fn extended_url_cannot_escape_the_host() {
        let c = client();
        assert!(c.extended_url("/v2/customers/c1/domains", &[]).is_ok());
        assert!(c.extended_url("https://evil.example.com/v2", &[]).is_err());
    }

    #[test]
    fn availability_normalization_handles_micros() {
        let raw: AvailabilityRaw = serde_json::from_value(json!({
            "domain": "example.com",
            "available": true,
            "definitive": true,
            "price": 12_990_000,
            "currency": "USD"
        }))
        .unwrap();
        let a = normalize_availability(raw);
        assert_eq!(a.price, 12.99);
        assert_eq!(a.price_raw, 12_990_000.0);
        assert_eq!(a.price_unit, "micros");
    }

    #[test]
    fn availability_normalization_tolerates_missing_price() {
        let raw: AvailabilityRaw =
            serde_json::from_value(json!({"domain": "taken.com", "available": false})).unwrap();
        let a = normalize_availability(raw);
        assert_eq!(a.price, 0.0);
        assert_eq!(a.price_unit, "");
    }

    #[test]
    fn orders_wire_shape_decodes_camel_case() {
        let raw: OrdersRaw = serde_json::from_value(json!({
            "orders": [{
                "orderId": "o-1",
                "createdAt": "2026-01-01T00:00:00Z",
                "currency": "USD",
                "items": [{"label": "example.com registration"}],
                "pricing": {"total": 10_990_000}
            }],
            "pagination": {"total": 1, "next": ""}
        }))
        .unwrap();
        assert_eq!(raw.orders.len(), 1);
        assert_eq!(raw.orders[0].order_id, "o-1");
        let total = normalize_price(&raw.orders[0].pricing.total);
        assert_eq!(total.price, 10.99);
    }

    #[test]
    fn decode_value_treats_empty_body_as_null() {
        assert_eq!(decode_value(b"").unwrap(), serde_json::Value::Null);
        assert_eq!(decode_value(b"  \n").unwrap(), serde_json::Value::Null);
        assert_eq!(decode_value(b"{\"a\":1}").unwrap()["a"], 1);
    }
}
