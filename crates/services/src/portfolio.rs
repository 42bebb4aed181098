//! Portfolio listing and per-domain detail enrichment.
//!
//! The enriched listing fans out one routed detail call per domain through
//! the bounded worker pool; results are reassembled in input order and
//! annotated with the API version that served each detail.

use chrono::Utc;
use serde::Serialize;

use domainclaw_core::error::{AppError, Result};
use domainclaw_core::registrar::PortfolioDomain;
use domainclaw_rate::retry;

use crate::pool::run_indexed;
use crate::router::v2_then_v1;
use crate::{RETRY_ATTEMPTS, Service};

const MAX_DETAIL_CONCURRENCY: usize = 20;

/// Per-domain record from the enriched portfolio listing.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioDetailItem {
    pub index: usize,
    pub domain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub expires: String,
    #[serde(rename = "nameServers", skip_serializing_if = "Vec::is_empty")]
    pub name_servers: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Service {
    /// List the portfolio with optional expiring-window, TLD, and substring
    /// filters.
    pub async fn list_portfolio(
        &self,
        expiring_in_days: u32,
        tld: &str,
        contains: &str,
    ) -> Result<Vec<PortfolioDomain>> {
        let deadline = self.runtime.deadline;
        let all = retry(deadline, RETRY_ATTEMPTS, || async move {
            self.runtime.limiter.acquire(deadline).await?;
            self.client.list_domains().await
        })
        .await?;

        let now = Utc::now();
        let tld = tld.to_lowercase();
        let contains = contains.to_lowercase();
        let out = all
            .into_iter()
            .filter(|d| {
                let name = d.domain.to_lowercase();
                if !tld.is_empty() && !name.ends_with(&format!(".{tld}")) {
                    return false;
                }
                if !contains.is_empty() && !name.contains(&contains) {
                    return false;
                }
                if expiring_in_days > 0 {
                    if let Ok(expires) =
                        chrono::NaiveDate::parse_from_str(&d.expires, "%Y-%m-%d")
                    {
                        let window = now.date_naive() + chrono::Days::new(expiring_in_days.into());
                        if expires > window {
                            return false;
                        }
                    }
                }
                true
            })
            .collect();
        Ok(out)
    }

    /// Routed domain detail (v2 preferred, v1 fallback), annotated with the
    /// version that served it.
    pub async fn domain_detail(
        &self,
        domain: &str,
        includes: &[String],
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let api = self.customer_api()?;
        let customer_id = self.runtime.settings.customer_id.clone();
        let (mut detail, version) = v2_then_v1(
            self.runtime.settings.v2_ready(),
            || api.domain_detail_v2(&customer_id, domain, includes),
            || api.domain_detail_v1(domain),
        )
        .await?;
        detail.insert("_api_version".into(), version.as_str().into());
        Ok(detail)
    }

    /// Portfolio listing enriched with per-domain nameservers.
    pub async fn portfolio_with_nameservers(
        &self,
        expiring_in_days: u32,
        tld: &str,
        contains: &str,
        concurrency: usize,
    ) -> Result<(Vec<PortfolioDetailItem>, Option<AppError>)> {
        let domains = self.list_portfolio(expiring_in_days, tld, contains).await?;
        let concurrency = concurrency.clamp(1, MAX_DETAIL_CONCURRENCY);
        let total = domains.len();

        let items = run_indexed(domains, concurrency, |index, entry| async move {
            let mut item = PortfolioDetailItem {
                index,
                domain: entry.domain.clone(),
                expires: entry.expires,
                name_servers: Vec::new(),
                api_version: String::new(),
                success: true,
                error: None,
            };
            match self.domain_detail(&entry.domain, &[]).await {
                Ok(detail) => {
                    if let Some(ns) = detail.get("nameServers").and_then(|v| v.as_array()) {
                        item.name_servers = ns
                            .iter()
                            .filter_map(|n| n.as_str())
                            .map(str::trim)
                            .filter(|n| !n.is_empty())
                            .map(String::from)
                            .collect();
                    }
                    if let Some(version) = detail.get("_api_version").and_then(|v| v.as_str()) {
                        item.api_version = version.to_string();
                    }
                }
                Err(err) => {
                    item.success = false;
                    item.error = Some(err.to_string());
                }
            }
            item
        })
        .await;

        let failed = items.iter().filter(|i| !i.success).count();
        let partial = (failed > 0).then(|| {
            AppError::partial(format!("{failed} domain detail lookups failed"))
                .with_detail("failed", failed)
                .with_detail("total", total)
        });
        Ok((items, partial))
    }
}
