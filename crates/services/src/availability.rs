//! Suggestion and availability workflows.
//!
//! Single lookups run the definitive (FULL) check; bulk mode fans out
//! single lookups through the bounded worker pool so each domain gets a
//! definitive answer, per-item failures stay inline, and the output order
//! matches the input order.

use serde::Serialize;
use serde_json::json;

use domainclaw_core::error::{AppError, Result};
use domainclaw_core::registrar::Availability;
use domainclaw_rate::retry;

use crate::pool::run_indexed;
use crate::{RETRY_ATTEMPTS, Service};

/// Per-domain record from the concurrent bulk check.
#[derive(Debug, Clone, Serialize)]
pub struct BulkAvailabilityItem {
    pub index: usize,
    pub input: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Availability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl Service {
    pub async fn suggest(
        &self,
        query: &str,
        tlds: &[String],
        limit: u32,
    ) -> Result<serde_json::Value> {
        let deadline = self.runtime.deadline;
        let suggestions = retry(deadline, RETRY_ATTEMPTS, || async move {
            self.runtime.limiter.acquire(deadline).await?;
            self.client.suggest(query, tlds, limit).await
        })
        .await?;
        Ok(json!({"query": query, "suggestions": suggestions}))
    }

    /// Definitive availability for one domain.
    pub async fn availability(&self, domain: &str) -> Result<Availability> {
        let deadline = self.runtime.deadline;
        retry(deadline, RETRY_ATTEMPTS, || async move {
            self.runtime.limiter.acquire(deadline).await?;
            self.client.available(domain).await
        })
        .await
    }

    /// One fast-path bulk call; answers may be non-definitive.
    pub async fn availability_bulk(&self, domains: &[String]) -> Result<Vec<Availability>> {
        let deadline = self.runtime.deadline;
        retry(deadline, RETRY_ATTEMPTS, || async move {
            self.runtime.limiter.acquire(deadline).await?;
            self.client.available_bulk(domains).await
        })
        .await
    }

    /// Definitive per-domain checks through the bounded worker pool.
    ///
    /// Always returns every item in input order; a non-zero failure count
    /// additionally yields a partial error carrying `{failed, total}`.
    pub async fn availability_bulk_concurrent(
        &self,
        domains: Vec<String>,
        concurrency: usize,
    ) -> (Vec<BulkAvailabilityItem>, Option<AppError>) {
        let total = domains.len();
        let items = run_indexed(domains, concurrency, |index, domain| async move {
            let start = std::time::Instant::now();
            match self.availability(&domain).await {
                Ok(result) => BulkAvailabilityItem {
                    index,
                    input: domain,
                    success: true,
                    result: Some(result),
                    error: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                },
                Err(err) => BulkAvailabilityItem {
                    index,
                    input: domain,
                    success: false,
                    result: None,
                    error: Some(err.to_string()),
                    duration_ms: start.elapsed().as_millis() as u64,
                },
            }
        })
        .await;

        let failed = items.iter().filter(|i| !i.success).count();
        let partial = (failed > 0).then(|| {
            AppError::partial(format!("{failed} availability checks failed"))
                .with_detail("failed", failed)
                .with_detail("total", total)
        });
        (items, partial)
    }
}
