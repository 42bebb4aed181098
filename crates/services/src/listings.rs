//! Paginated order and subscription listings — passthrough with price
//! normalization handled by the client.

use serde_json::json;

use domainclaw_core::error::Result;
use domainclaw_rate::retry;

use crate::{RETRY_ATTEMPTS, Service};

impl Service {
    pub async fn orders_list(&self, limit: u32, offset: u32) -> Result<serde_json::Value> {
        let deadline = self.runtime.deadline;
        let page = retry(deadline, RETRY_ATTEMPTS, || async move {
            self.runtime.limiter.acquire(deadline).await?;
            self.client.list_orders(limit, offset).await
        })
        .await?;
        Ok(json!({
            "orders": page.orders,
            "pagination": page.pagination,
        }))
    }

    pub async fn subscriptions_list(&self, limit: u32, offset: u32) -> Result<serde_json::Value> {
        let deadline = self.runtime.deadline;
        let page = retry(deadline, RETRY_ATTEMPTS, || async move {
            self.runtime.limiter.acquire(deadline).await?;
            self.client.list_subscriptions(limit, offset).await
        })
        .await?;
        Ok(json!({
            "subscriptions": page.subscriptions,
            "pagination": page.pagination,
        }))
    }
}
