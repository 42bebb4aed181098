//! Account identity: shopper/customer resolution and the generic v2
//! passthrough for extended customer-scoped endpoints.

use chrono::{SecondsFormat, Utc};
use serde_json::json;

use domainclaw_core::error::{AppError, Result};

use crate::Service;

/// Outcome of a shopper-to-customer lookup; the CLI persists it into the
/// settings record.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub shopper_id: String,
    pub customer_id: String,
    pub resolved_at: String,
}

impl Service {
    pub fn identity_show(&self) -> serde_json::Value {
        let settings = &self.runtime.settings;
        json!({
            "shopper_id": settings.shopper_id,
            "customer_id": settings.customer_id,
            "customer_id_resolved_at": settings.customer_id_resolved_at,
            "customer_id_source": settings.customer_id_source,
            "v2_customer_scoped_ready": settings.v2_ready(),
        })
    }

    /// Resolve the customer id behind a shopper id.
    pub async fn resolve_customer_id(&self, shopper_id: &str) -> Result<ResolvedIdentity> {
        let api = self.customer_api()?;
        let customer_id = api.resolve_customer_id(shopper_id).await?;
        Ok(ResolvedIdentity {
            shopper_id: shopper_id.to_string(),
            customer_id,
            resolved_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    fn require_customer_id(&self) -> Result<String> {
        let customer_id = self.runtime.settings.customer_id.trim();
        if customer_id.is_empty() {
            return Err(AppError::validation(
                "customer_id is not configured; run account identity set/resolve first",
            ));
        }
        Ok(customer_id.to_string())
    }

    /// Generic GET against an extended v2 endpoint.
    pub async fn v2_get(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<serde_json::Value> {
        let api = self.customer_api()?;
        self.require_customer_id()?;
        api.v2_get(path, query).await
    }

    /// Generic mutating call against an extended v2 endpoint.
    pub async fn v2_apply(
        &self,
        method: &str,
        path: &str,
        body: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<serde_json::Value> {
        let api = self.customer_api()?;
        self.require_customer_id()?;
        match method.to_uppercase().as_str() {
            "POST" => api.v2_post(path, body, idempotency_key).await,
            "PUT" => api.v2_put(path, body).await,
            "PATCH" => api.v2_patch(path, body).await,
            other => {
                Err(AppError::validation("unsupported method").with_detail("method", other))
            }
        }
    }

    /// Substitute the configured customer id into an endpoint template.
    pub fn v2_path_customer(&self, path_template: &str) -> Result<String> {
        let customer_id = self.require_customer_id()?;
        Ok(path_template.replace("{customerId}", &customer_id))
    }
}
