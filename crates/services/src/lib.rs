//! # domainclaw Services
//!
//! The workflow facade: every user-visible operation is composed here from
//! the rate limiter, the policy gates, the reservation engine, the
//! capability router, and the registrar client. The facade owns short-lived
//! in-flight state only; everything durable lives in the stores.
//!
//! Mutating workflows follow one pipeline: obtain a definitive price, pass
//! it through policy, reserve budget atomically in the ledger, execute the
//! provider call under retry with the operation key as idempotency header,
//! then finalize the reservation and (for confirmed purchases) burn the
//! confirmation token.

pub mod availability;
pub mod dns;
pub mod identity;
pub mod listings;
pub mod pool;
pub mod portfolio;
pub mod purchase;
pub mod renew;
pub mod reservation;
pub mod router;
pub mod runtime;

pub use availability::BulkAvailabilityItem;
pub use dns::{DnsApplyItem, DnsAuditItem};
pub use identity::ResolvedIdentity;
pub use pool::run_indexed;
pub use portfolio::PortfolioDetailItem;
pub use reservation::{finalize, operation_key, reserve};
pub use router::{ApiVersion, enrich_renew_error, v2_then_v1};
pub use runtime::Runtime;

use std::sync::Arc;

use domainclaw_core::error::{AppError, Result};
use domainclaw_core::registrar::{CustomerRegistrar, Registrar};

/// Provider calls are retried up to this many attempts.
pub(crate) const RETRY_ATTEMPTS: u32 = 3;

/// The workflow facade over one runtime and one registrar client.
pub struct Service {
    pub(crate) runtime: Runtime,
    pub(crate) client: Arc<dyn Registrar>,
    pub(crate) customer: Option<Arc<dyn CustomerRegistrar>>,
}

impl Service {
    pub fn new(runtime: Runtime, client: Arc<dyn Registrar>) -> Self {
        Self {
            runtime,
            client,
            customer: None,
        }
    }

    /// Attach the optional customer-scoped capability surface.
    pub fn with_customer_api(mut self, api: Arc<dyn CustomerRegistrar>) -> Self {
        self.customer = Some(api);
        self
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub(crate) fn customer_api(&self) -> Result<&Arc<dyn CustomerRegistrar>> {
        self.customer
            .as_ref()
            .ok_or_else(|| AppError::internal("client does not support customer-scoped operations"))
    }
}

/// Read a newline-delimited domain list; blank lines and `#` comments are
/// skipped. An empty result is a validation error: bulk commands should
/// fail loudly rather than do nothing.
pub fn load_domain_file(path: &std::path::Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::validation("domain list file not found")
            .with_detail("path", path.display().to_string())
            .with_cause(e)
    })?;
    let domains: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect();
    if domains.is_empty() {
        return Err(AppError::validation("no domains found in file")
            .with_detail("path", path.display().to_string()));
    }
    Ok(domains)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_file_skips_comments_and_blanks() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("domains.txt");
        std::fs::write(&path, "# portfolio\nexample.com\n\n  b.ai  \n# done\n").unwrap();
        let domains = load_domain_file(&path).unwrap();
        assert_eq!(domains, vec!["example.com", "b.ai"]);
    }

    #[test]
    fn empty_domain_file_is_a_validation_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("domains.txt");
        std::fs::write(&path, "# nothing here\n").unwrap();
        let err = load_domain_file(&path).unwrap_err();
        assert_eq!(err.kind, domainclaw_core::ErrorKind::Validation);
    }

    #[test]
    fn missing_domain_file_is_a_validation_error() {
        let err = load_domain_file(std::path::Path::new("/nonexistent/list.txt")).unwrap_err();
        assert_eq!(err.kind, domainclaw_core::ErrorKind::Validation);
    }
}
