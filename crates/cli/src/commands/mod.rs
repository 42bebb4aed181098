//! Command implementations and the shared construction helpers.

pub mod account;
pub mod dns;
pub mod domains;
pub mod init;
pub mod settings;
pub mod version;

use std::sync::Arc;

use tracing::warn;

use domainclaw_config::{Environment, StatePaths, load_credentials};
use domainclaw_core::error::Result;
use domainclaw_registrar::RegistrarClient;
use domainclaw_services::{Runtime, Service};

use crate::emit::Context;

/// Invocation-scoped construction inputs.
pub struct App {
    pub paths: StatePaths,
    pub timeout: Option<std::time::Duration>,
}

impl App {
    /// Build the runtime: settings snapshot, limiter, request id, deadline.
    pub fn runtime(&self, ctx: &Context) -> Result<Runtime> {
        let mut runtime = Runtime::new(self.paths.clone(), ctx.request_id.clone())?;
        if let Some(timeout) = self.timeout {
            runtime = runtime.with_timeout(timeout);
        }
        Ok(runtime)
    }

    /// Build the full service: runtime plus an allow-listed provider client
    /// carrying credentials from the environment or the OS keychain.
    pub fn service(&self, ctx: &Context) -> Result<Service> {
        let runtime = self.runtime(ctx)?;
        let credentials = load_credentials()?;
        let client = Arc::new(RegistrarClient::new(&runtime.settings.base_url(), &credentials)?);
        Ok(Service::new(runtime, client.clone()).with_customer_api(client))
    }
}

/// One-line stderr warning before financial mutations against production.
pub fn warn_prod_financial(environment: Environment, quiet: bool) {
    if !quiet && environment == Environment::Prod {
        warn!("running financial action against production API environment");
    }
}

/// Emit the error envelope and propagate the error for the exit code.
pub(crate) fn fail(ctx: &mut Context, command: &str, err: domainclaw_core::AppError) -> Result<()> {
    ctx.emit_error(command, &err);
    Err(err)
}

/// Serialize typed per-item records for stream emission.
pub(crate) fn to_records<T: serde::Serialize>(items: &[T]) -> Result<Vec<serde_json::Value>> {
    items
        .iter()
        .map(|item| Ok(serde_json::to_value(item)?))
        .collect()
}
