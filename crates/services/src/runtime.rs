//! Per-invocation runtime state.
//!
//! One [`Runtime`] is constructed per CLI invocation: a settings snapshot,
//! the shared rate limiter, the state paths, an opaque request id stamped
//! into every envelope, and an optional wall-clock deadline that propagates
//! to every suspension point. Tests build isolated runtimes over temp
//! state directories.

use std::sync::Arc;

use tokio::time::Instant;

use domainclaw_config::{Settings, StatePaths};
use domainclaw_core::error::Result;
use domainclaw_policy::TokenEngine;
use domainclaw_rate::Limiter;
use domainclaw_store::{Ledger, TokenFile};

const DEFAULT_RPM: u32 = 55;

#[derive(Clone)]
pub struct Runtime {
    pub settings: Settings,
    pub paths: StatePaths,
    pub limiter: Arc<Limiter>,
    pub request_id: String,
    pub deadline: Option<Instant>,
}

impl Runtime {
    /// Load settings from the state directory and build the runtime.
    pub fn new(paths: StatePaths, request_id: impl Into<String>) -> Result<Self> {
        let settings = Settings::load(&paths)?;
        Ok(Self::with_settings(paths, settings, request_id))
    }

    /// Build a runtime around an explicit settings snapshot.
    pub fn with_settings(
        paths: StatePaths,
        settings: Settings,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            settings,
            paths,
            limiter: Arc::new(Limiter::new(DEFAULT_RPM)),
            request_id: request_id.into(),
            deadline: None,
        }
    }

    /// Cap the whole invocation at `timeout` from now.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Override the pacing budget (tests and the local mock environment).
    pub fn with_rpm(mut self, rpm: u32) -> Self {
        self.limiter = Arc::new(Limiter::new(rpm));
        self
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.paths.operations_file())
    }

    pub fn tokens(&self) -> TokenEngine {
        TokenEngine::new(TokenFile::new(self.paths.tokens_file()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_creates_default_settings_on_first_load() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StatePaths::new(tmp.path().join("state"));
        let rt = Runtime::new(paths.clone(), "req-1").unwrap();
        assert_eq!(rt.settings.max_domains_per_day, 5);
        assert!(paths.config_file().exists());
        assert!(rt.deadline.is_none());
    }

    #[test]
    fn with_timeout_sets_a_deadline() {
        let tmp = tempfile::tempdir().unwrap();
        let rt = Runtime::with_settings(
            StatePaths::new(tmp.path()),
            Settings::default(),
            "req-2",
        )
        .with_timeout(std::time::Duration::from_secs(30));
        assert!(rt.deadline.is_some());
    }
}
