//! The persisted settings record.
//!
//! Maps directly to `~/.domainclaw/config.json`. Defaults are deliberately
//! conservative: auto-purchase off, a 25 USD per-domain cap, 100 USD daily
//! spend, five domains per day.

use serde::{Deserialize, Serialize};

use domainclaw_core::error::{AppError, Result};

use crate::{StatePaths, write_private};

/// Which provider environment the tool targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Prod,
    Ote,
}

impl Environment {
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Prod => "https://api.godaddy.com",
            Environment::Ote => "https://api.ote-godaddy.com",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Prod => "prod",
            Environment::Ote => "ote",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "prod" => Ok(Environment::Prod),
            "ote" => Ok(Environment::Ote),
            other => Err(AppError::validation("unknown api_environment")
                .with_detail("api_environment", other)),
        }
    }
}

/// How the stored customer id was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerIdSource {
    Manual,
    ShopperLookup,
}

/// The process-wide configuration record.
///
/// Invariant: auto-purchase is effective only when `auto_purchase_enabled`
/// is true AND `acknowledgment_hash` is non-empty; the safety gate enforces
/// both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api_environment: Environment,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shopper_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub customer_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub customer_id_resolved_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id_source: Option<CustomerIdSource>,

    #[serde(default)]
    pub auto_purchase_enabled: bool,

    /// SHA-256 hex of the accepted acknowledgment phrase; empty means the
    /// phrase was never accepted and auto mode stays off.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub acknowledgment_hash: String,

    #[serde(default = "default_max_price_per_domain")]
    pub max_price_per_domain: f64,

    #[serde(default = "default_max_daily_spend")]
    pub max_daily_spend: f64,

    #[serde(default = "default_max_domains_per_day")]
    pub max_domains_per_day: u32,

    #[serde(default = "default_years")]
    pub default_years: u32,

    #[serde(default = "default_dns_template")]
    pub default_dns_template: String,

    #[serde(default = "default_output")]
    pub output_default: String,
}

fn default_max_price_per_domain() -> f64 {
    25.0
}
fn default_max_daily_spend() -> f64 {
    100.0
}
fn default_max_domains_per_day() -> u32 {
    5
}
fn default_years() -> u32 {
    1
}
fn default_dns_template() -> String {
    "afternic-nameservers".into()
}
fn default_output() -> String {
    "json".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_environment: Environment::Prod,
            shopper_id: String::new(),
            customer_id: String::new(),
            customer_id_resolved_at: String::new(),
            customer_id_source: None,
            auto_purchase_enabled: false,
            acknowledgment_hash: String::new(),
            max_price_per_domain: default_max_price_per_domain(),
            max_daily_spend: default_max_daily_spend(),
            max_domains_per_day: default_max_domains_per_day(),
            default_years: default_years(),
            default_dns_template: default_dns_template(),
            output_default: default_output(),
        }
    }
}

impl Settings {
    /// Load the record from the state directory, creating it with defaults
    /// on first run. Identity fields can be overridden per-invocation via
    /// `DOMAINCLAW_SHOPPER_ID` / `DOMAINCLAW_CUSTOMER_ID`.
    pub fn load(paths: &StatePaths) -> Result<Self> {
        let mut settings = Self::load_stored(paths)?;
        if let Ok(shopper) = std::env::var("DOMAINCLAW_SHOPPER_ID") {
            if !shopper.trim().is_empty() {
                settings.shopper_id = shopper.trim().to_string();
            }
        }
        if let Ok(customer) = std::env::var("DOMAINCLAW_CUSTOMER_ID") {
            if !customer.trim().is_empty() {
                settings.customer_id = customer.trim().to_string();
                settings.customer_id_source = Some(CustomerIdSource::Manual);
            }
        }
        Ok(settings)
    }

    /// Load the record exactly as stored, without environment overrides.
    /// Mutating workflows (init, settings, identity) go through this so an
    /// override never leaks into the saved record.
    pub fn load_stored(paths: &StatePaths) -> Result<Self> {
        let path = paths.config_file();
        match std::fs::read(&path) {
            Ok(bytes) => {
                let settings: Settings = serde_json::from_slice(&bytes).map_err(|e| {
                    AppError::wrap(
                        domainclaw_core::ErrorKind::Internal,
                        format!("failed parsing {}", path.display()),
                        e,
                    )
                })?;
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let settings = Settings::default();
                settings.save(paths)?;
                Ok(settings)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the record (owner-only file mode).
    pub fn save(&self, paths: &StatePaths) -> Result<()> {
        paths.ensure_dir()?;
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        write_private(&paths.config_file(), &bytes)
    }

    /// Whether customer-scoped (v2) endpoints can be used.
    pub fn v2_ready(&self) -> bool {
        !self.customer_id.trim().is_empty()
    }

    /// Provider base URL, honoring the `DOMAINCLAW_BASE_URL` override.
    /// The override is still subject to the client's host allow-list.
    pub fn base_url(&self) -> String {
        if let Ok(url) = std::env::var("DOMAINCLAW_BASE_URL") {
            let url = url.trim();
            if !url.is_empty() {
                return url.trim_end_matches('/').to_string();
            }
        }
        self.api_environment.base_url().to_string()
    }
}
