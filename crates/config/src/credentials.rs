//! Provider credential loading.
//!
//! Environment variables win; on macOS the OS keychain is consulted as a
//! fallback through the `security` binary with a fixed argument vector
//! (strict account allow-list, no shell expansion). Missing credentials are
//! an auth error so the exit code tells the operator what to fix.

use domainclaw_core::error::{AppError, Result};

/// API key/secret pair for the registrar.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

// Keep secrets out of debug output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(target_os = "macos")]
const KEYCHAIN_SERVICE: &str = "domainclaw";
#[cfg(target_os = "macos")]
const KEYCHAIN_ACCOUNTS: [&str; 2] = ["godaddy_api_key", "godaddy_api_secret"];

/// Load credentials from `GODADDY_API_KEY` / `GODADDY_API_SECRET`, falling
/// back to the macOS keychain.
pub fn load_credentials() -> Result<Credentials> {
    let key = env_trimmed("GODADDY_API_KEY");
    let secret = env_trimmed("GODADDY_API_SECRET");
    if !key.is_empty() && !secret.is_empty() {
        return Ok(Credentials {
            api_key: key,
            api_secret: secret,
        });
    }

    #[cfg(target_os = "macos")]
    {
        let key = keychain_read("godaddy_api_key");
        let secret = keychain_read("godaddy_api_secret");
        if !key.is_empty() && !secret.is_empty() {
            return Ok(Credentials {
                api_key: key,
                api_secret: secret,
            });
        }
    }

    Err(AppError::auth(
        "missing registrar credentials; set GODADDY_API_KEY and GODADDY_API_SECRET or store them in the OS keychain",
    )
    .with_detail(
        "env_vars",
        serde_json::json!(["GODADDY_API_KEY", "GODADDY_API_SECRET"]),
    ))
}

fn env_trimmed(name: &str) -> String {
    std::env::var(name).map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Read one allow-listed account from the login keychain. Best-effort: any
/// failure reads as "not stored".
#[cfg(target_os = "macos")]
fn keychain_read(account: &str) -> String {
    if !KEYCHAIN_ACCOUNTS.contains(&account) {
        return String::new();
    }
    let output = std::process::Command::new("security")
        .args(["find-generic-password", "-s", KEYCHAIN_SERVICE, "-a", account, "-w"])
        .output();
    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_secrets() {
        let creds = Credentials {
            api_key: "key-abc123".into(),
            api_secret: "secret-xyz".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("abc123"));
        assert!(!rendered.contains("xyz"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn missing_credentials_is_an_auth_error() {
        // Only meaningful when the env vars are absent in the test runner;
        // guard so a developer shell with credentials set does not fail.
        if std::env::var("GODADDY_API_KEY").is_ok() {
            return;
        }
        let err = load_credentials().unwrap_err();
        assert_eq!(err.kind, domainclaw_core::ErrorKind::Auth);
        assert_eq!(err.exit_code(), 3);
    }
}
