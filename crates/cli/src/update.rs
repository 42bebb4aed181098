//! Startup update notifier and the explicit update-check command.
//!
//! The startup check is strictly best-effort: it runs in a background task
//! with a sub-second budget, caches one probe per day, writes notices to
//! the log channel only, and never affects the exit code. Set
//! `DOMAINCLAW_DISABLE_UPDATE_CHECK=1` (or `--quiet`) to silence it.

use chrono::Utc;
use tracing::{debug, info};

use domainclaw_config::StatePaths;
use domainclaw_registrar::fetch_latest_release;
use domainclaw_store::{UpdateCache, UpdateCacheFile, should_check};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const CHECK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(24 * 3600);
const STARTUP_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(300);
const EXPLICIT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(8);

/// Result of one probe against the release metadata endpoint.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub ok: bool,
    pub current: String,
    pub latest: String,
    pub update_available: Option<bool>,
    pub release_url: String,
    pub error: String,
}

pub fn is_disabled_by_env() -> bool {
    matches!(
        std::env::var("DOMAINCLAW_DISABLE_UPDATE_CHECK")
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .as_str(),
        "1" | "true" | "yes"
    )
}

/// Kick off the startup notifier unless suppressed. A fresh cache is
/// consulted synchronously; otherwise a background probe refreshes it.
pub fn maybe_start_notifier(paths: &StatePaths, root_command: &str, quiet: bool) {
    if quiet || is_disabled_by_env() {
        return;
    }
    if matches!(root_command, "version" | "update-check") {
        return;
    }

    let cache_file = UpdateCacheFile::new(paths.update_cache_file());
    let current = normalize_version(VERSION).to_string();
    if let Ok(Some(cache)) = cache_file.load() {
        if cache.current_version == current
            && !should_check(Utc::now(), cache.last_checked_at, CHECK_INTERVAL)
        {
            if cache.update_available == Some(true) {
                emit_notice(&current, &cache.latest_version, &cache.release_url);
            }
            return;
        }
    }

    tokio::spawn(async move {
        let result = check(STARTUP_TIMEOUT).await;
        let _ = cache_file.save(&UpdateCache {
            last_checked_at: Utc::now(),
            current_version: current.clone(),
            latest_version: result.latest.clone(),
            update_available: result.update_available,
            release_url: result.release_url.clone(),
            last_error: result.error.clone(),
        });
        if result.update_available == Some(true) {
            emit_notice(&current, &result.latest, &result.release_url);
        }
    });
}

fn emit_notice(current: &str, latest: &str, release_url: &str) {
    info!("update available: domainclaw {current} -> {latest}");
    if !release_url.is_empty() {
        info!("release: {release_url}");
    }
}

/// Probe the release endpoint once.
pub async fn check(timeout: std::time::Duration) -> CheckResult {
    let current = normalize_version(VERSION).to_string();
    match fetch_latest_release(&current, timeout).await {
        Ok(release) => {
            let latest = normalize_version(&release.tag).to_string();
            CheckResult {
                ok: true,
                update_available: is_version_newer(&current, &latest),
                current,
                latest,
                release_url: release.url,
                error: String::new(),
            }
        }
        Err(err) => {
            debug!(error = %err, "update check failed");
            CheckResult {
                ok: false,
                current,
                latest: String::new(),
                update_available: None,
                release_url: String::new(),
                error: err.to_string(),
            }
        }
    }
}

/// The explicit `update-check` command payload.
pub async fn update_check_result() -> serde_json::Value {
    let result = check(EXPLICIT_TIMEOUT).await;
    if !result.ok {
        return serde_json::json!({
            "ok": false,
            "current": result.current,
            "error": result.error,
        });
    }
    serde_json::json!({
        "ok": true,
        "current": result.current,
        "latest": result.latest,
        "release_url": result.release_url,
        "update_available": result.update_available,
    })
}

pub fn normalize_version(v: &str) -> &str {
    v.trim().trim_start_matches(['v', 'V'])
}

/// Compare semver strings; `None` when either side is unparseable (dev
/// builds never nag).
pub fn is_version_newer(current: &str, latest: &str) -> Option<bool> {
    let c = parse_semver(current)?;
    let l = parse_semver(latest)?;
    if l.core != c.core {
        return Some(l.core > c.core);
    }
    Some(match (c.pre.is_empty(), l.pre.is_empty()) {
        (true, false) => false,
        (false, true) => true,
        _ => l.pre > c.pre,
    })
}

struct Semver {
    core: (u64, u64, u64),
    pre: String,
}

fn parse_semver(v: &str) -> Option<Semver> {
    let v = normalize_version(v);
    if v.is_empty() || v == "dev" {
        return None;
    }
    let (core, pre) = match v.split_once('-') {
        Some((core, pre)) => (core, pre),
        None => (v, ""),
    };
    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    Some(Semver {
        core: (major, minor, patch),
        pre: pre.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_prefixes_are_stripped() {
        assert_eq!(normalize_version("v1.2.3"), "1.2.3");
        assert_eq!(normalize_version("  V0.4.1 "), "0.4.1");
        assert_eq!(normalize_version("1.0.0"), "1.0.0");
    }

    #[test]
    fn newer_versions_are_detected() {
        assert_eq!(is_version_newer("1.2.3", "1.2.4"), Some(true));
        assert_eq!(is_version_newer("1.2.3", "1.3.0"), Some(true));
        assert_eq!(is_version_newer("1.2.3", "2.0.0"), Some(true));
        assert_eq!(is_version_newer("1.2.3", "1.2.3"), Some(false));
        assert_eq!(is_version_newer("1.2.4", "1.2.3"), Some(false));
    }

    #[test]
    fn prerelease_ordering() {
        // A release beats its own prerelease.
        assert_eq!(is_version_newer("1.0.0-rc.1", "1.0.0"), Some(true));
        assert_eq!(is_version_newer("1.0.0", "1.0.0-rc.1"), Some(false));
        assert_eq!(is_version_newer("1.0.0-rc.1", "1.0.0-rc.1"), Some(false));
    }

    #[test]
    fn unparseable_versions_yield_none() {
        assert_eq!(is_version_newer("dev", "1.0.0"), None);
        assert_eq!(is_version_newer("1.0.0", ""), None);
        assert_eq!(is_version_newer("1.0", "1.0.0"), None);
    }
}
