//! Cached result of the upstream release probe.
//!
//! The startup update check is best-effort with a sub-second budget; the
//! cache keeps one probe per day useful across invocations. Failures are
//! recorded but never escalate past a log-channel notice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use domainclaw_core::error::{AppError, ErrorKind, Result};

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCache {
    pub last_checked_at: DateTime<Utc>,
    pub current_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub latest_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_available: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub release_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_error: String,
}

/// Handle to the on-disk cache file.
#[derive(Debug, Clone)]
pub struct UpdateCacheFile {
    path: PathBuf,
}

impl UpdateCacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Option<UpdateCache>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AppError::wrap(ErrorKind::Internal, "corrupt update cache", e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, cache: &UpdateCache) -> Result<()> {
        let mut bytes = serde_json::to_vec_pretty(cache)?;
        bytes.push(b'\n');
        std::fs::write(&self.path, &bytes)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

/// Whether enough time has passed since the last probe.
pub fn should_check(now: DateTime<Utc>, last_checked: DateTime<Utc>, interval: Duration) -> bool {
    if interval.is_zero() {
        return true;
    }
    (now - last_checked).to_std().map(|d| d >= interval).unwrap_or(true)
}
