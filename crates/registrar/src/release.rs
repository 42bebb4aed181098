//! Upstream release metadata probe for the update notifier.
//!
//! A single GET against the fixed releases-latest URL, read through the
//! same bounded-reader discipline as provider calls. Strictly best-effort:
//! the caller runs it under a sub-second budget and only ever logs the
//! outcome.

use serde::Deserialize;

use domainclaw_core::error::{AppError, Result};

const LATEST_RELEASE_URL: &str =
    "https://api.github.com/repos/sportwhiz/domainclaw/releases/latest";

const RELEASE_BODY_LIMIT: u64 = 1 << 20;

/// Latest published release, as reported upstream.
#[derive(Debug, Clone)]
pub struct ReleaseInfo {
    pub tag: String,
    pub url: String,
}

/// Fetch the latest release tag. `timeout` bounds the whole call.
pub async fn fetch_latest_release(
    current_version: &str,
    timeout: std::time::Duration,
) -> Result<ReleaseInfo> {
    #[derive(Deserialize)]
    struct ReleaseRaw {
        #[serde(default)]
        tag_name: String,
        #[serde(default)]
        html_url: String,
    }

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::internal("failed building HTTP client").with_cause(e))?;
    let response = client
        .get(LATEST_RELEASE_URL)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .header(
            reqwest::header::USER_AGENT,
            format!("domainclaw/{current_version}"),
        )
        .send()
        .await
        .map_err(|e| AppError::provider("update check request failed").with_cause(e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::provider("update check failed")
            .with_detail("status", status.as_u16()));
    }

    let bytes = crate::client::read_bounded(response, RELEASE_BODY_LIMIT).await?;
    let raw: ReleaseRaw = serde_json::from_slice(&bytes)
        .map_err(|e| AppError::provider("failed decoding release metadata").with_cause(e))?;
    Ok(ReleaseInfo {
        tag: raw.tag_name,
        url: raw.html_url,
    })
}
