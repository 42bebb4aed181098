//! Base-URL allow-list enforced at client construction.
//!
//! Exactly the production host, the OTE host, and loopback are accepted.
//! Non-loopback IP literals are rejected outright (SSRF prevention), and
//! the registrar hosts must be reached over TLS. Loopback over plain HTTP
//! is allowed for the local development server.

use std::net::IpAddr;

use url::Url;

use domainclaw_core::error::{AppError, Result};

pub const PROD_HOST: &str = "api.godaddy.com";
pub const OTE_HOST: &str = "api.ote-godaddy.com";

const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

/// Validate and parse a base URL against the allow-list.
pub fn validate_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|_| AppError::validation("invalid base URL").with_detail("base_url", raw))?;
    let host = match url.host_str() {
        Some(h) => h.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase(),
        None => {
            return Err(AppError::validation("invalid base URL").with_detail("base_url", raw));
        }
    };

    if let Ok(ip) = host.parse::<IpAddr>() {
        if !ip.is_loopback() {
            return Err(AppError::validation(
                "base URL must target the registrar API or loopback",
            )
            .with_detail("host", host));
        }
    }

    let allowed =
        host == PROD_HOST || host == OTE_HOST || LOOPBACK_HOSTS.contains(&host.as_str());
    if !allowed {
        return Err(AppError::validation("base URL host is not allowed").with_detail("host", host));
    }

    if (host == PROD_HOST || host == OTE_HOST) && url.scheme() != "https" {
        return Err(AppError::validation("registrar API base URL must use https")
            .with_detail("scheme", url.scheme()));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainclaw_core::ErrorKind;

    #[test]
    fn registrar_hosts_are_allowed_over_https() {
        assert!(validate_base_url("https://api.godaddy.com").is_ok());
        assert!(validate_base_url("https://api.ote-godaddy.com").is_ok());
    }

    #[test]
    fn registrar_hosts_require_tls() {
        let err = validate_base_url("http://api.godaddy.com").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("https"));
    }

    #[test]
    fn loopback_is_allowed_for_development() {
        assert!(validate_base_url("http://localhost:8080").is_ok());
        assert!(validate_base_url("http://127.0.0.1:3000").is_ok());
        assert!(validate_base_url("http://[::1]:3000").is_ok());
    }

    #[test]
    fn non_loopback_ip_literals_are_rejected() {
        for raw in [
            "http://10.0.0.5",
            "https://192.168.1.1",
            "http://169.254.169.254/latest/meta-data/",
            "https://8.8.8.8",
        ] {
            let err = validate_base_url(raw).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation, "accepted: {raw}");
        }
    }

    #[test]
    fn arbitrary_hosts_are_rejected() {
        let err = validate_base_url("https://evil.example.com").unwrap_err();
        assert!(err.message.contains("not allowed"));
    }

    #[test]
    fn garbage_is_an_invalid_base_url() {
        assert!(validate_base_url("not a url").is_err());
        assert!(validate_base_url("").is_err());
    }
}
