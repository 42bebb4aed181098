//! DNS audit and template application.
//!
//! The audit inspects each domain's nameservers and records and emits issue
//! tags an agent can act on. Apply supports the built-in templates
//! (Afternic nameservers, parking) plus a user-supplied JSON template file
//! carrying a nameserver list, a record list, or both. Nameserver writes go
//! through the capability router so customer-scoped accounts use v2.

use serde::{Deserialize, Serialize};

use domainclaw_core::error::{AppError, Result};
use domainclaw_core::registrar::DnsRecord;

use crate::Service;
use crate::router::v2_then_v1;

const AFTERNIC_NS: [&str; 2] = ["ns1.afternic.com", "ns2.afternic.com"];
const PARKING_A_RECORD: &str = "52.71.57.184";

/// Per-domain audit record.
#[derive(Debug, Clone, Serialize)]
pub struct DnsAuditItem {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub afternic_pointed: Option<bool>,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-domain apply record.
#[derive(Debug, Clone, Serialize)]
pub struct DnsApplyItem {
    pub domain: String,
    pub template: String,
    pub applied: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A user-supplied template: nameservers, records, or both.
#[derive(Debug, Clone, Deserialize)]
struct DnsTemplateFile {
    #[serde(default)]
    nameservers: Vec<String>,
    #[serde(default)]
    records: Vec<DnsRecord>,
}

impl Service {
    /// Inspect each domain and tag actionable issues.
    pub async fn dns_audit(&self, domains: &[String]) -> Result<Vec<DnsAuditItem>> {
        let mut results = Vec::with_capacity(domains.len());
        for domain in domains {
            let ns = match self.client.get_nameservers(domain).await {
                Ok(ns) => ns,
                Err(err) => {
                    results.push(DnsAuditItem {
                        domain: domain.clone(),
                        afternic_pointed: None,
                        issues: vec!["nameserver_fetch_failed".into()],
                        error: Some(err.to_string()),
                    });
                    continue;
                }
            };
            let records = match self.client.get_records(domain).await {
                Ok(records) => records,
                Err(err) => {
                    results.push(DnsAuditItem {
                        domain: domain.clone(),
                        afternic_pointed: None,
                        issues: vec!["records_fetch_failed".into()],
                        error: Some(err.to_string()),
                    });
                    continue;
                }
            };

            let afternic = ns.len() >= 2
                && ns[0].eq_ignore_ascii_case(AFTERNIC_NS[0])
                && ns[1].eq_ignore_ascii_case(AFTERNIC_NS[1]);
            let mut issues = Vec::new();
            if !afternic {
                issues.push("nameservers_not_afternic".into());
            }
            let has_txt = records.iter().any(|r| r.record_type.eq_ignore_ascii_case("TXT"));
            let has_a = records.iter().any(|r| r.record_type.eq_ignore_ascii_case("A"));
            if !has_txt {
                issues.push("missing_txt_verification".into());
            }
            if !has_a {
                issues.push("missing_a_record".into());
            }
            results.push(DnsAuditItem {
                domain: domain.clone(),
                afternic_pointed: Some(afternic),
                issues,
                error: None,
            });
        }
        Ok(results)
    }

    /// Apply a named or file-based template to each domain.
    pub async fn dns_apply(
        &self,
        template: &str,
        domains: &[String],
        dry_run: bool,
    ) -> Result<Vec<DnsApplyItem>> {
        let custom = if template.to_lowercase().ends_with(".json") {
            Some(load_template_file(std::path::Path::new(template))?)
        } else {
            None
        };

        let mut out = Vec::with_capacity(domains.len());
        for domain in domains {
            if dry_run {
                out.push(DnsApplyItem {
                    domain: domain.clone(),
                    template: template.to_string(),
                    applied: false,
                    dry_run: true,
                    changes: vec!["set_nameservers".into()],
                    error: None,
                });
                continue;
            }

            let applied = match (template, &custom) {
                ("afternic" | "afternic-nameservers", _) => {
                    let ns: Vec<String> = AFTERNIC_NS.iter().map(|s| s.to_string()).collect();
                    self.set_nameservers_routed(domain, &ns).await.map(|_| ())
                }
                ("parking", _) => {
                    let records = vec![DnsRecord {
                        record_type: "A".into(),
                        name: "@".into(),
                        data: PARKING_A_RECORD.into(),
                        ttl: Some(600),
                    }];
                    self.client.set_records(domain, &records).await
                }
                (_, Some(custom)) => self.apply_custom_template(domain, custom).await,
                (other, None) => Err(AppError::validation("unsupported template")
                    .with_detail("template", other)),
            };

            match applied {
                Ok(()) => out.push(DnsApplyItem {
                    domain: domain.clone(),
                    template: template.to_string(),
                    applied: true,
                    dry_run: false,
                    changes: Vec::new(),
                    error: None,
                }),
                Err(err) if err.kind == domainclaw_core::ErrorKind::Validation => {
                    // A bad template is a caller error, not a per-domain one.
                    return Err(err);
                }
                Err(err) => out.push(DnsApplyItem {
                    domain: domain.clone(),
                    template: template.to_string(),
                    applied: false,
                    dry_run: false,
                    changes: Vec::new(),
                    error: Some(err.to_string()),
                }),
            }
        }
        Ok(out)
    }

    async fn apply_custom_template(&self, domain: &str, custom: &DnsTemplateFile) -> Result<()> {
        if !custom.nameservers.is_empty() {
            self.set_nameservers_routed(domain, &custom.nameservers).await?;
        }
        if !custom.records.is_empty() {
            self.client.set_records(domain, &custom.records).await?;
        }
        Ok(())
    }

    /// Nameserver write through the capability router.
    pub async fn set_nameservers_routed(
        &self,
        domain: &str,
        nameservers: &[String],
    ) -> Result<&'static str> {
        match &self.customer {
            Some(api) if self.runtime.settings.v2_ready() => {
                let customer_id = self.runtime.settings.customer_id.clone();
                let (_, version) = v2_then_v1(
                    true,
                    || api.set_nameservers_v2(&customer_id, domain, nameservers),
                    || self.client.set_nameservers(domain, nameservers),
                )
                .await?;
                Ok(version.as_str())
            }
            _ => {
                self.client.set_nameservers(domain, nameservers).await?;
                Ok("v1")
            }
        }
    }
}

fn load_template_file(path: &std::path::Path) -> Result<DnsTemplateFile> {
    let bytes = std::fs::read(path).map_err(|e| {
        AppError::validation("custom template file not found")
            .with_detail("template", path.display().to_string())
            .with_cause(e)
    })?;
    let template: DnsTemplateFile = serde_json::from_slice(&bytes)
        .map_err(|e| AppError::validation("invalid custom template JSON").with_cause(e))?;
    if template.nameservers.is_empty() && template.records.is_empty() {
        return Err(AppError::validation(
            "custom template must include nameservers or records",
        ));
    }
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_file_requires_some_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.json");
        std::fs::write(&path, b"{}").unwrap();
        let err = load_template_file(&path).unwrap_err();
        assert!(err.message.contains("nameservers or records"));
    }

    #[test]
    fn template_file_parses_nameservers_and_records() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("custom.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "nameservers": ["ns1.example.net", "ns2.example.net"],
                "records": [{"type": "A", "name": "@", "data": "1.2.3.4", "ttl": 300}]
            })
            .to_string(),
        )
        .unwrap();
        let template = load_template_file(&path).unwrap();
        assert_eq!(template.nameservers.len(), 2);
        assert_eq!(template.records[0].data, "1.2.3.4");
    }

    #[test]
    fn invalid_template_json_is_a_validation_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, b"{nope").unwrap();
        let err = load_template_file(&path).unwrap_err();
        assert_eq!(err.kind, domainclaw_core::ErrorKind::Validation);
    }
}
