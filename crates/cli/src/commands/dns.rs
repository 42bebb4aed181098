//! `domainclaw dns …` — audit and template application.

use clap::Subcommand;

use domainclaw_core::error::Result;
use domainclaw_services::load_domain_file;

use crate::commands::{App, fail, to_records};
use crate::emit::Context;

#[derive(Subcommand)]
pub enum DnsCommand {
    /// Inspect nameservers and records, tagging actionable issues
    Audit {
        /// File with one domain per line
        #[arg(long)]
        domains: std::path::PathBuf,
    },

    /// Apply a named template or a custom JSON template file
    Apply {
        /// Template name (afternic-nameservers, parking) or a .json file;
        /// defaults to the configured default template
        #[arg(long)]
        template: Option<String>,
        #[arg(long)]
        domains: std::path::PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
}

pub async fn run(ctx: &mut Context, app: &App, command: DnsCommand) -> Result<()> {
    match command {
        DnsCommand::Audit { domains } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "dns audit", err),
            };
            let domains = match load_domain_file(&domains) {
                Ok(domains) => domains,
                Err(err) => return fail(ctx, "dns audit", err),
            };
            match service.dns_audit(&domains).await {
                Ok(items) => {
                    let records = to_records(&items)?;
                    ctx.emit_records("dns audit", records)
                }
                Err(err) => fail(ctx, "dns audit", err),
            }
        }

        DnsCommand::Apply {
            template,
            domains,
            dry_run,
        } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "dns apply", err),
            };
            let domains = match load_domain_file(&domains) {
                Ok(domains) => domains,
                Err(err) => return fail(ctx, "dns apply", err),
            };
            let template = template
                .unwrap_or_else(|| service.runtime().settings.default_dns_template.clone());
            match service.dns_apply(&template, &domains, dry_run).await {
                Ok(items) => {
                    let records = to_records(&items)?;
                    ctx.emit_records("dns apply", records)
                }
                Err(err) => fail(ctx, "dns apply", err),
            }
        }
    }
}
