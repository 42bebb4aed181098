//! `domainclaw domains …` — search, purchase, renewal, portfolio.

use clap::Subcommand;
use serde_json::json;

use domainclaw_core::error::{AppError, Result};
use domainclaw_services::load_domain_file;

use crate::commands::{App, fail, to_records, warn_prod_financial};
use crate::emit::Context;

#[derive(Subcommand)]
pub enum DomainsCommand {
    /// Suggest available names for a query
    Suggest {
        query: String,
        /// Restrict suggestions to these TLDs
        #[arg(long, value_delimiter = ',')]
        tlds: Vec<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Definitive availability check for one domain
    Check { domain: String },

    /// Concurrent definitive checks over a newline-delimited domain file
    CheckBulk {
        /// File with one domain per line (# comments allowed)
        #[arg(long)]
        file: std::path::PathBuf,
        #[arg(long, default_value_t = 10)]
        concurrency: usize,
    },

    /// Purchase a domain: dry-run by default, `--confirm <token>` to
    /// execute a quoted intent, `--auto` for the gated unattended path
    Buy {
        domain: String,
        #[arg(long)]
        years: Option<u32>,
        /// Confirmation token from a prior dry run
        #[arg(long)]
        confirm: Option<String>,
        /// Unattended purchase (requires the acknowledgment gate)
        #[arg(long)]
        auto: bool,
    },

    /// Renew a domain (dry-run unless --approve)
    Renew {
        domain: String,
        #[arg(long)]
        years: Option<u32>,
        #[arg(long)]
        dry_run: bool,
        /// Execute the renewal instead of quoting it
        #[arg(long)]
        approve: bool,
    },

    /// Renew each domain from a file (dry-run unless --approve)
    RenewBulk {
        #[arg(long)]
        file: std::path::PathBuf,
        #[arg(long)]
        years: Option<u32>,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        approve: bool,
    },

    /// List portfolio domains
    List {
        /// Only domains expiring within this many days
        #[arg(long, default_value_t = 0)]
        expiring_in: u32,
        #[arg(long, default_value = "")]
        tld: String,
        #[arg(long, default_value = "")]
        contains: String,
    },

    /// Portfolio enriched with per-domain nameservers
    Portfolio {
        #[arg(long, default_value_t = 0)]
        expiring_in: u32,
        #[arg(long, default_value = "")]
        tld: String,
        #[arg(long, default_value = "")]
        contains: String,
        #[arg(long, default_value_t = 5)]
        concurrency: usize,
    },

    /// Routed domain detail (v2 preferred, v1 fallback)
    Detail {
        domain: String,
        #[arg(long, value_delimiter = ',')]
        includes: Vec<String>,
    },

    /// Pending registry actions for a domain (customer-scoped)
    Actions {
        domain: String,
        /// Filter to one action type
        #[arg(long)]
        action_type: Option<String>,
    },

    /// Monthly domain usage report, e.g. 202608 (customer-scoped)
    Usage { month: String },

    /// Registry maintenance events
    Maintenances {
        #[arg(long)]
        id: Option<String>,
    },
}

pub async fn run(ctx: &mut Context, app: &App, command: DomainsCommand) -> Result<()> {
    match command {
        DomainsCommand::Suggest { query, tlds, limit } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "domains suggest", err),
            };
            let result = service.suggest(&query, &tlds, limit).await;
            ctx.finish("domains suggest", result)
        }

        DomainsCommand::Check { domain } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "domains check", err),
            };
            let result = service
                .availability(&domain)
                .await
                .and_then(|a| Ok(serde_json::to_value(a)?));
            ctx.finish("domains check", result)
        }

        DomainsCommand::CheckBulk { file, concurrency } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "domains check-bulk", err),
            };
            let domains = match load_domain_file(&file) {
                Ok(domains) => domains,
                Err(err) => return fail(ctx, "domains check-bulk", err),
            };
            let (items, partial) = service
                .availability_bulk_concurrent(domains, concurrency)
                .await;
            let records = to_records(&items)?;
            ctx.emit_records("domains check-bulk", records)?;
            match partial {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        DomainsCommand::Buy {
            domain,
            years,
            confirm,
            auto,
        } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "domains buy", err),
            };
            warn_prod_financial(service.runtime().settings.api_environment, ctx.quiet);
            let years = years.unwrap_or(service.runtime().settings.default_years);
            let result = if auto {
                service
                    .purchase_auto(&domain, years)
                    .await
                    .and_then(|o| Ok(serde_json::to_value(o)?))
            } else if let Some(token) = confirm {
                service
                    .purchase_confirm(&domain, &token, years)
                    .await
                    .and_then(|o| Ok(serde_json::to_value(o)?))
            } else {
                service.purchase_dry_run(&domain, years).await
            };
            ctx.finish("domains buy", result)
        }

        DomainsCommand::Renew {
            domain,
            years,
            dry_run,
            approve,
        } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "domains renew", err),
            };
            warn_prod_financial(service.runtime().settings.api_environment, ctx.quiet);
            let years = years.unwrap_or(service.runtime().settings.default_years);
            let result = service.renew(&domain, years, dry_run, approve).await;
            ctx.finish("domains renew", result)
        }

        DomainsCommand::RenewBulk {
            file,
            years,
            dry_run,
            approve,
        } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "domains renew-bulk", err),
            };
            warn_prod_financial(service.runtime().settings.api_environment, ctx.quiet);
            let domains = match load_domain_file(&file) {
                Ok(domains) => domains,
                Err(err) => return fail(ctx, "domains renew-bulk", err),
            };
            let years = years.unwrap_or(service.runtime().settings.default_years);

            let mut records = Vec::with_capacity(domains.len());
            let mut failed = 0usize;
            for (index, domain) in domains.iter().enumerate() {
                match service.renew(domain, years, dry_run, approve).await {
                    Ok(result) => records.push(json!({
                        "index": index,
                        "input": domain,
                        "success": true,
                        "result": result,
                    })),
                    Err(err) => {
                        failed += 1;
                        records.push(json!({
                            "index": index,
                            "input": domain,
                            "success": false,
                            "error": err.to_string(),
                        }));
                    }
                }
            }
            let total = domains.len();
            ctx.emit_records("domains renew-bulk", records)?;
            if failed > 0 {
                return Err(AppError::partial(format!("{failed} renewals failed"))
                    .with_detail("failed", failed)
                    .with_detail("total", total));
            }
            Ok(())
        }

        DomainsCommand::List {
            expiring_in,
            tld,
            contains,
        } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "domains list", err),
            };
            let result = service
                .list_portfolio(expiring_in, &tld, &contains)
                .await
                .and_then(|domains| Ok(json!({"domains": domains})));
            ctx.finish("domains list", result)
        }

        DomainsCommand::Portfolio {
            expiring_in,
            tld,
            contains,
            concurrency,
        } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "domains portfolio", err),
            };
            let (items, partial) = match service
                .portfolio_with_nameservers(expiring_in, &tld, &contains, concurrency)
                .await
            {
                Ok(out) => out,
                Err(err) => return fail(ctx, "domains portfolio", err),
            };
            let records = to_records(&items)?;
            ctx.emit_records("domains portfolio", records)?;
            match partial {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        DomainsCommand::Detail { domain, includes } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "domains detail", err),
            };
            let result = service
                .domain_detail(&domain, &includes)
                .await
                .map(serde_json::Value::Object);
            ctx.finish("domains detail", result)
        }

        DomainsCommand::Actions {
            domain,
            action_type,
        } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "domains actions", err),
            };
            let result = async {
                let mut path = service
                    .v2_path_customer(&format!("/v2/customers/{{customerId}}/domains/{domain}/actions"))?;
                if let Some(action_type) = action_type {
                    path = format!("{path}/{action_type}");
                }
                service.v2_get(&path, &[]).await
            }
            .await;
            ctx.finish("domains actions", result)
        }

        DomainsCommand::Usage { month } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "domains usage", err),
            };
            let result = service.v2_get(&format!("/v2/domains/usage/{month}"), &[]).await;
            ctx.finish("domains usage", result)
        }

        DomainsCommand::Maintenances { id } => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "domains maintenances", err),
            };
            let path = match id {
                Some(id) => format!("/v2/domains/maintenances/{id}"),
                None => "/v2/domains/maintenances".to_string(),
            };
            let result = service.v2_get(&path, &[]).await;
            ctx.finish("domains maintenances", result)
        }
    }
}
