//! `domainclaw init` — create the state directory and seed settings.

use clap::Args;
use serde_json::json;

use domainclaw_config::{CustomerIdSource, Settings};
use domainclaw_core::error::{AppError, Result};
use domainclaw_policy::safety::enable_auto_purchase;

use crate::commands::{App, fail};
use crate::emit::Context;

#[derive(Args)]
pub struct InitArgs {
    /// Provider environment: prod or ote
    #[arg(long)]
    api_environment: Option<String>,

    /// Per-domain price cap in USD
    #[arg(long)]
    max_price: Option<f64>,

    /// Daily spend cap in USD
    #[arg(long)]
    max_daily_spend: Option<f64>,

    /// Daily purchase/renew count cap
    #[arg(long)]
    max_domains_per_day: Option<u32>,

    /// Store the shopper id
    #[arg(long)]
    shopper_id: Option<String>,

    /// Resolve and store the customer id behind the shopper id
    #[arg(long)]
    resolve_customer_id: bool,

    /// Enable auto-purchase (requires --ack with the exact phrase)
    #[arg(long)]
    enable_auto_purchase: bool,

    /// The acknowledgment phrase for --enable-auto-purchase
    #[arg(long)]
    ack: Option<String>,
}

pub async fn run(ctx: &mut Context, app: &App, args: InitArgs) -> Result<()> {
    const COMMAND: &str = "init";

    if let Err(err) = app.paths.ensure_dir() {
        return fail(ctx, COMMAND, err);
    }
    let mut settings = match Settings::load_stored(&app.paths) {
        Ok(settings) => settings,
        Err(err) => return fail(ctx, COMMAND, err),
    };
    let mut changed = serde_json::Map::new();

    if let Some(env) = args.api_environment.as_deref() {
        let parsed = match env.parse() {
            Ok(parsed) => parsed,
            Err(err) => return fail(ctx, COMMAND, err),
        };
        settings.api_environment = parsed;
        changed.insert("api_environment".into(), env.to_lowercase().into());
    }
    if let Some(max_price) = args.max_price {
        if max_price <= 0.0 {
            return fail(ctx, COMMAND, AppError::validation("max-price must be > 0"));
        }
        settings.max_price_per_domain = max_price;
        changed.insert("max_price_per_domain".into(), max_price.into());
    }
    if let Some(max_daily) = args.max_daily_spend {
        if max_daily <= 0.0 {
            return fail(ctx, COMMAND, AppError::validation("max-daily-spend must be > 0"));
        }
        settings.max_daily_spend = max_daily;
        changed.insert("max_daily_spend".into(), max_daily.into());
    }
    if let Some(max_domains) = args.max_domains_per_day {
        if max_domains == 0 {
            return fail(
                ctx,
                COMMAND,
                AppError::validation("max-domains-per-day must be > 0"),
            );
        }
        settings.max_domains_per_day = max_domains;
        changed.insert("max_domains_per_day".into(), max_domains.into());
    }
    if let Some(shopper_id) = args.shopper_id.as_deref() {
        let shopper_id = shopper_id.trim();
        if shopper_id.is_empty() {
            return fail(ctx, COMMAND, AppError::validation("shopper-id must not be empty"));
        }
        settings.shopper_id = shopper_id.to_string();
        changed.insert("shopper_id".into(), shopper_id.into());
    }
    if args.enable_auto_purchase {
        let ack = args.ack.as_deref().unwrap_or_default();
        let hash = match enable_auto_purchase(ack) {
            Ok(hash) => hash,
            Err(err) => return fail(ctx, COMMAND, err),
        };
        settings.auto_purchase_enabled = true;
        settings.acknowledgment_hash = hash;
        changed.insert("auto_purchase_enabled".into(), true.into());
    }

    if let Err(err) = settings.save(&app.paths) {
        return fail(ctx, COMMAND, err);
    }

    if args.resolve_customer_id {
        let shopper_id = settings.shopper_id.trim().to_string();
        if shopper_id.is_empty() {
            return fail(
                ctx,
                COMMAND,
                AppError::validation("--resolve-customer-id requires a shopper id"),
            );
        }
        let service = match app.service(ctx) {
            Ok(service) => service,
            Err(err) => return fail(ctx, COMMAND, err),
        };
        let resolved = match service.resolve_customer_id(&shopper_id).await {
            Ok(resolved) => resolved,
            Err(err) => return fail(ctx, COMMAND, err),
        };
        settings.customer_id = resolved.customer_id.clone();
        settings.customer_id_resolved_at = resolved.resolved_at;
        settings.customer_id_source = Some(CustomerIdSource::ShopperLookup);
        if let Err(err) = settings.save(&app.paths) {
            return fail(ctx, COMMAND, err);
        }
        changed.insert("customer_id".into(), resolved.customer_id.into());
    }

    ctx.finish(
        COMMAND,
        Ok(json!({
            "state_dir": app.paths.dir().display().to_string(),
            "changed": changed,
        })),
    )
}
