//! `domainclaw settings …` — safety caps and the auto-purchase gate.

use clap::Subcommand;
use serde_json::json;

use domainclaw_config::Settings;
use domainclaw_core::error::{AppError, Result};
use domainclaw_policy::safety::enable_auto_purchase;

use crate::commands::{App, fail};
use crate::emit::Context;

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show current settings (acknowledgment hash redacted to presence)
    Show,

    /// Enable or disable unattended purchasing
    AutoPurchase {
        #[command(subcommand)]
        command: AutoPurchaseCommand,
    },

    /// Set the spending caps
    Caps {
        #[command(subcommand)]
        command: CapsCommand,
    },
}

#[derive(Subcommand)]
pub enum AutoPurchaseCommand {
    /// Enable auto-purchase; requires the exact acknowledgment phrase
    Enable {
        /// The acknowledgment phrase, verbatim
        #[arg(long)]
        ack: String,
    },
    /// Disable auto-purchase
    Disable,
}

#[derive(Subcommand)]
pub enum CapsCommand {
    /// Set all three caps at once
    Set {
        #[arg(long)]
        max_price: f64,
        #[arg(long)]
        max_daily_spend: f64,
        #[arg(long)]
        max_domains_per_day: u32,
    },
}

pub fn run(ctx: &mut Context, app: &App, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            let settings = match Settings::load_stored(&app.paths) {
                Ok(settings) => settings,
                Err(err) => return fail(ctx, "settings show", err),
            };
            ctx.finish(
                "settings show",
                Ok(json!({
                    "api_environment": settings.api_environment.as_str(),
                    "shopper_id": settings.shopper_id,
                    "customer_id": settings.customer_id,
                    "customer_id_resolved_at": settings.customer_id_resolved_at,
                    "customer_id_source": settings.customer_id_source,
                    "auto_purchase_enabled": settings.auto_purchase_enabled,
                    "acknowledgment_hash_present": !settings.acknowledgment_hash.is_empty(),
                    "max_price_per_domain": settings.max_price_per_domain,
                    "max_daily_spend": settings.max_daily_spend,
                    "max_domains_per_day": settings.max_domains_per_day,
                    "default_years": settings.default_years,
                    "default_dns_template": settings.default_dns_template,
                    "output_default": settings.output_default,
                })),
            )
        }

        SettingsCommand::AutoPurchase { command } => match command {
            AutoPurchaseCommand::Enable { ack } => {
                let hash = match enable_auto_purchase(&ack) {
                    Ok(hash) => hash,
                    Err(err) => return fail(ctx, "settings auto-purchase enable", err),
                };
                let mut settings = match Settings::load_stored(&app.paths) {
                    Ok(settings) => settings,
                    Err(err) => return fail(ctx, "settings auto-purchase enable", err),
                };
                settings.auto_purchase_enabled = true;
                settings.acknowledgment_hash = hash;
                if let Err(err) = settings.save(&app.paths) {
                    return fail(ctx, "settings auto-purchase enable", err);
                }
                ctx.finish(
                    "settings auto-purchase enable",
                    Ok(json!({"auto_purchase_enabled": true})),
                )
            }
            AutoPurchaseCommand::Disable => {
                let mut settings = match Settings::load_stored(&app.paths) {
                    Ok(settings) => settings,
                    Err(err) => return fail(ctx, "settings auto-purchase disable", err),
                };
                settings.auto_purchase_enabled = false;
                if let Err(err) = settings.save(&app.paths) {
                    return fail(ctx, "settings auto-purchase disable", err);
                }
                ctx.finish(
                    "settings auto-purchase disable",
                    Ok(json!({"auto_purchase_enabled": false})),
                )
            }
        },

        SettingsCommand::Caps { command } => match command {
            CapsCommand::Set {
                max_price,
                max_daily_spend,
                max_domains_per_day,
            } => {
                if max_price <= 0.0 || max_daily_spend <= 0.0 || max_domains_per_day == 0 {
                    return fail(
                        ctx,
                        "settings caps set",
                        AppError::validation("cap values must be positive"),
                    );
                }
                let mut settings = match Settings::load_stored(&app.paths) {
                    Ok(settings) => settings,
                    Err(err) => return fail(ctx, "settings caps set", err),
                };
                settings.max_price_per_domain = max_price;
                settings.max_daily_spend = max_daily_spend;
                settings.max_domains_per_day = max_domains_per_day;
                if let Err(err) = settings.save(&app.paths) {
                    return fail(ctx, "settings caps set", err);
                }
                ctx.finish(
                    "settings caps set",
                    Ok(json!({
                        "max_price_per_domain": max_price,
                        "max_daily_spend": max_daily_spend,
                        "max_domains_per_day": max_domains_per_day,
                    })),
                )
            }
        },
    }
}
