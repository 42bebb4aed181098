//! `domainclaw account …` — orders, subscriptions, and identity.

use clap::Subcommand;
use serde_json::json;

use domainclaw_config::{CustomerIdSource, Settings};
use domainclaw_core::error::{AppError, Result};

use crate::commands::{App, fail};
use crate::emit::Context;

#[derive(Subcommand)]
pub enum AccountCommand {
    /// List orders (paginated)
    Orders {
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// List subscriptions (paginated)
    Subscriptions {
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Show or change the shopper/customer identity
    Identity {
        #[command(subcommand)]
        command: IdentityCommand,
    },
}

#[derive(Subcommand)]
pub enum IdentityCommand {
    /// Show the configured identity and v2 readiness
    Show,

    /// Set the shopper and/or customer id directly
    Set {
        #[arg(long)]
        shopper_id: Option<String>,
        #[arg(long)]
        customer_id: Option<String>,
    },

    /// Resolve the customer id behind the configured shopper id
    Resolve,
}

pub async fn run(ctx: &mut Context, app: &App, command: AccountCommand) -> Result<()> {
    match command {
        AccountCommand::Orders { limit, offset } => {
            if limit == 0 {
                return fail(ctx, "account orders", AppError::validation("limit must be > 0"));
            }
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "account orders", err),
            };
            let result = service.orders_list(limit, offset).await;
            ctx.finish("account orders", result)
        }

        AccountCommand::Subscriptions { limit, offset } => {
            if limit == 0 {
                return fail(
                    ctx,
                    "account subscriptions",
                    AppError::validation("limit must be > 0"),
                );
            }
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "account subscriptions", err),
            };
            let result = service.subscriptions_list(limit, offset).await;
            ctx.finish("account subscriptions", result)
        }

        AccountCommand::Identity { command } => run_identity(ctx, app, command).await,
    }
}

async fn run_identity(ctx: &mut Context, app: &App, command: IdentityCommand) -> Result<()> {
    match command {
        IdentityCommand::Show => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "account identity show", err),
            };
            ctx.finish("account identity show", Ok(service.identity_show()))
        }

        IdentityCommand::Set {
            shopper_id,
            customer_id,
        } => {
            let shopper_id = shopper_id.unwrap_or_default().trim().to_string();
            let customer_id = customer_id.unwrap_or_default().trim().to_string();
            if shopper_id.is_empty() && customer_id.is_empty() {
                return fail(
                    ctx,
                    "account identity set",
                    AppError::validation(
                        "account identity set requires --shopper-id and/or --customer-id",
                    ),
                );
            }
            // The settings record has one mutating path: load, change, save.
            let mut settings = match Settings::load_stored(&app.paths) {
                Ok(settings) => settings,
                Err(err) => return fail(ctx, "account identity set", err),
            };
            if !shopper_id.is_empty() {
                settings.shopper_id = shopper_id;
            }
            if !customer_id.is_empty() {
                settings.customer_id = customer_id;
                settings.customer_id_source = Some(CustomerIdSource::Manual);
                settings.customer_id_resolved_at = String::new();
            }
            if let Err(err) = settings.save(&app.paths) {
                return fail(ctx, "account identity set", err);
            }
            ctx.finish(
                "account identity set",
                Ok(json!({
                    "shopper_id": settings.shopper_id,
                    "customer_id": settings.customer_id,
                })),
            )
        }

        IdentityCommand::Resolve => {
            let service = match app.service(ctx) {
                Ok(s) => s,
                Err(err) => return fail(ctx, "account identity resolve", err),
            };
            let shopper_id = service.runtime().settings.shopper_id.trim().to_string();
            if shopper_id.is_empty() {
                return fail(
                    ctx,
                    "account identity resolve",
                    AppError::validation(
                        "shopper_id is not configured; set it first with account identity set --shopper-id",
                    ),
                );
            }
            let resolved = match service.resolve_customer_id(&shopper_id).await {
                Ok(resolved) => resolved,
                Err(err) => return fail(ctx, "account identity resolve", err),
            };

            let mut settings = match Settings::load_stored(&app.paths) {
                Ok(settings) => settings,
                Err(err) => return fail(ctx, "account identity resolve", err),
            };
            settings.shopper_id = resolved.shopper_id.clone();
            settings.customer_id = resolved.customer_id.clone();
            settings.customer_id_resolved_at = resolved.resolved_at.clone();
            settings.customer_id_source = Some(CustomerIdSource::ShopperLookup);
            if let Err(err) = settings.save(&app.paths) {
                return fail(ctx, "account identity resolve", err);
            }

            ctx.finish(
                "account identity resolve",
                Ok(json!({
                    "shopper_id": resolved.shopper_id,
                    "customer_id": resolved.customer_id,
                    "customer_id_source": "shopper_lookup",
                    "customer_id_resolved_at": resolved.resolved_at,
                })),
            )
        }
    }
}
