//! domainclaw CLI — the main entry point.
//!
//! Machine-first output contract: stdout carries JSON envelopes only
//! (`--stream` for NDJSON), stderr carries logs and notices, and the exit
//! code is derived from the error taxonomy. Agent operators parse stdout
//! and branch on the exit code.

use clap::{Parser, Subcommand};

mod commands;
mod emit;
mod update;

use domainclaw_config::StatePaths;
use domainclaw_core::error::Result;
use emit::{Context, OutputMode};

#[derive(Parser)]
#[command(
    name = "domainclaw",
    about = "domainclaw — agent-first registrar CLI",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit a single JSON envelope on stdout (default)
    #[arg(long, global = true)]
    json: bool,

    /// Emit one envelope per record (NDJSON stream)
    #[arg(long, global = true)]
    stream: bool,

    /// Suppress log-channel notices
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Wall-clock budget for the whole invocation, in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the state directory and settings
    Init(commands::init::InitArgs),

    /// Domain search, purchase, renewal, and portfolio workflows
    Domains {
        #[command(subcommand)]
        command: commands::domains::DomainsCommand,
    },

    /// DNS audit and template application
    Dns {
        #[command(subcommand)]
        command: commands::dns::DnsCommand,
    },

    /// Orders, subscriptions, and account identity
    Account {
        #[command(subcommand)]
        command: commands::account::AccountCommand,
    },

    /// Safety caps and auto-purchase settings
    Settings {
        #[command(subcommand)]
        command: commands::settings::SettingsCommand,
    },

    /// Show version information
    Version,

    /// Query the latest released version
    UpdateCheck,
}

impl Commands {
    fn root_name(&self) -> &'static str {
        match self {
            Commands::Init(_) => "init",
            Commands::Domains { .. } => "domains",
            Commands::Dns { .. } => "dns",
            Commands::Account { .. } => "account",
            Commands::Settings { .. } => "settings",
            Commands::Version => "version",
            Commands::UpdateCheck => "update-check",
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr only; stdout is reserved for envelopes.
    let filter = if cli.quiet { "error" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // --json (the default) and --stream are mutually exclusive in spirit;
    // when both are passed, stream wins.
    let mode = match (cli.json, cli.stream) {
        (_, true) => OutputMode::Stream,
        _ => OutputMode::Document,
    };
    let request_id = uuid::Uuid::new_v4().simple().to_string();
    let mut ctx = Context::new(mode, cli.quiet, request_id);

    let code = match run(cli, &mut ctx).await {
        Ok(()) => 0,
        Err(err) => err.exit_code(),
    };
    std::process::exit(code);
}

async fn run(cli: Cli, ctx: &mut Context) -> Result<()> {
    let paths = match StatePaths::default_location() {
        Ok(paths) => paths,
        Err(err) => {
            ctx.emit_error("domainclaw", &err);
            return Err(err);
        }
    };
    update::maybe_start_notifier(&paths, cli.command.root_name(), cli.quiet);

    let app = commands::App {
        paths,
        timeout: cli.timeout.map(std::time::Duration::from_secs),
    };

    match cli.command {
        Commands::Init(args) => commands::init::run(ctx, &app, args).await,
        Commands::Domains { command } => commands::domains::run(ctx, &app, command).await,
        Commands::Dns { command } => commands::dns::run(ctx, &app, command).await,
        Commands::Account { command } => commands::account::run(ctx, &app, command).await,
        Commands::Settings { command } => commands::settings::run(ctx, &app, command),
        Commands::Version => commands::version::run(ctx),
        Commands::UpdateCheck => {
            let result = update::update_check_result().await;
            ctx.finish("update-check", Ok(result))
        }
    }
}
