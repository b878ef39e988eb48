//! Agent Market CLI - browse the catalog and manage your account.
//!
//! # Usage
//!
//! ```bash
//! # Browse development agents under $100, cheapest first
//! amk agents list --category development --max-price 100 --sort price-low
//!
//! # Sign in (the session is persisted between invocations)
//! amk login -e ada@example.com -p hunter22
//!
//! # Download a purchased agent
//! amk agents download 12 -o ./bots/
//! ```
//!
//! # Commands
//!
//! - `agents list|show|download` - Catalog browsing and downloads
//! - `register`, `login`, `logout`, `whoami` - Session lifecycle
//! - `profile update|avatar|password` - Account changes
//! - `cart` - Price a set of agents

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_market_client::{ClientConfig, Marketplace};
use agent_market_core::{Category, Role, SortKey};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "amk")]
#[command(author, version, about = "Agent Market command-line client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse and download agents
    Agents {
        #[command(subcommand)]
        action: AgentsAction,
    },
    /// Create an account and sign in
    Register {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,

        /// Account role (`customer`, `vendor`)
        #[arg(short, long)]
        role: Option<Role>,
    },
    /// Sign in
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Change account details
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Build a cart from agent IDs and print the subtotal
    Cart {
        /// Agent IDs; repeat an ID to add more than one
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Subcommand)]
enum AgentsAction {
    /// List agents
    List {
        /// Category name or slug (e.g. `data-analysis`)
        #[arg(short, long)]
        category: Option<Category>,

        /// Minimum price in dollars
        #[arg(long)]
        min_price: Option<Decimal>,

        /// Maximum price in dollars
        #[arg(long)]
        max_price: Option<Decimal>,

        /// Sort order (`popular`, `newest`, `rating`, `price-low`, `price-high`)
        #[arg(short, long)]
        sort: Option<SortKey>,
    },
    /// Show one agent
    Show {
        /// Agent ID
        id: i64,
    },
    /// Download a purchased agent
    Download {
        /// Agent ID
        id: i64,

        /// File or directory to write to (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Update name and/or email
    Update {
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        email: Option<String>,
    },
    /// Upload a new avatar image (max 5 MiB)
    Avatar {
        /// Image file
        path: PathBuf,
    },
    /// Change password
    Password {
        #[arg(long)]
        current: String,

        #[arg(long)]
        new: String,

        #[arg(long)]
        confirm: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::debug!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            commands::report(&CliError::Config(e));
            std::process::exit(1);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Log to stderr so command output stays pipeable
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agent_market_client=info,agent_market_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match Marketplace::new(config) {
        Ok(market) => run(cli, &market).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Command failed");
        commands::report(&e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, market: &Marketplace) -> Result<(), CliError> {
    match cli.command {
        Commands::Agents { action } => match action {
            AgentsAction::List {
                category,
                min_price,
                max_price,
                sort,
            } => {
                commands::agents::list(market, category, min_price, max_price, sort).await?;
            }
            AgentsAction::Show { id } => commands::agents::show(market, id).await?,
            AgentsAction::Download { id, output } => {
                commands::agents::download(market, id, output).await?;
            }
        },
        Commands::Register {
            name,
            email,
            password,
            role,
        } => commands::auth::register(market, name, email, password, role).await?,
        Commands::Login { email, password } => {
            commands::auth::login(market, &email, &password).await?;
        }
        Commands::Logout => commands::auth::logout(market).await,
        Commands::Whoami => commands::auth::whoami(market).await,
        Commands::Profile { action } => match action {
            ProfileAction::Update { name, email } => {
                commands::profile::update(market, name, email).await?;
            }
            ProfileAction::Avatar { path } => commands::profile::avatar(market, &path).await?,
            ProfileAction::Password {
                current,
                new,
                confirm,
            } => commands::profile::password(market, &current, &new, &confirm).await?,
        },
        Commands::Cart { ids } => commands::cart::build(market, &ids).await?,
    }
    Ok(())
}
