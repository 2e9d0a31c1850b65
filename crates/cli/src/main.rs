//! Green Grocer CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! gg-cli migrate run
//!
//! # Create a user and print their API token
//! gg-cli user create -n "Karachi Mart" -p "+92 300 1234567"
//!
//! # List all users
//! gg-cli user list
//!
//! # Seed the database with demo catalog and users
//! gg-cli seed
//!
//! # Run a background job once, in the foreground
//! gg-cli job dispatch_notifications
//! ```
//!
//! # Commands
//!
//! - `migrate run` - Run database migrations
//! - `user create` / `user list` - Manage users and API tokens
//! - `seed` - Seed the database with demo data
//! - `job <name>` - Run one background job to completion

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "gg-cli")]
#[command(author, version, about = "Green Grocer CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Seed the database with demo catalog and users
    Seed,
    /// Run a background job once, in the foreground
    Job {
        /// Job name (`cleanup_orphaned`, `sync_inventory`, `update_expiry`,
        /// `dispatch_notifications`)
        name: String,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Run,
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user and print their API token
    Create {
        /// Display name (business or contact name)
        #[arg(short, long)]
        name: String,

        /// Phone number in international format
        #[arg(short, long)]
        phone: String,

        /// Role (`customer`, `staff`, `admin`)
        #[arg(short, long, default_value = "customer")]
        role: String,
    },
    /// List all users
    List,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate { action } => match action {
            MigrateAction::Run => commands::migrate::run().await?,
        },
        Commands::User { action } => match action {
            UserAction::Create { name, phone, role } => {
                commands::user::create(&name, &phone, &role).await?;
            }
            UserAction::List => commands::user::list().await?,
        },
        Commands::Seed => commands::seed::run().await?,
        Commands::Job { name } => commands::job::run(&name).await?,
    }
    Ok(())
}
