//! Foodi CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! foodi-cli migrate
//!
//! # Insert or refresh the default dishes
//! foodi-cli seed menu
//!
//! # Bootstrap a Head account (password from FOODI_BOOTSTRAP_PASSWORD)
//! foodi-cli account create --handle head --email head@example.com --tier head
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "foodi-cli")]
#[command(author, version, about = "Foodi CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed reference data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert or refresh the default menu
    Menu,
}

#[derive(Subcommand)]
enum AccountAction {
    /// Create an account directly in the database
    Create {
        /// Login handle
        #[arg(long)]
        handle: String,

        /// Contact email address
        #[arg(short, long)]
        email: String,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,

        /// Permission tier (`agent`, `lead`, `admin`, `head`)
        #[arg(short, long, default_value = "head")]
        tier: String,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Menu => {
                commands::seed::menu().await?;
            }
        },
        Commands::Account { action } => match action {
            AccountAction::Create {
                handle,
                email,
                first_name,
                last_name,
                tier,
            } => {
                commands::account::create(&handle, &email, &first_name, &last_name, &tier).await?;
            }
        },
    }
    Ok(())
}
