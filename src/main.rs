//! homewatch - home alarm status from the terminal
//!
//! Interactive commands and the periodic `sync` job share one credential
//! and one status cache on disk.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use homewatch::app::App;
use homewatch::{auth, commands};

#[derive(Parser)]
#[command(name = "homewatch")]
#[command(about = "Check and control your home alarm from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the shared credential and status cache
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with the provider
    Login {
        /// Sign in again even if a credential is stored
        #[arg(short, long)]
        force: bool,
    },

    /// Sign out and delete the stored credential
    Logout,

    /// Show whether a credential is stored and when it expires
    AuthStatus,

    /// List homes on the account
    Homes,

    /// Select the home to monitor
    Select {
        /// Home ID (from `homes` output)
        home_id: String,
    },

    /// Show the selected home's alarm status
    Status,

    /// Arm the alarm
    Arm,

    /// Disarm the alarm
    Disarm,

    /// Refresh the cached status within the sync budget (for schedulers)
    Sync,

    /// Show the cached status without network access
    Cached,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let app = App::load(cli.config.as_deref(), cli.data_dir)?;

    match cli.command {
        Commands::Login { force } => {
            tracing::info!("Starting sign-in flow...");
            auth::signin::login(&app, force).await?;
        }
        Commands::Logout => {
            auth::signin::logout(&app)?;
        }
        Commands::AuthStatus => {
            auth::signin::status(&app)?;
        }
        Commands::Homes => {
            commands::list_homes(&app).await?;
        }
        Commands::Select { home_id } => {
            commands::select(&app, &home_id).await?;
        }
        Commands::Status => {
            commands::show_status(&app).await?;
        }
        Commands::Arm => {
            commands::set_armed(&app, true).await?;
        }
        Commands::Disarm => {
            commands::set_armed(&app, false).await?;
        }
        Commands::Sync => {
            commands::sync_once(&app).await?;
        }
        Commands::Cached => {
            commands::show_cached(&app)?;
        }
    }

    Ok(())
}
