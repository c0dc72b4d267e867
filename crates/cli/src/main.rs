//! Chorus CLI: the main entry point.
//!
//! Commands:
//! - `init`       Write a default config file
//! - `providers`  List the AI providers that are configured
//! - `chat`       Talk to the bot in a local channel

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "chorus",
    about = "Chorus: several AI providers sharing one chat channel",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration to ~/.chorus/config.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// List registered providers (the default is marked)
    Providers,

    /// Chat with the bot in a local channel
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Display name to chat as
        #[arg(long, default_value = "You")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(force)?,
        Commands::Providers => commands::providers::run()?,
        Commands::Chat { message, name } => commands::chat::run(message, name).await?,
    }

    Ok(())
}
