//! `chorus chat`: single-message or interactive chat on a local channel.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chorus_channels::CliChannel;
use chorus_config::AppConfig;
use tokio::io::{self, AsyncBufReadExt, BufReader};

use super::build_orchestrator;

const SWEEP_PERIOD: Duration = Duration::from_secs(60);

pub async fn run(message: Option<String>, name: String) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let orchestrator = build_orchestrator(&config);

    if orchestrator.registry().list().is_empty() {
        eprintln!("No AI provider is configured.");
        eprintln!("Set OPENAI_API_KEY, GEMINI_API_KEY or ANTHROPIC_API_KEY, or add a key to");
        eprintln!("  {}", AppConfig::config_dir().join("config.toml").display());
        anyhow::bail!("no provider registered");
    }

    let sweeper = orchestrator.store().spawn_sweeper(SWEEP_PERIOD);
    let channel = Arc::new(CliChannel::new(
        AppConfig::config_dir().join("images"),
        config.bot_name.clone(),
    ));

    if let Some(text) = message {
        let message = channel.user_message(&name, &text);
        orchestrator.handle_message(channel.clone(), message).await;
        sweeper.abort();
        return Ok(());
    }

    println!("Chatting with {} in a local channel.", config.bot_name);
    if let Some(provider) = orchestrator.registry().default_provider() {
        println!("Active provider: {} ({})", provider.display_name(), provider.id());
    }
    println!("Type a message and press Enter. Type 'exit' or press Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit" | "/exit" | "/quit") {
            break;
        }
        let message = channel.user_message(&name, line);
        orchestrator.handle_message(channel.clone(), message).await;
    }

    sweeper.abort();
    Ok(())
}
