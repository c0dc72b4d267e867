//! `chorus providers`: show which backends are registered.

use anyhow::Context;
use chorus_config::{AppConfig, PROVIDER_IDS};

use super::build_orchestrator;

fn key_var(id: &str) -> &'static str {
    match id {
        "openai" => "OPENAI_API_KEY",
        "gemini" => "GEMINI_API_KEY",
        "anthropic" => "ANTHROPIC_API_KEY",
        _ => "",
    }
}

pub fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let orchestrator = build_orchestrator(&config);
    let registry = orchestrator.registry();
    let default_id = registry.default_provider().map(|p| p.id().to_string());

    println!("Providers (priority order):");
    for id in PROVIDER_IDS {
        match registry.get(id) {
            Some(provider) => {
                let marker = if default_id.as_deref() == Some(id) {
                    "  (default)"
                } else {
                    ""
                };
                println!(
                    "  {id:<10} {:<8} model {}{marker}",
                    provider.display_name(),
                    provider.default_model()
                );
            }
            None => println!("  {id:<10} not configured (set {})", key_var(id)),
        }
    }

    if default_id.is_none() {
        println!();
        println!("No provider is registered, so the bot cannot reply.");
    } else if default_id.as_deref() != Some(config.default_provider.as_str()) {
        println!();
        println!(
            "Configured default \"{}\" is not registered; using the first registered provider.",
            config.default_provider
        );
    }
    Ok(())
}
