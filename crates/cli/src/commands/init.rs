//! `chorus init`: write the default configuration file.

use anyhow::Context;
use chorus_config::AppConfig;

pub fn run(force: bool) -> anyhow::Result<()> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    if config_path.exists() && !force {
        println!("Config already exists at {}", config_path.display());
        println!("Edit it by hand, or re-run with --force to overwrite it.");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("Wrote {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set at least one provider key, either in the file under");
    println!("     [providers.openai] / [providers.gemini] / [providers.anthropic]");
    println!("     or via OPENAI_API_KEY, GEMINI_API_KEY, ANTHROPIC_API_KEY");
    println!("  2. Run `chorus providers` to check what is registered");
    println!("  3. Run `chorus chat` to talk to the bot");
    Ok(())
}
