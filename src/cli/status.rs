//! Status command handler.

use anyhow::Result;

use sidekick::config::Config;

use super::common::load_state;

fn setting_status(value: Option<&str>) -> &'static str {
    match value {
        Some(v) if !v.trim().is_empty() => "configured",
        _ => "not set",
    }
}

/// Print persisted state and which integrations are configured.
pub(crate) async fn cmd_status(config: &Config) -> Result<()> {
    println!("Sidekick Status");
    println!("===============");
    println!();
    println!("Data directory: {}", config.data_dir().display());
    println!("Model:          {}", config.agent.model);
    println!("Think model:    {}", config.agent.think_model);
    println!("Sweep model:    {}", config.agent.schedule_model);
    println!();

    println!("Integrations");
    println!("------------");
    println!(
        "  Telegram token: {}",
        setting_status(Some(config.telegram.token.as_str()))
    );
    match config.telegram.allow_from {
        Some(id) => println!("  Owner:          {}", id),
        None => println!("  Owner:          not set"),
    }
    println!("  OpenAI:         {}", setting_status(config.openai_api_key()));
    println!(
        "  Search:         {}",
        setting_status(config.search.api_key.as_deref())
    );
    println!(
        "  Transcription:  {}",
        if config.transcription.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    if config.telegram.proxy.is_some() {
        println!("  Proxy:          configured");
    }
    println!();

    let state = load_state(config).await;
    let history = state.history().await;
    println!(
        "History: {} turn(s) stored, {} sent per prompt",
        history.len(),
        config.agent.history_window
    );
    println!();

    let memory = state.memory().await;
    println!("Memory");
    println!("------");
    if memory.trim().is_empty() {
        println!("  (empty)");
    } else {
        for line in memory.lines() {
            println!("  {}", line);
        }
    }
    println!();

    let listing = state.schedule_listing().await;
    println!("Schedule");
    println!("--------");
    if listing.is_empty() {
        println!("  (empty)");
    }
    for (when, tasks) in &listing {
        println!("  {}", when);
        for task in tasks {
            println!("    - {}", task);
        }
    }

    Ok(())
}
