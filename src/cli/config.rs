//! Config check command handler.

use std::path::Path;

use anyhow::{Context, Result};

use sidekick::config::validate::{validate_config, DiagnosticLevel};
use sidekick::config::Config;

use super::ConfigAction;

/// Validate the configuration file and the effective settings.
pub(crate) async fn cmd_config(action: ConfigAction, path: &Path, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Check => {
            println!("Config file: {}", path.display());

            let mut errors = 0;
            let mut warnings = 0;

            if path.exists() {
                let content =
                    std::fs::read_to_string(path).context("Failed to read config file")?;
                match serde_json::from_str::<serde_json::Value>(&content) {
                    Ok(raw) => {
                        for diag in validate_config(&raw) {
                            match diag.level {
                                DiagnosticLevel::Error => errors += 1,
                                DiagnosticLevel::Warn => warnings += 1,
                                DiagnosticLevel::Ok => {}
                            }
                            println!("{}", diag);
                        }
                    }
                    Err(e) => {
                        println!("[ERROR] Invalid JSON: {}", e);
                        errors += 1;
                    }
                }
            } else {
                println!("[OK] No config file found (using defaults and environment)");
            }

            for problem in config.validate() {
                println!("[ERROR] {}", problem);
                errors += 1;
            }

            if errors == 0 && warnings == 0 {
                println!("\nConfiguration looks good!");
            } else {
                println!("\nFound {} error(s), {} warning(s)", errors, warnings);
            }
            if errors > 0 {
                anyhow::bail!("configuration check failed");
            }
        }
    }
    Ok(())
}
