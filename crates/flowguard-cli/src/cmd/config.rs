use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use flowguard_core::{
    config::{Config, ConfigWarning, LlmBackend, WarnLevel},
    rules::RuleRegistry,
};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective config, defaults included
    Show,
    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    if json {
        print_json(&config)?;
    } else {
        print!("{}", serde_yaml::to_string(&config)?);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut warnings = config.validate(&RuleRegistry::default_rules());
    warnings.extend(environment_warnings(&config));

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

/// Checks that depend on the machine rather than the file.
fn environment_warnings(config: &Config) -> Vec<ConfigWarning> {
    match &config.llm.backend {
        LlmBackend::Anthropic { api_key_env, .. } => match std::env::var(api_key_env) {
            Ok(v) if !v.trim().is_empty() => vec![],
            _ => vec![ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("{api_key_env} is not set; `verify` will fail"),
            }],
        },
        LlmBackend::ClaudeCli { executable, .. } => {
            if executable.is_empty() || which::which(executable).is_ok() {
                vec![]
            } else {
                vec![ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("'{executable}' not found on PATH"),
                }]
            }
        }
    }
}
