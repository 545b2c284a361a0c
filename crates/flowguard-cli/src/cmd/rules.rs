use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use flowguard_core::{config::Config, rules::RuleRegistry};
use std::path::Path;

#[derive(Subcommand)]
pub enum RulesSubcommand {
    /// List registered rules and whether the project enables them
    List,
}

pub fn run(root: &Path, subcmd: RulesSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        RulesSubcommand::List => list(root, json),
    }
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let registry = RuleRegistry::default_rules();

    if json {
        let rules: Vec<_> = registry
            .rules()
            .map(|r| {
                serde_json::json!({
                    "id": r.id(),
                    "description": r.description(),
                    "enabled_by_default": r.enabled_by_default(),
                    "enabled": RuleRegistry::is_enabled(r, &config.rules),
                })
            })
            .collect();
        print_json(&rules)?;
        return Ok(());
    }

    let yes_no = |b: bool| if b { "yes" } else { "no" }.to_string();
    let rows: Vec<Vec<String>> = registry
        .rules()
        .map(|r| {
            vec![
                r.id().to_string(),
                yes_no(RuleRegistry::is_enabled(r, &config.rules)),
                yes_no(r.enabled_by_default()),
                r.description().to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "ENABLED", "DEFAULT", "DESCRIPTION"], rows);
    Ok(())
}
