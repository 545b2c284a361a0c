use crate::output::print_json;
use anyhow::Context;
use flowguard_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let project_name = name.map(str::to_string).unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    });

    let dirs = [
        paths::FLOWGUARD_DIR,
        paths::EPICS_DIR,
        paths::SPECS_DIR,
        paths::VERIFICATIONS_DIR,
    ];
    for dir in dirs {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_yaml = serde_yaml::to_string(&Config::new(&project_name))?;
    let created = io::write_if_missing(&paths::config_path(root), config_yaml.as_bytes())
        .context("failed to write config.yaml")?;

    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "config_created": created,
        }))?;
    } else {
        println!("Initializing flowguard in: {}", root.display());
        if created {
            println!("  created: {}", paths::CONFIG_FILE);
        } else {
            println!("  exists:  {}", paths::CONFIG_FILE);
        }
        println!("\nNext: flowguard epic create <slug> --title \"...\"");
    }
    Ok(())
}
