use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use flowguard_core::{epic::Epic, spec::Spec};
use std::path::Path;

#[derive(Subcommand)]
pub enum EpicSubcommand {
    /// Create a new epic
    Create {
        slug: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List all epics
    List,
}

pub fn run(root: &Path, subcmd: EpicSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        EpicSubcommand::Create {
            slug,
            title,
            description,
        } => create(root, &slug, title, description, json),
        EpicSubcommand::List => list(root, json),
    }
}

fn create(
    root: &Path,
    slug: &str,
    title: Option<String>,
    description: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let title = title.unwrap_or_else(|| slug.replace('-', " "));
    let epic = Epic::create(root, slug, &title, description)
        .with_context(|| format!("failed to create epic '{slug}'"))?;

    if json {
        print_json(&epic)?;
    } else {
        println!("Created epic: {slug} ({title})");
        println!("Next: flowguard spec create <id> --epic {slug}");
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let epics = Epic::list(root).context("failed to list epics")?;
    let specs = Spec::list(root, None).context("failed to list specs")?;
    let spec_count = |slug: &str| specs.iter().filter(|s| s.epic_id == slug).count();

    if json {
        let summaries: Vec<_> = epics
            .iter()
            .map(|e| {
                serde_json::json!({
                    "slug": e.slug,
                    "title": e.title,
                    "description": e.description,
                    "specs": spec_count(&e.slug),
                    "created_at": e.created_at,
                })
            })
            .collect();
        print_json(&summaries)?;
        return Ok(());
    }

    if epics.is_empty() {
        println!("No epics yet.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = epics
        .iter()
        .map(|e| {
            vec![
                e.slug.clone(),
                spec_count(&e.slug).to_string(),
                e.title.clone(),
            ]
        })
        .collect();
    print_table(&["SLUG", "SPECS", "TITLE"], rows);
    Ok(())
}
