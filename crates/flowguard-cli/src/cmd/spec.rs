use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use flowguard_core::{matcher::extract_requirements, spec::Spec};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum SpecSubcommand {
    /// Create a spec under an epic
    Create {
        id: String,
        /// Owning epic slug
        #[arg(long)]
        epic: String,
        #[arg(long)]
        title: Option<String>,
        /// Markdown body (use '-' for stdin; default: a section template)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List specs
    List {
        /// Only specs of this epic
        #[arg(long)]
        epic: Option<String>,
    },
    /// Show a spec
    Show { id: String },
    /// Print the requirements extracted from a spec
    Requirements { id: String },
}

pub fn run(root: &Path, subcmd: SpecSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SpecSubcommand::Create {
            id,
            epic,
            title,
            file,
        } => create(root, &id, &epic, title, file.as_deref(), json),
        SpecSubcommand::List { epic } => list(root, epic.as_deref(), json),
        SpecSubcommand::Show { id } => show(root, &id, json),
        SpecSubcommand::Requirements { id } => requirements(root, &id, json),
    }
}

fn template(title: &str) -> String {
    format!(
        "# {title}\n\n\
         ## Functional Requirements\n\
         - FR1: \n\n\
         ## Non-Functional Requirements\n\
         - NFR1: \n\n\
         ## Technical Plan\n\
         1. \n"
    )
}

fn create(
    root: &Path,
    id: &str,
    epic: &str,
    title: Option<String>,
    file: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let title = title.unwrap_or_else(|| id.replace('-', " "));
    let content = match file {
        Some(path) => super::read_input(Some(path))?,
        None => template(&title),
    };
    let spec = Spec::create(root, id, epic, &title, content)
        .with_context(|| format!("failed to create spec '{id}'"))?;

    if json {
        print_json(&spec)?;
    } else {
        println!("Created spec: {id} (epic {epic})");
        println!(
            "  body: {}",
            flowguard_core::paths::spec_content_path(root, id).display()
        );
    }
    Ok(())
}

fn list(root: &Path, epic: Option<&str>, json: bool) -> anyhow::Result<()> {
    let specs = Spec::list(root, epic).context("failed to list specs")?;

    if json {
        let summaries: Vec<_> = specs
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id,
                    "epic_id": s.epic_id,
                    "title": s.title,
                    "requirements": extract_requirements(&s.content).len(),
                    "updated_at": s.updated_at,
                })
            })
            .collect();
        print_json(&summaries)?;
        return Ok(());
    }

    if specs.is_empty() {
        println!("No specs yet.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = specs
        .iter()
        .map(|s| {
            vec![
                s.id.clone(),
                s.epic_id.clone(),
                extract_requirements(&s.content).len().to_string(),
                s.title.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "EPIC", "REQS", "TITLE"], rows);
    Ok(())
}

fn show(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let spec = Spec::load(root, id).with_context(|| format!("spec '{id}' not found"))?;

    if json {
        print_json(&spec)?;
        return Ok(());
    }

    println!("Spec: {} ({})", spec.id, spec.title);
    println!("Epic: {}", spec.epic_id);
    println!("Updated: {}", spec.updated_at.format("%Y-%m-%d %H:%M"));
    println!();
    print!("{}", spec.content);
    if !spec.content.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn requirements(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let spec = Spec::load(root, id).with_context(|| format!("spec '{id}' not found"))?;
    let reqs = extract_requirements(&spec.content);

    if json {
        print_json(&reqs)?;
        return Ok(());
    }

    if reqs.is_empty() {
        println!("No requirements found in spec '{id}'.");
        return Ok(());
    }
    for (i, r) in reqs.iter().enumerate() {
        println!("{:>3}. {r}", i + 1);
    }
    Ok(())
}
