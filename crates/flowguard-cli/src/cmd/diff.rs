use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use flowguard_core::diff::{self, DiffFormat};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum DiffSubcommand {
    /// Parse a diff and print its files and statistics
    Parse {
        /// Diff file (default: stdin)
        file: Option<PathBuf>,
        /// git, github, gitlab or unified (default: detect)
        #[arg(long)]
        format: Option<String>,
    },
    /// Print the detected format of a diff
    Detect {
        /// Diff file (default: stdin)
        file: Option<PathBuf>,
    },
}

pub fn run(subcmd: DiffSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        DiffSubcommand::Parse { file, format } => {
            let text = super::read_input(file.as_deref())?;
            parse(&text, format.as_deref(), json)
        }
        DiffSubcommand::Detect { file } => {
            let text = super::read_input(file.as_deref())?;
            detect(&text, json)
        }
    }
}

pub fn parse_format(format: Option<&str>) -> anyhow::Result<Option<DiffFormat>> {
    format
        .map(|f| f.parse::<DiffFormat>())
        .transpose()
        .context("expected one of: git, github, gitlab, unified")
}

fn parse(text: &str, format: Option<&str>, json: bool) -> anyhow::Result<()> {
    let format = parse_format(format)?.unwrap_or_else(|| diff::detect_format(text));
    let parsed = diff::parse_diff(text, format);
    let source = diff::extract_metadata(text, format);

    if json {
        print_json(&serde_json::json!({
            "diff": parsed,
            "source": source,
        }))?;
        return Ok(());
    }

    let stats = &parsed.stats;
    println!("Format: {}", parsed.format);
    if let Some(hash) = &source.commit_hash {
        println!("Commit: {hash}");
    }
    if let Some(msg) = &source.message {
        println!("Message: {msg}");
    }
    println!(
        "Files: {} ({} added, {} modified, {} deleted, {} renamed)",
        stats.total_files, stats.added, stats.modified, stats.deleted, stats.renamed
    );
    println!(
        "Lines: {} (+{} -{})",
        stats.total_lines, stats.additions, stats.deletions
    );

    if !parsed.files.is_empty() {
        println!();
        let rows: Vec<Vec<String>> = parsed
            .files
            .iter()
            .map(|f| {
                vec![
                    f.status.to_string(),
                    format!("+{}", f.additions()),
                    format!("-{}", f.deletions()),
                    match &f.old_path {
                        Some(old) => format!("{old} -> {}", f.path),
                        None => f.path.clone(),
                    },
                ]
            })
            .collect();
        print_table(&["STATUS", "ADD", "DEL", "PATH"], rows);
    }
    Ok(())
}

fn detect(text: &str, json: bool) -> anyhow::Result<()> {
    let format = diff::detect_format(text);
    if json {
        print_json(&serde_json::json!({ "format": format }))?;
    } else {
        println!("{format}");
    }
    Ok(())
}
