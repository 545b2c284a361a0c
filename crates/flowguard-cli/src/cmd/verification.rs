use crate::output::{first_line, print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use flowguard_core::{
    types::{ApprovalStatus, IssueResolution},
    verification::Verification,
};
use std::path::Path;

#[derive(Subcommand)]
pub enum VerificationSubcommand {
    /// List stored verifications, newest first
    List {
        #[arg(long)]
        epic: Option<String>,
    },
    /// Show a verification and its issues
    Show {
        /// Verification id or unique prefix
        id: String,
        /// Also print fix suggestions
        #[arg(long)]
        fixes: bool,
    },
    /// Mark an issue fixed, ignored or open
    Resolve {
        /// Verification id or unique prefix
        id: String,
        /// Issue id or unique prefix
        issue: String,
        /// fixed, ignored or open
        #[arg(default_value = "fixed")]
        resolution: String,
    },
    /// Override the approval status
    Approve {
        /// Verification id or unique prefix
        id: String,
        /// approved, approved_with_conditions, changes_requested or pending
        #[arg(long, default_value = "approved")]
        status: String,
    },
}

pub fn run(root: &Path, subcmd: VerificationSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        VerificationSubcommand::List { epic } => list(root, epic.as_deref(), json),
        VerificationSubcommand::Show { id, fixes } => show(root, &id, fixes, json),
        VerificationSubcommand::Resolve {
            id,
            issue,
            resolution,
        } => resolve(root, &id, &issue, &resolution, json),
        VerificationSubcommand::Approve { id, status } => approve(root, &id, &status, json),
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

fn unique_match<'a>(
    what: &str,
    prefix: &str,
    ids: impl Iterator<Item = &'a str>,
) -> anyhow::Result<String> {
    let hits: Vec<&str> = ids.filter(|id| id.starts_with(prefix)).collect();
    match hits.as_slice() {
        [one] => Ok(one.to_string()),
        [] => anyhow::bail!("{what} '{prefix}' not found"),
        _ => anyhow::bail!("{what} prefix '{prefix}' is ambiguous ({} matches)", hits.len()),
    }
}

fn load(root: &Path, id: &str) -> anyhow::Result<Verification> {
    if let Ok(v) = Verification::load(root, id) {
        return Ok(v);
    }
    let all = Verification::list(root, None).context("failed to list verifications")?;
    let full = unique_match("verification", id, all.iter().map(|v| v.id.as_str()))?;
    Verification::load(root, &full).with_context(|| format!("failed to load verification '{full}'"))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn list(root: &Path, epic: Option<&str>, json: bool) -> anyhow::Result<()> {
    let records = Verification::list(root, epic).context("failed to list verifications")?;

    if json {
        let summaries: Vec<_> = records
            .iter()
            .map(|v| {
                serde_json::json!({
                    "id": v.id,
                    "epic_id": v.epic_id,
                    "created_at": v.created_at,
                    "approval_status": v.summary.approval_status,
                    "passed": v.summary.passed,
                    "total_issues": v.summary.total_issues,
                    "open_issues": v.issues.iter().filter(|i| i.is_open()).count(),
                })
            })
            .collect();
        print_json(&summaries)?;
        return Ok(());
    }

    if records.is_empty() {
        println!("No verifications yet.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|v| {
            let open = v.issues.iter().filter(|i| i.is_open()).count();
            vec![
                v.id.chars().take(8).collect(),
                v.epic_id.clone(),
                v.created_at.format("%Y-%m-%d %H:%M").to_string(),
                v.summary.approval_status.to_string(),
                format!("{open}/{}", v.summary.total_issues),
            ]
        })
        .collect();
    print_table(&["ID", "EPIC", "CREATED", "STATUS", "OPEN"], rows);
    Ok(())
}

fn show(root: &Path, id: &str, fixes: bool, json: bool) -> anyhow::Result<()> {
    let v = load(root, id)?;

    if json {
        print_json(&serde_json::json!({
            "verification": v,
            "open_summary": v.open_summary(),
        }))?;
        return Ok(());
    }

    super::verify::print_report(&v);
    let open = v.open_summary();
    if open.total_issues != v.summary.total_issues {
        println!(
            "\nOpen issues: {} (status if resolved issues are excluded: {})",
            open.total_issues, open.approval_status
        );
    }

    if fixes {
        for issue in v.issues.iter().filter(|i| i.fix_suggestion.is_some()) {
            let Some(fix) = &issue.fix_suggestion else {
                continue;
            };
            println!("\n[{}] {}", &issue.id[..issue.id.len().min(8)], first_line(&issue.message, 70));
            println!("  {}", fix.description);
            for (n, step) in fix.steps.iter().enumerate() {
                println!("  {}. {step}", n + 1);
            }
            if let Some(code) = &fix.code_example {
                for line in code.lines() {
                    println!("    {line}");
                }
            }
        }
    }
    Ok(())
}

fn resolve(
    root: &Path,
    id: &str,
    issue_prefix: &str,
    resolution: &str,
    json: bool,
) -> anyhow::Result<()> {
    let resolution: IssueResolution = resolution
        .parse()
        .context("expected one of: fixed, ignored, open")?;
    let mut v = load(root, id)?;
    let issue_id = unique_match("issue", issue_prefix, v.issues.iter().map(|i| i.id.as_str()))?;

    v.resolve_issue(&issue_id, resolution)?;
    v.save(root).context("failed to save verification")?;

    if json {
        print_json(&v.issue(&issue_id))?;
    } else {
        println!("Issue {issue_id} marked {resolution}");
    }
    Ok(())
}

fn approve(root: &Path, id: &str, status: &str, json: bool) -> anyhow::Result<()> {
    let status: ApprovalStatus = status.parse().context(
        "expected one of: approved, approved_with_conditions, changes_requested, pending",
    )?;
    let mut v = load(root, id)?;
    v.set_approval(status);
    v.save(root).context("failed to save verification")?;

    if json {
        print_json(&v.summary)?;
    } else {
        println!("Verification {} set to {status}", v.id);
    }
    Ok(())
}
