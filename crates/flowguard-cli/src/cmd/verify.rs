use crate::output::{first_line, print_json, print_table};
use anyhow::Context;
use clap::Args;
use flowguard_core::{
    config::Config,
    diff::DiffSource,
    epic::Epic,
    store::FsStorage,
    types::Severity,
    verification::Verification,
    DiffInput, VerificationEngine, VerifyInput, VerifyOptions,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args)]
pub struct VerifyArgs {
    /// Epic to verify against
    #[arg(long)]
    pub epic: String,

    /// Spec ids to verify against (repeatable; default: every spec of the epic)
    #[arg(long = "spec")]
    pub specs: Vec<String>,

    /// Diff file (default: stdin)
    #[arg(long)]
    pub diff: Option<PathBuf>,

    /// git, github, gitlab or unified (default: detect)
    #[arg(long)]
    pub format: Option<String>,

    #[arg(long)]
    pub commit: Option<String>,
    #[arg(long)]
    pub branch: Option<String>,
    #[arg(long)]
    pub author: Option<String>,
    #[arg(long)]
    pub message: Option<String>,

    /// Drop Low severity issues
    #[arg(long)]
    pub skip_low: bool,

    /// Keep at most this many issues
    #[arg(long)]
    pub max_issues: Option<usize>,

    /// Treat approved-with-conditions as approved
    #[arg(long)]
    pub auto_approve: bool,

    /// Skip the fix-suggestion model calls
    #[arg(long)]
    pub no_code_examples: bool,

    /// Concurrent rating calls
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Exit non-zero unless the verification passed
    #[arg(long)]
    pub strict: bool,
}

impl VerifyArgs {
    fn options(&self, config: &Config) -> VerifyOptions {
        let mut options = VerifyOptions::from(&config.verification);
        options.skip_low_severity |= self.skip_low;
        options.auto_approve |= self.auto_approve;
        if self.no_code_examples {
            options.include_code_examples = false;
        }
        if let Some(max) = self.max_issues {
            options.max_issues = Some(max);
        }
        if let Some(n) = self.concurrency {
            options.rating_concurrency = n.max(1);
        }
        options
    }

    fn source(&self) -> DiffSource {
        DiffSource {
            commit_hash: self.commit.clone(),
            branch: self.branch.clone(),
            author: self.author.clone(),
            timestamp: None,
            message: self.message.clone(),
        }
    }
}

pub fn run(root: &Path, args: VerifyArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    if !Epic::exists(root, &args.epic) {
        anyhow::bail!("epic '{}' not found", args.epic);
    }

    let text = super::read_input(args.diff.as_deref())?;
    let format = super::diff::parse_format(args.format.as_deref())?;
    let llm = config
        .llm
        .build_provider()
        .context("failed to configure LLM provider")?;
    let storage = Arc::new(FsStorage::new(root));
    let engine = VerificationEngine::from_config(&config, llm, storage);

    let input = VerifyInput {
        epic_id: args.epic.clone(),
        spec_ids: (!args.specs.is_empty()).then(|| args.specs.clone()),
        diff_input: DiffInput {
            text,
            format,
            source: args.source(),
        },
        options: args.options(&config),
    };

    tracing::debug!(epic = %input.epic_id, "starting runtime");
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let verification = rt.block_on(engine.verify_changes(input));

    if json {
        print_json(&verification)?;
    } else {
        print_report(&verification);
    }

    if args.strict && !verification.summary.passed {
        anyhow::bail!(
            "verification {} did not pass ({})",
            verification.id,
            verification.summary.approval_status
        );
    }
    Ok(())
}

pub fn print_report(v: &Verification) {
    let s = &v.summary;
    println!("Verification: {}", v.id);
    println!("Epic: {}  Specs: {}", v.epic_id, v.spec_ids.join(", "));
    println!(
        "Diff: {} file(s), +{} -{} ({})",
        v.analysis.total_files, v.analysis.additions, v.analysis.deletions, v.analysis.format
    );
    println!(
        "Status: {}  ({})",
        s.approval_status,
        if s.passed { "passed" } else { "failed" }
    );
    let counts: Vec<String> = Severity::all()
        .iter()
        .map(|&sev| format!("{sev} {}", s.issue_counts.get(sev)))
        .collect();
    println!("Issues: {} ({})", s.total_issues, counts.join(", "));
    println!("{}", s.recommendation);

    if v.issues.is_empty() {
        return;
    }
    println!();
    let rows: Vec<Vec<String>> = v
        .issues
        .iter()
        .map(|i| {
            let location = match i.line {
                Some(line) => format!("{}:{line}", i.file),
                None => i.file.clone(),
            };
            vec![
                i.id.chars().take(8).collect(),
                i.severity.to_string(),
                i.category.to_string(),
                i.resolution.to_string(),
                location,
                first_line(&i.message, 60),
            ]
        })
        .collect();
    print_table(
        &["ID", "SEVERITY", "CATEGORY", "STATE", "LOCATION", "MESSAGE"],
        rows,
    );
}
