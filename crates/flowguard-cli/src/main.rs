mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, diff::DiffSubcommand, epic::EpicSubcommand,
    rules::RulesSubcommand, spec::SpecSubcommand, verification::VerificationSubcommand,
    verify::VerifyArgs,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "flowguard",
    about = "Verify code diffs against epic specifications",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .flowguard/ or .git/)
    #[arg(long, global = true, env = "FLOWGUARD_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize flowguard in the current project
    Init {
        /// Project name (default: root directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Manage epics
    Epic {
        #[command(subcommand)]
        subcommand: EpicSubcommand,
    },

    /// Manage specifications
    Spec {
        #[command(subcommand)]
        subcommand: SpecSubcommand,
    },

    /// Inspect a diff without verifying it
    Diff {
        #[command(subcommand)]
        subcommand: DiffSubcommand,
    },

    /// Verify a diff against an epic's specifications
    Verify(VerifyArgs),

    /// Inspect and act on stored verifications
    Verification {
        #[command(subcommand)]
        subcommand: VerificationSubcommand,
    },

    /// Show or validate the project config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// List verification rules
    Rules {
        #[command(subcommand)]
        subcommand: RulesSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Verify(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref(), cli.json),
        Commands::Epic { subcommand } => cmd::epic::run(&root, subcommand, cli.json),
        Commands::Spec { subcommand } => cmd::spec::run(&root, subcommand, cli.json),
        Commands::Diff { subcommand } => cmd::diff::run(subcommand, cli.json),
        Commands::Verify(args) => cmd::verify::run(&root, args, cli.json),
        Commands::Verification { subcommand } => {
            cmd::verification::run(&root, subcommand, cli.json)
        }
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Rules { subcommand } => cmd::rules::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
