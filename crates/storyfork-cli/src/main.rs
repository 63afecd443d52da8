#![forbid(unsafe_code)]

mod author;
mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, CodedError, OutputMode, render_error};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use storyfork_core::config;
use storyfork_core::error::ErrorCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "storyfork: branching stories with like-driven canon",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Author name for new stories and contributions.
    #[arg(long, global = true)]
    author: Option<String>,

    /// Story database path (default: .storyfork/storyfork.db).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// The explicit format choice, if any flag made one.
    fn format_flag(&self) -> Option<OutputMode> {
        self.format.or(self.json.then_some(OutputMode::Json))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Initialize a storyfork project",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    sf init\n\n    # Emit machine-readable output\n    sf init --json"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        about = "Create, list, show, and close stories",
        after_help = "EXAMPLES:\n    sf story create --title \"Harbor\" --content \"Fog rolled in.\"\n    sf story list\n    sf story show <story-id> --all\n    sf story status <story-id> completed"
    )]
    Story {
        #[command(subcommand)]
        command: cmd::story::StoryCommand,
    },

    #[command(
        about = "Add a branch under an existing contribution",
        after_help = "EXAMPLES:\n    sf contribute <story-id> --parent <contribution-id> --content \"A ship appeared.\"\n    sf contribute <story-id> --parent <id> --content \"...\" --character Mira --location docks"
    )]
    Contribute(cmd::contribute::ContributeArgs),

    #[command(
        about = "Like a contribution, possibly promoting it to canon",
        after_help = "EXAMPLES:\n    sf like <story-id> <contribution-id>\n    sf like <story-id> <contribution-id> --json"
    )]
    Like(cmd::like::LikeArgs),

    #[command(
        about = "List the competing branches of a contribution",
        after_help = "EXAMPLES:\n    # Branches under the opening\n    sf branches <story-id>\n\n    # Ranked branches under a specific contribution\n    sf branches <story-id> --parent <id> --rank"
    )]
    Branches(cmd::branches::BranchesArgs),

    #[command(
        about = "Check canon invariants over stored stories",
        after_help = "EXAMPLES:\n    sf verify\n    sf verify <story-id> --json"
    )]
    Verify(cmd::verify::VerifyArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("STORYFORK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "storyfork=debug,info"
        } else {
            "storyfork=info,warn"
        })
    });

    let format = env::var("STORYFORK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, project_root: &Path, output: &mut OutputMode) -> anyhow::Result<()> {
    let cli_format = cli.format_flag().map(OutputMode::as_str);
    let effective = config::resolve_config(project_root, cli_format)
        .map_err(|err| CodedError::new(ErrorCode::ConfigParseError, format!("{err:#}")))?;
    let ctx = cmd::Context::new(project_root, cli.db.clone(), effective, cli.author.clone());
    *output = ctx.output;

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, &ctx),
        Commands::Story { command } => cmd::story::run_story(command, &ctx),
        Commands::Contribute(args) => cmd::contribute::run_contribute(args, &ctx),
        Commands::Like(args) => cmd::like::run_like(args, &ctx),
        Commands::Branches(args) => cmd::branches::run_branches(args, &ctx),
        Commands::Verify(args) => cmd::verify::run_verify(args, &ctx),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Until config is loaded, only the flags know the format.
    let mut output = cli.format_flag().unwrap_or(OutputMode::Text);
    let result = env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|root| run(&cli, &root, &mut output));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            let cli_error = CliError::from_anyhow(&err);
            if render_error(output, &cli_error).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
