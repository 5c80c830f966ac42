#![forbid(unsafe_code)]

mod cmd;
mod output;
mod reviewer;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "verdict: reviewer workbench for machine-judged claim contradictions",
    long_about = None
)]
struct Cli {
    /// Log at debug level (overridden by `VERDICT_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print JSON; in `annotate`, one event object per line.
    #[arg(long, global = true)]
    json: bool,

    /// Reviewer id (falls back to VERDICT_REVIEWER).
    #[arg(long, global = true)]
    reviewer: Option<String>,

    /// Reviewer password (falls back to VERDICT_PASSWORD).
    #[arg(long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn credential_flags(&self) -> reviewer::CredentialFlags<'_> {
        reviewer::CredentialFlags {
            reviewer: self.reviewer.as_deref(),
            password: self.password.as_deref(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a verdict project",
        long_about = "Write .verdict/config.toml and create the snapshot directory.",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    vd init\n\n    # Rewrite the config template\n    vd init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Annotate",
        about = "Start an annotation session",
        long_about = "Authenticate, then read session commands line by line from stdin.\nType `help` inside the session for the command list.",
        after_help = "EXAMPLES:\n    # Interactive session\n    vd annotate --reviewer halil\n\n    # Resume at a specific item\n    vd annotate --start 42\n\n    # Scripted session\n    printf 'label incorrect\\nnext\\n' | vd annotate"
    )]
    Annotate(cmd::annotate::AnnotateArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show annotation progress",
        long_about = "Show how many dataset items the reviewer has saved.",
        after_help = "EXAMPLES:\n    # Progress for the current reviewer\n    vd progress\n\n    # Emit machine-readable output\n    vd progress --json"
    )]
    Progress(cmd::progress::ProgressArgs),

    #[command(
        next_help_heading = "Read",
        about = "List saved annotations",
        long_about = "List annotated item ids in save order and preview one saved record.",
        after_help = "EXAMPLES:\n    # Ids plus a preview of the first record\n    vd traceback\n\n    # Preview a specific item\n    vd traceback 42"
    )]
    Traceback(cmd::traceback::TracebackArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one dataset item",
        long_about = "Show an item's claims, metadata, and the reviewer's saved record.",
        after_help = "EXAMPLES:\n    # Show an item\n    vd show 42\n\n    # Emit machine-readable output\n    vd show 42 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Sync",
        about = "Push the local snapshot to the remote",
        long_about = "Push the reviewer's local snapshot to the configured remote, replacing the remote copy.",
        after_help = "EXAMPLES:\n    # Retry after a failed sync\n    vd sync\n\n    # Emit machine-readable output\n    vd sync --json"
    )]
    Sync(cmd::sync::SyncArgs),

    #[command(
        next_help_heading = "Read",
        about = "List contextual factors",
        long_about = "Print the contextual-factor taxonomy with codes used by `factors <codes>`.",
        after_help = "EXAMPLES:\n    # Print the taxonomy\n    vd factors"
    )]
    Factors,

    #[command(
        next_help_heading = "Setup",
        about = "Print a shell completion script",
        long_about = "Print a completion script for bash, zsh, fish, elvish or powershell to stdout.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    vd completions bash\n\n    # Generate zsh completions\n    vd completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("VERDICT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "vd=debug,verdict_core=debug,info"
        } else {
            "vd=info,verdict_core=info,warn"
        })
    });
    let format = env::var("VERDICT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
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

fn resolve_output(cli: &Cli) -> OutputMode {
    let user = verdict_core::config::load_user_config().unwrap_or_else(|err| {
        warn!(error = %err, "ignoring unreadable user config");
        verdict_core::config::UserConfig::default()
    });
    output::resolve_output_mode(cli.json, user.output.as_deref())
}

fn run(cli: &Cli, output: OutputMode) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;
    let creds = cli.credential_flags();

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, &project_root),
        Commands::Annotate(args) => cmd::annotate::run_annotate(args, creds, output, &project_root),
        Commands::Progress(args) => cmd::progress::run_progress(args, creds, output, &project_root),
        Commands::Traceback(args) => {
            cmd::traceback::run_traceback(args, creds, output, &project_root)
        }
        Commands::Show(args) => cmd::show::run_show(args, creds, output, &project_root),
        Commands::Sync(args) => cmd::sync::run_sync(args, creds, output, &project_root),
        Commands::Factors => cmd::factors::run_factors(output),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(command = ?cli.command, "starting");

    let output = resolve_output(&cli);
    match run(&cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let cli_error = CliError::from(&err);
            if render_error(output, &cli_error).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
