// usersync CLI - reconcile a tabular user export against a document snapshot

mod exit_codes;
mod sync;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use env_logger::Env;

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "usersync")]
#[command(about = "Reconcile user identities between a tabular export and a document snapshot")]
#[command(version)]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load both sources, match users and write the three artifacts
    #[command(after_help = "\
Examples:
  usersync run sync.toml
  usersync run sync.toml --output out/ --json
  usersync run --tabular clerk_export.csv --snapshot snapshot/
  USERSYNC_OUTPUT=/srv/sync usersync run sync.toml")]
    Run {
        /// Path to a .sync.toml config file
        config: Option<PathBuf>,

        /// Tabular export (overrides source_a.file)
        #[arg(long)]
        tabular: Option<PathBuf>,

        /// Snapshot directory (overrides source_b.snapshot_dir)
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Output directory (overrides output.dir)
        #[arg(long, short = 'o', env = "USERSYNC_OUTPUT")]
        output: Option<PathBuf>,

        /// Print the sync report as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate a sync config without running
    #[command(after_help = "\
Examples:
  usersync validate sync.toml")]
    Validate {
        /// Path to the .sync.toml config file
        config: PathBuf,
    },

    /// Summarize the artifacts of a previous run
    #[command(after_help = "\
Examples:
  usersync summary output/
  usersync summary output/ --json")]
    Summary {
        /// Directory holding linked_users.jsonl, unmatched_users.jsonl and sync_report.json
        dir: PathBuf,

        /// Print the sync report as JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Run { config, tabular, snapshot, output, json } => {
            sync::cmd_run(sync::RunArgs { config, tabular, snapshot, output, json })
        }
        Commands::Validate { config } => sync::cmd_validate(config),
        Commands::Summary { dir, json } => sync::cmd_summary(dir, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
