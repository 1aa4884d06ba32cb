// dublist CLI - multi-source dub dataset merge

mod exit_codes;
mod merge;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "dublist")]
#[command(about = "Merge per-source dub lists into confidence-tiered datasets")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load sources, merge, and write the tiered dataset
    #[command(after_help = "\
Examples:
  dublist run dublist.merge.toml
  dublist run dublist.merge.toml --dry-run
  dublist run dublist.merge.toml --json
  dublist run dublist.merge.toml --report run-report.json --strict")]
    Run {
        /// Path to the .merge.toml config file
        config: PathBuf,

        /// Merge and diff against the existing output without writing
        #[arg(long)]
        dry_run: bool,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write the JSON report to file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Exit 63 when the run produced diagnostics
        #[arg(long)]
        strict: bool,
    },

    /// Validate a merge config without running
    #[command(after_help = "\
Examples:
  dublist validate dublist.merge.toml")]
    Validate {
        /// Path to the .merge.toml config file
        config: PathBuf,
    },

    /// Show per-language counts from the last written output
    #[command(after_help = "\
Examples:
  dublist stats dublist.merge.toml
  dublist stats dublist.merge.toml --json")]
    Stats {
        /// Path to the .merge.toml config file
        config: PathBuf,

        /// Output JSON to stdout instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("GIT_COMMIT_HASH"),
        ")",
        "\nengine:  dublist-merge ",
        env!("CARGO_PKG_VERSION"),
        "\ntarget:  ",
        env!("TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Info);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Debug);
        }
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            dry_run,
            json,
            report,
            strict,
        } => merge::cmd_run(config, dry_run, json, report, strict),
        Commands::Validate { config } => merge::cmd_validate(config),
        Commands::Stats { config, json } => merge::cmd_stats(config, json),
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

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            hint: None,
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
