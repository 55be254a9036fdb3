//! Glint CLI: inspect, verify and run scripts.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Input or parse error
//! - 2: Verification failure
//! - 3: Runtime error

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "glint", author, version, about)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG overrides it.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tokens of a script
    Tokens { input: PathBuf },
    /// Print the instruction listing of every procedure
    List { input: PathBuf },
    /// Parse and verify a script
    Check { input: PathBuf },
    /// Parse, verify and run a script
    Run {
        input: PathBuf,
        /// Top-level function to call after initialization
        #[arg(long)]
        entry: Option<String>,
        /// Report locals when execution reaches this line (repeatable)
        #[arg(long = "break", value_name = "LINE")]
        breakpoints: Vec<u32>,
    },
    /// Print the blake3 digest of a script's source
    Hash { input: PathBuf },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Command::Tokens { input } => commands::tokens(input),
        Command::List { input } => commands::list(input),
        Command::Check { input } => commands::check(input),
        Command::Run {
            input,
            entry,
            breakpoints,
        } => commands::run(input, entry.as_deref(), breakpoints),
        Command::Hash { input } => commands::hash(input),
    };

    if let Err(code) = result {
        process::exit(code);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
