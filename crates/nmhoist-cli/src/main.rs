#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use commands::optimize::OptimizeArgs;
use miette::Result;
use nmhoist_core::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nmhoist")]
#[command(author, version, about = "Shorten node_modules paths by hoisting and deduplicating modules", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Rewrite the installed tree so no path exceeds the limit
    Optimize {
        /// Read the tree from a listing file instead of running the package manager
        #[arg(long, value_name = "FILE")]
        listing: Option<PathBuf>,

        /// Perform the moves, removals and reinstalls on disk
        #[arg(long)]
        apply: bool,

        /// Walk through the plan without touching the disk
        #[arg(long)]
        dry_run: bool,

        /// Longest acceptable path, in characters
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        /// Stop after this many tree mutations
        #[arg(long, value_name = "N")]
        max_iterations: Option<usize>,

        /// Extra wildcard pattern to leave out of measurements (repeatable)
        #[arg(long = "ignore", value_name = "PATTERN")]
        ignore: Vec<String>,

        /// Directory the tree will finally live under, for the long-path scan
        #[arg(long, value_name = "PATH")]
        assume_root: Option<PathBuf>,

        /// Also write the JSON report to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Run the package manager's dedupe before listing the tree
        #[arg(long)]
        dedupe: bool,
    },

    /// Show the installed tree with weights and dependency resolution
    Tree {
        /// Read the tree from a listing file instead of running the package manager
        #[arg(long, value_name = "FILE")]
        listing: Option<PathBuf>,
    },

    /// Report paths that would exceed the limit
    Scan {
        /// Directory to scan (defaults to the working directory)
        path: Option<PathBuf>,

        /// Measure paths as if PATH were this directory
        #[arg(long, value_name = "PATH")]
        assume_root: Option<PathBuf>,

        /// Longest acceptable path, in characters
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(cli.json),
        Some(Commands::Optimize {
            listing,
            apply,
            dry_run,
            limit,
            max_iterations,
            ignore,
            assume_root,
            report,
            dedupe,
        }) => {
            let span = tracing::info_span!("optimize", cmd = "optimize", cwd = %cwd.display());
            let _guard = span.enter();
            commands::optimize::run(
                &config,
                OptimizeArgs {
                    listing,
                    apply,
                    dry_run,
                    limit,
                    max_iterations,
                    ignore,
                    assume_root,
                    report,
                    dedupe,
                },
            )
        }
        Some(Commands::Tree { listing }) => {
            let span = tracing::info_span!("tree", cmd = "tree", cwd = %cwd.display());
            let _guard = span.enter();
            commands::tree::run(&config, listing.as_deref())
        }
        Some(Commands::Scan {
            path,
            assume_root,
            limit,
        }) => commands::scan::run(&config, path.as_deref(), assume_root.as_deref(), limit),
    }
}
