//! Entry point for the `tide` binary.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use std::io;
use std::process;
use tidemark::cli::{Cli, Commands};
use tidemark::commands;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        commands::print_error(&format!("{e:#}"));
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Backup {
            source,
            target,
            exclude_patterns,
        } => commands::backup::execute(&source, &target, &exclude_patterns),
        Commands::Restore {
            target,
            destination,
            backup_name,
            as_of,
        } => commands::restore::execute(
            &target,
            &destination,
            backup_name.as_deref(),
            as_of.as_deref(),
        ),
        Commands::Prune {
            target,
            prune_other_data,
            dry_run,
        } => commands::prune::execute(&target, prune_other_data, dry_run),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}

/// Install the tracing subscriber; `RUST_LOG` overrides the default level.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
