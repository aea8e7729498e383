mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    apply, check, delete_frame, duplicate, ApplyArgs, CheckArgs, DeleteFrameArgs, DuplicateArgs,
};
use std::path::PathBuf;

/// Draftboard CLI - apply patch batches and compound edits to design documents
#[derive(Parser, Debug)]
#[command(name = "draftboard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log every commit, coalesce and undo step
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a JSON patch batch to a document
    Apply(ApplyArgs),

    /// Validate document structure
    Check(CheckArgs),

    /// Delete a frame and every node under it
    DeleteFrame(DeleteFrameArgs),

    /// Duplicate nodes next to themselves
    Duplicate(DuplicateArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let result = match cli.command {
        Command::Apply(args) => apply(args, &cwd),
        Command::Check(args) => check(args, &cwd),
        Command::DeleteFrame(args) => delete_frame(args, &cwd),
        Command::Duplicate(args) => duplicate(args, &cwd),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
