use super::{open_store, save_store};
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use draftboard_editor::PatchOp;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Persisted document to edit
    pub document: PathBuf,

    /// JSON file holding one patch op or an array of them
    pub patches: PathBuf,

    /// Write the result here instead of over the input
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Undo label recorded for the batch
    #[arg(short, long, default_value = "Automation")]
    pub label: String,

    /// Validate and report without writing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PatchFile {
    Batch(Vec<PatchOp>),
    Single(PatchOp),
}

pub(crate) fn parse_patches(source: &str) -> Result<Vec<PatchOp>> {
    let parsed: PatchFile =
        serde_json::from_str(source).map_err(|e| anyhow!("Invalid patch file: {}", e))?;
    Ok(match parsed {
        PatchFile::Batch(ops) => ops,
        PatchFile::Single(op) => vec![op],
    })
}

pub fn apply(args: ApplyArgs, cwd: &Path) -> Result<()> {
    let mut store = open_store(&args.document, cwd)?;
    let source = fs::read_to_string(&args.patches)
        .with_context(|| format!("Cannot read patches {}", args.patches.display()))?;
    let ops = parse_patches(&source)?;

    println!(
        "{} {} ops from {}",
        "🔧 Applying".bright_blue().bold(),
        ops.len(),
        args.patches.display()
    );

    // Automation failures are reported with their reason, never half-applied
    let commit = store.apply_patches(&ops, &args.label).map_err(|err| {
        anyhow!(
            "Batch rejected ({:?}): {}. Document left unchanged.",
            err.kind(),
            err
        )
    })?;
    info!(revision = commit.revision, ops = commit.applied, "Batch committed");

    let issues = store.integrity_issues();
    if !issues.is_empty() {
        for issue in &issues {
            println!("  {} {}", "⚠️".yellow(), issue);
        }
    }

    if args.dry_run {
        println!("{} {} ops would apply", "✓".green(), commit.applied);
        return Ok(());
    }

    save_store(&store, &args.document, args.out.as_deref())?;
    println!(
        "{} Applied {} ops → {}",
        "✅".green(),
        commit.applied,
        args.out.as_deref().unwrap_or(&args.document).display()
    );
    Ok(())
}
