use super::open_store;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Persisted document to validate
    pub document: PathBuf,
}

pub fn check(args: CheckArgs, cwd: &Path) -> Result<()> {
    let store = open_store(&args.document, cwd)?;
    let doc = store.document();

    println!("🔍 {} {}", "Checking".green().bold(), args.document.display());
    println!("   Frames: {}", doc.frames.len());
    println!("   Nodes:  {}", doc.nodes.len());
    println!(
        "   Expanded (read-only): {}",
        doc.nodes.values().filter(|n| !n.is_patchable()).count()
    );

    let issues = store.integrity_issues();
    if issues.is_empty() {
        println!("{} Document is consistent", "✅".green());
        return Ok(());
    }

    println!();
    for issue in &issues {
        println!("  {} {}", "✗".red(), issue);
    }
    Err(anyhow!("{} integrity issue(s)", issues.len()))
}
