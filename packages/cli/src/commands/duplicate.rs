use super::{open_store, save_store};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use draftboard_editor::{ClipboardService, EditorConfig, MemoryClipboard};
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct DuplicateArgs {
    /// Persisted document to edit
    pub document: PathBuf,

    /// Node ids to duplicate
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Write the result here instead of over the input
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

pub fn duplicate(args: DuplicateArgs, cwd: &Path) -> Result<()> {
    let config = EditorConfig::load(cwd)?;
    let mut store = open_store(&args.document, cwd)?;

    let service = ClipboardService::new(MemoryClipboard::new(), &config);
    let copies = service.duplicate(&mut store, &args.ids)?;
    if copies.is_empty() {
        return Err(anyhow!("Nothing to duplicate (frame roots cannot be duplicated)"));
    }

    save_store(&store, &args.document, args.out.as_deref())?;
    for (original, copy) in args.ids.iter().zip(&copies) {
        println!("  {} {} → {}", "✓".green(), original, copy);
    }
    if copies.len() != args.ids.len() {
        println!("  {} nested selections were copied with their ancestor", "ℹ".dimmed());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{load, scratch};

    #[test]
    fn test_duplicate_inserts_after_original() {
        let dir = scratch("duplicate");
        duplicate(
            DuplicateArgs {
                document: dir.join("doc.json"),
                ids: vec!["title".to_string()],
                out: None,
            },
            &dir,
        )
        .unwrap();

        let doc = load(&dir.join("doc.json"));
        let children = &doc.nodes["root"].children;
        assert_eq!(children.len(), 3);
        assert_eq!(children[0], "title");
        assert_eq!(children[2], "body");
        assert_eq!(doc.nodes[&children[1]].props["text"], "Hello");
    }

    #[test]
    fn test_frame_root_rejected() {
        let dir = scratch("duplicate-root");
        let result = duplicate(
            DuplicateArgs {
                document: dir.join("doc.json"),
                ids: vec!["root".to_string()],
                out: None,
            },
            &dir,
        );
        assert!(result.is_err());
    }
}
