use super::{open_store, save_store};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use draftboard_editor::{delete_frame_and_subtree, removed_ids};
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct DeleteFrameArgs {
    /// Persisted document to edit
    pub document: PathBuf,

    /// Id of the frame to delete
    pub frame: String,

    /// Write the result here instead of over the input
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

pub fn delete_frame(args: DeleteFrameArgs, cwd: &Path) -> Result<()> {
    let mut store = open_store(&args.document, cwd)?;

    let op = delete_frame_and_subtree(store.document(), &args.frame)?;
    let removed = removed_ids(&op).len();
    store.apply_patches(&[op], "Delete frame")?;

    save_store(&store, &args.document, args.out.as_deref())?;
    println!(
        "{} Deleted frame {} ({} nodes)",
        "✅".green(),
        args.frame.bold(),
        removed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{load, scratch};

    #[test]
    fn test_deletes_frame_and_nodes() {
        let dir = scratch("delete-frame");
        delete_frame(
            DeleteFrameArgs {
                document: dir.join("doc.json"),
                frame: "home".to_string(),
                out: None,
            },
            &dir,
        )
        .unwrap();

        let doc = load(&dir.join("doc.json"));
        assert!(doc.frames.is_empty());
        assert!(doc.nodes.is_empty());
    }

    #[test]
    fn test_missing_frame_fails() {
        let dir = scratch("delete-missing");
        let result = delete_frame(
            DeleteFrameArgs {
                document: dir.join("doc.json"),
                frame: "nope".to_string(),
                out: None,
            },
            &dir,
        );
        assert!(result.is_err());
    }
}
