pub mod apply;
pub mod check;
pub mod delete_frame;
pub mod duplicate;

pub use apply::{apply, ApplyArgs};
pub use check::{check, CheckArgs};
pub use delete_frame::{delete_frame, DeleteFrameArgs};
pub use duplicate::{duplicate, DuplicateArgs};

use anyhow::{Context, Result};
use draftboard_editor::{DocumentStore, EditorConfig, PersistedDocument};
use std::path::Path;

/// Load `path` into a store configured from `cwd`
pub(crate) fn open_store(path: &Path, cwd: &Path) -> Result<DocumentStore> {
    let config = EditorConfig::load(cwd)?;
    let persisted = PersistedDocument::load(path)
        .with_context(|| format!("Cannot load document {}", path.display()))?;
    Ok(DocumentStore::with_config(persisted.into_document(), &config))
}

/// Write the store's document to `out`, or back over `input`
pub(crate) fn save_store(store: &DocumentStore, input: &Path, out: Option<&Path>) -> Result<()> {
    let target = out.unwrap_or(input);
    PersistedDocument::new(store.document().clone())
        .save(target)
        .with_context(|| format!("Cannot write document {}", target.display()))?;
    Ok(())
}
