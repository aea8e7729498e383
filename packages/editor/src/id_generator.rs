//! Node ids minted for pasted and duplicated content.
//!
//! Minted ids read `<seed>-<n>`, where the seed is the CRC32 of the document
//! id. A generator opened on a document continues after the highest counter
//! already present there, so repeated pastes never walk over old copies.

use crate::document::{Document, NodeId};
use crc32fast::Hasher;

/// Short stable seed for a document id (CRC32, hex)
pub fn document_seed(document_id: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(document_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    next: u32,
}

impl IdGenerator {
    pub fn new(document_id: &str) -> Self {
        Self::from_seed(document_seed(document_id))
    }

    pub fn from_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            next: 1,
        }
    }

    /// Generator for `doc`, starting past every id it already minted there
    pub fn for_document(doc: &Document) -> Self {
        let mut generator = Self::new(&doc.id);
        let prefix = format!("{}-", generator.seed);
        let highest = doc
            .nodes
            .keys()
            .filter_map(|id| id.strip_prefix(&prefix)?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        generator.next = highest.saturating_add(1);
        generator
    }

    pub fn new_id(&mut self) -> NodeId {
        let id = format!("{}-{}", self.seed, self.next);
        self.next = self.next.saturating_add(1);
        id
    }

    /// Next id for which `taken` is false
    pub fn next_unused(&mut self, taken: impl Fn(&str) -> bool) -> NodeId {
        loop {
            let id = self.new_id();
            if !taken(&id) {
                return id;
            }
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::{build_payload, remap};
    use crate::document::Node;
    use crate::parent_index::ParentIndex;

    fn doc_with(ids: &[&str]) -> Document {
        let mut doc = Document::new("doc-1");
        let root = Node::container("root").with_children(ids.iter().copied());
        doc.insert_node(root);
        for id in ids {
            doc.insert_node(Node::text(*id, "x"));
        }
        doc
    }

    #[test]
    fn test_seed_depends_on_document() {
        assert_eq!(document_seed("doc-1"), document_seed("doc-1"));
        assert_ne!(document_seed("doc-1"), document_seed("doc-2"));
        assert_eq!(IdGenerator::new("doc-1").seed(), document_seed("doc-1"));
    }

    #[test]
    fn test_continues_after_earlier_copies() {
        let seed = document_seed("doc-1");
        let copies = [format!("{}-3", seed), format!("{}-11", seed)];
        let doc = doc_with(&["plain", "7", copies[0].as_str(), copies[1].as_str()]);

        let mut generator = IdGenerator::for_document(&doc);
        assert_eq!(generator.new_id(), format!("{}-12", seed));

        let empty = IdGenerator::for_document(&Document::new("doc-1")).new_id();
        assert_eq!(empty, format!("{}-1", seed));
    }

    #[test]
    fn test_remap_skips_ids_in_use() {
        let doc = doc_with(&["a", "b"]);
        let index = ParentIndex::build(&doc);
        let payload = build_payload(&doc, &index, ["a", "b"], None).unwrap();

        // The copy's own ids are also off limits
        let seed = document_seed(&doc.id);
        let mut generator = IdGenerator::from_seed(seed.clone());
        let first = format!("{}-1", seed);
        let remapped = remap(&payload, &mut generator, |id| id == first);

        assert_eq!(
            remapped.root_ids,
            vec![format!("{}-2", seed), format!("{}-3", seed)]
        );
    }

    #[test]
    fn test_next_unused_skips_taken() {
        let mut generator = IdGenerator::from_seed("s");
        assert_eq!(generator.next_unused(|id| id == "s-1" || id == "s-2"), "s-3");
        assert_eq!(generator.new_id(), "s-4");
    }
}
