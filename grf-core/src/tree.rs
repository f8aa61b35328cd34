//! Hierarchical view over the flat archive namespace.
//!
//! Nodes live in an arena owned by [`VirtualTree`] and are addressed by
//! [`NodeId`]. Directories only exist as prefixes of at least one file path.

use std::collections::HashMap;

use tracing::warn;

use crate::domain::{ArchiveEntry, EntryId, StorageFlags};
use crate::encoding::NativeCodec;
use crate::repo::GrfArchive;

pub const SEPARATOR: u8 = b'\\';

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Directory {
        children: Vec<NodeId>,
    },
    File {
        entry_id: EntryId,
        size: u64,
        flags: StorageFlags,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub display_name: String,
    pub parent: Option<NodeId>,
    pub aggregate_size: u64,
}

impl TreeNode {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub fn entry_id(&self) -> Option<EntryId> {
        match self.kind {
            NodeKind::File { entry_id, .. } => Some(entry_id),
            NodeKind::Directory { .. } => None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualTree {
    nodes: Vec<TreeNode>,
    skipped_entries: usize,
}

impl VirtualTree {
    /// Build from an archive snapshot, in the archive's iteration order.
    pub fn from_archive(archive: &dyn GrfArchive, codec: &dyn NativeCodec) -> Self {
        Self::build(&archive.entries(), codec)
    }

    pub fn build(entries: &[ArchiveEntry], codec: &dyn NativeCodec) -> Self {
        let mut tree = VirtualTree {
            nodes: vec![TreeNode {
                kind: NodeKind::Directory {
                    children: Vec::new(),
                },
                display_name: String::new(),
                parent: None,
                aggregate_size: 0,
            }],
            skipped_entries: 0,
        };
        let mut dirs: HashMap<(NodeId, Vec<u8>), NodeId> = HashMap::new();

        for entry in entries {
            let segments: Vec<&[u8]> = entry
                .virtual_path
                .split(|&b| b == SEPARATOR)
                .filter(|s| !s.is_empty())
                .collect();
            let Some((leaf, parents)) = segments.split_last() else {
                warn!(id = %entry.id, "skipping entry with empty virtual path");
                tree.skipped_entries += 1;
                continue;
            };

            let mut cur = tree.root();
            for seg in parents {
                cur = match dirs.get(&(cur, seg.to_vec())) {
                    Some(&dir) => dir,
                    None => {
                        let dir = tree.push(
                            cur,
                            seg,
                            codec,
                            NodeKind::Directory {
                                children: Vec::new(),
                            },
                        );
                        dirs.insert((cur, seg.to_vec()), dir);
                        dir
                    }
                };
            }
            tree.push(
                cur,
                leaf,
                codec,
                NodeKind::File {
                    entry_id: entry.id,
                    size: entry.size,
                    flags: entry.flags,
                },
            );
        }

        tree.aggregate();
        tree
    }

    fn push(&mut self, parent: NodeId, raw: &[u8], codec: &dyn NativeCodec, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let aggregate_size = match kind {
            NodeKind::File { size, .. } => size,
            NodeKind::Directory { .. } => 0,
        };
        self.nodes.push(TreeNode {
            kind,
            display_name: codec.decode_native_to_portable(raw),
            parent: Some(parent),
            aggregate_size,
        });
        if let NodeKind::Directory { children } = &mut self.nodes[parent.index()].kind {
            children.push(id);
        }
        id
    }

    // Children are always pushed after their parent, so one reverse sweep
    // sees every subtree complete before its parent.
    fn aggregate(&mut self) {
        for node in self.nodes.iter_mut() {
            if node.is_dir() {
                node.aggregate_size = 0;
            }
        }
        for i in (1..self.nodes.len()).rev() {
            let size = self.nodes[i].aggregate_size;
            if let Some(parent) = self.nodes[i].parent {
                self.nodes[parent.index()].aggregate_size += size;
            }
        }
    }

    /// Display ordering: every level sorted by `display_name`, ordinal and
    /// case-sensitive. Idempotent.
    pub fn sort_by_name(&mut self) {
        for i in 0..self.nodes.len() {
            let mut children = match &mut self.nodes[i].kind {
                NodeKind::Directory { children } => std::mem::take(children),
                NodeKind::File { .. } => continue,
            };
            children.sort_by(|a, b| {
                self.nodes[a.index()]
                    .display_name
                    .cmp(&self.nodes[b.index()].display_name)
            });
            if let NodeKind::Directory { children: slot } = &mut self.nodes[i].kind {
                *slot = children;
            }
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.index())
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(TreeNode::children).unwrap_or(&[])
    }

    /// Entries that could not be placed (empty or separator-only paths).
    pub fn skipped_entries(&self) -> usize {
        self.skipped_entries
    }

    pub fn file_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_dir()).count()
    }

    /// Directories other than the root.
    pub fn dir_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_dir()).count() - 1
    }

    /// Look up a node by display path, segments separated by `\`. The empty
    /// path is the root.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let mut cur = self.root();
        for seg in path.split('\\').filter(|s| !s.is_empty()) {
            cur = *self
                .children(cur)
                .iter()
                .find(|c| self.nodes[c.index()].display_name == seg)?;
        }
        Some(cur)
    }

    /// Display path of `id`, `\`-joined, without a leading separator.
    pub fn display_path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cur = self.node(id);
        while let Some(n) = cur {
            if n.parent.is_none() {
                break;
            }
            parts.push(n.display_name.as_str());
            cur = n.parent.and_then(|p| self.node(p));
        }
        parts.reverse();
        parts.join("\\")
    }

    /// Every file leaf, depth-first pre-order over the current child order.
    pub fn files(&self) -> Vec<EntryId> {
        let mut out = Vec::new();
        self.collect_files(self.root(), &mut out);
        out
    }

    pub(crate) fn collect_files(&self, id: NodeId, out: &mut Vec<EntryId>) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::File { entry_id, .. } => out.push(*entry_id),
            NodeKind::Directory { children } => {
                for &c in children {
                    self.collect_files(c, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::EucKr;

    fn entry(id: u32, path: &[u8], size: u64) -> ArchiveEntry {
        ArchiveEntry {
            id: EntryId(id),
            virtual_path: path.to_vec(),
            size,
            storage_size: size,
            storage_offset: 0,
            flags: StorageFlags::FILE,
        }
    }

    #[test]
    fn aggregates_nested_sizes() {
        let tree = VirtualTree::build(
            &[entry(1, b"data\\x.txt", 10), entry(2, b"data\\sub\\y.txt", 20)],
            &EucKr,
        );
        let data = tree.find("data").unwrap();
        let sub = tree.find("data\\sub").unwrap();
        assert_eq!(tree.node(data).unwrap().aggregate_size, 30);
        assert_eq!(tree.node(sub).unwrap().aggregate_size, 20);
        assert_eq!(tree.node(tree.root()).unwrap().aggregate_size, 30);
        assert_eq!(tree.dir_count(), 2);
    }

    #[test]
    fn separator_only_paths_are_skipped() {
        let tree = VirtualTree::build(
            &[entry(1, b"", 1), entry(2, b"\\\\", 1), entry(3, b"a.txt", 5)],
            &EucKr,
        );
        assert_eq!(tree.skipped_entries(), 2);
        assert_eq!(tree.files(), vec![EntryId(3)]);
    }

    #[test]
    fn empty_segments_collapse() {
        let tree = VirtualTree::build(&[entry(1, b"\\data\\\\a", 1), entry(2, b"data\\b", 1)], &EucKr);
        let data = tree.find("data").unwrap();
        assert_eq!(tree.children(data).len(), 2);
    }

    #[test]
    fn names_decode_from_native() {
        let tree = VirtualTree::build(&[entry(1, &[0xC7, 0xD1, b'\\', b'a'], 1)], &EucKr);
        assert!(tree.find("한\\a").is_some());
        assert_eq!(tree.display_path(tree.find("한\\a").unwrap()), "한\\a");
    }

    #[test]
    fn sort_is_ordinal_and_idempotent() {
        let mut tree = VirtualTree::build(
            &[entry(1, b"b", 1), entry(2, b"B", 1), entry(3, b"a\\z", 1)],
            &EucKr,
        );
        tree.sort_by_name();
        let names: Vec<_> = tree
            .children(tree.root())
            .iter()
            .map(|c| tree.node(*c).unwrap().display_name.clone())
            .collect();
        assert_eq!(names, vec!["B", "a", "b"]);
        let once = tree.clone();
        tree.sort_by_name();
        assert_eq!(tree, once);
    }
}
