use tracing::debug;

use crate::domain::EntryId;
use crate::tree::{NodeId, VirtualTree};

/// Expand a selection of tree nodes into the entry ids of its file leaves.
///
/// Output follows selection order; directories expand depth-first pre-order
/// over their current child order. Nothing is de-duplicated: selecting a
/// directory and one of its files yields that file twice.
pub fn resolve_selection(tree: &VirtualTree, selection: &[NodeId]) -> Vec<EntryId> {
    let mut out = Vec::new();
    for &id in selection {
        if tree.node(id).is_none() {
            debug!(?id, "ignoring selection outside the tree");
            continue;
        }
        tree.collect_files(id, &mut out);
    }
    out
}

/// Resolve display paths (`\`-separated) to nodes, then expand them.
/// Unknown paths are returned separately.
pub fn resolve_paths<'a>(
    tree: &VirtualTree,
    paths: &'a [String],
) -> (Vec<EntryId>, Vec<&'a str>) {
    let mut nodes = Vec::with_capacity(paths.len());
    let mut missing = Vec::new();
    for p in paths {
        match tree.find(p) {
            Some(id) => nodes.push(id),
            None => missing.push(p.as_str()),
        }
    }
    (resolve_selection(tree, &nodes), missing)
}
