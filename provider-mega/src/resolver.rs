//! Path resolution against a [`TreeSnapshot`]
//!
//! Paths are walked from the root one segment at a time. Names compare
//! case-insensitively because the same folder is synced from platforms that
//! disagree on case. At every step the first matching child in listing order
//! wins and the walk never backtracks.

use bridge_traits::{NodeKind, RemoteNode};

use crate::tree::TreeSnapshot;

/// Split on `/` and `\`, dropping empty segments.
///
/// ```
/// use provider_mega::resolver::split_path;
///
/// assert_eq!(split_path("/mods\\\\a.zip/"), vec!["mods", "a.zip"]);
/// assert!(split_path("").is_empty());
/// ```
pub fn split_path(relative_path: &str) -> Vec<&str> {
    relative_path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Resolve `relative_path` to a node. An empty path yields the root.
pub fn resolve<'a>(snapshot: &'a TreeSnapshot, relative_path: &str) -> Option<&'a RemoteNode> {
    match resolve_chain(snapshot, relative_path)?.pop() {
        Some(node) => Some(node),
        None => Some(snapshot.root()),
    }
}

/// Resolve `relative_path`, returning every node visited below the root,
/// outermost first.
pub fn resolve_chain<'a>(
    snapshot: &'a TreeSnapshot,
    relative_path: &str,
) -> Option<Vec<&'a RemoteNode>> {
    let segments = split_path(relative_path);
    let mut chain = Vec::with_capacity(segments.len());
    let mut current = snapshot.root();

    for segment in segments {
        let wanted = segment.to_lowercase();
        current = snapshot
            .children_of(&current.id)
            .into_iter()
            .find(|child| matches_segment(child, &wanted))?;
        chain.push(current);
    }

    Some(chain)
}

fn matches_segment(node: &RemoteNode, wanted_lowercase: &str) -> bool {
    matches!(node.kind, NodeKind::Directory | NodeKind::File)
        && node.name.to_lowercase() == wanted_lowercase
}
