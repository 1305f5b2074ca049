//! Dotted path resolution (`root.suiteA.testX`).
//!
//! The first segment must name the starting node itself. Resolution never
//! returns a partial match: either every segment matches or nothing does.

use std::sync::Arc;

use crate::core::graph::{NodeId, RunTree};
use crate::suite::Suite;

pub const SEPARATOR: char = '.';

/// Resolve `path` against a suite, returning the selected subtree.
pub fn resolve_suite(suite: &Arc<Suite>, path: &str) -> Option<Arc<Suite>> {
    let (head, rest) = split_head(path)?;
    if suite.name != head {
        return None;
    }
    match rest {
        None => Some(Arc::clone(suite)),
        Some(rest) => suite
            .children()
            .iter()
            .find_map(|child| resolve_suite(child, rest)),
    }
}

/// Resolve `path` against a runtime tree, starting at its root.
pub fn resolve_node(tree: &RunTree, path: &str) -> Option<NodeId> {
    resolve_node_from(tree, tree.root(), path)
}

fn resolve_node_from(tree: &RunTree, id: NodeId, path: &str) -> Option<NodeId> {
    let (head, rest) = split_head(path)?;
    if tree.node(id).name != head {
        return None;
    }
    match rest {
        None => Some(id),
        Some(rest) => tree
            .children(id)
            .iter()
            .find_map(|child| resolve_node_from(tree, *child, rest)),
    }
}

/// Dotted path of `id` from the runtime root.
pub fn node_path(tree: &RunTree, id: NodeId) -> String {
    tree.segments(id).join(".")
}

/// Dotted path of `id` from the root of the full suite the tree was built
/// from, i.e. including the filter prefix.
pub fn full_path(tree: &RunTree, id: NodeId) -> String {
    let relative = node_path(tree, id);
    match tree.prefix() {
        Some(prefix) => format!("{prefix}{SEPARATOR}{relative}"),
        None => relative,
    }
}

/// Split off the first segment. Empty segments never match.
fn split_head(path: &str) -> Option<(&str, Option<&str>)> {
    let (head, rest) = match path.split_once(SEPARATOR) {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    if head.is_empty() {
        return None;
    }
    Some((head, rest))
}

/// Parent prefix of a dotted path (`a.b.c` -> `a.b`), if any.
pub fn parent_prefix(path: &str) -> Option<&str> {
    path.rsplit_once(SEPARATOR).map(|(prefix, _)| prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::build_graph;

    fn noop() {}

    fn suite() -> Arc<Suite> {
        let test_x = Suite::test("testX", noop);
        let suite_a = Suite::group("suiteA", [Suite::test("testY", noop), test_x]);
        let suite_b = Suite::group("suiteB", [Suite::test("testX", noop)]);
        Suite::group("root", [suite_a, suite_b])
    }

    #[test]
    fn resolves_suite_path_segment_by_segment() {
        let found = resolve_suite(&suite(), "root.suiteA.testX").expect("found");
        assert_eq!(found.name, "testX");
        assert!(found.is_leaf());

        let subtree = resolve_suite(&suite(), "root.suiteB").expect("found");
        assert_eq!(subtree.children().len(), 1);
    }

    #[test]
    fn root_name_resolves_to_root() {
        let root = suite();
        let found = resolve_suite(&root, "root").expect("found");
        assert!(Arc::ptr_eq(&found, &root));
    }

    #[test]
    fn unresolvable_paths_are_not_found() {
        let root = suite();
        assert!(resolve_suite(&root, "root.suiteA.missing").is_none());
        assert!(resolve_suite(&root, "other.suiteA").is_none());
        assert!(resolve_suite(&root, "root.suiteA.testX.deeper").is_none());
        assert!(resolve_suite(&root, "").is_none());
        assert!(resolve_suite(&root, "root..suiteA").is_none());
    }

    #[test]
    fn resolves_runtime_nodes() {
        let tree = build_graph(&suite(), None);
        let id = resolve_node(&tree, "root.suiteB.testX").expect("found");
        assert_eq!(node_path(&tree, id), "root.suiteB.testX");
        assert!(resolve_node(&tree, "root.suiteB.testY").is_none());
    }

    #[test]
    fn full_path_includes_filter_prefix() {
        let root = suite();
        let subtree = resolve_suite(&root, "root.suiteA").expect("found");
        let tree = build_graph(&subtree, parent_prefix("root.suiteA"));
        let id = resolve_node(&tree, "suiteA.testX").expect("found");
        assert_eq!(full_path(&tree, id), "root.suiteA.testX");
        assert_eq!(parent_prefix("root"), None);
    }
}
