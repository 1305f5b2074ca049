//! Structural checks for suites and runtime trees.

use std::collections::HashSet;

use crate::core::graph::{LeafState, NodeId, NodeKind, RunTree};
use crate::suite::{Suite, SuiteKind};

/// Check that a suite can be run and addressed by dotted paths:
/// - names are non-empty and contain neither `.` nor `/`
/// - groups have at least one child
/// - sibling names are unique
pub fn validate_suite(root: &Suite) -> Vec<String> {
    let mut errors = Vec::new();
    validate_suite_node(root, &root.name, &mut errors);
    errors
}

fn validate_suite_node(node: &Suite, path: &str, errors: &mut Vec<String>) {
    if let Some(problem) = name_problem(&node.name) {
        errors.push(format!("{path}: {problem}"));
    }

    let SuiteKind::Group(children) = &node.kind else {
        return;
    };
    if children.is_empty() {
        errors.push(format!("{path}: group must have at least one child"));
    }
    let mut seen = HashSet::new();
    for child in children {
        if !seen.insert(child.name.as_str()) {
            errors.push(format!("{path}: duplicate child name '{}'", child.name));
        }
        let child_path = format!("{}.{}", path, child.name);
        validate_suite_node(child, &child_path, errors);
    }
}

/// Reason a suite node name is unusable, if any.
pub fn name_problem(name: &str) -> Option<&'static str> {
    if name.trim().is_empty() {
        Some("name must be non-empty")
    } else if name.contains('.') {
        Some("name must not contain '.'")
    } else if name.contains('/') {
        Some("name must not contain '/'")
    } else {
        None
    }
}

/// Check aggregate bookkeeping of a runtime tree:
/// - `total_leaves` equals the number of leaf descendants
/// - `num_passed + num_failed <= total_leaves`
/// - passed/failed counts match the outcomes of done leaves beneath
pub fn validate_run_tree(tree: &RunTree) -> Vec<String> {
    let mut errors = Vec::new();
    for id in tree.ids() {
        let node = tree.node(id);
        let NodeKind::Internal(internal) = &node.kind else {
            continue;
        };
        let path = tree.segments(id).join(".");
        let (mut total, mut passed, mut failed) = (0, 0, 0);
        collect_leaves(tree, id, &mut total, &mut passed, &mut failed);

        if internal.total_leaves != total {
            errors.push(format!(
                "{path}: total_leaves {} but {} leaves beneath",
                internal.total_leaves, total
            ));
        }
        if internal.num_passed + internal.num_failed > internal.total_leaves {
            errors.push(format!(
                "{path}: {} passed + {} failed exceeds {} leaves",
                internal.num_passed, internal.num_failed, internal.total_leaves
            ));
        }
        if internal.num_passed != passed || internal.num_failed != failed {
            errors.push(format!(
                "{path}: counts {}/{} disagree with leaf outcomes {}/{}",
                internal.num_passed, internal.num_failed, passed, failed
            ));
        }
    }
    errors
}

fn collect_leaves(
    tree: &RunTree,
    id: NodeId,
    total: &mut usize,
    passed: &mut usize,
    failed: &mut usize,
) {
    match &tree.node(id).kind {
        NodeKind::Leaf(leaf) => {
            *total += 1;
            if leaf.state == LeafState::Done {
                match leaf.outcome {
                    Some(outcome) if outcome.passed() => *passed += 1,
                    _ => *failed += 1,
                }
            }
        }
        NodeKind::Internal(internal) => {
            for child in &internal.children {
                collect_leaves(tree, *child, total, passed, failed);
            }
        }
    }
}
