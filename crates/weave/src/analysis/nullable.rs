//! Nullability is computed by "bubbling up" from the leaves. A node is marked nullable once its
//! children make it so, the scan restarts after every change until nothing changes anymore.
//! Flags only ever go from non-nullable to nullable, so this terminates after at most one scan
//! per node.

use cranelift_entity::EntitySet;

use crate::{
    grammar::{Grammar, NodeHandle},
    node::NodeKind,
};

/// Whether a node can match the empty string, given the current flags of its children.
pub fn evaluate_nullability(kind: &NodeKind<NodeHandle>, nullable: &EntitySet<NodeHandle>) -> bool {
    match kind {
        NodeKind::Empty => true,
        NodeKind::Literal(text) => text.is_empty(),
        NodeKind::Pattern(pattern) => pattern.matches_empty(),
        NodeKind::Utf8Char { .. } | NodeKind::Until { .. } => false,
        NodeKind::Sequence(children) => children.iter().all(|&child| nullable.contains(child)),
        NodeKind::Choice(children) => children.iter().any(|&child| nullable.contains(child)),
        NodeKind::Repeat { child, lower, .. } => *lower == 0 || nullable.contains(*child),
    }
}

pub fn compute_nullable<V>(grammar: &Grammar<V>) -> EntitySet<NodeHandle> {
    let mut nullable = EntitySet::with_capacity(grammar.rules.len());

    'scan: loop {
        for (handle, rule) in grammar.rules.iter() {
            if nullable.contains(handle) {
                continue;
            }
            if evaluate_nullability(&rule.kind, &nullable) {
                log::trace!("Nullable: {}", grammar.display_node(handle));
                nullable.insert(handle);
                continue 'scan;
            }
        }
        break;
    }

    nullable
}
