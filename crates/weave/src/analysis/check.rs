use cranelift_entity::EntitySet;

use crate::{
    error::GrammarError,
    grammar::Grammar,
    node::NodeKind,
};

/// A definition is left-recursive if it appears in its own extended first-set, that is the
/// closure of [`Grammar::first_set`] starting from it.
///
/// Every definition is checked, including ones that cannot be reached from the start.
pub fn check_left_recursion<V>(grammar: &Grammar<V>) -> Result<(), GrammarError> {
    let mut frontier = Vec::new();

    for &definition in &grammar.definitions {
        let mut seen = EntitySet::with_capacity(grammar.rules.len());
        frontier.clear();
        frontier.push(definition);
        seen.insert(definition);

        // breadth first, the frontier doubles as the queue
        let mut i = 0;
        while let Some(&current) = frontier.get(i) {
            for &next in grammar.first_set(current) {
                if next == definition {
                    let rule = match grammar.name(definition) {
                        Some(name) => name.clone(),
                        None => grammar.display_node(definition).into(),
                    };
                    return Err(GrammarError::LeftRecursion { rule });
                }
                if seen.insert(next) {
                    frontier.push(next);
                }
            }
            i += 1;
        }

        log::trace!(
            "Extended first-set of {} has {} nodes",
            grammar.display_node(definition),
            frontier.len()
        );
    }

    Ok(())
}

/// An unbounded repetition of something that can match without consuming input would never
/// stop.
pub fn check_nullable_loops<V>(grammar: &Grammar<V>) -> Result<(), GrammarError> {
    for (handle, rule) in grammar.rules.iter() {
        if let NodeKind::Repeat {
            child, upper: None, ..
        } = rule.kind
        {
            if grammar.is_handle_nullable(child) {
                let describe = |handle| match grammar.name(handle) {
                    Some(name) => name.to_string(),
                    None => grammar.display_node(handle),
                };
                return Err(GrammarError::NullableLoop {
                    repetition: describe(handle),
                    child: describe(child),
                });
            }
        }
    }
    Ok(())
}
