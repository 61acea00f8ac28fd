//! Moves definitions into the grammar arena and resolves named children into handles. Every
//! node is visited exactly once, as it is moved, so cycles through names need no special care.

use std::collections::{hash_map::Entry, HashMap};

use cranelift_entity::{EntityRef, EntitySet, PrimaryMap};

use crate::{
    error::GrammarError,
    grammar::{Grammar, NodeHandle, Rule},
    node::{Child, Name, Node, NodeKind},
};

struct ResolveCx<V> {
    rules: PrimaryMap<NodeHandle, Rule<V>>,
    name_to_rule: HashMap<Name, NodeHandle>,
}

impl<V> ResolveCx<V> {
    fn resolve_child(&mut self, child: Child<V>, referrer: &Name) -> Result<NodeHandle, GrammarError> {
        match child {
            Child::Named(name) => match self.name_to_rule.get(&name) {
                Some(&handle) => Ok(handle),
                None => Err(GrammarError::UnknownReference {
                    name,
                    referrer: referrer.clone(),
                }),
            },
            Child::Inline(node) => {
                let Node { kind, transform } = *node;
                let kind = self.resolve_kind(kind, referrer)?;
                Ok(self.rules.push(Rule {
                    name: None,
                    kind,
                    transform,
                }))
            }
        }
    }

    fn resolve_kind(
        &mut self,
        kind: NodeKind<Child<V>>,
        referrer: &Name,
    ) -> Result<NodeKind<NodeHandle>, GrammarError> {
        // the constructors are not the only way to build a node
        kind.validate()?;
        kind.try_map_children(|child| self.resolve_child(child, referrer))
    }
}

pub fn resolve<V>(
    start: &str,
    definitions: Vec<(Name, Node<V>)>,
) -> Result<Grammar<V>, GrammarError> {
    let mut cx = ResolveCx {
        rules: PrimaryMap::with_capacity(definitions.len()),
        name_to_rule: HashMap::with_capacity(definitions.len()),
    };

    // definitions get the first handles, allocated before anything refers to them
    for (name, _) in &definitions {
        let handle = cx.rules.push(Rule {
            name: Some(name.clone()),
            kind: NodeKind::Empty,
            transform: None,
        });
        match cx.name_to_rule.entry(name.clone()) {
            Entry::Occupied(_) => {
                return Err(GrammarError::DuplicateDefinition { name: name.clone() })
            }
            Entry::Vacant(v) => {
                v.insert(handle);
            }
        }
    }

    let count = definitions.len();
    for (index, (name, node)) in definitions.into_iter().enumerate() {
        let handle = NodeHandle::new(index);
        let Node { kind, transform } = node;

        let kind = cx.resolve_kind(kind, &name)?;
        let rule = &mut cx.rules[handle];
        rule.kind = kind;
        rule.transform = transform;
    }

    log::trace!(
        "Resolved {count} definitions into {} nodes",
        cx.rules.len()
    );

    let start = *cx
        .name_to_rule
        .get(start)
        .ok_or_else(|| GrammarError::MissingStart {
            start: start.into(),
        })?;

    Ok(Grammar {
        rules: cx.rules,
        names: cx.name_to_rule,
        definitions: (0..count).map(NodeHandle::new).collect(),
        start,
        nullable: EntitySet::new(),
        transform: None,
    })
}
