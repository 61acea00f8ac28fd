use std::{collections::HashMap, fmt::Write, sync::Arc};

use cranelift_entity::{entity_impl, EntitySet, PrimaryMap};
use weave_runtime::{ParseValue, Value};

use crate::{
    analysis::{check, nullable, resolve},
    error::GrammarError,
    node::{Name, Node, NodeKind, Transform},
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeHandle(u32);

entity_impl! { NodeHandle }

/// A node owned by a grammar, all of its children are resolved.
pub struct Rule<V> {
    /// Set for definitions, inline children have no name.
    pub name: Option<Name>,
    pub kind: NodeKind<NodeHandle>,
    pub transform: Option<Transform<V>>,
}

impl<V: ParseValue> Rule<V> {
    pub fn apply(&self, args: Vec<V>) -> V {
        match &self.transform {
            Some(transform) => transform(args),
            None => self.kind.default_transform(args),
        }
    }
}

/// A set of named, mutually referencing nodes which has passed static analysis.
///
/// Every node (definitions and their inline children) lives in a single arena, edges between
/// nodes are [`NodeHandle`]s into it.
pub struct Grammar<V = Value> {
    pub(crate) rules: PrimaryMap<NodeHandle, Rule<V>>,
    pub(crate) names: HashMap<Name, NodeHandle>,
    /// Definitions in the order they were given.
    pub(crate) definitions: Vec<NodeHandle>,
    pub(crate) start: NodeHandle,
    pub(crate) nullable: EntitySet<NodeHandle>,
    /// Applied to the value of the start definition after a successful match.
    pub(crate) transform: Option<Arc<dyn Fn(V) -> V + Send + Sync>>,
}

impl<V: ParseValue> Grammar<V> {
    /// Builds a grammar from named definitions, parsing begins with the `start` definition.
    ///
    /// The definitions are resolved and checked for left recursion and for unbounded
    /// repetitions of nodes which can match the empty string, any of which is an error.
    pub fn new<N: Into<Name>>(
        start: &str,
        definitions: impl IntoIterator<Item = (N, Node<V>)>,
    ) -> Result<Grammar<V>, GrammarError> {
        let definitions: Vec<(Name, Node<V>)> = definitions
            .into_iter()
            .map(|(name, node)| (name.into(), node))
            .collect();

        log::debug!(
            "Building grammar '{start}' from {} definitions",
            definitions.len()
        );

        let result = Self::build(start, definitions);
        match &result {
            Ok(grammar) => log::debug!("Grammar ready with {} nodes", grammar.rules.len()),
            Err(err) => log::debug!("Rejected grammar: {err}"),
        }
        result
    }

    /// A grammar consisting of just `node`.
    pub fn from_node(node: Node<V>) -> Result<Grammar<V>, GrammarError> {
        const ROOT: &str = "root";
        Self::new(ROOT, [(ROOT, node)])
    }

    /// Replaces the final value of [`Grammar::parse`] and [`Grammar::match_at`], by default it
    /// is the value of the start definition.
    pub fn transform<F>(mut self, fun: F) -> Grammar<V>
    where
        F: Fn(V) -> V + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(fun));
        self
    }

    pub(crate) fn finish(&self, value: V) -> V {
        match &self.transform {
            Some(transform) => transform(value),
            None => value,
        }
    }

    fn build(start: &str, definitions: Vec<(Name, Node<V>)>) -> Result<Grammar<V>, GrammarError> {
        if !definitions.iter().any(|(name, _)| &**name == start) {
            return Err(GrammarError::MissingStart {
                start: start.into(),
            });
        }

        let mut grammar = resolve::resolve(start, definitions)?;
        grammar.nullable = nullable::compute_nullable(&grammar);
        check::check_left_recursion(&grammar)?;
        check::check_nullable_loops(&grammar)?;

        Ok(grammar)
    }
}

impl<V> Grammar<V> {
    pub fn start(&self) -> &Name {
        self.name(self.start)
            .expect("Start handle always refers to a definition")
    }

    pub fn start_handle(&self) -> NodeHandle {
        self.start
    }

    /// Names of all definitions, in the order they were given.
    pub fn definitions(&self) -> impl Iterator<Item = &Name> + '_ {
        self.definitions.iter().filter_map(|&handle| self.name(handle))
    }

    pub fn handle(&self, name: &str) -> Option<NodeHandle> {
        self.names.get(name).copied()
    }

    pub fn get_rule(&self, handle: NodeHandle) -> Option<&Rule<V>> {
        self.rules.get(handle)
    }

    pub fn name(&self, handle: NodeHandle) -> Option<&Name> {
        self.rules.get(handle)?.name.as_ref()
    }

    /// Number of nodes, including inline children.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_nullable(&self, name: &str) -> Option<bool> {
        self.handle(name).map(|handle| self.is_handle_nullable(handle))
    }

    pub fn is_handle_nullable(&self, handle: NodeHandle) -> bool {
        self.nullable.contains(handle)
    }

    /// The children of a node which could be entered first, before any input is consumed.
    ///
    /// # Panics
    /// If `handle` belongs to a different grammar, [`Grammar::get_rule`] checks this.
    pub fn first_set(&self, handle: NodeHandle) -> &[NodeHandle] {
        match &self.rules[handle].kind {
            NodeKind::Sequence(children) => {
                // everything up to and including the first child that must consume something
                let end = children
                    .iter()
                    .position(|&child| !self.is_handle_nullable(child))
                    .map_or(children.len(), |i| i + 1);
                &children[..end]
            }
            kind => kind.children(),
        }
    }

    /// Writes the description of a node, its named children are written by name.
    ///
    /// Panics like [`Grammar::first_set`].
    pub fn display_node_into(&self, buf: &mut dyn Write, handle: NodeHandle) -> std::fmt::Result {
        self.rules[handle]
            .kind
            .display_into(buf, &|buf, &child| self.display_child_into(buf, child))
    }

    fn display_child_into(&self, buf: &mut dyn Write, handle: NodeHandle) -> std::fmt::Result {
        match self.name(handle) {
            Some(name) => buf.write_str(name),
            None => self.display_node_into(buf, handle),
        }
    }

    pub fn display_node(&self, handle: NodeHandle) -> String {
        let mut buf = String::new();
        // writing into a String cannot fail
        _ = self.display_node_into(&mut buf, handle);
        buf
    }

    pub fn display_into(&self, buf: &mut dyn Write) -> std::fmt::Result {
        for &handle in &self.definitions {
            if let Some(name) = self.name(handle) {
                write!(buf, "{name} = ")?;
            }
            self.display_node_into(buf, handle)?;
            writeln!(buf)?;
        }
        Ok(())
    }
}

impl<V> std::fmt::Display for Grammar<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display_into(f)
    }
}

impl<V> std::fmt::Debug for Grammar<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar")
            .field("start", self.start())
            .field("nodes", &self.rules.len())
            .finish_non_exhaustive()
    }
}
