use std::{fmt::Write, sync::Arc};

use bstr::{BStr, ByteSlice};
use weave_runtime::ParseValue;

use crate::error::GrammarError;

pub type Name = Arc<str>;
pub type Bytes = Box<[u8]>;

/// Turns the raw arguments collected by a node into its value.
pub type Transform<V> = Arc<dyn Fn(Vec<V>) -> V + Send + Sync>;

/// The closed set of node kinds, generic over how children are referred to.
///
/// Nodes being built hold [`Child`] values, nodes owned by a grammar hold
/// [`NodeHandle`](crate::NodeHandle)s.
#[derive(Clone, Debug)]
pub enum NodeKind<C> {
    Empty,
    Literal(Bytes),
    Pattern(Pattern),
    Utf8Char { blacklist: Vec<Bytes> },
    Until { stops: Vec<Bytes> },
    Sequence(Vec<C>),
    Choice(Vec<C>),
    Repeat {
        child: C,
        lower: u32,
        /// `None` means unbounded
        upper: Option<u32>,
    },
}

impl<C> NodeKind<C> {
    pub fn children(&self) -> &[C] {
        match self {
            NodeKind::Sequence(children) | NodeKind::Choice(children) => children,
            NodeKind::Repeat { child, .. } => std::slice::from_ref(child),
            NodeKind::Empty
            | NodeKind::Literal(_)
            | NodeKind::Pattern(_)
            | NodeKind::Utf8Char { .. }
            | NodeKind::Until { .. } => &[],
        }
    }

    pub fn try_map_children<D, E>(
        self,
        mut fun: impl FnMut(C) -> Result<D, E>,
    ) -> Result<NodeKind<D>, E> {
        let kind = match self {
            NodeKind::Empty => NodeKind::Empty,
            NodeKind::Literal(text) => NodeKind::Literal(text),
            NodeKind::Pattern(pattern) => NodeKind::Pattern(pattern),
            NodeKind::Utf8Char { blacklist } => NodeKind::Utf8Char { blacklist },
            NodeKind::Until { stops } => NodeKind::Until { stops },
            NodeKind::Sequence(children) => {
                NodeKind::Sequence(children.into_iter().map(fun).collect::<Result<_, _>>()?)
            }
            NodeKind::Choice(children) => {
                NodeKind::Choice(children.into_iter().map(fun).collect::<Result<_, _>>()?)
            }
            NodeKind::Repeat {
                child,
                lower,
                upper,
            } => NodeKind::Repeat {
                child: fun(child)?,
                lower,
                upper,
            },
        };
        Ok(kind)
    }

    /// Checks the arguments which the node constructors check.
    pub fn validate(&self) -> Result<(), GrammarError> {
        match self {
            NodeKind::Choice(children) if children.is_empty() => Err(GrammarError::EmptyChoice),
            NodeKind::Until { stops } if stops.is_empty() => Err(GrammarError::EmptyLookahead),
            &NodeKind::Repeat {
                lower,
                upper: Some(upper),
                ..
            } if upper < lower => Err(GrammarError::InvalidBounds { lower, upper }),
            _ => Ok(()),
        }
    }

    /// The value of a node which was not given a transform.
    pub fn default_transform<V: ParseValue>(&self, args: Vec<V>) -> V {
        match self {
            NodeKind::Empty => V::null(),
            NodeKind::Literal(_)
            | NodeKind::Pattern(_)
            | NodeKind::Utf8Char { .. }
            | NodeKind::Until { .. }
            | NodeKind::Choice(_) => args.into_iter().next().unwrap_or_else(V::null),
            NodeKind::Sequence(_) | NodeKind::Repeat { .. } => V::list(args),
        }
    }

    /// Writes a constructor-like description, children are written by `child`.
    pub fn display_into(
        &self,
        buf: &mut dyn Write,
        child: &dyn Fn(&mut dyn Write, &C) -> std::fmt::Result,
    ) -> std::fmt::Result {
        let list = |buf: &mut dyn Write, name: &str, children: &[C]| {
            write!(buf, "{name}(")?;
            for (i, c) in children.iter().enumerate() {
                if i != 0 {
                    write!(buf, ", ")?;
                }
                child(buf, c)?;
            }
            write!(buf, ")")
        };

        match self {
            NodeKind::Empty => write!(buf, "Empty"),
            NodeKind::Literal(text) => write!(buf, "Literal({:?})", text.as_bstr()),
            NodeKind::Pattern(pattern) => write!(buf, "Pattern({:?})", pattern.as_str()),
            NodeKind::Utf8Char { blacklist } if blacklist.is_empty() => write!(buf, "Utf8Char"),
            NodeKind::Utf8Char { blacklist } => {
                write!(buf, "Utf8Char({:?})", display_byte_list(blacklist))
            }
            NodeKind::Until { stops } => write!(buf, "Until({:?})", display_byte_list(stops)),
            NodeKind::Sequence(children) => list(buf, "Sequence", children),
            NodeKind::Choice(children) => list(buf, "Choice", children),
            NodeKind::Repeat {
                child: c,
                lower: 0,
                upper: None,
            } => list(buf, "Star", std::slice::from_ref(c)),
            NodeKind::Repeat {
                child: c,
                lower,
                upper,
            } => {
                write!(buf, "Repeat(")?;
                child(buf, c)?;
                match upper {
                    Some(upper) => write!(buf, ", {lower}, {upper})"),
                    None => write!(buf, ", {lower}, ..)"),
                }
            }
        }
    }
}

fn display_byte_list(list: &[Bytes]) -> Vec<&BStr> {
    list.iter().map(|b| b.as_bstr()).collect()
}

/// An anchored regular expression.
#[derive(Clone, Debug)]
pub struct Pattern {
    regex: regex::bytes::Regex,
    nullable: bool,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Pattern, GrammarError> {
        if !Self::is_anchored(source) {
            return Err(GrammarError::UnanchoredPattern {
                pattern: source.to_owned(),
            });
        }

        let regex =
            regex::bytes::Regex::new(source).map_err(|e| GrammarError::InvalidPattern {
                pattern: source.to_owned(),
                message: e.to_string(),
            })?;
        let nullable = regex.is_match(b"");

        Ok(Pattern { regex, nullable })
    }

    /// Whether the expression begins with `^` or `\A`, ignoring leading flag groups like `(?i)`.
    fn is_anchored(source: &str) -> bool {
        let mut rest = source;
        while let Some(after) = rest.strip_prefix("(?") {
            let flags_end = after
                .find(|c: char| !(c.is_ascii_alphabetic() || c == '-'))
                .unwrap_or(after.len());
            match after[flags_end..].strip_prefix(')') {
                Some(next) => rest = next,
                None => break,
            }
        }
        rest.starts_with('^') || rest.starts_with("\\A")
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn matches_empty(&self) -> bool {
        self.nullable
    }

    /// Matches a prefix of `haystack`.
    ///
    /// Alternations such as `^a|b` pass the anchoring check but could match further along,
    /// those matches are rejected.
    pub fn match_prefix<'h>(&self, haystack: &'h [u8]) -> Option<regex::bytes::Captures<'h>> {
        let captures = self.regex.captures(haystack)?;
        match captures.get(0) {
            Some(m) if m.start() == 0 => Some(captures),
            _ => None,
        }
    }
}

/// A child of a composite node, either built inline or referring to a definition by name.
pub enum Child<V> {
    Inline(Box<Node<V>>),
    Named(Name),
}

impl<V> Clone for Child<V> {
    fn clone(&self) -> Self {
        match self {
            Child::Inline(node) => Child::Inline(node.clone()),
            Child::Named(name) => Child::Named(name.clone()),
        }
    }
}

impl<V> From<Node<V>> for Child<V> {
    fn from(value: Node<V>) -> Self {
        Child::Inline(Box::new(value))
    }
}

impl<V> From<&str> for Child<V> {
    fn from(value: &str) -> Self {
        Child::Named(value.into())
    }
}

impl<V> From<String> for Child<V> {
    fn from(value: String) -> Self {
        Child::Named(value.into())
    }
}

impl<V> From<Name> for Child<V> {
    fn from(value: Name) -> Self {
        Child::Named(value)
    }
}

/// A node which has not yet been handed to a [`Grammar`](crate::Grammar).
pub struct Node<V> {
    pub(crate) kind: NodeKind<Child<V>>,
    pub(crate) transform: Option<Transform<V>>,
}

impl<V> Clone for Node<V> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            transform: self.transform.clone(),
        }
    }
}

impl<V> Node<V> {
    fn new(kind: NodeKind<Child<V>>) -> Node<V> {
        Node {
            kind,
            transform: None,
        }
    }

    fn checked(kind: NodeKind<Child<V>>) -> Result<Node<V>, GrammarError> {
        kind.validate()?;
        Ok(Self::new(kind))
    }

    pub fn kind(&self) -> &NodeKind<Child<V>> {
        &self.kind
    }

    /// Matches nothing, always succeeds.
    pub fn empty() -> Node<V> {
        Self::new(NodeKind::Empty)
    }

    pub fn literal(text: impl AsRef<[u8]>) -> Node<V> {
        Self::new(NodeKind::Literal(text.as_ref().into()))
    }

    /// A regular expression which must be anchored at the start, such as `^[0-9]+`.
    pub fn pattern(expr: &str) -> Result<Node<V>, GrammarError> {
        Ok(Self::new(NodeKind::Pattern(Pattern::new(expr)?)))
    }

    /// A single UTF-8 encoded character.
    pub fn utf8_char() -> Node<V> {
        Self::new(NodeKind::Utf8Char {
            blacklist: Vec::new(),
        })
    }

    /// A single UTF-8 encoded character whose bytes are not any of `blacklist`.
    pub fn utf8_char_except<B: AsRef<[u8]>>(blacklist: impl IntoIterator<Item = B>) -> Node<V> {
        Self::new(NodeKind::Utf8Char {
            blacklist: blacklist.into_iter().map(|b| b.as_ref().into()).collect(),
        })
    }

    /// Everything up to the first occurence of any of `stops`, or up to the end of input.
    pub fn until<B: AsRef<[u8]>>(stops: impl IntoIterator<Item = B>) -> Result<Node<V>, GrammarError> {
        Self::checked(NodeKind::Until {
            stops: stops.into_iter().map(|b| b.as_ref().into()).collect(),
        })
    }

    pub fn sequence<C: Into<Child<V>>>(children: impl IntoIterator<Item = C>) -> Node<V> {
        Self::new(NodeKind::Sequence(
            children.into_iter().map(Into::into).collect(),
        ))
    }

    /// Tries `children` in order, the first one that matches wins.
    pub fn choice<C: Into<Child<V>>>(
        children: impl IntoIterator<Item = C>,
    ) -> Result<Node<V>, GrammarError> {
        Self::checked(NodeKind::Choice(
            children.into_iter().map(Into::into).collect(),
        ))
    }

    /// Greedily matches `child` between `lower` and `upper` times, `None` is unbounded.
    pub fn repeat(
        child: impl Into<Child<V>>,
        lower: u32,
        upper: impl Into<Option<u32>>,
    ) -> Result<Node<V>, GrammarError> {
        Self::checked(NodeKind::Repeat {
            child: child.into(),
            lower,
            upper: upper.into(),
        })
    }

    /// Zero or more repetitions.
    pub fn star(child: impl Into<Child<V>>) -> Node<V> {
        Self::new(NodeKind::Repeat {
            child: child.into(),
            lower: 0,
            upper: None,
        })
    }

    /// Zero or one repetition.
    pub fn optional(child: impl Into<Child<V>>) -> Node<V> {
        Self::new(NodeKind::Repeat {
            child: child.into(),
            lower: 0,
            upper: Some(1),
        })
    }

    /// Replaces the default transform of this node.
    pub fn transform<F>(mut self, fun: F) -> Node<V>
    where
        F: Fn(Vec<V>) -> V + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(fun));
        self
    }

    pub fn display_into(&self, buf: &mut dyn Write) -> std::fmt::Result {
        self.kind.display_into(buf, &|buf, child| match child {
            Child::Inline(node) => node.display_into(buf),
            Child::Named(name) => buf.write_str(name),
        })
    }
}

impl<V> std::fmt::Display for Node<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display_into(f)
    }
}

impl<V> std::fmt::Debug for Node<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display_into(f)
    }
}

#[cfg(test)]
mod tests {
    use weave_runtime::Value;

    use super::*;

    type N = Node<Value>;

    #[test]
    fn anchoring() {
        assert!(Pattern::is_anchored("^boo"));
        assert!(Pattern::is_anchored("\\Aboo"));
        assert!(Pattern::is_anchored("(?i)^boo"));
        assert!(Pattern::is_anchored("(?i)(?-u)^boo"));
        assert!(!Pattern::is_anchored("boo"));
        assert!(!Pattern::is_anchored("(?i:^boo)"));
        assert!(!Pattern::is_anchored(""));

        assert!(matches!(
            N::pattern("boo"),
            Err(GrammarError::UnanchoredPattern { .. })
        ));
        assert!(matches!(
            N::pattern("^(boo"),
            Err(GrammarError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn pattern_prefix() {
        let pattern = Pattern::new("^-?(0|[1-9][0-9]*)(\\.[0-9]*)?([eE][-+]?[0-9]*)?").unwrap();
        let caps = pattern.match_prefix(b"4.444E-009").unwrap();
        assert_eq!(&caps[0], b"4.444E-009");
        assert!(!pattern.matches_empty());

        let pattern = Pattern::new("^a|b").unwrap();
        assert!(pattern.match_prefix(b"xb").is_none());
        assert!(pattern.match_prefix(b"ab").is_some());

        assert!(Pattern::new("^a*").unwrap().matches_empty());
    }

    #[test]
    fn construction_errors() {
        assert!(matches!(
            N::choice(Vec::<Child<Value>>::new()),
            Err(GrammarError::EmptyChoice)
        ));
        assert!(matches!(
            N::repeat("a", 3, 2),
            Err(GrammarError::InvalidBounds { lower: 3, upper: 2 })
        ));
        assert!(N::repeat("a", 2, 2).is_ok());
        assert!(N::repeat("a", 7, None).is_ok());
        assert!(matches!(
            N::until(Vec::<&str>::new()),
            Err(GrammarError::EmptyLookahead)
        ));
    }

    #[test]
    fn display() {
        let node = N::sequence([
            Child::from("A"),
            N::literal("-").into(),
            N::star(N::utf8_char_except(["\""])).into(),
            N::repeat("B", 1, 2).unwrap().into(),
            N::repeat("B", 1, None).unwrap().into(),
        ]);
        assert_eq!(
            node.to_string(),
            r#"Sequence(A, Literal("-"), Star(Utf8Char(["\""])), Repeat(B, 1, 2), Repeat(B, 1, ..))"#
        );
        assert_eq!(N::pattern("^a+").unwrap().to_string(), r#"Pattern("^a+")"#);
    }

    #[test]
    fn default_transforms() {
        let args = || vec![Value::from("a"), Value::from("b")];
        let kind = NodeKind::<()>::Sequence(Vec::new());
        assert_eq!(kind.default_transform(args()), Value::from(vec!["a", "b"]));
        let kind = NodeKind::<()>::Choice(Vec::new());
        assert_eq!(kind.default_transform(args()), Value::from("a"));
        let kind = NodeKind::<()>::Empty;
        assert_eq!(kind.default_transform(Vec::<Value>::new()), Value::Null);
    }
}
