//! Backtracking recursive descent over the grammar arena.
//!
//! Failures are plain values, an ordered choice simply moves on to its next alternative. They
//! are only rendered into a [`ParseError`] once they escape the grammar.

use bstr::ByteSlice;
use weave_runtime::{
    utf8::{self, DecodeError},
    ParseError, ParseValue,
};

use crate::{
    grammar::{Grammar, NodeHandle},
    node::NodeKind,
};

/// Raw arguments of a successful match, before the transform is applied.
pub struct Match<V> {
    pub end: usize,
    pub args: Vec<V>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FailureKind {
    Literal,
    Pattern,
    Utf8(DecodeError),
    Blacklisted,
    Until,
    Choice,
}

/// A node did not match at `position`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Failure {
    pub handle: NodeHandle,
    pub position: usize,
    pub kind: FailureKind,
}

impl<V: ParseValue> Grammar<V> {
    /// Parses the whole input with the start definition.
    pub fn parse(&self, input: impl AsRef<[u8]>) -> Result<V, ParseError> {
        let input = input.as_ref();
        let Match { end, args } = self
            .get_result(self.start, input, 0)
            .map_err(|failure| self.failure_to_error(failure, input))?;

        if end != input.len() {
            return Err(ParseError::new("Parsing completed prematurely", end, input));
        }

        // transforms of the start definition only run once all input is consumed
        Ok(self.finish(self.rules[self.start].apply(args)))
    }

    /// Matches the start definition at `pos`, the input does not need to be fully consumed.
    ///
    /// Returns the end of the match and the value.
    pub fn match_at(&self, input: impl AsRef<[u8]>, pos: usize) -> Result<(usize, V), ParseError> {
        let input = input.as_ref();
        let (end, value) = self
            .match_handle(self.start, input, pos)
            .map_err(|failure| self.failure_to_error(failure, input))?;
        Ok((end, self.finish(value)))
    }

    pub fn match_handle(
        &self,
        handle: NodeHandle,
        input: &[u8],
        pos: usize,
    ) -> Result<(usize, V), Failure> {
        let Match { end, args } = self.get_result(handle, input, pos)?;
        Ok((end, self.rules[handle].apply(args)))
    }

    /// Matches the node at exactly `pos`, without applying its transform.
    ///
    /// Panics if `handle` belongs to a different grammar.
    pub fn get_result(
        &self,
        handle: NodeHandle,
        input: &[u8],
        pos: usize,
    ) -> Result<Match<V>, Failure> {
        let fail = |kind| Failure {
            handle,
            position: pos,
            kind,
        };
        let rest = input.get(pos..).unwrap_or_default();

        match &self.rules[handle].kind {
            NodeKind::Empty => Ok(Match {
                end: pos,
                args: Vec::new(),
            }),
            NodeKind::Literal(text) => {
                if !rest.starts_with(text) {
                    return Err(fail(FailureKind::Literal));
                }
                Ok(Match {
                    end: pos + text.len(),
                    args: vec![V::from_bytes(text)],
                })
            }
            NodeKind::Pattern(pattern) => {
                let captures = pattern
                    .match_prefix(rest)
                    .ok_or_else(|| fail(FailureKind::Pattern))?;
                let len = captures.get(0).map_or(0, |m| m.end());
                let args = captures
                    .iter()
                    .map(|group| match group {
                        Some(m) => V::from_bytes(m.as_bytes()),
                        None => V::null(),
                    })
                    .collect();
                Ok(Match {
                    end: pos + len,
                    args,
                })
            }
            NodeKind::Utf8Char { blacklist } => {
                let decoded =
                    utf8::decode(input, pos).map_err(|err| fail(FailureKind::Utf8(err)))?;
                let character = &rest[..decoded.len];
                if blacklist.iter().any(|b| **b == *character) {
                    return Err(fail(FailureKind::Blacklisted));
                }
                Ok(Match {
                    end: pos + decoded.len,
                    args: vec![V::from_bytes(character)],
                })
            }
            NodeKind::Until { stops } => {
                let len = stops
                    .iter()
                    .filter_map(|stop| rest.find(stop))
                    .min()
                    .unwrap_or(rest.len());
                if len == 0 {
                    return Err(fail(FailureKind::Until));
                }
                Ok(Match {
                    end: pos + len,
                    args: vec![V::from_bytes(&rest[..len])],
                })
            }
            NodeKind::Sequence(children) => {
                let mut end = pos;
                let mut args = Vec::with_capacity(children.len());
                for &child in children {
                    let (next, value) = self.match_handle(child, input, end)?;
                    end = next;
                    args.push(value);
                }
                Ok(Match { end, args })
            }
            NodeKind::Choice(children) => {
                for &child in children {
                    if let Ok((end, value)) = self.match_handle(child, input, pos) {
                        return Ok(Match {
                            end,
                            args: vec![value],
                        });
                    }
                }
                Err(fail(FailureKind::Choice))
            }
            &NodeKind::Repeat {
                child,
                lower,
                upper,
            } => {
                let mut end = pos;
                let mut args = Vec::new();

                // failures in the mandatory part are fatal
                for _ in 0..lower {
                    let (next, value) = self.match_handle(child, input, end)?;
                    end = next;
                    args.push(value);
                }

                let optional = upper.map(|upper| upper.saturating_sub(lower));
                let mut count = 0;
                while optional.map_or(true, |optional| count < optional) {
                    match self.match_handle(child, input, end) {
                        // zero-width assertions such as `^\b` are not nullable, yet can match
                        // without consuming anything
                        Ok((next, _)) if next == end && optional.is_none() => break,
                        Ok((next, value)) => {
                            end = next;
                            args.push(value);
                        }
                        Err(_) => break,
                    }
                    count += 1;
                }

                Ok(Match { end, args })
            }
        }
    }

    fn failure_to_error(&self, failure: Failure, input: &[u8]) -> ParseError {
        let node = self.display_node(failure.handle);
        let message = match (failure.kind, &self.rules[failure.handle].kind) {
            (FailureKind::Literal, NodeKind::Literal(text)) => {
                format!("{node} could not find string {:?}", text.as_bstr())
            }
            (FailureKind::Pattern, NodeKind::Pattern(pattern)) => {
                format!("{node} could not match expression {:?}", pattern.as_str())
            }
            (FailureKind::Utf8(err), _) => {
                format!("{node} could not find a UTF-8 character ({err})")
            }
            (FailureKind::Blacklisted, _) => format!("{node} found a blacklisted character"),
            (FailureKind::Until, _) => format!("{node} did not match anything"),
            (FailureKind::Choice, _) => format!("{node} could not match another alternative"),
            (kind, _) => format!("{node} failed to match ({kind:?})"),
        };
        ParseError::new(message, failure.position, input)
    }
}

#[cfg(test)]
mod tests {
    use weave_runtime::Value;

    use super::*;
    use crate::{init_test_logger, node::Child, transform, Node};

    type N = Node<Value>;

    fn single(node: N) -> Grammar<Value> {
        Grammar::from_node(node).unwrap()
    }

    #[test]
    fn literal() {
        assert_eq!(single(N::literal("")).parse("").unwrap(), Value::from(""));
        assert_eq!(single(N::literal("x")).parse("x").unwrap(), Value::from("x"));

        let err = single(N::literal("x")).parse("y").unwrap_err();
        assert_eq!(err.position, 0);
        assert_eq!(
            err.message,
            "Literal(\"x\") could not find string \"x\""
        );
        assert_eq!(
            err.to_string(),
            "Literal(\"x\") could not find string \"x\" at position 0 near \"y\""
        );
    }

    #[test]
    fn empty() {
        let grammar = single(N::empty());
        assert_eq!(grammar.parse("").unwrap(), Value::Null);
        assert_eq!(grammar.match_at("abc", 2).unwrap(), (2, Value::Null));

        let err = grammar.parse("a").unwrap_err();
        assert_eq!(err.message, "Parsing completed prematurely");
        assert_eq!(err.position, 0);
    }

    #[test]
    fn pattern() {
        let grammar = single(N::pattern("^boo").unwrap());
        assert!(grammar.match_at("aboo", 0).is_err());
        assert_eq!(grammar.match_at("aboo", 1).unwrap(), (4, Value::from("boo")));

        let grammar =
            single(N::pattern("^-?(0|[1-9][0-9]*)(\\.[0-9]*)?([eE][-+]?[0-9]*)?").unwrap());
        assert_eq!(
            grammar.match_at("-24.444E-009", 2).unwrap(),
            (12, Value::from("4.444E-009"))
        );

        let err = grammar.parse("x").unwrap_err();
        assert!(err.message.ends_with("could not match expression \"^-?(0|[1-9][0-9]*)(\\\\.[0-9]*)?([eE][-+]?[0-9]*)?\""));
    }

    #[test]
    fn pattern_captures() {
        let grammar = single(
            N::pattern("^([a-z]+)(=([0-9]+))?")
                .unwrap()
                .transform(Value::List),
        );
        assert_eq!(
            grammar.parse("key=42").unwrap(),
            Value::from(vec!["key=42", "key", "=42", "42"])
        );
        assert_eq!(
            grammar.parse("key").unwrap(),
            Value::List(vec![
                Value::from("key"),
                Value::from("key"),
                Value::Null,
                Value::Null
            ])
        );
    }

    #[test]
    fn utf8_char() {
        let grammar = single(N::utf8_char());
        assert!(grammar.parse("").is_err());
        assert_eq!(grammar.parse("\u{2665}").unwrap(), Value::from("\u{2665}"));
        assert_eq!(
            grammar.match_at(b"A\xC2\xAF\xE2\x99\xA5", 0).unwrap(),
            (1, Value::from("A"))
        );
        assert_eq!(
            grammar.match_at(b"\xEF\xBB\xBF", 0).unwrap(),
            (3, Value::from("\u{FEFF}"))
        );

        for input in [
            &b"\xF4\x90\x80\x80"[..],
            b"\xC0\xA6",
            b"\xC3\xFF",
            b"\xFF",
            b"\xC2",
            b"\x00",
            b"\xED\xA0\x80",
            b"\xED\xBF\xBF",
        ] {
            assert!(grammar.match_at(input, 0).is_err(), "{input:?}");
        }

        let err = grammar.parse(b"\xC0\xA6").unwrap_err();
        assert_eq!(
            err.message,
            "Utf8Char could not find a UTF-8 character (overlong encoding of U+0026)"
        );
    }

    #[test]
    fn utf8_char_blacklist() {
        let grammar = single(N::star(N::utf8_char_except(["\"", "\u{2665}"])));
        assert_eq!(
            grammar.match_at("ab\u{2665}", 0).unwrap(),
            (2, Value::from(vec!["a", "b"]))
        );
        assert_eq!(grammar.match_at("\"", 0).unwrap(), (0, Value::List(vec![])));
    }

    #[test]
    fn until() {
        let grammar = single(N::until(["*/", "\n"]).unwrap());
        assert_eq!(
            grammar.match_at("comment */ rest", 0).unwrap(),
            (8, Value::from("comment "))
        );
        assert_eq!(grammar.match_at("a\nb */", 0).unwrap(), (1, Value::from("a")));
        assert_eq!(grammar.parse("to the end").unwrap(), Value::from("to the end"));

        let err = grammar.match_at("*/", 0).unwrap_err();
        assert_eq!(err.message, "Until([\"*/\", \"\\n\"]) did not match anything");
        assert!(grammar.parse("").is_err());
    }

    #[test]
    fn sequence() {
        init_test_logger();

        let grammar = single(N::sequence([N::literal("a"), N::literal("b")]));
        assert_eq!(grammar.parse("ab").unwrap(), Value::from(vec!["a", "b"]));

        let err = grammar.parse("a").unwrap_err();
        assert_eq!(err.position, 1);
        assert!(err.message.starts_with("Literal(\"b\")"));

        let grammar = single(N::sequence(Vec::<Child<Value>>::new()));
        assert_eq!(grammar.parse("").unwrap(), Value::List(vec![]));
    }

    #[test]
    fn choice_is_first_match() {
        let grammar = single(
            N::choice([N::literal("abc"), N::literal("ab"), N::literal("a")]).unwrap(),
        );
        assert_eq!(grammar.match_at("abcd", 0).unwrap(), (3, Value::from("abc")));
        assert_eq!(grammar.match_at("abd", 0).unwrap(), (2, Value::from("ab")));

        // the shorter alternative wins when listed first, even though the longer one would
        // consume all input
        let grammar = single(N::choice([N::literal("a"), N::literal("ab")]).unwrap());
        assert!(grammar.parse("ab").is_err());

        let err = grammar.parse("x").unwrap_err();
        assert_eq!(
            err.message,
            "Choice(Literal(\"a\"), Literal(\"ab\")) could not match another alternative"
        );
    }

    #[test]
    fn bounded_repetition() {
        let grammar = single(N::repeat(N::literal("f"), 1, 2).unwrap());
        assert_eq!(grammar.parse("f").unwrap(), Value::from(vec!["f"]));
        assert_eq!(grammar.parse("ff").unwrap(), Value::from(vec!["f", "f"]));

        let err = grammar.parse("fff").unwrap_err();
        assert_eq!(err.message, "Parsing completed prematurely");
        assert_eq!(err.position, 2);

        let err = grammar.parse("").unwrap_err();
        assert!(err.message.starts_with("Literal(\"f\")"));

        let grammar = single(N::repeat(N::literal("f"), 0, 0).unwrap());
        assert_eq!(grammar.match_at("ff", 0).unwrap(), (0, Value::List(vec![])));

        let grammar = single(N::star(N::literal("f")));
        assert_eq!(
            grammar.parse("ffff").unwrap().as_list().map(<[_]>::len),
            Some(4)
        );
    }

    #[test]
    fn unbounded_repetition_stops_on_empty_match() {
        // a word boundary never matches the empty string, so this passes the loop check
        let grammar = single(N::star(N::pattern("^\\b").unwrap()));
        assert_eq!(grammar.match_at("ab", 0).unwrap(), (0, Value::List(vec![])));
        assert!(grammar.parse("ab").is_err());

        let grammar = single(N::sequence([
            Child::from(N::repeat(N::pattern("^\\b").unwrap(), 1, None).unwrap()),
            N::literal("ab").into(),
        ]));
        assert_eq!(
            grammar.parse("ab").unwrap(),
            Value::List(vec![Value::from(vec![""]), Value::from("ab")])
        );
    }

    #[test]
    fn transforms_run_bottom_up() {
        let digit = N::pattern("^[0-9]")
            .unwrap()
            .transform(|args| {
                let text = args[0].as_str().unwrap_or_default();
                Value::Int(text.parse().unwrap_or_default())
            });
        let grammar = single(N::star(digit).transform(|args| {
            Value::Int(args.iter().filter_map(Value::as_int).sum())
        }));
        assert_eq!(grammar.parse("12345").unwrap(), Value::Int(15));
    }

    #[test]
    fn left_subtraction() {
        init_test_logger();

        let number = || {
            N::pattern("^(0|[1-9][0-9]*)").unwrap().transform(|args| {
                let text = args[0].as_str().unwrap_or_default();
                Value::Int(text.parse().unwrap_or_default())
            })
        };

        // S -> N | S P is rejected
        let result = Grammar::new(
            "S",
            [
                (
                    "S",
                    N::choice([Child::from("N"), N::sequence(["S", "P"]).into()]).unwrap(),
                ),
                ("P", N::sequence([Child::from(N::literal("-")), "N".into()]).transform(transform::nth(1))),
                ("N", number()),
            ],
        );
        assert!(matches!(
            result,
            Err(crate::GrammarError::LeftRecursion { rule }) if &*rule == "S"
        ));

        // S -> N P*
        let grammar = Grammar::new(
            "S",
            [
                (
                    "S",
                    N::sequence([Child::from("N"), N::star("P").into()]).transform(|args| {
                        let mut args = args.into_iter();
                        let first = args.next().and_then(|n| n.as_int()).unwrap_or_default();
                        let rest = args.next().unwrap_or_default();
                        let rest = rest.as_list().unwrap_or_default();
                        Value::Int(
                            rest.iter()
                                .filter_map(Value::as_int)
                                .fold(first, |minuend, subtrahend| minuend - subtrahend),
                        )
                    }),
                ),
                ("P", N::sequence([Child::from(N::literal("-")), "N".into()]).transform(transform::nth(1))),
                ("N", number()),
            ],
        )
        .unwrap();

        assert_eq!(grammar.parse("5-4-3").unwrap(), Value::Int(-2));
        assert_eq!(grammar.parse("10").unwrap(), Value::Int(10));
        assert!(grammar.parse("5-").is_err());
    }

    #[test]
    fn grammar_transform() {
        let grammar = single(N::star(N::literal("a"))).transform(|value| {
            Value::Int(value.as_list().map_or(0, |items| items.len() as i64))
        });
        assert_eq!(grammar.parse("aaa").unwrap(), Value::Int(3));
        assert_eq!(grammar.match_at("aab", 0).unwrap(), (2, Value::Int(2)));
        assert!(grammar.parse("aab").is_err());

        // without one, the value of the start definition is returned as is
        let grammar = single(N::star(N::literal("a")));
        assert_eq!(grammar.parse("a").unwrap(), Value::from(vec!["a"]));
    }

    #[test]
    fn repeated_parses_are_identical() {
        let grammar = Grammar::new(
            "S",
            [
                ("S", N::star("W")),
                ("W", N::choice([N::pattern("^[a-z]+").unwrap(), N::literal(" ")]).unwrap()),
            ],
        )
        .unwrap();

        let first = grammar.parse("hello world");
        for _ in 0..3 {
            assert_eq!(grammar.parse("hello world"), first);
        }
        assert_eq!(grammar.parse("hello World"), grammar.parse("hello World"));
    }

    #[test]
    fn parse_from_many_threads() {
        let grammar = Grammar::new(
            "S",
            [("S", N::star(N::choice([N::literal("a"), N::literal("b")]).unwrap()))],
        )
        .unwrap();

        std::thread::scope(|scope| {
            for i in 0..4 {
                let grammar = &grammar;
                scope.spawn(move || {
                    let input = "ab".repeat(i + 1);
                    let value = grammar.parse(&input).unwrap();
                    assert_eq!(value.as_list().map(<[_]>::len), Some(input.len()));
                });
            }
        });
    }
}
