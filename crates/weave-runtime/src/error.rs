use std::{borrow::Cow, fmt::Display};

use bstr::{BStr, BString, ByteSlice};

/// Parsing failed, either because no node matched or the input was not fully consumed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParseError {
    pub message: Cow<'static, str>,
    /// Byte offset into the input.
    pub position: usize,
    /// Input starting at `position`, at most [`ParseError::SNIPPET_LEN`] bytes.
    pub snippet: BString,
}

impl ParseError {
    pub const SNIPPET_LEN: usize = 32;

    pub fn new(message: impl Into<Cow<'static, str>>, position: usize, input: &[u8]) -> ParseError {
        let start = position.min(input.len());
        let end = start.saturating_add(Self::SNIPPET_LEN).min(input.len());
        Self {
            message: message.into(),
            position,
            snippet: BString::from(&input[start..end]),
        }
    }

    pub fn snippet(&self) -> &BStr {
        self.snippet.as_bstr()
    }
}

impl std::error::Error for ParseError {}
impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at position {} near {:?}",
            self.message, self.position, self.snippet
        )
    }
}

#[test]
fn test_parse_error_snippet() {
    let input = [b'a'; 40];
    let err = ParseError::new("Parsing completed prematurely", 4, &input);
    assert_eq!(err.snippet.len(), ParseError::SNIPPET_LEN);

    let err = ParseError::new("nope", 2, b"abc");
    assert_eq!(err.snippet(), "c");
    assert_eq!(err.to_string(), "nope at position 2 near \"c\"");

    let err = ParseError::new("nope", 3, b"abc");
    assert!(err.snippet.is_empty());
}
