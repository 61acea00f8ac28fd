use std::fmt::Display;

use crate::node::Name;

/// A node or grammar definition is malformed. No grammar is produced.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum GrammarError {
    MissingStart { start: Name },
    DuplicateDefinition { name: Name },
    UnknownReference { name: Name, referrer: Name },
    LeftRecursion { rule: Name },
    /// An unbounded repetition of something that can match the empty string.
    NullableLoop { repetition: String, child: String },
    InvalidBounds { lower: u32, upper: u32 },
    UnanchoredPattern { pattern: String },
    InvalidPattern { pattern: String, message: String },
    EmptyChoice,
    EmptyLookahead,
}

impl std::error::Error for GrammarError {}
impl Display for GrammarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrammarError::MissingStart { start } => write!(
                f,
                "This grammar begins with rule '{start}' but no rule with this name was given"
            ),
            GrammarError::DuplicateDefinition { name } => {
                write!(f, "Rule '{name}' is defined more than once")
            }
            GrammarError::UnknownReference { name, referrer } => write!(
                f,
                "Rule '{referrer}' contains a reference to '{name}' which cannot be found"
            ),
            GrammarError::LeftRecursion { rule } => {
                write!(f, "This grammar is left-recursive in '{rule}'")
            }
            GrammarError::NullableLoop { repetition, child } => write!(
                f,
                "{repetition} has inner node {child}, which matches the empty string. This would loop forever when parsing"
            ),
            GrammarError::InvalidBounds { lower, upper } => write!(
                f,
                "Can't create a repetition with lower limit {lower} and upper limit {upper}"
            ),
            GrammarError::UnanchoredPattern { pattern } => {
                write!(f, "Pattern {pattern:?} doesn't anchor at the beginning of the string")
            }
            GrammarError::InvalidPattern { pattern, message } => {
                write!(f, "Pattern {pattern:?} is invalid\n{message}")
            }
            GrammarError::EmptyChoice => {
                write!(f, "Can't make a choice without at least one alternative")
            }
            GrammarError::EmptyLookahead => {
                write!(f, "Can't make a lookahead without at least one stop string")
            }
        }
    }
}
