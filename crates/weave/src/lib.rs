//! Parser combinators with static grammar checks.
//!
//! Nodes are built with the constructors on [`Node`] and handed to [`Grammar::new`] under
//! names, named nodes may refer to each other. Building a grammar resolves all references and
//! rejects left recursion and unbounded repetitions of nullable nodes, so that parsing with a
//! finished [`Grammar`] always terminates.

pub mod analysis;
pub mod error;
pub mod grammar;
pub mod node;
mod parse;
pub mod transform;

pub use error::GrammarError;
pub use grammar::{Grammar, NodeHandle, Rule};
pub use node::{Child, Name, Node, NodeKind, Transform};
pub use parse::{Failure, FailureKind, Match};
pub use weave_runtime::{self, utf8, ParseError, ParseValue, Value};

#[cfg(test)]
pub(crate) fn init_test_logger() {
    use std::str::FromStr;

    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "TRACE".to_owned());
    let level = log::LevelFilter::from_str(&level).unwrap_or(log::LevelFilter::Trace);

    // multiple tests race to install the logger, only the first one wins
    _ = simplelog::TestLogger::init(
        level,
        simplelog::ConfigBuilder::new()
            .set_time_format_custom(&[])
            .build(),
    );
}
