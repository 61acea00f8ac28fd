//! Runtime support shared by grammars and their clients: the UTF-8 codec, the value model
//! and the parse error.

pub mod error;
pub mod utf8;
pub mod value;

pub use error::ParseError;
pub use value::{ParseValue, Value};
