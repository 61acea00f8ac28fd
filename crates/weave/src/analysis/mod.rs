//! Construction time passes. They run in order on a grammar which has not been handed out yet,
//! each relies on the results of the previous ones.

pub mod check;
pub mod nullable;
pub mod resolve;
