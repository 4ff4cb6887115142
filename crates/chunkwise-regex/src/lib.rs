#![forbid(unsafe_code)]
//! chunkwise-regex: route string inputs to handlers by regular expression.
//!
//! A `RegexDispatcher` is an explicit registry value (no global state). Each
//! entry pairs a pattern with a priority and a handler; dispatch picks the
//! highest-priority entry whose pattern fully matches the input, ignoring
//! letter case.

pub mod dispatcher;
pub mod error;

pub use dispatcher::{Handler, RegexDispatcher, TieBreak, DEFAULT_PRIORITY};
pub use error::DispatchError;
