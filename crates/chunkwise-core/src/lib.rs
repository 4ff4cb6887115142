#![forbid(unsafe_code)]
//! chunkwise-core: values, records, frames, schemas, errors, and config.
//!
//! Everything here is pure data. Expression trees live in `chunkwise-expr`,
//! chunking in `chunkwise-chunks`, and evaluation in `chunkwise-compute`.

pub mod config;
pub mod error;
pub mod hash;
pub mod prelude;
pub mod schema;
pub mod types;

pub use error::{Error, Result};
