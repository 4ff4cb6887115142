#![forbid(unsafe_code)]
//! chunkwise: expression compute over in-memory, chunked and external
//! backends, plus a priority-ordered regex dispatcher.
//!
//! The workspace crates are re-exported whole under their short names, and
//! the names most programs need are re-exported at the root.

pub use chunkwise_chunks as chunks;
pub use chunkwise_compute as engine;
pub use chunkwise_expr as expr;
pub use chunkwise_regex as dispatch;

pub use chunkwise_chunks::{get_chunk, Chunk, ChunkIterable, ChunkSource};
pub use chunkwise_compute::{
    compute, compute_with, Backend, Bindings, ChunkExecutor, Compute, Output, SerialExecutor,
    TableSource,
};
pub use chunkwise_core::prelude::*;
pub use chunkwise_expr::{by, join, join_on, lit, sequence, symbol, Expr};
pub use chunkwise_regex::{DispatchError, RegexDispatcher};
