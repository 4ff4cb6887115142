#![forbid(unsafe_code)]
//! chunkwise-compute: evaluate expressions against bound backends.
//!
//! `compute` / `compute_with` / `Compute::run` take an `Expr` and return an
//! `Output`: a scalar, a plain record stream, or a lazy chunk stream. Chunked
//! backends are processed chunk by chunk; chunk-local work is queued as
//! stages and everything else is reduced to per-chunk partials that are
//! merged in chunk order. All per-chunk work runs through a `ChunkExecutor`.

pub mod backend;
pub mod engine;
pub mod executor;
pub mod kernels;
pub mod output;
pub mod stream;

mod chunked;
mod group;
mod join;
mod reduce;
mod row;

pub use backend::{Backend, Bindings, TableSource};
pub use engine::{compute, compute_with, Compute};
#[cfg(feature = "rayon")]
pub use executor::RayonExecutor;
pub use executor::{map_ordered, ChunkExecutor, Job, SerialExecutor};
pub use output::Output;
pub use stream::{ChunkStream, DatumStream, Stage};
