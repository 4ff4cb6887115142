#![forbid(unsafe_code)]
//! chunkwise-chunks: split a logical dataset into bounded chunks.
//!
//! A `ChunkSource` knows how to produce chunk `i` of a dataset; a
//! `ChunkIterable` pairs a source with a chunk size and yields chunks lazily
//! in index order. Whether an iterable can be walked more than once is a
//! property of its source (`ChunkSource::is_restartable`).

pub mod iterable;
pub mod source;

use chunkwise_core::types::Datum;

/// An ordered, bounded run of records.
pub type Chunk = Vec<Datum>;

pub use iterable::{ChunkIter, ChunkIterable};
pub use source::{get_chunk, ChunkSource, FrameSource, StreamSource, VecSource};
