//! `ChunkIterable`: a chunk source paired with a chunk size.

use std::fmt;
use std::sync::Arc;

use chunkwise_core::error::{Error, Result};
use chunkwise_core::types::{Datum, RowBatch};

use crate::source::{ChunkSource, FrameSource, StreamSource, VecSource};
use crate::Chunk;

/// A dataset that is consumed chunk by chunk.
///
/// Cloning is cheap and shares the source. Each call to `iter` starts a new
/// pass from chunk 0; for single-pass sources a second pass fails with
/// `Error::SourceExhausted` on its first chunk.
#[derive(Clone)]
pub struct ChunkIterable {
    source: Arc<dyn ChunkSource>,
    chunksize: usize,
}

impl ChunkIterable {
    pub fn new(source: impl ChunkSource + 'static, chunksize: usize) -> Result<Self> {
        Self::from_arc(Arc::new(source), chunksize)
    }

    pub fn from_arc(source: Arc<dyn ChunkSource>, chunksize: usize) -> Result<Self> {
        if chunksize == 0 {
            return Err(Error::Config("chunksize must be at least 1".into()));
        }
        Ok(Self { source, chunksize })
    }

    pub fn from_vec(data: Vec<Datum>, chunksize: usize) -> Result<Self> {
        Self::new(VecSource::new(data), chunksize)
    }

    pub fn from_frame(batch: RowBatch, chunksize: usize) -> Result<Self> {
        Self::new(FrameSource::new(batch), chunksize)
    }

    /// Wrap a one-shot record stream. Only expressions that read it in a
    /// single pass can run over the result.
    pub fn from_stream<I>(records: I, chunksize: usize) -> Result<Self>
    where
        I: IntoIterator<Item = Datum>,
        I::IntoIter: Send + 'static,
    {
        Self::new(StreamSource::new(records), chunksize)
    }

    pub fn chunksize(&self) -> usize {
        self.chunksize
    }

    pub fn is_restartable(&self) -> bool {
        self.source.is_restartable()
    }

    pub fn source(&self) -> &Arc<dyn ChunkSource> {
        &self.source
    }

    /// Read one chunk directly, or `None` past the end.
    pub fn chunk(&self, index: usize) -> Result<Option<Chunk>> {
        self.source.read_chunk(index, self.chunksize)
    }

    /// Start a pass over the chunks in index order.
    pub fn iter(&self) -> ChunkIter {
        ChunkIter {
            source: Arc::clone(&self.source),
            chunksize: self.chunksize,
            next: 0,
            done: false,
        }
    }

    /// All records of one pass, concatenated in chunk order.
    pub fn into_vec(self) -> Result<Vec<Datum>> {
        let mut out = Vec::new();
        for chunk in self.iter() {
            out.extend(chunk?);
        }
        Ok(out)
    }

    /// All records of one pass as a frame with the given column names.
    pub fn into_frame(self, names: &[String]) -> Result<RowBatch> {
        let mut batch = RowBatch::empty(names);
        for chunk in self.iter() {
            for datum in chunk? {
                batch.push_row(datum)?;
            }
        }
        Ok(batch)
    }
}

impl fmt::Debug for ChunkIterable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkIterable")
            .field("chunksize", &self.chunksize)
            .field("restartable", &self.is_restartable())
            .finish()
    }
}

impl IntoIterator for &ChunkIterable {
    type Item = Result<Chunk>;
    type IntoIter = ChunkIter;

    fn into_iter(self) -> ChunkIter {
        self.iter()
    }
}

/// One pass over a `ChunkIterable`. Stops after the first error.
pub struct ChunkIter {
    source: Arc<dyn ChunkSource>,
    chunksize: usize,
    next: usize,
    done: bool,
}

impl ChunkIter {
    /// Index of the next chunk to be read.
    pub fn position(&self) -> usize {
        self.next
    }
}

impl Iterator for ChunkIter {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.source.read_chunk(self.next, self.chunksize) {
            Ok(Some(chunk)) => {
                self.next += 1;
                Some(Ok(chunk))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
