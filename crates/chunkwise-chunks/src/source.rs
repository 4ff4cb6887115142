//! Chunk sources: random-access slices, frames, and single-pass streams.

use std::sync::{Arc, Mutex};

use chunkwise_core::error::{Error, Result};
use chunkwise_core::types::{Datum, RowBatch};

use crate::Chunk;

/// The `index`-th run of `chunksize` elements of `source`.
///
/// The last chunk may be shorter; past the end the result is empty.
pub fn get_chunk<T: Clone>(source: &[T], index: usize, chunksize: usize) -> Vec<T> {
    let start = index.saturating_mul(chunksize);
    if start >= source.len() {
        return Vec::new();
    }
    let end = start.saturating_add(chunksize).min(source.len());
    source[start..end].to_vec()
}

/// Produces the chunks of one dataset.
pub trait ChunkSource: Send + Sync {
    /// Chunk `index` for the given chunk size, or `None` past the end.
    fn read_chunk(&self, index: usize, chunksize: usize) -> Result<Option<Chunk>>;

    /// Whether chunks can be read again after a full pass.
    fn is_restartable(&self) -> bool;
}

/// A flat in-memory sequence.
#[derive(Debug, Clone)]
pub struct VecSource {
    data: Arc<Vec<Datum>>,
}

impl VecSource {
    pub fn new(data: Vec<Datum>) -> Self {
        Self {
            data: Arc::new(data),
        }
    }

    pub fn from_arc(data: Arc<Vec<Datum>>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ChunkSource for VecSource {
    fn read_chunk(&self, index: usize, chunksize: usize) -> Result<Option<Chunk>> {
        let chunk = get_chunk(&self.data, index, chunksize);
        Ok((!chunk.is_empty()).then_some(chunk))
    }

    fn is_restartable(&self) -> bool {
        true
    }
}

/// Row slices of a columnar frame.
#[derive(Debug, Clone)]
pub struct FrameSource {
    batch: Arc<RowBatch>,
}

impl FrameSource {
    pub fn new(batch: RowBatch) -> Self {
        Self {
            batch: Arc::new(batch),
        }
    }

    pub fn from_arc(batch: Arc<RowBatch>) -> Self {
        Self { batch }
    }
}

impl ChunkSource for FrameSource {
    fn read_chunk(&self, index: usize, chunksize: usize) -> Result<Option<Chunk>> {
        let Some(offset) = index.checked_mul(chunksize) else {
            return Ok(None);
        };
        if offset >= self.batch.num_rows() {
            return Ok(None);
        }
        let slice = self.batch.slice(offset, chunksize);
        Ok(Some(slice.rows().collect()))
    }

    fn is_restartable(&self) -> bool {
        true
    }
}

type BoxedRecords = Box<dyn Iterator<Item = Result<Datum>> + Send>;

struct StreamState {
    records: BoxedRecords,
    next_index: usize,
}

/// A one-shot stream of records.
///
/// Chunks must be requested in index order, each exactly once; anything
/// else (including starting a second pass) fails with
/// `Error::SourceExhausted`. Expressions that read the stream twice, such as
/// `s - s.mean()`, cannot run over it; bind a restartable source instead.
pub struct StreamSource {
    state: Mutex<StreamState>,
}

impl StreamSource {
    pub fn new<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Datum>,
        I::IntoIter: Send + 'static,
    {
        Self::fallible(records.into_iter().map(Ok))
    }

    /// A stream whose records may fail to load.
    pub fn fallible<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Result<Datum>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            state: Mutex::new(StreamState {
                records: Box::new(records.into_iter()),
                next_index: 0,
            }),
        }
    }
}

impl std::fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource").finish_non_exhaustive()
    }
}

impl ChunkSource for StreamSource {
    fn read_chunk(&self, index: usize, chunksize: usize) -> Result<Option<Chunk>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Invariant("stream source lock poisoned".into()))?;
        if index != state.next_index {
            return Err(Error::SourceExhausted(format!(
                "single-pass stream asked for chunk {index} after {} chunk reads",
                state.next_index
            )));
        }
        state.next_index += 1;

        let mut chunk = Vec::with_capacity(chunksize);
        for record in state.records.by_ref().take(chunksize) {
            chunk.push(record?);
        }
        Ok((!chunk.is_empty()).then_some(chunk))
    }

    fn is_restartable(&self) -> bool {
        false
    }
}
