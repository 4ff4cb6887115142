//! Lazy record and chunk streams.
//!
//! A `ChunkStream` is a pull-based pipeline: raw chunks come from a source,
//! chunk-local stages are queued on the stream, and nothing runs until a
//! consumer pulls. Each pull takes up to `width` raw chunks and runs all
//! queued stages on them as one executor batch.

use std::collections::VecDeque;
use std::sync::Arc;

use chunkwise_chunks::{Chunk, ChunkIterable};
use chunkwise_core::error::Result;
use chunkwise_core::types::Datum;

use crate::executor::{map_ordered, ChunkExecutor};

/// A lazily produced sequence of records.
pub type DatumStream = Box<dyn Iterator<Item = Result<Datum>> + Send>;

/// A chunk-local transform.
pub type Stage = Arc<dyn Fn(Chunk) -> Result<Chunk> + Send + Sync>;

type RawChunks = Box<dyn Iterator<Item = Result<Chunk>> + Send>;

pub struct ChunkStream {
    chunks: RawChunks,
    stages: Vec<Stage>,
    executor: Arc<dyn ChunkExecutor>,
    width: usize,
    ready: VecDeque<Result<Chunk>>,
    done: bool,
}

impl ChunkStream {
    /// `max_in_flight` caps how many chunks one pull hands to the executor;
    /// the executor's own parallelism caps it further.
    pub fn new<I>(chunks: I, executor: Arc<dyn ChunkExecutor>, max_in_flight: usize) -> Self
    where
        I: Iterator<Item = Result<Chunk>> + Send + 'static,
    {
        let width = max_in_flight.min(executor.parallelism()).max(1);
        Self {
            chunks: Box::new(chunks),
            stages: Vec::new(),
            executor,
            width,
            ready: VecDeque::new(),
            done: false,
        }
    }

    pub fn from_iterable(
        iterable: &ChunkIterable,
        executor: Arc<dyn ChunkExecutor>,
        max_in_flight: usize,
    ) -> Self {
        Self::new(iterable.iter(), executor, max_in_flight)
    }

    /// Group a plain record stream into chunks of `batch_size` records.
    pub fn from_records(
        records: DatumStream,
        batch_size: usize,
        executor: Arc<dyn ChunkExecutor>,
        max_in_flight: usize,
    ) -> Self {
        Self::new(
            Batches {
                records,
                size: batch_size.max(1),
                done: false,
            },
            executor,
            max_in_flight,
        )
    }

    /// Queue a chunk-local transform after the existing ones.
    pub fn with_stage<F>(self, stage: F) -> Self
    where
        F: Fn(Chunk) -> Result<Chunk> + Send + Sync + 'static,
    {
        self.with_shared_stage(Arc::new(stage))
    }

    pub fn with_shared_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Override how many raw chunks one pull may take.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn executor(&self) -> &Arc<dyn ChunkExecutor> {
        &self.executor
    }

    /// Pull the next batch of raw chunks and run the stages plus `finish` on
    /// each. A source error ends the stream after the chunks already pulled.
    fn pull_batch<P: Send>(
        &mut self,
        finish: &(dyn Fn(Chunk) -> Result<P> + Sync),
    ) -> Option<Vec<Result<P>>> {
        if self.done {
            return None;
        }
        let mut raw = Vec::with_capacity(self.width);
        let mut failure = None;
        while raw.len() < self.width {
            match self.chunks.next() {
                Some(Ok(chunk)) => raw.push(chunk),
                Some(Err(e)) => {
                    failure = Some(e);
                    self.done = true;
                    break;
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if raw.is_empty() && failure.is_none() {
            return None;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            chunks = raw.len(),
            stages = self.stages.len(),
            executor = self.executor.name(),
            "chunk batch"
        );

        let stages = &self.stages;
        let job = |chunk: Chunk| -> Result<P> {
            let mut chunk = chunk;
            for stage in stages {
                chunk = stage(chunk)?;
            }
            finish(chunk)
        };
        let mut out = map_ordered(self.executor.as_ref(), raw, &job);
        out.extend(failure.map(Err));
        Some(out)
    }

    /// Run the pipeline to the end, turning each chunk into a partial result
    /// with `partial` and folding partials in chunk order with `merge`.
    pub fn fold_partials<P, F, M>(mut self, partial: F, mut merge: M) -> Result<()>
    where
        P: Send,
        F: Fn(Chunk) -> Result<P> + Sync,
        M: FnMut(P) -> Result<()>,
    {
        while let Some(batch) = self.pull_batch(&partial) {
            for result in batch {
                merge(result?)?;
            }
        }
        Ok(())
    }

    /// Flatten into a record stream.
    pub fn into_records(self) -> DatumStream {
        Box::new(self.flat_map(|chunk| {
            let (records, failure) = match chunk {
                Ok(records) => (records, None),
                Err(e) => (Vec::new(), Some(e)),
            };
            records.into_iter().map(Ok).chain(failure.map(Err))
        }))
    }
}

impl Iterator for ChunkStream {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ready.is_empty() {
            let identity = |chunk: Chunk| -> Result<Chunk> { Ok(chunk) };
            let batch = self.pull_batch(&identity)?;
            self.ready.extend(batch);
        }
        self.ready.pop_front()
    }
}

struct Batches {
    records: DatumStream,
    size: usize,
    done: bool,
}

impl Iterator for Batches {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut chunk = Vec::with_capacity(self.size);
        while chunk.len() < self.size {
            match self.records.next() {
                Some(Ok(d)) => chunk.push(d),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        (!chunk.is_empty()).then_some(Ok(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SerialExecutor;
    use chunkwise_core::error::Error;
    use chunkwise_core::types::Scalar;

    fn ints(range: std::ops::Range<i64>) -> Vec<Datum> {
        range.map(|i| Datum::Scalar(Scalar::I64(i))).collect()
    }

    fn serial() -> Arc<dyn ChunkExecutor> {
        Arc::new(SerialExecutor)
    }

    fn double(chunk: Chunk) -> Result<Chunk> {
        Ok(chunk
            .into_iter()
            .map(|d| match d {
                Datum::Scalar(Scalar::I64(v)) => Datum::Scalar(Scalar::I64(v * 2)),
                other => other,
            })
            .collect())
    }

    #[test]
    fn stages_apply_in_order_and_flatten() {
        let it = ChunkIterable::from_vec(ints(0..5), 2).unwrap();
        let records: Vec<Datum> = ChunkStream::from_iterable(&it, serial(), 4)
            .with_stage(double)
            .with_stage(|c: Chunk| Ok(c.into_iter().rev().collect()))
            .into_records()
            .collect::<Result<_>>()
            .unwrap();
        let expected: Vec<Datum> = [2, 0, 6, 4, 8]
            .into_iter()
            .map(|v| Datum::Scalar(Scalar::I64(v)))
            .collect();
        assert_eq!(records, expected);
    }

    #[test]
    fn plain_records_are_batched() {
        let records: DatumStream = Box::new(ints(0..7).into_iter().map(Ok));
        let sizes: Vec<usize> = ChunkStream::from_records(records, 3, serial(), 2)
            .map(|c| c.unwrap().len())
            .collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn partials_fold_in_chunk_order() {
        let it = ChunkIterable::from_vec(ints(0..5), 2).unwrap();
        let mut seen = Vec::new();
        ChunkStream::from_iterable(&it, serial(), 4)
            .fold_partials(
                |c: Chunk| Ok(c.len()),
                |n| {
                    seen.push(n);
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(seen, vec![2, 2, 1]);
    }

    #[test]
    fn stage_errors_surface_to_the_consumer() {
        let it = ChunkIterable::from_vec(ints(0..4), 2).unwrap();
        let result: Result<Vec<Datum>> = ChunkStream::from_iterable(&it, serial(), 1)
            .with_stage(|_| Err(Error::Arithmetic("boom".into())))
            .into_records()
            .collect();
        assert!(matches!(result, Err(Error::Arithmetic(_))));
    }
}
