//! Chunk-then-merge drivers for reductions, distinct and head.

use std::collections::HashSet;

use chunkwise_chunks::Chunk;
use chunkwise_core::error::{Error, Result};
use chunkwise_core::schema::DataType;
use chunkwise_core::types::Scalar;
use chunkwise_expr::ReductionKind;

use crate::output::Output;
use crate::reduce::Accumulator;
use crate::stream::{ChunkStream, DatumStream};

/// Reduce every chunk to a partial, then merge the partials.
pub(crate) fn reduce(
    stream: ChunkStream,
    kind: ReductionKind,
    output: Option<DataType>,
    label: &str,
) -> Result<Scalar> {
    let mut total = Accumulator::new(kind, output);
    stream.fold_partials(
        |chunk: Chunk| {
            let mut acc = Accumulator::new(kind, output);
            for record in chunk {
                acc.update(record)?;
            }
            Ok(acc)
        },
        |partial| total.merge(partial),
    )?;

    #[cfg(feature = "tracing")]
    tracing::trace!(reduction = label, "merged reduction partials");

    total.finish(label)
}

fn dedupe_chunk(chunk: Chunk) -> Chunk {
    let mut seen = HashSet::with_capacity(chunk.len());
    chunk.into_iter().filter(|d| seen.insert(d.clone())).collect()
}

/// Drop repeated records, keeping first occurrences in order.
pub(crate) fn dedupe(records: DatumStream) -> DatumStream {
    let mut seen = HashSet::new();
    Box::new(records.filter(move |r| match r {
        Ok(d) => seen.insert(d.clone()),
        Err(_) => true,
    }))
}

/// Deduplicate within each chunk first, then across chunks.
pub(crate) fn distinct(input: Output) -> Result<Output> {
    match input {
        Output::Chunks(c) => Ok(Output::Stream(dedupe(
            c.with_stage(|chunk| Ok(dedupe_chunk(chunk))).into_records(),
        ))),
        Output::Stream(s) => Ok(Output::Stream(dedupe(s))),
        Output::Scalar(s) => Err(Error::Invariant(format!("distinct of the scalar {s}"))),
    }
}

/// The first `n` records. Chunked input is pulled one chunk at a time so
/// that nothing past the last needed chunk is read.
pub(crate) fn head(input: Output, n: usize) -> Result<Output> {
    match input {
        Output::Stream(s) => Ok(Output::Stream(Box::new(s.take(n)))),
        Output::Chunks(c) => Ok(Output::Stream(Box::new(
            c.with_width(1).into_records().take(n),
        ))),
        Output::Scalar(s) => Err(Error::Invariant(format!("head of the scalar {s}"))),
    }
}
