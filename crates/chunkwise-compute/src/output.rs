//! The three kinds of data a compute step can produce.

use std::fmt;

use chunkwise_chunks::Chunk;
use chunkwise_core::error::{Error, Result};
use chunkwise_core::types::{Datum, RowBatch, Scalar};
use chunkwise_expr::Expr;

use crate::stream::{ChunkStream, DatumStream};

pub enum Output {
    Scalar(Scalar),
    /// Records produced one at a time.
    Stream(DatumStream),
    /// Records produced chunk by chunk.
    Chunks(ChunkStream),
}

impl Output {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Output::Scalar(_) => "scalar",
            Output::Stream(_) => "stream",
            Output::Chunks(_) => "chunks",
        }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self, Output::Chunks(_))
    }

    pub fn into_scalar(self) -> Result<Scalar> {
        match self {
            Output::Scalar(s) => Ok(s),
            other => Err(Error::Type(format!(
                "expected a scalar result, got a {}",
                other.kind_name()
            ))),
        }
    }

    /// The records of a sequence result, chunks flattened in order.
    pub fn into_records(self) -> Result<DatumStream> {
        match self {
            Output::Stream(s) => Ok(s),
            Output::Chunks(c) => Ok(c.into_records()),
            Output::Scalar(s) => Err(Error::Type(format!(
                "expected a sequence result, got the scalar {s}"
            ))),
        }
    }

    pub fn into_vec(self) -> Result<Vec<Datum>> {
        self.into_records()?.collect()
    }

    /// Chunks as produced; a plain stream comes back as a single chunk.
    pub fn into_chunks(self) -> Result<Vec<Chunk>> {
        match self {
            Output::Chunks(c) => c.collect(),
            Output::Stream(s) => {
                let records: Vec<Datum> = s.collect::<Result<_>>()?;
                Ok(if records.is_empty() {
                    Vec::new()
                } else {
                    vec![records]
                })
            }
            Output::Scalar(s) => Err(Error::Type(format!(
                "expected a sequence result, got the scalar {s}"
            ))),
        }
    }

    /// Materialize as a frame whose columns carry `names`, in order.
    pub fn into_frame(self, names: &[String]) -> Result<RowBatch> {
        match self {
            Output::Scalar(s) => RowBatch::from_rows(names, [Datum::Scalar(s)]),
            sequence => {
                let mut batch = RowBatch::empty(names);
                for datum in sequence.into_records()? {
                    batch.push_row(datum?)?;
                }
                Ok(batch)
            }
        }
    }

    /// Materialize with the field names declared by `expr`'s shape.
    pub fn into_frame_for(self, expr: &Expr) -> Result<RowBatch> {
        self.into_frame(&expr.shape().names())
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Scalar(s) => f.debug_tuple("Scalar").field(s).finish(),
            Output::Stream(_) => f.write_str("Stream(..)"),
            Output::Chunks(c) => f
                .debug_struct("Chunks")
                .field("width", &c.width())
                .finish_non_exhaustive(),
        }
    }
}
