//! Data backends and symbol bindings.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chunkwise_chunks::ChunkIterable;
use chunkwise_core::config::ComputeConfig;
use chunkwise_core::error::Result;
use chunkwise_core::types::{Datum, RowBatch};
use chunkwise_expr::Expr;

use crate::output::Output;
use crate::stream::DatumStream;

/// An external data source, e.g. a proxy for a relational table.
///
/// Sources that can evaluate expressions natively override `compute`; the
/// engine offers every expression that reads only from this source and falls
/// back to `scan` plus the generic algorithms when `compute` returns `None`.
pub trait TableSource: Send + Sync {
    fn name(&self) -> &str;

    /// All records, in the source's natural order.
    fn scan(&self) -> Result<DatumStream>;

    fn compute(&self, _expr: &Expr) -> Option<Result<Output>> {
        None
    }
}

#[derive(Clone)]
pub enum Backend {
    /// A flat in-memory sequence of records or scalars.
    Memory(Arc<Vec<Datum>>),
    /// A columnar frame, read as rows.
    Frame(Arc<RowBatch>),
    Chunked(ChunkIterable),
    Source(Arc<dyn TableSource>),
}

impl Backend {
    pub fn memory(data: Vec<Datum>) -> Self {
        Backend::Memory(Arc::new(data))
    }

    pub fn frame(batch: RowBatch) -> Self {
        Backend::Frame(Arc::new(batch))
    }

    pub fn chunked(iterable: ChunkIterable) -> Self {
        Backend::Chunked(iterable)
    }

    pub fn source(source: impl TableSource + 'static) -> Self {
        Backend::Source(Arc::new(source))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Backend::Memory(_) => "memory",
            Backend::Frame(_) => "frame",
            Backend::Chunked(_) => "chunked",
            Backend::Source(_) => "source",
        }
    }

    /// Wrap in-memory data into a chunked iterable of `config.chunksize`.
    /// Chunked and external backends are returned unchanged.
    pub fn into_chunked(self, config: &ComputeConfig) -> Result<Self> {
        match self {
            Backend::Memory(data) => Ok(Backend::Chunked(ChunkIterable::new(
                chunkwise_chunks::VecSource::from_arc(data),
                config.chunksize,
            )?)),
            Backend::Frame(batch) => Ok(Backend::Chunked(ChunkIterable::new(
                chunkwise_chunks::FrameSource::from_arc(batch),
                config.chunksize,
            )?)),
            other => Ok(other),
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Memory(data) => write!(f, "Memory({} records)", data.len()),
            Backend::Frame(batch) => write!(f, "Frame({} rows)", batch.num_rows()),
            Backend::Chunked(it) => write!(f, "{it:?}"),
            Backend::Source(src) => write!(f, "Source({})", src.name()),
        }
    }
}

impl From<Vec<Datum>> for Backend {
    fn from(data: Vec<Datum>) -> Self {
        Backend::memory(data)
    }
}

impl From<RowBatch> for Backend {
    fn from(batch: RowBatch) -> Self {
        Backend::frame(batch)
    }
}

impl From<ChunkIterable> for Backend {
    fn from(it: ChunkIterable) -> Self {
        Backend::Chunked(it)
    }
}

/// Symbol name to backend.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    map: HashMap<String, Backend>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `insert`.
    pub fn with(mut self, name: impl Into<String>, backend: impl Into<Backend>) -> Self {
        self.insert(name, backend);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, backend: impl Into<Backend>) {
        self.map.insert(name.into(), backend.into());
    }

    pub fn get(&self, name: &str) -> Option<&Backend> {
        self.map.get(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
