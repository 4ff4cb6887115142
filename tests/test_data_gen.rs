//! Sample data shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chunkwise::chunks::{Chunk, ChunkSource, VecSource};
use chunkwise::engine::{ChunkExecutor, Job};
use chunkwise::{symbol, ChunkIterable, DataType, Datum, Expr, Field, Result, RowBatch, Scalar, Schema};

pub fn accounts_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("amount", DataType::Int64, false),
    ])
}

/// `t`: the accounts table.
pub fn accounts() -> Expr {
    symbol("t", accounts_schema())
}

pub fn account(id: i64, name: &str, amount: i64) -> Datum {
    Datum::Row(vec![Scalar::I64(id), Scalar::Str(name.to_string()), Scalar::I64(amount)])
}

pub fn accounts_rows() -> Vec<Datum> {
    vec![
        account(1, "Alice", 100),
        account(2, "Bob", 200),
        account(3, "Alice", -300),
        account(4, "Charlie", 400),
        account(5, "Edith", 200),
    ]
}

pub fn accounts_chunked(chunksize: usize) -> ChunkIterable {
    ChunkIterable::from_vec(accounts_rows(), chunksize).expect("accounts iterable")
}

pub fn accounts_frame() -> RowBatch {
    let names: Vec<String> = accounts_schema().names();
    RowBatch::from_rows(&names, accounts_rows()).expect("accounts frame")
}

pub fn cities_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
    ])
}

/// `c`: the cities table.
pub fn cities() -> Expr {
    symbol("c", cities_schema())
}

pub fn cities_rows() -> Vec<Datum> {
    vec![
        Datum::Row(vec![Scalar::I64(1), "NYC".into()]),
        Datum::Row(vec![Scalar::I64(1), "Chicago".into()]),
        Datum::Row(vec![Scalar::I64(5), "Paris".into()]),
    ]
}

pub fn ints(values: &[i64]) -> Vec<Datum> {
    values.iter().map(|v| Datum::Scalar(Scalar::I64(*v))).collect()
}

pub fn strs(values: &[&str]) -> Vec<Datum> {
    values.iter().map(|v| Datum::Scalar((*v).into())).collect()
}

/// A restartable source that counts chunk reads.
#[derive(Debug, Clone)]
pub struct CountingSource {
    inner: Arc<VecSource>,
    reads: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new(data: Vec<Datum>) -> Self {
        Self {
            inner: Arc::new(VecSource::new(data)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ChunkSource for CountingSource {
    fn read_chunk(&self, index: usize, chunksize: usize) -> Result<Option<Chunk>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_chunk(index, chunksize)
    }

    fn is_restartable(&self) -> bool {
        true
    }
}

/// Runs jobs inline and counts them.
#[derive(Debug, Clone, Default)]
pub struct CountingExecutor {
    jobs: Arc<AtomicUsize>,
}

impl CountingExecutor {
    pub fn jobs(&self) -> usize {
        self.jobs.load(Ordering::SeqCst)
    }
}

impl ChunkExecutor for CountingExecutor {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn parallelism(&self) -> usize {
        2
    }

    fn run(&self, jobs: Vec<Job<'_>>) {
        self.jobs.fetch_add(jobs.len(), Ordering::SeqCst);
        for job in jobs {
            job();
        }
    }
}
