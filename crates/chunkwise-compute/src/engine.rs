//! Compute entry points: evaluate an expression against bound backends.
//!
//! Evaluation is a single match over the expression kind. Row-wise chains
//! are fused into one per-chunk stage over their row base; reductions,
//! distinct, head, joins and group-bys consume the chunk stream of their
//! input with the chunk-then-merge drivers.

use std::sync::Arc;

use chunkwise_chunks::Chunk;
use chunkwise_core::config::ComputeConfig;
use chunkwise_core::error::{Error, Result};
use chunkwise_core::types::{Datum, Scalar};
use chunkwise_expr::{Expr, ExprKind, Symbol};

use crate::backend::{Backend, Bindings, TableSource};
use crate::executor::{ChunkExecutor, SerialExecutor};
use crate::group::{self, GroupSpec, GroupValue};
use crate::output::Output;
use crate::row::{Projector, RowExpr};
use crate::stream::{ChunkStream, DatumStream, Stage};
use crate::{chunked, join, kernels};

/// Owns the bindings, configuration and executor for compute calls.
pub struct Compute {
    bindings: Bindings,
    config: ComputeConfig,
    executor: Arc<dyn ChunkExecutor>,
    chunk_bindings: bool,
}

impl Compute {
    /// Serial execution with the default configuration.
    pub fn new(bindings: Bindings) -> Self {
        Self {
            bindings,
            config: ComputeConfig::default(),
            executor: Arc::new(SerialExecutor),
            chunk_bindings: false,
        }
    }

    pub fn with_config(mut self, config: ComputeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_executor(self, executor: impl ChunkExecutor + 'static) -> Self {
        self.with_shared_executor(Arc::new(executor))
    }

    pub fn with_shared_executor(mut self, executor: Arc<dyn ChunkExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Read in-memory and frame bindings as chunks of `config.chunksize`
    /// records, so they run through the same chunk-then-merge paths as
    /// chunked bindings.
    pub fn with_chunked_bindings(mut self) -> Self {
        self.chunk_bindings = true;
        self
    }

    pub fn config(&self) -> &ComputeConfig {
        &self.config
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Evaluate `expr`. Every symbol it references must be bound.
    pub fn run(&self, expr: &Expr) -> Result<Output> {
        self.config.validate()?;
        if let Some(missing) = expr
            .symbols()
            .into_iter()
            .find(|s| self.bindings.get(&s.name).is_none())
        {
            return Err(Error::UnboundSymbol(missing.name.clone()));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            expr = %expr,
            fingerprint = %expr.fingerprint().short(),
            executor = self.executor.name(),
            "compute"
        );

        self.eval(expr)
    }

    fn eval(&self, expr: &Expr) -> Result<Output> {
        if let Some(out) = self.pushdown(expr) {
            return out;
        }

        let is_scalar = expr.shape().is_scalar();
        match expr.kind() {
            ExprKind::Symbol(s) => self.leaf(s),
            ExprKind::Literal(v) => Ok(Output::Scalar(v.clone())),

            ExprKind::Binary { op, left, right } if is_scalar => {
                kernels::binary(*op, &self.scalar(left)?, &self.scalar(right)?).map(Output::Scalar)
            }
            ExprKind::Unary { op, operand } if is_scalar => {
                kernels::unary(*op, &self.scalar(operand)?).map(Output::Scalar)
            }
            ExprKind::Map { child, func } if is_scalar => {
                func.apply(&self.scalar(child)?).map(Output::Scalar)
            }
            ExprKind::DatePart { child, part } if is_scalar => {
                kernels::date_part(*part, &self.scalar(child)?).map(Output::Scalar)
            }

            _ if expr.is_elementwise() => {
                let base = required_base(expr.row_base(), expr)?;
                let scalar = self.operand(base);
                let projector = Projector::compile(expr, base, &scalar)?;
                self.rowwise(self.eval(base)?, None, projector)
            }

            ExprKind::Selection { child, predicate } => {
                let base = required_base(child.operand_base(), child)?;
                let scalar = self.operand(base);
                let keep = RowExpr::compile(predicate, base, &scalar)?;
                let projector = Projector::compile(child, base, &scalar)?;
                self.rowwise(self.eval(base)?, Some(keep), projector)
            }

            ExprKind::Reduction { child, kind } => {
                let input = self.chunk_stream(self.eval(child)?)?;
                chunked::reduce(input, *kind, expr.shape().data_type(), &expr.name())
                    .map(Output::Scalar)
            }
            ExprKind::Distinct { child } => chunked::distinct(self.eval(child)?),
            ExprKind::Head { child, n } => chunked::head(self.eval(child)?, *n),

            ExprKind::Join {
                left,
                right,
                layout,
            } => {
                let (probe, stage) = join::hash_join(self.eval(left)?, self.eval(right)?, layout)?;
                self.apply_stage(probe, stage)
            }

            ExprKind::By { grouper, apply } => {
                let base = required_base(grouper.operand_base(), grouper)?;
                let scalar = self.operand(base);
                let key = Projector::compile(grouper, base, &scalar)?;
                let values = apply
                    .iter()
                    .map(|(name, e)| match e.kind() {
                        ExprKind::Reduction { child, kind } => Ok(GroupValue {
                            name: name.clone(),
                            input: Projector::compile(child, base, &scalar)?,
                            kind: *kind,
                            output: e.shape().data_type(),
                        }),
                        _ => Err(Error::Invariant(format!(
                            "by() entry '{name}' is not a reduction: {e}"
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;

                let input = self.chunk_stream(self.eval(base)?)?;
                let rows = group::group(input, &GroupSpec { key, values })?;
                Ok(Output::Stream(Box::new(rows.into_iter().map(Ok))))
            }

            ExprKind::Binary { .. }
            | ExprKind::Unary { .. }
            | ExprKind::Map { .. }
            | ExprKind::DatePart { .. }
            | ExprKind::Column { .. }
            | ExprKind::Projection { .. } => Err(Error::Invariant(format!(
                "{expr} is neither scalar nor row-wise"
            ))),
        }
    }

    fn scalar(&self, expr: &Expr) -> Result<Scalar> {
        self.eval(expr)?.into_scalar()
    }

    /// Evaluates scalar operands that get folded into a row-wise chain over
    /// `base`. Folding reads the operand's sources before `base` is read, so
    /// a single-pass source shared by both is rejected up front.
    fn operand<'a>(&'a self, base: &'a Expr) -> impl Fn(&Expr) -> Result<Scalar> + 'a {
        move |e: &Expr| {
            let shared = base.symbols();
            let single_pass = e.symbols().into_iter().find(|s| {
                shared.iter().any(|b| b.name == s.name)
                    && matches!(
                        self.bindings.get(&s.name),
                        Some(Backend::Chunked(it)) if !it.is_restartable()
                    )
            });
            if let Some(s) = single_pass {
                return Err(Error::SourceExhausted(format!(
                    "'{}' is single-pass but {e} must read it before {base} does",
                    s.name
                )));
            }
            self.scalar(e)
        }
    }

    fn leaf(&self, symbol: &Symbol) -> Result<Output> {
        let mut backend = self
            .bindings
            .get(&symbol.name)
            .cloned()
            .ok_or_else(|| Error::UnboundSymbol(symbol.name.clone()))?;
        if self.chunk_bindings {
            backend = backend.into_chunked(&self.config)?;
        }
        let out = match backend {
            Backend::Chunked(it) => Output::Chunks(ChunkStream::from_iterable(
                &it,
                Arc::clone(&self.executor),
                self.config.max_in_flight_chunks,
            )),
            Backend::Memory(data) => Output::Stream(Box::new(
                (0..data.len()).map(move |i| Ok(data[i].clone())),
            )),
            Backend::Frame(batch) => Output::Stream(Box::new(
                (0..batch.num_rows()).filter_map(move |i| batch.row(i).map(Ok)),
            )),
            Backend::Source(src) => Output::Stream(src.scan()?),
        };
        if !symbol.shape.is_column() {
            return Ok(out);
        }
        // A column read from a one-column frame arrives as one-field rows.
        Ok(match out {
            Output::Chunks(c) => Output::Chunks(c.with_stage(|chunk: Chunk| -> Result<Chunk> {
                Ok(chunk.into_iter().map(bare).collect())
            })),
            Output::Stream(s) => Output::Stream(Box::new(s.map(|r| r.map(bare)))),
            scalar => scalar,
        })
    }

    /// Offer `expr` to a `TableSource` when every symbol in it is bound to
    /// that same source.
    fn pushdown(&self, expr: &Expr) -> Option<Result<Output>> {
        if matches!(expr.kind(), ExprKind::Symbol(_)) {
            return None;
        }
        let mut sources = expr
            .symbols()
            .into_iter()
            .map(|s| match self.bindings.get(&s.name) {
                Some(Backend::Source(src)) => Some(src),
                _ => None,
            });
        let first: &Arc<dyn TableSource> = sources.next()??;
        for other in sources {
            if !Arc::ptr_eq(first, other?) {
                return None;
            }
        }

        let out = first.compute(expr)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(source = first.name(), expr = %expr, "computed by source");

        Some(out)
    }

    fn batched(&self, records: DatumStream) -> ChunkStream {
        ChunkStream::from_records(
            records,
            self.config.batch_size,
            Arc::clone(&self.executor),
            self.config.max_in_flight_chunks,
        )
    }

    fn chunk_stream(&self, output: Output) -> Result<ChunkStream> {
        match output {
            Output::Chunks(c) => Ok(c),
            Output::Stream(s) => Ok(self.batched(s)),
            Output::Scalar(v) => Err(Error::Type(format!(
                "expected a sequence, got the scalar {v}"
            ))),
        }
    }

    /// Queue `stage` on chunked output; batch a plain stream, run the stage
    /// per batch and flatten it back into a stream.
    fn apply_stage(&self, output: Output, stage: Stage) -> Result<Output> {
        match output {
            Output::Chunks(c) => Ok(Output::Chunks(c.with_shared_stage(stage))),
            Output::Stream(s) => Ok(Output::Stream(
                self.batched(s).with_shared_stage(stage).into_records(),
            )),
            Output::Scalar(v) => Err(Error::Invariant(format!(
                "row-wise stage over the scalar {v}"
            ))),
        }
    }

    fn rowwise(&self, input: Output, keep: Option<RowExpr>, projector: Projector) -> Result<Output> {
        if keep.is_none() && projector.is_identity() {
            return Ok(input);
        }
        let stage: Stage = Arc::new(move |chunk: Chunk| -> Result<Chunk> {
            let mut out = Vec::with_capacity(chunk.len());
            for record in chunk {
                if let Some(keep) = &keep {
                    if !kernels::is_true(&keep.eval(&record)?)? {
                        continue;
                    }
                }
                out.push(projector.apply(record)?);
            }
            Ok(out)
        });
        self.apply_stage(input, stage)
    }
}

fn bare(record: Datum) -> Datum {
    match record {
        Datum::Row(mut fields) if fields.len() == 1 => Datum::Scalar(fields.remove(0)),
        other => other,
    }
}

fn required_base<'a>(base: Option<&'a Expr>, expr: &Expr) -> Result<&'a Expr> {
    base.ok_or_else(|| Error::Invariant(format!("{expr} has no sequence to read records from")))
}

/// Evaluate an expression with at most one symbol against `backend`.
pub fn compute(expr: &Expr, backend: impl Into<Backend>) -> Result<Output> {
    let mut bindings = Bindings::new();
    match expr.symbols().as_slice() {
        [] => {}
        [only] => bindings.insert(only.name.clone(), backend),
        [_, rest @ ..] => {
            let names: Vec<&str> = rest.iter().map(|s| s.name.as_str()).collect();
            return Err(Error::UnboundSymbol(names.join(", ")));
        }
    }
    Compute::new(bindings).run(expr)
}

/// Evaluate `expr` with serial execution against `bindings`.
pub fn compute_with(expr: &Expr, bindings: &Bindings) -> Result<Output> {
    Compute::new(bindings.clone()).run(expr)
}
