//! Mergeable reduction state.
//!
//! Each chunk folds its records into a fresh `Accumulator`; partials are
//! merged in chunk order and finished once. Merging is associative, so the
//! result does not depend on how the data was chunked.

use std::collections::HashSet;

use chunkwise_core::error::{Error, Result};
use chunkwise_core::schema::DataType;
use chunkwise_core::types::{Datum, Scalar};
use chunkwise_expr::ReductionKind;

#[derive(Debug, Clone)]
pub(crate) enum Accumulator {
    Count(i64),
    IntSum(i64),
    FloatSum(f64),
    Min(Option<Scalar>),
    Max(Option<Scalar>),
    Mean { sum: f64, count: i64 },
    Distinct(HashSet<Datum>),
}

impl Accumulator {
    /// Empty state for `kind` producing values of `output`.
    pub(crate) fn new(kind: ReductionKind, output: Option<DataType>) -> Self {
        match kind {
            ReductionKind::Count => Accumulator::Count(0),
            ReductionKind::Sum if output == Some(DataType::Float64) => Accumulator::FloatSum(0.0),
            ReductionKind::Sum => Accumulator::IntSum(0),
            ReductionKind::Min => Accumulator::Min(None),
            ReductionKind::Max => Accumulator::Max(None),
            ReductionKind::Mean => Accumulator::Mean { sum: 0.0, count: 0 },
            ReductionKind::NUnique => Accumulator::Distinct(HashSet::new()),
        }
    }

    pub(crate) fn update(&mut self, record: Datum) -> Result<()> {
        if let Accumulator::Distinct(seen) = self {
            seen.insert(record);
            return Ok(());
        }
        let value = match record {
            Datum::Scalar(Scalar::Null) => return Ok(()),
            Datum::Scalar(v) => v,
            // Whole records only reach `count`; a row is never null.
            Datum::Row(_) => {
                return match self {
                    Accumulator::Count(n) => {
                        *n += 1;
                        Ok(())
                    }
                    _ => Err(Error::Type("only count and nunique reduce whole records".into())),
                }
            }
        };

        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::IntSum(total) => {
                let v = value
                    .as_i64()
                    .ok_or_else(|| Error::Type(format!("cannot add {value} to an integer sum")))?;
                *total = checked_sum(*total, v)?;
            }
            Accumulator::FloatSum(total) => *total += numeric(&value)?,
            Accumulator::Min(best) => {
                if best.as_ref().map_or(true, |b| value.total_cmp(b).is_lt()) {
                    *best = Some(value);
                }
            }
            Accumulator::Max(best) => {
                if best.as_ref().map_or(true, |b| value.total_cmp(b).is_gt()) {
                    *best = Some(value);
                }
            }
            Accumulator::Mean { sum, count } => {
                *sum += numeric(&value)?;
                *count += 1;
            }
            Accumulator::Distinct(_) => {}
        }
        Ok(())
    }

    /// Fold `other` (a later partial) into `self`.
    pub(crate) fn merge(&mut self, other: Accumulator) -> Result<()> {
        match (self, other) {
            (Accumulator::Count(a), Accumulator::Count(b)) => *a += b,
            (Accumulator::IntSum(a), Accumulator::IntSum(b)) => *a = checked_sum(*a, b)?,
            (Accumulator::FloatSum(a), Accumulator::FloatSum(b)) => *a += b,
            (Accumulator::Min(a), Accumulator::Min(b)) => {
                if let Some(b) = b {
                    if a.as_ref().map_or(true, |x| b.total_cmp(x).is_lt()) {
                        *a = Some(b);
                    }
                }
            }
            (Accumulator::Max(a), Accumulator::Max(b)) => {
                if let Some(b) = b {
                    if a.as_ref().map_or(true, |x| b.total_cmp(x).is_gt()) {
                        *a = Some(b);
                    }
                }
            }
            (
                Accumulator::Mean { sum, count },
                Accumulator::Mean {
                    sum: other_sum,
                    count: other_count,
                },
            ) => {
                *sum += other_sum;
                *count += other_count;
            }
            (Accumulator::Distinct(a), Accumulator::Distinct(b)) => a.extend(b),
            (a, b) => {
                return Err(Error::Invariant(format!(
                    "cannot merge {a:?} with {b:?}"
                )))
            }
        }
        Ok(())
    }

    /// Final value; `label` names the reduction in errors.
    pub(crate) fn finish(self, label: &str) -> Result<Scalar> {
        match self {
            Accumulator::Count(n) => Ok(Scalar::I64(n)),
            Accumulator::IntSum(total) => Ok(Scalar::I64(total)),
            Accumulator::FloatSum(total) => Ok(Scalar::F64(total)),
            Accumulator::Min(best) | Accumulator::Max(best) => {
                best.ok_or_else(|| Error::EmptyReduction(label.to_string()))
            }
            Accumulator::Mean { count: 0, .. } => Err(Error::EmptyReduction(label.to_string())),
            Accumulator::Mean { sum, count } => Ok(Scalar::F64(sum / count as f64)),
            Accumulator::Distinct(seen) => Ok(Scalar::I64(seen.len() as i64)),
        }
    }
}

fn checked_sum(a: i64, b: i64) -> Result<i64> {
    a.checked_add(b)
        .ok_or_else(|| Error::Arithmetic(format!("integer overflow in sum: {a} + {b}")))
}

fn numeric(v: &Scalar) -> Result<f64> {
    v.as_f64()
        .ok_or_else(|| Error::Type(format!("expected a number, got {v}")))
}
