//! Row-wise expressions compiled against their row base.
//!
//! A chain of column access, projection, arithmetic, map and date-part
//! nodes over one base is fused into a single `Projector` that turns each
//! base record into one output record. Scalar-valued operands are evaluated
//! once up front and embedded as constants.

use chunkwise_core::error::{Error, Result};
use chunkwise_core::types::{Datum, Scalar};
use chunkwise_expr::{BinaryOp, DatePart, Expr, ExprKind, MapFn, UnaryOp};

use crate::kernels;

/// Evaluates a scalar-shaped sub-expression.
pub(crate) type ScalarEval<'a> = dyn Fn(&Expr) -> Result<Scalar> + 'a;

#[derive(Debug, Clone)]
pub(crate) enum RowExpr {
    /// The record itself, for column-shaped bases.
    Item,
    Field(usize),
    Const(Scalar),
    Binary(BinaryOp, Box<RowExpr>, Box<RowExpr>),
    Unary(UnaryOp, Box<RowExpr>),
    Map(MapFn, Box<RowExpr>),
    DatePart(DatePart, Box<RowExpr>),
}

impl RowExpr {
    pub(crate) fn compile(expr: &Expr, base: &Expr, scalar: &ScalarEval<'_>) -> Result<RowExpr> {
        if expr.shape().is_scalar() {
            return Ok(match expr.kind() {
                ExprKind::Literal(v) => RowExpr::Const(v.clone()),
                _ => RowExpr::Const(scalar(expr)?),
            });
        }
        if expr.same_as(base) {
            return Ok(RowExpr::Item);
        }
        let boxed = |e: &Expr| RowExpr::compile(e, base, scalar).map(Box::new);
        match expr.kind() {
            ExprKind::Column { child, index, .. } => field_of(child, *index, base),
            ExprKind::Binary { op, left, right } => {
                Ok(RowExpr::Binary(*op, boxed(left)?, boxed(right)?))
            }
            ExprKind::Unary { op, operand } => Ok(RowExpr::Unary(*op, boxed(operand)?)),
            ExprKind::Map { child, func } => Ok(RowExpr::Map(func.clone(), boxed(child)?)),
            ExprKind::DatePart { child, part } => Ok(RowExpr::DatePart(*part, boxed(child)?)),
            _ => Err(not_rowwise(expr, base)),
        }
    }

    pub(crate) fn eval(&self, record: &Datum) -> Result<Scalar> {
        match self {
            // Single-column frames hand out one-field rows.
            RowExpr::Item => match record {
                Datum::Scalar(v) => Ok(v.clone()),
                Datum::Row(r) if r.len() == 1 => Ok(r[0].clone()),
                Datum::Row(_) => Err(Error::Type(format!(
                    "expected a scalar record, got {record}"
                ))),
            },
            RowExpr::Field(i) => record.field(*i).cloned().ok_or_else(|| {
                Error::Type(format!("record {record} has no field {i}"))
            }),
            RowExpr::Const(v) => Ok(v.clone()),
            RowExpr::Binary(op, l, r) => kernels::binary(*op, &l.eval(record)?, &r.eval(record)?),
            RowExpr::Unary(op, x) => kernels::unary(*op, &x.eval(record)?),
            RowExpr::Map(func, x) => func.apply(&x.eval(record)?),
            RowExpr::DatePart(part, x) => kernels::date_part(*part, &x.eval(record)?),
        }
    }
}

/// Field `index` of `child`, resolved through projections down to `base`.
fn field_of(child: &Expr, index: usize, base: &Expr) -> Result<RowExpr> {
    if child.same_as(base) {
        return Ok(RowExpr::Field(index));
    }
    match child.kind() {
        ExprKind::Projection {
            child: inner,
            indices,
            ..
        } => {
            let resolved = indices.get(index).copied().ok_or_else(|| {
                Error::Invariant(format!("projection {child} has no field {index}"))
            })?;
            field_of(inner, resolved, base)
        }
        _ => Err(not_rowwise(child, base)),
    }
}

fn not_rowwise(expr: &Expr, base: &Expr) -> Error {
    Error::Invariant(format!("{expr} is not computed row by row from {base}"))
}

/// Turns one base record into one output record.
#[derive(Debug, Clone)]
pub(crate) enum Projector {
    Identity,
    Scalar(RowExpr),
    Record(Vec<RowExpr>),
}

impl Projector {
    pub(crate) fn compile(expr: &Expr, base: &Expr, scalar: &ScalarEval<'_>) -> Result<Projector> {
        if expr.same_as(base) {
            return Ok(Projector::Identity);
        }
        match expr.kind() {
            ExprKind::Projection { child, indices, .. } => indices
                .iter()
                .map(|&i| field_of(child, i, base))
                .collect::<Result<Vec<_>>>()
                .map(Projector::Record),
            _ if expr.shape().is_table() => Err(not_rowwise(expr, base)),
            _ => RowExpr::compile(expr, base, scalar).map(Projector::Scalar),
        }
    }

    pub(crate) fn is_identity(&self) -> bool {
        matches!(self, Projector::Identity)
    }

    pub(crate) fn apply(&self, record: Datum) -> Result<Datum> {
        match self {
            Projector::Identity => Ok(record),
            Projector::Scalar(e) => e.eval(&record).map(Datum::Scalar),
            Projector::Record(fields) => fields
                .iter()
                .map(|f| f.eval(&record))
                .collect::<Result<Vec<_>>>()
                .map(Datum::Row),
        }
    }
}
