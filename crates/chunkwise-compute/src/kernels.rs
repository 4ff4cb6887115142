//! Scalar kernels for row-wise expressions.
//!
//! Nulls propagate through arithmetic and comparisons. Logical operators use
//! three-valued logic, and a null predicate keeps nothing. The sign of `%`
//! follows the divisor.

use std::cmp::Ordering;

use chrono::{Datelike, Timelike};
use chunkwise_core::error::{Error, Result};
use chunkwise_core::types::Scalar;
use chunkwise_expr::{BinaryOp, DatePart, UnaryOp};

pub fn binary(op: BinaryOp, l: &Scalar, r: &Scalar) -> Result<Scalar> {
    if op.is_logical() {
        return logical(op, l, r);
    }
    if l.is_null() || r.is_null() {
        return Ok(Scalar::Null);
    }
    if op.is_comparison() {
        return compare(op, l, r).map(Scalar::Bool);
    }
    arithmetic(op, l, r)
}

fn logical(op: BinaryOp, l: &Scalar, r: &Scalar) -> Result<Scalar> {
    let l = optional_bool(l)?;
    let r = optional_bool(r)?;
    let out = match (op, l, r) {
        (BinaryOp::And, Some(false), _) | (BinaryOp::And, _, Some(false)) => Some(false),
        (BinaryOp::And, Some(true), Some(true)) => Some(true),
        (BinaryOp::Or, Some(true), _) | (BinaryOp::Or, _, Some(true)) => Some(true),
        (BinaryOp::Or, Some(false), Some(false)) => Some(false),
        _ => None,
    };
    Ok(out.map(Scalar::Bool).unwrap_or(Scalar::Null))
}

fn optional_bool(v: &Scalar) -> Result<Option<bool>> {
    match v {
        Scalar::Null => Ok(None),
        Scalar::Bool(b) => Ok(Some(*b)),
        other => Err(Error::Type(format!("expected a boolean, got {other}"))),
    }
}

fn compare(op: BinaryOp, l: &Scalar, r: &Scalar) -> Result<bool> {
    use Scalar::*;

    let ord = match (l, r) {
        (Bool(a), Bool(b)) => Some(a.cmp(b)),
        (Str(a), Str(b)) => Some(a.cmp(b)),
        (Bin(a), Bin(b)) => Some(a.cmp(b)),
        (Date(a), Date(b)) => Some(a.cmp(b)),
        (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
        _ => match (l.as_i64(), r.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => match (l.as_f64(), r.as_f64()) {
                // NaN is unordered: every comparison but `!=` is false.
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => return Err(Error::Type(format!("cannot compare {l} with {r}"))),
            },
        },
    };

    Ok(match (op, ord) {
        (BinaryOp::Eq, ord) => ord == Some(Ordering::Equal),
        (BinaryOp::Ne, ord) => ord != Some(Ordering::Equal),
        (_, None) => false,
        (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
        (BinaryOp::Le, Some(o)) => o != Ordering::Greater,
        (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
        (BinaryOp::Ge, Some(o)) => o != Ordering::Less,
        (op, _) => return Err(Error::Invariant(format!("{op} is not a comparison"))),
    })
}

fn arithmetic(op: BinaryOp, l: &Scalar, r: &Scalar) -> Result<Scalar> {
    if let (Scalar::Str(a), Scalar::Str(b), BinaryOp::Add) = (l, r, op) {
        return Ok(Scalar::Str(format!("{a}{b}")));
    }

    if op != BinaryOp::Div {
        if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
            let out = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Rem if b == 0 => {
                    return Err(Error::Arithmetic(format!("{a} % 0")));
                }
                BinaryOp::Rem => a.checked_rem(b).map(|m| {
                    if m != 0 && (m < 0) != (b < 0) {
                        m + b
                    } else {
                        m
                    }
                }),
                _ => return Err(Error::Invariant(format!("{op} is not arithmetic"))),
            };
            return out
                .map(Scalar::I64)
                .ok_or_else(|| Error::Arithmetic(format!("integer overflow in {a} {op} {b}")));
        }
    }

    let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
        return Err(Error::Type(format!("cannot apply {op} to {l} and {r}")));
    };
    let out = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => {
            let m = a % b;
            if m != 0.0 && (m < 0.0) != (b < 0.0) {
                m + b
            } else {
                m
            }
        }
        _ => return Err(Error::Invariant(format!("{op} is not arithmetic"))),
    };
    Ok(Scalar::F64(out))
}

pub fn unary(op: UnaryOp, v: &Scalar) -> Result<Scalar> {
    match (op, v) {
        (_, Scalar::Null) => Ok(Scalar::Null),
        (UnaryOp::Neg, Scalar::I32(x)) => x
            .checked_neg()
            .map(Scalar::I32)
            .ok_or_else(|| Error::Arithmetic(format!("integer overflow in -{x}"))),
        (UnaryOp::Neg, Scalar::I64(x)) => x
            .checked_neg()
            .map(Scalar::I64)
            .ok_or_else(|| Error::Arithmetic(format!("integer overflow in -{x}"))),
        (UnaryOp::Neg, Scalar::F32(x)) => Ok(Scalar::F32(-x)),
        (UnaryOp::Neg, Scalar::F64(x)) => Ok(Scalar::F64(-x)),
        (UnaryOp::Not, Scalar::Bool(b)) => Ok(Scalar::Bool(!b)),
        (op, other) => Err(Error::Type(format!("cannot apply {op:?} to {other}"))),
    }
}

pub fn date_part(part: DatePart, v: &Scalar) -> Result<Scalar> {
    let int = |x: i64| -> Result<Scalar> { Ok(Scalar::I64(x)) };
    match (v, part) {
        (Scalar::Null, _) => Ok(Scalar::Null),
        (Scalar::Date(d), DatePart::Year) => int(d.year() as i64),
        (Scalar::Date(d), DatePart::Month) => int(d.month() as i64),
        (Scalar::Date(d), DatePart::Day) => int(d.day() as i64),
        (Scalar::Date(d), DatePart::Date) => Ok(Scalar::Date(*d)),
        (Scalar::DateTime(t), DatePart::Year) => int(t.year() as i64),
        (Scalar::DateTime(t), DatePart::Month) => int(t.month() as i64),
        (Scalar::DateTime(t), DatePart::Day) => int(t.day() as i64),
        (Scalar::DateTime(t), DatePart::Hour) => int(t.hour() as i64),
        (Scalar::DateTime(t), DatePart::Minute) => int(t.minute() as i64),
        (Scalar::DateTime(t), DatePart::Second) => int(t.second() as i64),
        (Scalar::DateTime(t), DatePart::Date) => Ok(Scalar::Date(t.date())),
        (other, part) => Err(Error::Type(format!(
            "cannot take .{} of {other}",
            part.name()
        ))),
    }
}

/// Whether a predicate value keeps its record.
pub fn is_true(v: &Scalar) -> Result<bool> {
    Ok(optional_bool(v)?.unwrap_or(false))
}
