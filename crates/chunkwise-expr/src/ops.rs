//! Operator vocabularies: binary/unary operators, date parts, reductions, and
//! user-supplied map functions.

use std::fmt;
use std::sync::Arc;

use chunkwise_core::error::Result;
use chunkwise_core::schema::DataType;
use chunkwise_core::types::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Result type for operands of type `l` and `r`, or `None` when the
    /// operator does not apply to them.
    ///
    /// `/` always yields `Float64`; `+` also concatenates strings.
    pub fn result_type(self, l: DataType, r: DataType) -> Option<DataType> {
        use DataType::*;

        if self.is_comparison() {
            let ordered = matches!(self, BinaryOp::Eq | BinaryOp::Ne)
                || (l.is_orderable() && r.is_orderable());
            return (l.is_comparable_with(r) && ordered).then_some(Boolean);
        }
        if self.is_logical() {
            return matches!((l, r), (Boolean | Null, Boolean | Null)).then_some(Boolean);
        }

        // Arithmetic: a null operand takes the other side's type.
        let (l, r) = match (l, r) {
            (Null, Null) => return Some(Null),
            (Null, other) | (other, Null) => (other, other),
            pair => pair,
        };
        match self {
            BinaryOp::Add if l == Utf8 && r == Utf8 => Some(Utf8),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Rem => l.numeric_promote(r),
            BinaryOp::Div => l.numeric_promote(r).map(|_| Float64),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn result_type(self, input: DataType) -> Option<DataType> {
        match self {
            UnaryOp::Neg if input.is_numeric() || input == DataType::Null => Some(input),
            UnaryOp::Not if matches!(input, DataType::Boolean | DataType::Null) => {
                Some(DataType::Boolean)
            }
            _ => None,
        }
    }
}

/// Calendar component extracted from `Date`/`DateTime` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatePart {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    /// The calendar date of a datetime.
    Date,
}

impl DatePart {
    pub fn name(self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Month => "month",
            DatePart::Day => "day",
            DatePart::Hour => "hour",
            DatePart::Minute => "minute",
            DatePart::Second => "second",
            DatePart::Date => "date",
        }
    }

    pub fn result_type(self, input: DataType) -> Option<DataType> {
        let time_part = matches!(self, DatePart::Hour | DatePart::Minute | DatePart::Second);
        match input {
            DataType::DateTime => Some(self.output_type()),
            DataType::Date if !time_part => Some(self.output_type()),
            _ => None,
        }
    }

    fn output_type(self) -> DataType {
        match self {
            DatePart::Date => DataType::Date,
            _ => DataType::Int64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReductionKind {
    Sum,
    Min,
    Max,
    Count,
    Mean,
    NUnique,
}

impl ReductionKind {
    pub fn name(self) -> &'static str {
        match self {
            ReductionKind::Sum => "sum",
            ReductionKind::Min => "min",
            ReductionKind::Max => "max",
            ReductionKind::Count => "count",
            ReductionKind::Mean => "mean",
            ReductionKind::NUnique => "nunique",
        }
    }

    /// Whether the reduction accepts table-shaped input (whole records).
    pub fn accepts_tables(self) -> bool {
        matches!(self, ReductionKind::Count | ReductionKind::NUnique)
    }

    /// Result type for a column of `input`, or `None` if not applicable.
    pub fn result_type(self, input: DataType) -> Option<DataType> {
        match self {
            ReductionKind::Count | ReductionKind::NUnique => Some(DataType::Int64),
            ReductionKind::Sum if input.is_integer() => Some(DataType::Int64),
            ReductionKind::Sum if input.is_float() => Some(DataType::Float64),
            ReductionKind::Mean if input.is_numeric() => Some(DataType::Float64),
            ReductionKind::Min | ReductionKind::Max
                if input.is_orderable() && input != DataType::Null =>
            {
                Some(input)
            }
            _ => None,
        }
    }
}

type MapBody = dyn Fn(&Scalar) -> Result<Scalar> + Send + Sync;

/// A named user function applied to every element of a column.
///
/// The name identifies the function in rendered expressions and
/// fingerprints, so distinct functions should carry distinct names.
#[derive(Clone)]
pub struct MapFn {
    name: String,
    func: Arc<MapBody>,
}

impl MapFn {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Scalar) -> Result<Scalar> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Wrap a function that cannot fail.
    pub fn infallible<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Scalar) -> Scalar + Send + Sync + 'static,
    {
        Self::new(name, move |v| Ok(func(v)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, value: &Scalar) -> Result<Scalar> {
        (self.func)(value)
    }
}

impl fmt::Debug for MapFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MapFn").field(&self.name).finish()
    }
}
