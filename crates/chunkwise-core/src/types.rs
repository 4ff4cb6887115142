//! Values, records, and the columnar frame container.
//!
//! `Scalar` is a single value, `Datum` is one element of a sequence (a bare
//! scalar for column-shaped data, a row for table-shaped data), and
//! `RowBatch` is a named columnar frame used both as a backend and as a
//! materialization target.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::DataType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// A table record: one scalar per schema field.
pub type Row = Vec<Scalar>;

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Null => DataType::Null,
            Scalar::Bool(_) => DataType::Boolean,
            Scalar::I32(_) => DataType::Int32,
            Scalar::I64(_) => DataType::Int64,
            Scalar::F32(_) => DataType::Float32,
            Scalar::F64(_) => DataType::Float64,
            Scalar::Str(_) => DataType::Utf8,
            Scalar::Bin(_) => DataType::Binary,
            Scalar::Date(_) => DataType::Date,
            Scalar::DateTime(_) => DataType::DateTime,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I32(v) => Some(*v as i64),
            Scalar::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::I32(v) => Some(*v as f64),
            Scalar::I64(v) => Some(*v as f64),
            Scalar::F32(v) => Some(*v as f64),
            Scalar::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Widen to the canonical numeric representation (`I32` to `I64`,
    /// `F32` to `F64`) so that keys from differently-typed columns compare
    /// and hash alike.
    pub fn normalized(&self) -> Scalar {
        match self {
            Scalar::I32(v) => Scalar::I64(*v as i64),
            Scalar::F32(v) => Scalar::F64(*v as f64),
            other => other.clone(),
        }
    }

    /// Total order used by sorting and `min`/`max`.
    ///
    /// Nulls sort first, NaN sorts after every other float, numbers of
    /// different widths compare by value, and otherwise mixed kinds order by
    /// kind.
    pub fn total_cmp(&self, other: &Scalar) -> Ordering {
        use Scalar::*;

        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Bool(x), Bool(y)) => x.cmp(y),
            (Str(x), Str(y)) => x.cmp(y),
            (Bin(x), Bin(y)) => x.cmp(y),
            (Date(x), Date(y)) => x.cmp(y),
            (DateTime(x), DateTime(y)) => x.cmp(y),
            _ => match (self.as_i64(), other.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => match (self.as_f64(), other.as_f64()) {
                    (Some(x), Some(y)) => float_cmp(x, y),
                    _ => kind_order(self).cmp(&kind_order(other)),
                },
            },
        }
    }
}

fn float_cmp(x: f64, y: f64) -> Ordering {
    if x.is_nan() && y.is_nan() {
        Ordering::Equal
    } else if x.is_nan() {
        Ordering::Greater
    } else if y.is_nan() {
        Ordering::Less
    } else {
        x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
}

/// Assign a numeric order to scalar kinds for mixed-kind comparisons.
fn kind_order(s: &Scalar) -> u8 {
    use Scalar::*;
    match s {
        Null => 0,
        Bool(_) => 1,
        I32(_) => 2,
        I64(_) => 3,
        F32(_) => 4,
        F64(_) => 5,
        Str(_) => 6,
        Bin(_) => 7,
        Date(_) => 8,
        DateTime(_) => 9,
    }
}

fn f64_bits(f: f64) -> u64 {
    if f == 0.0 {
        0u64
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

fn f32_bits(f: f32) -> u32 {
    if f == 0.0 {
        0u32
    } else if f.is_nan() {
        f32::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

// Equality is by kind and bit pattern so that scalars can key hash tables;
// `-0.0 == 0.0` and all NaNs are equal to each other.
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        use Scalar::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (I32(a), I32(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            (F32(a), F32(b)) => f32_bits(*a) == f32_bits(*b),
            (F64(a), F64(b)) => f64_bits(*a) == f64_bits(*b),
            (Str(a), Str(b)) => a == b,
            (Bin(a), Bin(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use Scalar::*;

        kind_order(self).hash(state);
        match self {
            Null => {}
            Bool(b) => b.hash(state),
            I32(i) => i.hash(state),
            I64(i) => i.hash(state),
            F32(f) => f32_bits(*f).hash(state),
            F64(f) => f64_bits(*f).hash(state),
            Str(s) => s.hash(state),
            Bin(b) => b.hash(state),
            Date(d) => d.hash(state),
            DateTime(d) => d.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::I32(v) => write!(f, "{v}"),
            Scalar::I64(v) => write!(f, "{v}"),
            Scalar::F32(v) => write!(f, "{v}"),
            Scalar::F64(v) => write!(f, "{v}"),
            Scalar::Str(s) => write!(f, "'{s}'"),
            Scalar::Bin(b) => write!(f, "<{} bytes>", b.len()),
            Scalar::Date(d) => write!(f, "{d}"),
            Scalar::DateTime(d) => write!(f, "{d}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::I32(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::I64(v)
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Scalar::F32(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::F64(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl From<NaiveDate> for Scalar {
    fn from(v: NaiveDate) -> Self {
        Scalar::Date(v)
    }
}

impl From<NaiveDateTime> for Scalar {
    fn from(v: NaiveDateTime) -> Self {
        Scalar::DateTime(v)
    }
}

/// One element of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datum {
    /// Element of a column-shaped sequence.
    Scalar(Scalar),
    /// Element of a table-shaped sequence, one value per field.
    Row(Row),
}

impl Datum {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Datum::Scalar(s) => Some(s),
            Datum::Row(_) => None,
        }
    }

    pub fn as_row(&self) -> Option<&[Scalar]> {
        match self {
            Datum::Row(r) => Some(r),
            Datum::Scalar(_) => None,
        }
    }

    /// Field `idx` of a row; a bare scalar only has field 0.
    pub fn field(&self, idx: usize) -> Option<&Scalar> {
        match self {
            Datum::Row(r) => r.get(idx),
            Datum::Scalar(s) if idx == 0 => Some(s),
            Datum::Scalar(_) => None,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            Datum::Row(r) => r.len(),
            Datum::Scalar(_) => 1,
        }
    }

    pub fn into_scalars(self) -> Vec<Scalar> {
        match self {
            Datum::Row(r) => r,
            Datum::Scalar(s) => vec![s],
        }
    }
}

impl From<Scalar> for Datum {
    fn from(s: Scalar) -> Self {
        Datum::Scalar(s)
    }
}

impl From<Row> for Datum {
    fn from(r: Row) -> Self {
        Datum::Row(r)
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Scalar(s) => write!(f, "{s}"),
            Datum::Row(r) => {
                f.write_str("(")?;
                for (i, v) in r.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// A named column of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Columnar frame: equal-length named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowBatch {
    pub columns: Vec<Column>,
}

impl RowBatch {
    /// An empty frame with the given column names.
    pub fn empty(names: &[String]) -> Self {
        Self {
            columns: names
                .iter()
                .map(|n| Column {
                    name: n.clone(),
                    values: Vec::new(),
                })
                .collect(),
        }
    }

    /// Build a frame from records, one column per name, preserving order.
    ///
    /// A bare scalar datum fills a single-column frame.
    pub fn from_rows<I>(names: &[String], rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = Datum>,
    {
        let mut batch = Self::empty(names);
        for datum in rows {
            batch.push_row(datum)?;
        }
        Ok(batch)
    }

    /// Append one record; its width must match the column count.
    pub fn push_row(&mut self, datum: Datum) -> Result<()> {
        if datum.width() != self.columns.len() {
            return Err(Error::SchemaMismatch(format!(
                "record of width {} does not fit a frame with {} columns",
                datum.width(),
                self.columns.len()
            )));
        }
        for (col, value) in self.columns.iter_mut().zip(datum.into_scalars()) {
            col.values.push(value);
        }
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The record at `idx` as a row (always `Datum::Row`).
    pub fn row(&self, idx: usize) -> Option<Datum> {
        if idx >= self.num_rows() {
            return None;
        }
        Some(Datum::Row(
            self.columns.iter().map(|c| c.values[idx].clone()).collect(),
        ))
    }

    /// Rows `[offset, offset + len)`, clamped to the frame.
    pub fn slice(&self, offset: usize, len: usize) -> RowBatch {
        let rows = self.num_rows();
        let start = offset.min(rows);
        let end = offset.saturating_add(len).min(rows);
        RowBatch {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values[start..end].to_vec(),
                })
                .collect(),
        }
    }

    /// All records in order.
    pub fn rows(&self) -> impl Iterator<Item = Datum> + '_ {
        (0..self.num_rows()).filter_map(move |i| self.row(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_equality_is_total() {
        assert_eq!(Scalar::F64(f64::NAN), Scalar::F64(f64::NAN));
        assert_eq!(Scalar::F64(-0.0), Scalar::F64(0.0));
        assert_ne!(Scalar::I32(1), Scalar::I64(1));
        assert_eq!(Scalar::I32(1).normalized(), Scalar::I64(1));
    }

    #[test]
    fn total_cmp_orders_nulls_first_and_nan_last() {
        let mut values = vec![
            Scalar::F64(f64::NAN),
            Scalar::F64(2.0),
            Scalar::Null,
            Scalar::F64(-1.0),
        ];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(values[0], Scalar::Null);
        assert_eq!(values[1], Scalar::F64(-1.0));
        assert_eq!(values[2], Scalar::F64(2.0));
        assert!(matches!(values[3], Scalar::F64(f) if f.is_nan()));
        assert_eq!(
            Scalar::I32(3).total_cmp(&Scalar::I64(2)),
            Ordering::Greater
        );
    }

    #[test]
    fn frame_from_rows_and_slice() {
        let names = vec!["name".to_string(), "id".to_string()];
        let batch = RowBatch::from_rows(
            &names,
            vec![
                Datum::Row(vec!["Alice".into(), Scalar::I64(1)]),
                Datum::Row(vec!["Bob".into(), Scalar::I64(2)]),
                Datum::Row(vec!["Charlie".into(), Scalar::I64(3)]),
            ],
        )
        .expect("frame");
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.names(), names);

        let tail = batch.slice(2, 10);
        assert_eq!(tail.num_rows(), 1);
        assert_eq!(
            tail.row(0),
            Some(Datum::Row(vec!["Charlie".into(), Scalar::I64(3)]))
        );
        assert_eq!(batch.slice(5, 2).num_rows(), 0);
    }

    #[test]
    fn frame_rejects_wrong_width() {
        let names = vec!["a".to_string(), "b".to_string()];
        let err = RowBatch::from_rows(&names, vec![Datum::Scalar(Scalar::I64(1))]).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }
}
