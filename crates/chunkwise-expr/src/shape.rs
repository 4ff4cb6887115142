//! Static output shapes of expressions.

use std::fmt;

use chunkwise_core::schema::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// A sequence of records.
    Table(Schema),
    /// A sequence of scalars.
    Column(Field),
    /// A single value.
    Scalar(Field),
}

impl Shape {
    pub fn is_sequence(&self) -> bool {
        !self.is_scalar()
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Shape::Table(_))
    }

    pub fn is_column(&self) -> bool {
        matches!(self, Shape::Column(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Shape::Scalar(_))
    }

    pub fn schema(&self) -> Option<&Schema> {
        match self {
            Shape::Table(s) => Some(s),
            _ => None,
        }
    }

    /// The single field of a column or scalar shape.
    pub fn field(&self) -> Option<&Field> {
        match self {
            Shape::Column(f) | Shape::Scalar(f) => Some(f),
            Shape::Table(_) => None,
        }
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.field().map(|f| f.data_type)
    }

    /// Fields of the materialized form, in declared order.
    pub fn fields(&self) -> Vec<Field> {
        match self {
            Shape::Table(s) => s.fields.clone(),
            Shape::Column(f) | Shape::Scalar(f) => vec![f.clone()],
        }
    }

    /// Column names of the materialized form, in declared order.
    pub fn names(&self) -> Vec<String> {
        self.fields().into_iter().map(|f| f.name).collect()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Table(schema) => write!(f, "var * {schema}"),
            Shape::Column(field) => write!(f, "var * {}", field.data_type),
            Shape::Scalar(field) => write!(f, "{}", field.data_type),
        }
    }
}
