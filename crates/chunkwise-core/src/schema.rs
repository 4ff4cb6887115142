//! Logical schema types. Pure data.
//!
//! Schemas are declared up front (no datashape parsing here) and carried by
//! every expression node so that shape errors surface before evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Type of a bare `null` literal; compatible with every other type.
    Null,
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Binary,
    Date,
    DateTime,
}

impl DataType {
    pub fn is_integer(self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, DataType::Date | DataType::DateTime)
    }

    /// Types with a meaningful ordering for `<`, `min` and `max`.
    pub fn is_orderable(self) -> bool {
        !matches!(self, DataType::Binary)
    }

    /// Whether values of `self` and `other` can be compared or joined on.
    pub fn is_comparable_with(self, other: DataType) -> bool {
        self == other
            || self == DataType::Null
            || other == DataType::Null
            || (self.is_numeric() && other.is_numeric())
    }

    /// Result type of arithmetic between two numeric types.
    pub fn numeric_promote(self, other: DataType) -> Option<DataType> {
        if !self.is_numeric() || !other.is_numeric() {
            return None;
        }
        if self.is_float() || other.is_float() {
            Some(DataType::Float64)
        } else {
            Some(DataType::Int64)
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Null => "null",
            DataType::Boolean => "bool",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Utf8 => "string",
            DataType::Binary => "bytes",
            DataType::Date => "date",
            DataType::DateTime => "datetime",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", field.name, field.data_type)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_promotion() {
        assert_eq!(
            DataType::Int32.numeric_promote(DataType::Int64),
            Some(DataType::Int64)
        );
        assert_eq!(
            DataType::Int64.numeric_promote(DataType::Float32),
            Some(DataType::Float64)
        );
        assert_eq!(DataType::Utf8.numeric_promote(DataType::Int64), None);
    }

    #[test]
    fn schema_lookup_and_display() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]);
        assert_eq!(schema.index_of("name"), Some(1));
        assert!(schema.field_named("missing").is_none());
        assert_eq!(schema.to_string(), "{id: int64, name: string}");
    }
}
