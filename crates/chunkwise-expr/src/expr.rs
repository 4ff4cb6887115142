//! Expression nodes and their constructors.
//!
//! Constructors borrow their operands and return a new node; trees are never
//! mutated after construction. Row-wise nodes (column access, projection,
//! arithmetic, map, date parts) read one record at a time from a single
//! **row base**, the nearest operand that is not itself row-wise.

use std::fmt;

use chunkwise_core::error::{Error, Result};
use chunkwise_core::hash::{hash_str, Hash256};
use chunkwise_core::schema::{DataType, Field, Schema};
use chunkwise_core::types::Scalar;

use crate::ops::{BinaryOp, DatePart, MapFn, ReductionKind, UnaryOp};
use crate::relational::JoinLayout;
use crate::shape::Shape;

/// A named placeholder for data supplied at compute time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub name: String,
    pub shape: Shape,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Symbol(Symbol),
    Literal(Scalar),
    Column {
        child: Box<Expr>,
        name: String,
        index: usize,
    },
    Projection {
        child: Box<Expr>,
        fields: Vec<String>,
        indices: Vec<usize>,
    },
    Selection {
        child: Box<Expr>,
        predicate: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Map {
        child: Box<Expr>,
        func: MapFn,
    },
    DatePart {
        child: Box<Expr>,
        part: DatePart,
    },
    Reduction {
        child: Box<Expr>,
        kind: ReductionKind,
    },
    Distinct {
        child: Box<Expr>,
    },
    Head {
        child: Box<Expr>,
        n: usize,
    },
    Join {
        left: Box<Expr>,
        right: Box<Expr>,
        layout: JoinLayout,
    },
    By {
        grouper: Box<Expr>,
        apply: Vec<(String, Expr)>,
    },
}

#[derive(Debug, Clone)]
pub struct Expr {
    kind: ExprKind,
    shape: Shape,
}

/// A table-shaped symbol.
pub fn symbol(name: impl Into<String>, schema: Schema) -> Expr {
    let name = name.into();
    let shape = Shape::Table(schema);
    Expr {
        kind: ExprKind::Symbol(Symbol {
            name,
            shape: shape.clone(),
        }),
        shape,
    }
}

/// A column-shaped symbol: a sequence of bare scalars.
pub fn sequence(name: impl Into<String>, data_type: DataType) -> Expr {
    let name = name.into();
    let shape = Shape::Column(Field::new(name.clone(), data_type, true));
    Expr {
        kind: ExprKind::Symbol(Symbol {
            name,
            shape: shape.clone(),
        }),
        shape,
    }
}

pub fn lit(value: impl Into<Scalar>) -> Expr {
    let value = value.into();
    let field = Field::new("literal", value.data_type(), value.is_null());
    Expr {
        kind: ExprKind::Literal(value),
        shape: Shape::Scalar(field),
    }
}

macro_rules! literal_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Expr {
                fn from(v: $t) -> Self {
                    lit(v)
                }
            }
        )*
    };
}

literal_from!(Scalar, bool, i32, i64, f32, f64, &str, String);

impl From<&Expr> for Expr {
    fn from(e: &Expr) -> Self {
        e.clone()
    }
}

pub(crate) fn mismatch(msg: impl Into<String>) -> Error {
    Error::SchemaMismatch(msg.into())
}

#[allow(clippy::should_implement_trait)]
impl Expr {
    pub(crate) fn from_parts(kind: ExprKind, shape: Shape) -> Self {
        Self { kind, shape }
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Name used for the node's output field and in derived names.
    pub fn name(&self) -> String {
        if let Some(field) = self.shape.field() {
            return field.name.clone();
        }
        match &self.kind {
            ExprKind::Symbol(s) => s.name.clone(),
            ExprKind::By { grouper, .. } => grouper.name(),
            _ => match self.children().first() {
                Some(child) => child.name(),
                None => String::new(),
            },
        }
    }

    // ----- structure -----

    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Symbol(_) | ExprKind::Literal(_) => vec![],
            ExprKind::Column { child, .. }
            | ExprKind::Projection { child, .. }
            | ExprKind::Map { child, .. }
            | ExprKind::DatePart { child, .. }
            | ExprKind::Reduction { child, .. }
            | ExprKind::Distinct { child }
            | ExprKind::Head { child, .. } => vec![child],
            ExprKind::Unary { operand, .. } => vec![operand],
            ExprKind::Selection { child, predicate } => vec![child, predicate],
            ExprKind::Binary { left, right, .. } | ExprKind::Join { left, right, .. } => {
                vec![left, right]
            }
            ExprKind::By { grouper, apply } => {
                let mut out: Vec<&Expr> = vec![grouper];
                out.extend(apply.iter().map(|(_, e)| e));
                out
            }
        }
    }

    /// Distinct symbols referenced by this tree, in first-visit order.
    pub fn symbols(&self) -> Vec<&Symbol> {
        let mut out: Vec<&Symbol> = Vec::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            if let ExprKind::Symbol(s) = &e.kind {
                if !out.iter().any(|seen| seen.name == s.name) {
                    out.push(s);
                }
            }
            let mut children = e.children();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Whether the node is computed record by record from its row base.
    pub fn is_elementwise(&self) -> bool {
        self.shape.is_sequence()
            && matches!(
                self.kind,
                ExprKind::Column { .. }
                    | ExprKind::Projection { .. }
                    | ExprKind::Binary { .. }
                    | ExprKind::Unary { .. }
                    | ExprKind::Map { .. }
                    | ExprKind::DatePart { .. }
            )
    }

    /// The sequence a row-wise node reads its records from.
    pub fn row_base(&self) -> Option<&Expr> {
        if !self.is_elementwise() {
            return None;
        }
        match &self.kind {
            ExprKind::Binary { left, right, .. } => {
                left.operand_base().or_else(|| right.operand_base())
            }
            ExprKind::Unary { operand, .. } => operand.operand_base(),
            ExprKind::Column { child, .. }
            | ExprKind::Projection { child, .. }
            | ExprKind::Map { child, .. }
            | ExprKind::DatePart { child, .. } => child.operand_base(),
            _ => None,
        }
    }

    /// The sequence this node contributes records from when used as an
    /// operand: its row base if row-wise, itself if it is some other
    /// sequence, and nothing for scalars.
    pub fn operand_base(&self) -> Option<&Expr> {
        if self.is_elementwise() {
            self.row_base()
        } else if self.shape.is_sequence() {
            Some(self)
        } else {
            None
        }
    }

    pub fn fingerprint(&self) -> Hash256 {
        hash_str(&format!("{} :: {}", self, self.shape))
    }

    /// Structural identity: same rendering and same shape.
    pub fn same_as(&self, other: &Expr) -> bool {
        self.shape == other.shape && self.fingerprint() == other.fingerprint()
    }

    fn sequence_field(&self, what: &str) -> Result<&Field> {
        match &self.shape {
            Shape::Column(f) | Shape::Scalar(f) => Ok(f),
            Shape::Table(schema) => Err(mismatch(format!(
                "{what} needs a column or scalar, but {self} is a table {schema}"
            ))),
        }
    }

    fn require_sequence(&self, what: &str) -> Result<()> {
        if self.shape.is_scalar() {
            return Err(mismatch(format!(
                "{what} needs a sequence, but {self} is a single {}",
                self.shape
            )));
        }
        Ok(())
    }

    fn elementwise_shape(&self, name: String, data_type: DataType, nullable: bool) -> Shape {
        let field = Field::new(name, data_type, nullable);
        if self.shape.is_scalar() {
            Shape::Scalar(field)
        } else {
            Shape::Column(field)
        }
    }

    // ----- row-wise constructors -----

    /// Access one field of a table-shaped expression.
    pub fn column(&self, name: &str) -> Result<Expr> {
        let Shape::Table(schema) = &self.shape else {
            return Err(mismatch(format!(
                "cannot access field '{name}' of non-table {self}"
            )));
        };
        let index = schema
            .index_of(name)
            .ok_or_else(|| mismatch(format!("no field '{name}' in {schema}")))?;
        let field = schema.fields[index].clone();
        Ok(Expr {
            kind: ExprKind::Column {
                child: Box::new(self.clone()),
                name: name.to_string(),
                index,
            },
            shape: Shape::Column(field),
        })
    }

    /// Select fields of a table in the given order.
    pub fn project(&self, names: &[&str]) -> Result<Expr> {
        let Shape::Table(schema) = &self.shape else {
            return Err(mismatch(format!("cannot project non-table {self}")));
        };
        if names.is_empty() {
            return Err(mismatch("projection needs at least one field"));
        }
        let mut indices = Vec::with_capacity(names.len());
        let mut fields = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(mismatch(format!("field '{name}' projected twice")));
            }
            let idx = schema
                .index_of(name)
                .ok_or_else(|| mismatch(format!("no field '{name}' in {schema}")))?;
            indices.push(idx);
            fields.push(schema.fields[idx].clone());
        }
        Ok(Expr {
            kind: ExprKind::Projection {
                child: Box::new(self.clone()),
                fields: names.iter().map(|n| n.to_string()).collect(),
                indices,
            },
            shape: Shape::Table(Schema::new(fields)),
        })
    }

    pub fn binary(&self, op: BinaryOp, rhs: impl Into<Expr>) -> Result<Expr> {
        let rhs = rhs.into();
        let lf = self.sequence_field(op.symbol())?;
        let rf = rhs.sequence_field(op.symbol())?;
        let data_type = op.result_type(lf.data_type, rf.data_type).ok_or_else(|| {
            mismatch(format!(
                "operator {op} does not apply to {} and {}",
                lf.data_type, rf.data_type
            ))
        })?;

        if let (Some(lb), Some(rb)) = (self.operand_base(), rhs.operand_base()) {
            if !lb.same_as(rb) {
                return Err(mismatch(format!(
                    "operands of {op} read from different sequences: {lb} and {rb}"
                )));
            }
        }

        let name = if self.shape.is_sequence() || rhs.shape.is_scalar() {
            lf.name.clone()
        } else {
            rf.name.clone()
        };
        let nullable = lf.nullable || rf.nullable;
        let field = Field::new(name, data_type, nullable);
        let shape = if self.shape.is_scalar() && rhs.shape.is_scalar() {
            Shape::Scalar(field)
        } else {
            Shape::Column(field)
        };
        Ok(Expr {
            kind: ExprKind::Binary {
                op,
                left: Box::new(self.clone()),
                right: Box::new(rhs),
            },
            shape,
        })
    }

    pub fn add(&self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Add, rhs)
    }

    pub fn sub(&self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Sub, rhs)
    }

    pub fn mul(&self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Mul, rhs)
    }

    pub fn div(&self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Div, rhs)
    }

    pub fn rem(&self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Rem, rhs)
    }

    pub fn eq(&self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Eq, rhs)
    }

    pub fn ne(&self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Ne, rhs)
    }

    pub fn lt(&self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Lt, rhs)
    }

    pub fn le(&self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Le, rhs)
    }

    pub fn gt(&self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Gt, rhs)
    }

    pub fn ge(&self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Ge, rhs)
    }

    pub fn and(&self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::And, rhs)
    }

    pub fn or(&self, rhs: impl Into<Expr>) -> Result<Expr> {
        self.binary(BinaryOp::Or, rhs)
    }

    fn unary(&self, op: UnaryOp) -> Result<Expr> {
        let field = self.sequence_field("unary operator")?;
        let data_type = op.result_type(field.data_type).ok_or_else(|| {
            mismatch(format!("{op:?} does not apply to {}", field.data_type))
        })?;
        let shape = self.elementwise_shape(field.name.clone(), data_type, field.nullable);
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(self.clone()),
            },
            shape,
        })
    }

    pub fn neg(&self) -> Result<Expr> {
        self.unary(UnaryOp::Neg)
    }

    pub fn not(&self) -> Result<Expr> {
        self.unary(UnaryOp::Not)
    }

    /// Apply `func` to every element. The result type cannot be inferred
    /// from an opaque function, so it is declared by the caller.
    pub fn map(&self, func: MapFn, data_type: DataType) -> Result<Expr> {
        let field = self.sequence_field("map")?;
        let shape = self.elementwise_shape(field.name.clone(), data_type, true);
        Ok(Expr {
            kind: ExprKind::Map {
                child: Box::new(self.clone()),
                func,
            },
            shape,
        })
    }

    pub fn date_part(&self, part: DatePart) -> Result<Expr> {
        let field = self.sequence_field(part.name())?;
        let data_type = part.result_type(field.data_type).ok_or_else(|| {
            mismatch(format!(
                "cannot take .{} of {} values",
                part.name(),
                field.data_type
            ))
        })?;
        let shape = self.elementwise_shape(
            format!("{}_{}", field.name, part.name()),
            data_type,
            field.nullable,
        );
        Ok(Expr {
            kind: ExprKind::DatePart {
                child: Box::new(self.clone()),
                part,
            },
            shape,
        })
    }

    // ----- selection -----

    /// Keep the records for which `predicate` is true.
    ///
    /// The predicate must be a boolean row-wise expression over the same
    /// records as `self`.
    pub fn filter(&self, predicate: &Expr) -> Result<Expr> {
        self.require_sequence("selection")?;
        if predicate.shape.data_type() != Some(DataType::Boolean) || !predicate.shape.is_column()
        {
            return Err(mismatch(format!(
                "selection predicate must be a boolean column, got {} ({})",
                predicate, predicate.shape
            )));
        }
        let expected = self.operand_base();
        let actual = predicate.row_base();
        match (expected, actual) {
            (Some(e), Some(a)) if e.same_as(a) => {}
            _ => {
                return Err(mismatch(format!(
                    "predicate {predicate} does not read from the records of {self}"
                )))
            }
        }
        Ok(Expr {
            kind: ExprKind::Selection {
                child: Box::new(self.clone()),
                predicate: Box::new(predicate.clone()),
            },
            shape: self.shape.clone(),
        })
    }

    // ----- sequence operations -----

    fn reduction(&self, kind: ReductionKind) -> Result<Expr> {
        self.require_sequence(kind.name())?;
        let (input, nullable) = match &self.shape {
            Shape::Table(_) if kind.accepts_tables() => (DataType::Null, false),
            Shape::Table(schema) => {
                return Err(mismatch(format!(
                    "{} needs a column, but {self} is a table {schema}",
                    kind.name()
                )))
            }
            Shape::Column(f) | Shape::Scalar(f) => (f.data_type, f.nullable),
        };
        let data_type = kind.result_type(input).ok_or_else(|| {
            mismatch(format!("cannot take {} of {} values", kind.name(), input))
        })?;
        let nullable = nullable && !kind.accepts_tables();
        let field = Field::new(format!("{}_{}", self.name(), kind.name()), data_type, nullable);
        Ok(Expr {
            kind: ExprKind::Reduction {
                child: Box::new(self.clone()),
                kind,
            },
            shape: Shape::Scalar(field),
        })
    }

    pub fn sum(&self) -> Result<Expr> {
        self.reduction(ReductionKind::Sum)
    }

    pub fn min(&self) -> Result<Expr> {
        self.reduction(ReductionKind::Min)
    }

    pub fn max(&self) -> Result<Expr> {
        self.reduction(ReductionKind::Max)
    }

    pub fn count(&self) -> Result<Expr> {
        self.reduction(ReductionKind::Count)
    }

    pub fn mean(&self) -> Result<Expr> {
        self.reduction(ReductionKind::Mean)
    }

    pub fn nunique(&self) -> Result<Expr> {
        self.reduction(ReductionKind::NUnique)
    }

    pub fn distinct(&self) -> Result<Expr> {
        self.require_sequence("distinct")?;
        Ok(Expr {
            kind: ExprKind::Distinct {
                child: Box::new(self.clone()),
            },
            shape: self.shape.clone(),
        })
    }

    pub fn head(&self, n: usize) -> Result<Expr> {
        self.require_sequence("head")?;
        Ok(Expr {
            kind: ExprKind::Head {
                child: Box::new(self.clone()),
                n,
            },
            shape: self.shape.clone(),
        })
    }
}

fn write_names(f: &mut fmt::Formatter<'_>, names: &[String]) -> fmt::Result {
    f.write_str("[")?;
    for (i, n) in names.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "'{n}'")?;
    }
    f.write_str("]")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Symbol(s) => f.write_str(&s.name),
            ExprKind::Literal(v) => write!(f, "{v}"),
            ExprKind::Column { child, name, .. } => write!(f, "{child}.{name}"),
            ExprKind::Projection { child, fields, .. } => {
                write!(f, "{child}[")?;
                write_names(f, fields)?;
                f.write_str("]")
            }
            ExprKind::Selection { child, predicate } => write!(f, "{child}[{predicate}]"),
            ExprKind::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Neg => write!(f, "-{operand}"),
                UnaryOp::Not => write!(f, "~{operand}"),
            },
            ExprKind::Map { child, func } => write!(f, "{child}.map({})", func.name()),
            ExprKind::DatePart { child, part } => write!(f, "{child}.{}", part.name()),
            ExprKind::Reduction { child, kind } => write!(f, "{child}.{}()", kind.name()),
            ExprKind::Distinct { child } => write!(f, "{child}.distinct()"),
            ExprKind::Head { child, n } => write!(f, "{child}.head({n})"),
            ExprKind::Join {
                left,
                right,
                layout,
            } => {
                write!(f, "join({left}, {right}, ")?;
                write_names(f, &layout.left_on)?;
                f.write_str(", ")?;
                write_names(f, &layout.right_on)?;
                f.write_str(")")
            }
            ExprKind::By { grouper, apply } => {
                write!(f, "by({grouper}")?;
                for (name, e) in apply {
                    write!(f, ", {name}={e}")?;
                }
                f.write_str(")")
            }
        }
    }
}
