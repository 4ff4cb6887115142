#![forbid(unsafe_code)]
//! chunkwise-expr: query expressions built against declared schemas.
//!
//! An `Expr` is an immutable tree. Every constructor derives the node's
//! output `Shape` from its operands and rejects invalid combinations with
//! `Error::SchemaMismatch` right away, so evaluation never discovers a
//! schema problem halfway through a dataset.

pub mod expr;
pub mod ops;
pub mod relational;
pub mod shape;

pub use expr::{lit, sequence, symbol, Expr, ExprKind, Symbol};
pub use ops::{BinaryOp, DatePart, MapFn, ReductionKind, UnaryOp};
pub use relational::{by, join, join_on, JoinLayout};
pub use shape::Shape;
