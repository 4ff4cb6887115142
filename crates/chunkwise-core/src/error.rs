use thiserror::Error;

/// Canonical result for the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An expression references a symbol with no backend in the compute scope.
    #[error("unbound symbol '{0}': no backend bound for it")]
    UnboundSymbol(String),

    /// An operation is invalid for the schema of its operands. Raised while
    /// building expressions, never from deep inside evaluation.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("empty reduction: {0} over zero records")]
    EmptyReduction(String),

    /// A value did not have the type its declared schema promised.
    #[error("type error: {0}")]
    Type(String),

    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    // Backends map their own I/O and decode failures into this variant.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("source exhausted: {0}")]
    SourceExhausted(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}
