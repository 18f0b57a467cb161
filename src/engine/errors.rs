//! Error types for document loading and correction evaluation.
//!
//! Loading validates eagerly and fails fast; evaluation is total except
//! where a node's declared flow policy or a missing category key requires a
//! failure. Division by zero is not an error (IEEE-754 semantics apply).

use thiserror::Error;

/// Errors raised while loading and validating a correction document.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LoadError {
    /// Reading the document from disk failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not well-formed JSON.
    #[error("json parse error: {0}")]
    ParseJson(String),

    /// The document's schema_version does not match the evaluator's.
    #[error("evaluator is designed for schema v{supported} and is not {direction}-compatible (document has v{found})")]
    SchemaMismatch {
        found: i32,
        supported: i32,
        direction: &'static str,
    },

    /// A content node carries an unrecognized `nodetype`.
    #[error("unrecognized content node type: {0}")]
    UnknownNodeType(String),

    /// A formula declares a parser dialect the evaluator does not support.
    #[error("unsupported formula parser: {0}")]
    UnknownParser(String),

    /// A required field is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field holds a JSON value of the wrong type or shape.
    #[error("invalid type or shape for field: {0}")]
    InvalidFieldType(&'static str),

    /// A correction, compound correction, input, or category key is
    /// declared more than once.
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// A node references an input the enclosing correction does not declare.
    #[error("could not find variable {0} in inputs")]
    UnknownVariable(String),

    /// A formula expression failed to parse.
    #[error("failed to parse formula expression at position {position}: {message}")]
    BadFormula { position: usize, message: String },

    /// A formula uses a variable position its declared list does not cover.
    #[error("insufficient variables for formula: {0} is not mapped")]
    InsufficientVariables(String),

    /// A formula or formula reference binds fewer parameters than the
    /// expression uses.
    #[error("insufficient parameters for formula: [{index}] with {count} bound")]
    InsufficientParameters { index: usize, count: usize },

    /// Binning edges are not strictly increasing.
    #[error("binning edges not monotone increasing")]
    NonMonotoneEdges,

    /// The number of content nodes does not match the binning.
    #[error("inconsistent binning: expected {expected} content nodes, found {found}")]
    InconsistentContentSize { expected: usize, found: usize },

    /// A uniform axis declares zero bins.
    #[error("uniform binning must have at least one bin")]
    UniformBinsZero,

    /// An input's declared type is not allowed where it is used.
    #[error("disallowed input type: {0}")]
    TypeDisallowed(String),

    /// A compound correction names a constituent the set does not contain.
    #[error("compound correction references unknown correction {0}")]
    UnresolvedConstituent(String),
}

/// Errors raised while evaluating a correction.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EvalError {
    /// The number of provided values does not match the declared inputs.
    #[error("wrong number of inputs: got {got}, expected {expected}")]
    ArityMismatch { got: usize, expected: usize },

    /// A provided value's type does not match the declared input type.
    #[error("input {name} has wrong type: got {got}, expected {expected}")]
    TypeMismatch {
        position: usize,
        name: String,
        got: &'static str,
        expected: &'static str,
    },

    /// A binned lookup fell outside the axis range under `flow: error`.
    #[error("index out of bounds in {node} for input {axis}: value {value}")]
    OutOfBounds {
        node: &'static str,
        axis: usize,
        value: f64,
    },

    /// A category lookup or set lookup missed with no default.
    #[error("key not found in {node}: {key}")]
    KeyNotFound { node: &'static str, key: String },

    /// A generic formula was evaluated without bound parameters.
    #[error("generic formulas must be evaluated with parameters")]
    GenericNotBound,

    /// A generic formula was evaluated with too few parameters.
    #[error("insufficient parameters: formula uses {needed}, got {got}")]
    InsufficientParameters { needed: usize, got: usize },

    /// Invariant violation that load-time validation should have prevented.
    #[error("internal error: {0}")]
    Internal(String),
}
