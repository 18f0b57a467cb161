//! # correval — a correction-function evaluator
//!
//! correval loads schema-versioned JSON documents describing named
//! **corrections** — trees of piecewise lookup and arithmetic nodes mapping
//! typed input tuples to a real value — and evaluates them on the hot path
//! of event-processing pipelines.
//!
//! ## Architecture
//!
//! - **frontend**: the TFormula expression parser, its AST, and the typed
//!   JSON tree walker used by the loader
//! - **engine**: the immutable node types (binning, category, formula,
//!   transform, hashprng), corrections, compound pipelines, and the
//!   correction-set container
//!
//! ## Usage
//!
//! ```rust,ignore
//! use correval::{CorrectionSet, Value};
//!
//! let cset = CorrectionSet::from_file("corrections.json.gz")?;
//! let corr = cset.at("muon_id_sf")?;
//! let sf = corr.evaluate(&[Value::Real(52.3), Value::Real(-1.1)])?;
//! ```
//!
//! A loaded set is deeply immutable: corrections may be shared and
//! evaluated from many threads without synchronization.

#![forbid(unsafe_code)]

pub mod engine;
pub mod frontend;

pub use engine::compound::CompoundCorrection;
pub use engine::correction::Correction;
pub use engine::correction_set::{CorrectionSet, EVALUATOR_VERSION};
pub use engine::errors::{EvalError, LoadError};
pub use engine::formula::Formula;
pub use engine::variable::{Value, VarType, Variable};
