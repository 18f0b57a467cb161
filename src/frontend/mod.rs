//! Document and expression front end: the TFormula parser, its AST, and the
//! typed JSON tree walker the loader is built on.

pub mod ast;
pub(crate) mod json;
pub mod parser;
