//! The content tree: a closed sum type of evaluation nodes.
//!
//! Interior nodes either compute a value directly (literal, formula family,
//! hashprng) or select a child on some inputs and recurse (binning,
//! multibinning, category, transform). Dispatch is a match on the variant.

use std::sync::Arc;

use crate::engine::binning::{Binning, MultiBinning};
use crate::engine::category::Category;
use crate::engine::errors::{EvalError, LoadError};
use crate::engine::formula::{Formula, FormulaRef};
use crate::engine::hashprng::HashPrng;
use crate::engine::transform::Transform;
use crate::engine::variable::{Value, Variable};
use serde_json::Value as Json;

/// Name-resolution context while loading one correction's data tree.
pub(crate) struct LoadContext<'a> {
    pub inputs: &'a [Variable],
    pub generics: &'a [Arc<Formula>],
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(inputs: &'a [Variable], generics: &'a [Arc<Formula>]) -> Self {
        LoadContext { inputs, generics }
    }

    /// Resolves an input by name to its position.
    pub(crate) fn input_index(&self, name: &str) -> Result<usize, LoadError> {
        self.inputs
            .iter()
            .position(|v| v.name() == name)
            .ok_or_else(|| LoadError::UnknownVariable(name.to_owned()))
    }
}

/// One node of a correction's data tree.
#[derive(Debug)]
pub(crate) enum Content {
    Literal(f64),
    Formula(Formula),
    FormulaRef(FormulaRef),
    Transform(Transform),
    HashPrng(HashPrng),
    Binning(Binning),
    MultiBinning(MultiBinning),
    Category(Category),
}

/// Builds a content node from its JSON form: a bare number is a literal,
/// an object dispatches on its `nodetype` tag.
pub(crate) fn resolve_content(value: &Json, ctx: &LoadContext) -> Result<Content, LoadError> {
    if let Some(v) = value.as_f64() {
        return Ok(Content::Literal(v));
    }
    let Some(obj) = value.as_object() else {
        return Err(LoadError::InvalidFieldType("content"));
    };
    let nodetype = obj
        .get("nodetype")
        .ok_or(LoadError::MissingField("nodetype"))?
        .as_str()
        .ok_or(LoadError::InvalidFieldType("nodetype"))?;
    match nodetype {
        "binning" => Ok(Content::Binning(Binning::from_json(value, ctx)?)),
        "multibinning" => Ok(Content::MultiBinning(MultiBinning::from_json(value, ctx)?)),
        "category" => Ok(Content::Category(Category::from_json(value, ctx)?)),
        "formula" => Ok(Content::Formula(Formula::from_json(
            value, ctx.inputs, false,
        )?)),
        "formularef" => Ok(Content::FormulaRef(FormulaRef::from_json(
            value,
            ctx.generics,
        )?)),
        "transform" => Ok(Content::Transform(Transform::from_json(value, ctx)?)),
        "hashprng" => Ok(Content::HashPrng(HashPrng::from_json(value, ctx)?)),
        other => Err(LoadError::UnknownNodeType(other.to_owned())),
    }
}

impl Content {
    /// Evaluates this node on the given input tuple.
    pub(crate) fn evaluate(&self, values: &[Value]) -> Result<f64, EvalError> {
        match self {
            Content::Literal(v) => Ok(*v),
            Content::Formula(f) => f.evaluate(values),
            Content::FormulaRef(r) => r.evaluate(values),
            Content::Transform(t) => t.evaluate(values),
            Content::HashPrng(h) => h.evaluate(values),
            Content::Binning(b) => b.child(values)?.evaluate(values),
            Content::MultiBinning(m) => m.child(values)?.evaluate(values),
            Content::Category(c) => c.child(values)?.evaluate(values),
        }
    }
}
