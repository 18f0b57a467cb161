//! A named correction: typed input/output header plus a data tree.

use std::sync::Arc;

use crate::engine::content::{resolve_content, Content, LoadContext};
use crate::engine::errors::{EvalError, LoadError};
use crate::engine::formula::Formula;
use crate::engine::variable::{Value, VarType, Variable};
use crate::frontend::json::Obj;
use serde_json::Value as Json;

/// A correction maps a tuple of typed inputs to a real value.
///
/// Deeply immutable after load; safe to share across threads and evaluate
/// concurrently.
#[derive(Debug)]
pub struct Correction {
    name: String,
    description: String,
    version: i32,
    inputs: Vec<Variable>,
    output: Variable,
    data: Content,
}

impl Correction {
    pub(crate) fn from_json(value: &Json) -> Result<Self, LoadError> {
        let obj = Obj::wrap(value, "correction")?;
        let name = obj.str_field("name")?.to_owned();
        let description = obj.description()?;
        let version = obj.i32_field("version")?;

        let mut inputs: Vec<Variable> = Vec::new();
        for item in obj.array_field("inputs")? {
            let var = Variable::from_json(item)?;
            if inputs.iter().any(|v| v.name() == var.name()) {
                return Err(LoadError::DuplicateName(var.name().to_owned()));
            }
            inputs.push(var);
        }

        let output = Variable::from_json(obj.field("output")?)?;
        if output.var_type() != VarType::Real {
            return Err(LoadError::TypeDisallowed(format!(
                "output {} of correction {name} must be real-valued",
                output.name()
            )));
        }

        // Generic formulas live in a flat table; FormulaRef nodes hold
        // shared handles into it, which keep the referenced formulas alive
        // for the correction's whole lifetime.
        let mut generics = Vec::new();
        for item in obj.opt_array_field("generic_formulas")? {
            generics.push(Arc::new(Formula::from_json(item, &inputs, true)?));
        }

        let ctx = LoadContext::new(&inputs, &generics);
        let data = resolve_content(obj.field("data")?, &ctx)?;
        Ok(Correction {
            name,
            description,
            version,
            inputs,
            output,
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    pub fn output(&self) -> &Variable {
        &self.output
    }

    /// Evaluates the correction on one input tuple.
    ///
    /// The arity and per-position type gate runs before any node is
    /// visited, so a mistyped tuple never reaches the tree.
    pub fn evaluate(&self, values: &[Value]) -> Result<f64, EvalError> {
        if values.len() != self.inputs.len() {
            return Err(EvalError::ArityMismatch {
                got: values.len(),
                expected: self.inputs.len(),
            });
        }
        for (position, (input, value)) in self.inputs.iter().zip(values).enumerate() {
            input.validate(position, value)?;
        }
        self.data.evaluate(values)
    }
}
