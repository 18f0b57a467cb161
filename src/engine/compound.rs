//! Staged pipelines over named constituent corrections.
//!
//! A compound correction runs its stack in declared order. Each stage sees
//! the compound's inputs permuted down to the constituent's declared
//! inputs; after a stage, its scale factor may be folded into designated
//! real-valued inputs (`input_op`) before later stages run, and into the
//! accumulated output (`output_op`). The caller's tuple is never modified.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::engine::correction::Correction;
use crate::engine::errors::{EvalError, LoadError};
use crate::engine::variable::{Value, VarType, Variable};
use crate::frontend::json::{element_str, Obj};
use serde_json::Value as Json;

/// How a stage's scale factor folds into an input or the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineOp {
    Add,
    Multiply,
    Divide,
    Last,
}

fn combine(acc: f64, sf: f64, op: PipelineOp) -> f64 {
    match op {
        PipelineOp::Add => acc + sf,
        PipelineOp::Multiply => acc * sf,
        PipelineOp::Divide => acc / sf,
        PipelineOp::Last => sf,
    }
}

/// A pipeline of corrections with in-place input updates.
#[derive(Debug)]
pub struct CompoundCorrection {
    name: String,
    description: String,
    inputs: Vec<Variable>,
    output: Variable,
    inputs_update: Vec<usize>,
    input_op: PipelineOp,
    output_op: PipelineOp,
    stack: Vec<(Vec<usize>, Arc<Correction>)>,
}

impl CompoundCorrection {
    pub(crate) fn from_json(
        value: &Json,
        corrections: &FxHashMap<String, Arc<Correction>>,
    ) -> Result<Self, LoadError> {
        let obj = Obj::wrap(value, "compound_correction")?;
        let name = obj.str_field("name")?.to_owned();
        let description = obj.description()?;

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
                "output {} of compound correction {name} must be real-valued",
                output.name()
            )));
        }

        let mut inputs_update = Vec::new();
        for item in obj.array_field("inputs_update")? {
            let update = element_str(item, "inputs_update")?;
            let idx = inputs
                .iter()
                .position(|v| v.name() == update)
                .ok_or_else(|| LoadError::UnknownVariable(update.to_owned()))?;
            if inputs[idx].var_type() != VarType::Real {
                return Err(LoadError::TypeDisallowed(format!(
                    "updatable input {update} must be real-valued"
                )));
            }
            inputs_update.push(idx);
        }

        let input_op = match obj.str_field("input_op")? {
            "+" => PipelineOp::Add,
            "*" => PipelineOp::Multiply,
            "/" => PipelineOp::Divide,
            _ => return Err(LoadError::InvalidFieldType("input_op")),
        };
        let output_op = match obj.str_field("output_op")? {
            "+" => PipelineOp::Add,
            "*" => PipelineOp::Multiply,
            "/" => PipelineOp::Divide,
            "last" => PipelineOp::Last,
            _ => return Err(LoadError::InvalidFieldType("output_op")),
        };

        let stack_names = obj.array_field("stack")?;
        if stack_names.is_empty() {
            return Err(LoadError::InvalidFieldType("stack"));
        }
        let mut stack = Vec::with_capacity(stack_names.len());
        for item in stack_names {
            let corr_name = element_str(item, "stack")?;
            let corr = corrections
                .get(corr_name)
                .cloned()
                .ok_or_else(|| LoadError::UnresolvedConstituent(corr_name.to_owned()))?;
            // Each constituent reads the compound's tuple through a
            // name-matched permutation computed once at load.
            let mut permutation = Vec::with_capacity(corr.inputs().len());
            for needed in corr.inputs() {
                let idx = inputs
                    .iter()
                    .position(|v| v.name() == needed.name())
                    .ok_or_else(|| LoadError::UnknownVariable(needed.name().to_owned()))?;
                if inputs[idx].var_type() != needed.var_type() {
                    return Err(LoadError::TypeDisallowed(format!(
                        "input {} is {} here but {} in constituent {corr_name}",
                        needed.name(),
                        inputs[idx].var_type(),
                        needed.var_type()
                    )));
                }
                permutation.push(idx);
            }
            stack.push((permutation, corr));
        }

        Ok(CompoundCorrection {
            name,
            description,
            inputs,
            output,
            inputs_update,
            input_op,
            output_op,
            stack,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    pub fn output(&self) -> &Variable {
        &self.output
    }

    /// Runs the pipeline on one input tuple.
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

        let mut state = values.to_vec();
        let mut sub: Vec<Value> = Vec::new();
        let mut out = 0.0;
        let mut first = true;
        for (permutation, corr) in &self.stack {
            sub.clear();
            sub.extend(permutation.iter().map(|&i| state[i].clone()));
            let sf = corr.evaluate(&sub)?;
            for &j in &self.inputs_update {
                match state[j] {
                    Value::Real(current) => {
                        state[j] = Value::Real(combine(current, sf, self.input_op));
                    }
                    _ => {
                        return Err(EvalError::Internal(
                            "updatable input became non-real after load".into(),
                        ))
                    }
                }
            }
            if first {
                out = sf;
                first = false;
            } else {
                out = combine(out, sf, self.output_op);
            }
        }
        Ok(out)
    }
}
