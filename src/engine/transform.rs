//! Input-rewriting node: evaluate a rule, substitute the result into one
//! input position, then evaluate the content subtree on the rewritten tuple.

use crate::engine::content::{resolve_content, Content, LoadContext};
use crate::engine::errors::{EvalError, LoadError};
use crate::engine::variable::{Value, VarType};
use crate::frontend::json::Obj;
use serde_json::Value as Json;

#[derive(Debug)]
pub(crate) struct Transform {
    input: usize,
    rule: Box<Content>,
    content: Box<Content>,
}

impl Transform {
    pub(crate) fn from_json(value: &Json, ctx: &LoadContext) -> Result<Self, LoadError> {
        let obj = Obj::wrap(value, "transform")?;
        let name = obj.str_field("input")?;
        let input = ctx.input_index(name)?;
        if ctx.inputs[input].var_type() == VarType::String {
            return Err(LoadError::TypeDisallowed(format!(
                "transform cannot rewrite string input {name}"
            )));
        }
        Ok(Transform {
            input,
            rule: Box::new(resolve_content(obj.field("rule")?, ctx)?),
            content: Box::new(resolve_content(obj.field("content")?, ctx)?),
        })
    }

    pub(crate) fn evaluate(&self, values: &[Value]) -> Result<f64, EvalError> {
        let rewritten = self.rule.evaluate(values)?;
        let mut new_values = values.to_vec();
        new_values[self.input] = match &new_values[self.input] {
            Value::Real(_) => Value::Real(rewritten),
            // Round half away from zero; the cast saturates at i32 bounds.
            Value::Int(_) => Value::Int(rewritten.round() as i32),
            Value::Str(_) => {
                return Err(EvalError::Internal(
                    "transform target became a string after load".into(),
                ))
            }
        };
        self.content.evaluate(&new_values)
    }
}
