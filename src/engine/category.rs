//! Discrete dispatch on a string or integer input.

use rustc_hash::FxHashMap;

use crate::engine::content::{resolve_content, Content, LoadContext};
use crate::engine::errors::{EvalError, LoadError};
use crate::engine::variable::{Value, VarType};
use crate::frontend::json::Obj;
use serde_json::Value as Json;

/// The key map variant, chosen by the bound input's declared type.
#[derive(Debug)]
enum CategoryMap {
    Str(FxHashMap<String, Content>),
    Int(FxHashMap<i32, Content>),
}

/// Keyed dispatch with an optional default subtree.
#[derive(Debug)]
pub(crate) struct Category {
    input: usize,
    map: CategoryMap,
    default: Option<Box<Content>>,
}

impl Category {
    pub(crate) fn from_json(value: &Json, ctx: &LoadContext) -> Result<Self, LoadError> {
        let obj = Obj::wrap(value, "category")?;
        let name = obj.str_field("input")?;
        let input = ctx.input_index(name)?;
        let var_type = ctx.inputs[input].var_type();

        let mut map = match var_type {
            VarType::String => CategoryMap::Str(FxHashMap::default()),
            VarType::Integer => CategoryMap::Int(FxHashMap::default()),
            VarType::Real => {
                return Err(LoadError::TypeDisallowed(format!(
                    "category input {name} must be string or int, got real"
                )))
            }
        };

        for item in obj.array_field("content")? {
            let item = Obj::wrap(item, "content")?;
            let key = item.field("key")?;
            let node = resolve_content(item.field("value")?, ctx)?;
            match (&mut map, key) {
                (CategoryMap::Str(m), Json::String(k)) => {
                    if m.insert(k.clone(), node).is_some() {
                        return Err(LoadError::DuplicateName(k.clone()));
                    }
                }
                (CategoryMap::Int(m), _) if key.as_i64().is_some() => {
                    let k = key
                        .as_i64()
                        .and_then(|v| i32::try_from(v).ok())
                        .ok_or(LoadError::InvalidFieldType("key"))?;
                    if m.insert(k, node).is_some() {
                        return Err(LoadError::DuplicateName(k.to_string()));
                    }
                }
                _ => {
                    return Err(LoadError::TypeDisallowed(format!(
                        "category key does not match the {} type of input {name}",
                        var_type
                    )))
                }
            }
        }

        let default = match obj.opt_field("default") {
            Some(d) => Some(Box::new(resolve_content(d, ctx)?)),
            None => None,
        };
        Ok(Category {
            input,
            map,
            default,
        })
    }

    /// Selects the child node for the bound input value, falling back to
    /// the default subtree when present.
    pub(crate) fn child(&self, values: &[Value]) -> Result<&Content, EvalError> {
        let found = match (&self.map, &values[self.input]) {
            (CategoryMap::Str(m), Value::Str(k)) => m.get(k.as_str()),
            (CategoryMap::Int(m), Value::Int(k)) => m.get(k),
            _ => {
                return Err(EvalError::Internal(
                    "category input type changed after load".into(),
                ))
            }
        };
        match found {
            Some(node) => Ok(node),
            None => match &self.default {
                Some(default) => Ok(default),
                None => Err(EvalError::KeyNotFound {
                    node: "category",
                    key: match &values[self.input] {
                        Value::Str(k) => k.clone(),
                        Value::Int(k) => k.to_string(),
                        Value::Real(k) => k.to_string(),
                    },
                }),
            },
        }
    }
}
