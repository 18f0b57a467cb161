//! Declared inputs and the values bound to them at evaluation time.

use crate::engine::errors::{EvalError, LoadError};
use crate::frontend::json::Obj;
use serde_json::Value as Json;

/// The semantic type of a declared input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    String,
    Integer,
    Real,
}

impl VarType {
    /// The type name as it appears in documents and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            VarType::String => "string",
            VarType::Integer => "int",
            VarType::Real => "real",
        }
    }
}

impl std::fmt::Display for VarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value provided for one input position.
///
/// A value is type-compatible with a [`Variable`] iff the tags match
/// exactly; no implicit conversions happen at the evaluation gate.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i32),
    Real(f64),
}

impl Value {
    /// The tag name used in type-mismatch messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "int",
            Value::Real(_) => "real",
        }
    }

    /// Numeric view used by binned lookups and formulas: integers widen,
    /// reals pass through. Strings never reach here (load-time validation
    /// keeps them out of numeric nodes); they map to NaN to keep the
    /// evaluator total.
    pub(crate) fn as_f64(&self) -> f64 {
        match self {
            Value::Real(v) => *v,
            Value::Int(v) => f64::from(*v),
            Value::Str(_) => f64::NAN,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// A declared input or output: name, free-form description, semantic type.
///
/// Immutable after load. Input names are unique within one correction.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    description: String,
    var_type: VarType,
}

impl Variable {
    pub(crate) fn from_json(value: &Json) -> Result<Self, LoadError> {
        let obj = Obj::wrap(value, "variable")?;
        let var_type = match obj.str_field("type")? {
            "string" => VarType::String,
            "int" => VarType::Integer,
            "real" => VarType::Real,
            _ => return Err(LoadError::InvalidFieldType("type")),
        };
        Ok(Variable {
            name: obj.str_field("name")?.to_owned(),
            description: obj.description()?,
            var_type,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn var_type(&self) -> VarType {
        self.var_type
    }

    /// Checks that `value`'s tag matches the declared type.
    pub(crate) fn validate(&self, position: usize, value: &Value) -> Result<(), EvalError> {
        let matches = matches!(
            (self.var_type, value),
            (VarType::String, Value::Str(_))
                | (VarType::Integer, Value::Int(_))
                | (VarType::Real, Value::Real(_))
        );
        if matches {
            Ok(())
        } else {
            Err(EvalError::TypeMismatch {
                position,
                name: self.name.clone(),
                got: value.type_name(),
                expected: self.var_type.as_str(),
            })
        }
    }
}
