//! Formula nodes: an AST bound to a correction's inputs, compiled to a
//! linear instruction stream for hot-path evaluation.
//!
//! A `Formula` is owned either inline by a content node or by the enclosing
//! correction's generic-formula table; `FormulaRef` holds a shared handle to
//! a generic formula together with the parameter values it binds.
//!
//! The compiled program is a register machine with a small spill stack: the
//! left operand of every binary node is computed into the register, pushed,
//! and popped when the operator is applied after the right operand. The
//! recursive AST walk and the compiled form agree bit-for-bit because both
//! funnel through the same operator kernels in [`crate::frontend::ast`].

use std::sync::Arc;

use smallvec::{smallvec, SmallVec};

use crate::engine::errors::{EvalError, LoadError};
use crate::engine::variable::{Value, VarType, Variable};
use crate::frontend::ast::{eval_binary_op, eval_unary_op, BinaryOp, FormulaAst, UnaryOp};
use crate::frontend::json::{element_f64, element_str, Obj};
use crate::frontend::parser::{parse_formula, FormulaScope};
use serde_json::Value as Json;

/// One instruction of a compiled formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum OpCode {
    /// Load the next literal into the register.
    LoadLiteral,
    /// Load an input value (by stored index) into the register.
    LoadVariable,
    /// Load a bound parameter (by stored index) into the register.
    LoadParameter,
    /// Spill the register before computing a right operand.
    PushStack,
    Unary(UnaryOp),
    Binary(BinaryOp),
}

/// A formula compiled to a linear instruction stream.
#[derive(Debug, Clone)]
pub(crate) struct FormulaProgram {
    ops: Vec<OpCode>,
    literals: Vec<f64>,
    indices: Vec<u32>,
    stack_depth: u32,
}

struct CompileState {
    ops: Vec<OpCode>,
    literals: Vec<f64>,
    indices: Vec<u32>,
    depth: u32,
    max_depth: u32,
}

impl FormulaProgram {
    pub(crate) fn compile(ast: &FormulaAst) -> Self {
        let mut state = CompileState {
            ops: Vec::new(),
            literals: Vec::new(),
            indices: Vec::new(),
            depth: 0,
            max_depth: 0,
        };
        Self::emit(ast, &mut state);
        FormulaProgram {
            ops: state.ops,
            literals: state.literals,
            indices: state.indices,
            stack_depth: state.max_depth,
        }
    }

    fn emit(ast: &FormulaAst, state: &mut CompileState) {
        match ast {
            FormulaAst::Literal(v) => {
                state.literals.push(*v);
                state.ops.push(OpCode::LoadLiteral);
            }
            FormulaAst::Variable(idx) => {
                state.indices.push(*idx as u32);
                state.ops.push(OpCode::LoadVariable);
            }
            FormulaAst::Parameter(idx) => {
                state.indices.push(*idx as u32);
                state.ops.push(OpCode::LoadParameter);
            }
            FormulaAst::Unary { op, arg } => {
                Self::emit(arg, state);
                state.ops.push(OpCode::Unary(*op));
            }
            FormulaAst::Binary { op, left, right } => {
                Self::emit(left, state);
                state.ops.push(OpCode::PushStack);
                state.depth += 1;
                state.max_depth = state.max_depth.max(state.depth);
                Self::emit(right, state);
                state.ops.push(OpCode::Binary(*op));
                state.depth -= 1;
            }
        }
    }

    /// Runs the instruction stream. Index validity and stack balance are
    /// guaranteed by compilation.
    pub(crate) fn evaluate(&self, values: &[Value], params: &[f64]) -> f64 {
        let mut stack: SmallVec<[f64; 8]> = smallvec![0.0; self.stack_depth as usize];
        let mut sptr = 0usize;
        let mut lit = 0usize;
        let mut idx = 0usize;
        let mut reg = 0.0f64;
        for op in &self.ops {
            match op {
                OpCode::LoadLiteral => {
                    reg = self.literals[lit];
                    lit += 1;
                }
                OpCode::LoadVariable => {
                    reg = values[self.indices[idx] as usize].as_f64();
                    idx += 1;
                }
                OpCode::LoadParameter => {
                    reg = params[self.indices[idx] as usize];
                    idx += 1;
                }
                OpCode::PushStack => {
                    stack[sptr] = reg;
                    sptr += 1;
                }
                OpCode::Unary(op) => reg = eval_unary_op(*op, reg),
                OpCode::Binary(op) => {
                    sptr -= 1;
                    reg = eval_binary_op(*op, stack[sptr], reg);
                }
            }
        }
        reg
    }
}

/// An arithmetic expression bound to a correction's inputs.
#[derive(Debug)]
pub struct Formula {
    expression: String,
    generic: bool,
    param_count: usize,
    ast: FormulaAst,
    program: FormulaProgram,
}

impl Formula {
    /// Builds a formula from its JSON node, resolving declared variables
    /// against `inputs`. Generic formulas keep `[k]` symbolic; inline
    /// formulas bind them from the `parameters` field at parse time.
    pub(crate) fn from_json(
        value: &Json,
        inputs: &[Variable],
        generic: bool,
    ) -> Result<Self, LoadError> {
        let obj = Obj::wrap(value, "formula")?;
        match obj.str_field("parser")? {
            "TFormula" => {}
            other => return Err(LoadError::UnknownParser(other.to_owned())),
        }
        let expression = obj.str_field("expression")?.to_owned();

        let mut variable_index = Vec::new();
        for item in obj.array_field("variables")? {
            let name = element_str(item, "variables")?;
            let idx = inputs
                .iter()
                .position(|v| v.name() == name)
                .ok_or_else(|| LoadError::UnknownVariable(name.to_owned()))?;
            if inputs[idx].var_type() != VarType::Real {
                return Err(LoadError::TypeDisallowed(format!(
                    "formulas only accept real-valued inputs, got type {} for variable {}",
                    inputs[idx].var_type(),
                    name
                )));
            }
            variable_index.push(idx);
        }

        let mut parameters = Vec::new();
        for item in obj.opt_array_field("parameters")? {
            parameters.push(element_f64(item, "parameters")?);
        }

        let scope = FormulaScope {
            parameters: &parameters,
            variable_index: &variable_index,
            bind_parameters: !generic,
        };
        let ast = parse_formula(&expression, &scope)?;
        let program = FormulaProgram::compile(&ast);
        let param_count = ast.parameter_count();
        Ok(Formula {
            expression,
            generic,
            param_count,
            ast,
            program,
        })
    }

    /// The source expression text.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Number of positional parameters the expression references.
    pub fn parameter_count(&self) -> usize {
        self.param_count
    }

    /// The parsed expression tree.
    pub fn ast(&self) -> &FormulaAst {
        &self.ast
    }

    /// Evaluates a non-generic formula. Generic formulas must be reached
    /// through a [`FormulaRef`] that binds their parameters.
    pub(crate) fn evaluate(&self, values: &[Value]) -> Result<f64, EvalError> {
        if self.generic {
            return Err(EvalError::GenericNotBound);
        }
        Ok(self.program.evaluate(values, &[]))
    }

    /// Evaluates with bound parameter values.
    pub(crate) fn evaluate_with(&self, values: &[Value], params: &[f64]) -> Result<f64, EvalError> {
        if params.len() < self.param_count {
            return Err(EvalError::InsufficientParameters {
                needed: self.param_count,
                got: params.len(),
            });
        }
        Ok(self.program.evaluate(values, params))
    }
}

/// A shared reference to a generic formula with parameters bound.
#[derive(Debug, Clone)]
pub(crate) struct FormulaRef {
    formula: Arc<Formula>,
    parameters: Vec<f64>,
}

impl FormulaRef {
    pub(crate) fn from_json(value: &Json, generics: &[Arc<Formula>]) -> Result<Self, LoadError> {
        let obj = Obj::wrap(value, "formularef")?;
        let index = obj.u32_field("index")? as usize;
        let formula = generics
            .get(index)
            .cloned()
            .ok_or(LoadError::InvalidFieldType("index"))?;
        let mut parameters = Vec::new();
        for item in obj.array_field("parameters")? {
            parameters.push(element_f64(item, "parameters")?);
        }
        if parameters.len() < formula.parameter_count() {
            return Err(LoadError::InsufficientParameters {
                index: formula.parameter_count() - 1,
                count: parameters.len(),
            });
        }
        Ok(FormulaRef {
            formula,
            parameters,
        })
    }

    pub(crate) fn evaluate(&self, values: &[Value]) -> Result<f64, EvalError> {
        self.formula.evaluate_with(values, &self.parameters)
    }
}
