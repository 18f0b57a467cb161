//! # TFormula Parser
//!
//! Parses TFormula-dialect arithmetic expressions into [`FormulaAst`] trees
//! using the Pest parser generator. The grammar is defined in
//! `grammar/tformula.pest` using Pest's PEG syntax.
//!
//! Binding happens at parse time:
//!
//! - the formula-local variables `x,y,z,t` are positions 0..3 in the
//!   formula's declared variable list, which the caller has already resolved
//!   to input indices of the enclosing correction;
//! - `[k]` parameters are either inlined as literals (inline formulas,
//!   `bind_parameters = true`) or preserved as `Parameter` nodes (generic
//!   formulas shared by reference).
//!
//! The derived parser holds no state, so concurrent parses need no locking.

use crate::engine::errors::LoadError;
use crate::frontend::ast::{BinaryOp, FormulaAst, UnaryOp};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "grammar/tformula.pest"]
struct TFormulaParser;

/// Name-resolution scope for a single formula parse.
pub struct FormulaScope<'a> {
    /// Parameter values, consulted only when `bind_parameters` is set.
    pub parameters: &'a [f64],
    /// Maps formula-local variable positions (`x`=0 .. `t`=3) to input
    /// indices of the enclosing correction.
    pub variable_index: &'a [usize],
    /// Inline `[k]` as `Literal(parameters[k])` instead of `Parameter(k)`.
    pub bind_parameters: bool,
}

/// Parses a TFormula expression into an AST.
///
/// Fails with [`LoadError::BadFormula`] on syntax errors (with the offending
/// position), [`LoadError::InsufficientVariables`] when the expression names
/// a variable position the declared list does not cover, and
/// [`LoadError::InsufficientParameters`] when binding a parameter the value
/// list does not cover.
pub fn parse_formula(expression: &str, scope: &FormulaScope) -> Result<FormulaAst, LoadError> {
    let mut pairs = TFormulaParser::parse(Rule::formula, expression).map_err(|e| {
        let position = match e.location {
            pest::error::InputLocation::Pos(p) => p,
            pest::error::InputLocation::Span((start, _)) => start,
        };
        LoadError::BadFormula {
            position,
            message: e.variant.message().into_owned(),
        }
    })?;

    let formula = pairs.next().expect("formula rule always produces a pair");
    let expr = formula
        .into_inner()
        .find(|p| p.as_rule() == Rule::expression)
        .expect("formula rule contains an expression");
    build_expression(expr, scope)
}

fn build_expression(pair: Pair<Rule>, scope: &FormulaScope) -> Result<FormulaAst, LoadError> {
    match pair.as_rule() {
        Rule::expression => {
            let inner = pair.into_inner().next().expect("expression wraps eq_expr");
            build_expression(inner, scope)
        }
        Rule::eq_expr | Rule::ord_expr | Rule::add_expr | Rule::mul_expr => {
            build_left_assoc(pair, scope)
        }
        Rule::pow_expr => build_pow(pair, scope),
        Rule::atom => {
            let inner = pair.into_inner().next().expect("atom wraps one alternative");
            build_expression(inner, scope)
        }
        Rule::literal => build_literal(pair),
        Rule::uatom => build_uatom(pair, scope),
        Rule::paren => {
            let inner = pair.into_inner().next().expect("paren wraps expression");
            build_expression(inner, scope)
        }
        Rule::callu => build_callu(pair, scope),
        Rule::callb => build_callb(pair, scope),
        Rule::name => {
            let inner = pair.into_inner().next().expect("name wraps one alternative");
            build_expression(inner, scope)
        }
        Rule::parameter => build_parameter(pair, scope),
        Rule::variable => build_variable(pair, scope),
        other => unreachable!("unexpected formula rule: {:?}", other),
    }
}

/// Folds `operand (op operand)*` left-associatively.
fn build_left_assoc(pair: Pair<Rule>, scope: &FormulaScope) -> Result<FormulaAst, LoadError> {
    let mut it = pair.into_inner();
    let mut node = build_expression(it.next().expect("leading operand"), scope)?;
    while let Some(op_pair) = it.next() {
        let rhs = build_expression(it.next().expect("operand after operator"), scope)?;
        let op = binary_op_token(op_pair.as_str());
        node = FormulaAst::Binary {
            op,
            left: Box::new(node),
            right: Box::new(rhs),
        };
    }
    Ok(node)
}

/// Folds `atom (^ atom)*` right-associatively: `a^b^c` is `a^(b^c)`.
fn build_pow(pair: Pair<Rule>, scope: &FormulaScope) -> Result<FormulaAst, LoadError> {
    let operands: Vec<Pair<Rule>> = pair
        .into_inner()
        .filter(|p| p.as_rule() != Rule::op_pow)
        .collect();
    let mut it = operands.into_iter().rev();
    let mut node = build_expression(it.next().expect("trailing operand"), scope)?;
    for lhs in it {
        let lhs = build_expression(lhs, scope)?;
        node = FormulaAst::Binary {
            op: BinaryOp::Pow,
            left: Box::new(lhs),
            right: Box::new(node),
        };
    }
    Ok(node)
}

fn binary_op_token(token: &str) -> BinaryOp {
    match token {
        "==" => BinaryOp::Equal,
        "!=" => BinaryOp::NotEqual,
        ">=" => BinaryOp::GreaterEq,
        "<=" => BinaryOp::LessEq,
        ">" => BinaryOp::Greater,
        "<" => BinaryOp::Less,
        "-" => BinaryOp::Minus,
        "+" => BinaryOp::Plus,
        "/" => BinaryOp::Div,
        "*" => BinaryOp::Times,
        "^" => BinaryOp::Pow,
        other => unreachable!("unexpected binary operator: {other:?}"),
    }
}

fn build_uatom(pair: Pair<Rule>, scope: &FormulaScope) -> Result<FormulaAst, LoadError> {
    let mut negated = false;
    let mut node = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::neg => negated = true,
            _ => node = Some(build_expression(p, scope)?),
        }
    }
    let node = node.expect("uatom contains an operand");
    Ok(if negated {
        FormulaAst::Unary {
            op: UnaryOp::Negative,
            arg: Box::new(node),
        }
    } else {
        node
    })
}

fn build_callu(pair: Pair<Rule>, scope: &FormulaScope) -> Result<FormulaAst, LoadError> {
    let mut it = pair.into_inner();
    let func = it.next().expect("callu function name");
    let arg = build_expression(it.next().expect("callu argument"), scope)?;
    let op = match func.as_str() {
        "log" => UnaryOp::Log,
        "log10" => UnaryOp::Log10,
        "exp" => UnaryOp::Exp,
        "erf" => UnaryOp::Erf,
        "sqrt" => UnaryOp::Sqrt,
        "abs" => UnaryOp::Abs,
        "cos" => UnaryOp::Cos,
        "sin" => UnaryOp::Sin,
        "tan" => UnaryOp::Tan,
        "acos" => UnaryOp::Acos,
        "asin" => UnaryOp::Asin,
        "atan" => UnaryOp::Atan,
        "cosh" => UnaryOp::Cosh,
        "sinh" => UnaryOp::Sinh,
        "tanh" => UnaryOp::Tanh,
        "acosh" => UnaryOp::Acosh,
        "asinh" => UnaryOp::Asinh,
        "atanh" => UnaryOp::Atanh,
        other => unreachable!("unexpected unary function: {other:?}"),
    };
    Ok(FormulaAst::Unary {
        op,
        arg: Box::new(arg),
    })
}

fn build_callb(pair: Pair<Rule>, scope: &FormulaScope) -> Result<FormulaAst, LoadError> {
    let mut it = pair.into_inner();
    let func = it.next().expect("callb function name");
    let left = build_expression(it.next().expect("callb first argument"), scope)?;
    let right = build_expression(it.next().expect("callb second argument"), scope)?;
    let op = match func.as_str() {
        "atan2" => BinaryOp::Atan2,
        "pow" => BinaryOp::Pow,
        "max" => BinaryOp::Max,
        "min" => BinaryOp::Min,
        other => unreachable!("unexpected binary function: {other:?}"),
    };
    Ok(FormulaAst::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn build_literal(pair: Pair<Rule>) -> Result<FormulaAst, LoadError> {
    let text = pair.as_str();
    let value = text.parse::<f64>().map_err(|e| LoadError::BadFormula {
        position: pair.as_span().start(),
        message: format!("invalid numeric literal {text:?}: {e}"),
    })?;
    Ok(FormulaAst::Literal(value))
}

fn build_parameter(pair: Pair<Rule>, scope: &FormulaScope) -> Result<FormulaAst, LoadError> {
    let index_pair = pair.into_inner().next().expect("parameter index");
    let index: usize = index_pair
        .as_str()
        .parse()
        .map_err(|e| LoadError::BadFormula {
            position: index_pair.as_span().start(),
            message: format!("invalid parameter index: {e}"),
        })?;
    if scope.bind_parameters {
        match scope.parameters.get(index) {
            Some(value) => Ok(FormulaAst::Literal(*value)),
            None => Err(LoadError::InsufficientParameters {
                index,
                count: scope.parameters.len(),
            }),
        }
    } else {
        Ok(FormulaAst::Parameter(index))
    }
}

fn build_variable(pair: Pair<Rule>, scope: &FormulaScope) -> Result<FormulaAst, LoadError> {
    let name = pair.as_str();
    let position = match name {
        "x" => 0,
        "y" => 1,
        "z" => 2,
        "t" => 3,
        other => unreachable!("unexpected formula variable: {other:?}"),
    };
    match scope.variable_index.get(position) {
        Some(input_index) => Ok(FormulaAst::Variable(*input_index)),
        None => Err(LoadError::InsufficientVariables(name.to_string())),
    }
}
