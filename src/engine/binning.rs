//! Rectilinear histogram lookup nodes.
//!
//! A `Binning` dispatches on one axis, a `MultiBinning` on several with
//! row-major child indexing (the last axis varies fastest). Axes are either
//! uniform (`{n, low, high}`) or non-uniform (strictly increasing edge
//! lists, where the document may spell infinite edges as `"inf"`, `"+inf"`,
//! or `"-inf"`). Bin `i` covers `[edge_i, edge_{i+1})`.
//!
//! Out-of-range values resolve through the node's flow policy: clamp to the
//! nearest edge bin, fail with `OutOfBounds`, or short-circuit to a default
//! content node evaluated on the original input tuple.

use crate::engine::content::{resolve_content, Content, LoadContext};
use crate::engine::errors::{EvalError, LoadError};
use crate::engine::variable::{Value, VarType};
use crate::frontend::json::Obj;
use serde_json::Value as Json;

/// Bin edges of one axis.
#[derive(Debug)]
pub(crate) enum AxisBins {
    Uniform { n: usize, low: f64, high: f64 },
    NonUniform(Vec<f64>),
}

/// Where a value fell on an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinIndex {
    Under,
    In(usize),
    Over,
}

impl AxisBins {
    fn from_json(value: &Json) -> Result<Self, LoadError> {
        if let Some(items) = value.as_array() {
            if items.len() < 2 {
                return Err(LoadError::InvalidFieldType("edges"));
            }
            let edges = items.iter().map(edge_value).collect::<Result<Vec<_>, _>>()?;
            if edges.windows(2).any(|w| w[0] >= w[1]) {
                return Err(LoadError::NonMonotoneEdges);
            }
            return Ok(AxisBins::NonUniform(edges));
        }
        let obj = Obj::wrap(value, "edges")?;
        let n = obj.u32_field("n")? as usize;
        if n == 0 {
            return Err(LoadError::UniformBinsZero);
        }
        let low = obj.f64_field("low")?;
        let high = obj.f64_field("high")?;
        if !(low < high) {
            return Err(LoadError::NonMonotoneEdges);
        }
        Ok(AxisBins::Uniform { n, low, high })
    }

    fn nbins(&self) -> usize {
        match self {
            AxisBins::Uniform { n, .. } => *n,
            AxisBins::NonUniform(edges) => edges.len() - 1,
        }
    }

    fn locate(&self, v: f64) -> BinIndex {
        match self {
            AxisBins::Uniform { n, low, high } => {
                // Negated comparison so NaN resolves through the flow
                // policy, as it does on the non-uniform search path.
                if !(v >= *low) {
                    BinIndex::Under
                } else if v >= *high {
                    BinIndex::Over
                } else {
                    // The in-range check bounds the quotient, but rounding
                    // can still produce n for values just under high.
                    let i = ((v - low) / (high - low) * *n as f64) as usize;
                    BinIndex::In(i.min(n - 1))
                }
            }
            AxisBins::NonUniform(edges) => {
                let i = edges.partition_point(|e| *e <= v);
                if i == 0 {
                    BinIndex::Under
                } else if i == edges.len() {
                    BinIndex::Over
                } else {
                    BinIndex::In(i - 1)
                }
            }
        }
    }
}

/// Document edges admit the literal strings `"inf"`, `"+inf"`, `"-inf"`.
fn edge_value(value: &Json) -> Result<f64, LoadError> {
    if let Some(v) = value.as_f64() {
        return Ok(v);
    }
    match value.as_str() {
        Some("inf") | Some("+inf") => Ok(f64::INFINITY),
        Some("-inf") => Ok(f64::NEG_INFINITY),
        _ => Err(LoadError::InvalidFieldType("edges")),
    }
}

/// Policy for values outside the axis range.
#[derive(Debug)]
pub(crate) enum Flow {
    Clamp,
    Error,
    Default(Box<Content>),
}

impl Flow {
    fn from_json(value: &Json, ctx: &LoadContext) -> Result<Self, LoadError> {
        match value.as_str() {
            Some("clamp") => Ok(Flow::Clamp),
            Some("error") => Ok(Flow::Error),
            _ => Ok(Flow::Default(Box::new(resolve_content(value, ctx)?))),
        }
    }
}

/// 1-D binned lookup.
#[derive(Debug)]
pub(crate) struct Binning {
    input: usize,
    bins: AxisBins,
    contents: Vec<Content>,
    flow: Flow,
}

impl Binning {
    pub(crate) fn from_json(value: &Json, ctx: &LoadContext) -> Result<Self, LoadError> {
        let obj = Obj::wrap(value, "binning")?;
        let input = axis_input(obj.str_field("input")?, ctx)?;
        let bins = AxisBins::from_json(obj.field("edges")?)?;
        let content = obj.array_field("content")?;
        if content.len() != bins.nbins() {
            return Err(LoadError::InconsistentContentSize {
                expected: bins.nbins(),
                found: content.len(),
            });
        }
        let contents = content
            .iter()
            .map(|item| resolve_content(item, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        let flow = Flow::from_json(obj.field("flow")?, ctx)?;
        Ok(Binning {
            input,
            bins,
            contents,
            flow,
        })
    }

    /// Selects the child node for the bound input value.
    pub(crate) fn child(&self, values: &[Value]) -> Result<&Content, EvalError> {
        let v = values[self.input].as_f64();
        let location = self.bins.locate(v);
        match location {
            BinIndex::In(i) => Ok(&self.contents[i]),
            BinIndex::Under | BinIndex::Over => match &self.flow {
                Flow::Clamp => {
                    if location == BinIndex::Under {
                        Ok(&self.contents[0])
                    } else {
                        Ok(&self.contents[self.contents.len() - 1])
                    }
                }
                Flow::Error => Err(EvalError::OutOfBounds {
                    node: "binning",
                    axis: self.input,
                    value: v,
                }),
                Flow::Default(default) => Ok(default),
            },
        }
    }
}

#[derive(Debug)]
struct MultiAxis {
    input: usize,
    stride: usize,
    bins: AxisBins,
}

/// N-D binned lookup with row-major child indexing.
#[derive(Debug)]
pub(crate) struct MultiBinning {
    axes: Vec<MultiAxis>,
    contents: Vec<Content>,
    flow: Flow,
}

impl MultiBinning {
    pub(crate) fn from_json(value: &Json, ctx: &LoadContext) -> Result<Self, LoadError> {
        let obj = Obj::wrap(value, "multibinning")?;
        let inputs = obj.array_field("inputs")?;
        let edges = obj.array_field("edges")?;
        if inputs.len() != edges.len() || inputs.is_empty() {
            return Err(LoadError::InvalidFieldType("inputs"));
        }

        let mut axes = Vec::with_capacity(edges.len());
        for (name, dim) in inputs.iter().zip(edges) {
            let name = name
                .as_str()
                .ok_or(LoadError::InvalidFieldType("inputs"))?;
            axes.push(MultiAxis {
                input: axis_input(name, ctx)?,
                stride: 0,
                bins: AxisBins::from_json(dim)?,
            });
        }
        let mut stride = 1usize;
        for axis in axes.iter_mut().rev() {
            axis.stride = stride;
            stride *= axis.bins.nbins();
        }

        let content = obj.array_field("content")?;
        if content.len() != stride {
            return Err(LoadError::InconsistentContentSize {
                expected: stride,
                found: content.len(),
            });
        }
        let contents = content
            .iter()
            .map(|item| resolve_content(item, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        let flow = Flow::from_json(obj.field("flow")?, ctx)?;
        Ok(MultiBinning {
            axes,
            contents,
            flow,
        })
    }

    /// Selects the child node for the bound input tuple. The first
    /// out-of-range axis resolves the flow policy for the whole lookup.
    pub(crate) fn child(&self, values: &[Value]) -> Result<&Content, EvalError> {
        let mut idx = 0usize;
        for axis in &self.axes {
            let v = values[axis.input].as_f64();
            let location = axis.bins.locate(v);
            let local = match location {
                BinIndex::In(i) => i,
                BinIndex::Under | BinIndex::Over => match &self.flow {
                    Flow::Clamp => {
                        if location == BinIndex::Under {
                            0
                        } else {
                            axis.bins.nbins() - 1
                        }
                    }
                    Flow::Error => {
                        return Err(EvalError::OutOfBounds {
                            node: "multibinning",
                            axis: axis.input,
                            value: v,
                        })
                    }
                    Flow::Default(default) => return Ok(default),
                },
            };
            idx += local * axis.stride;
        }
        Ok(&self.contents[idx])
    }
}

/// Resolves an axis input by name; string inputs are never binnable.
fn axis_input(name: &str, ctx: &LoadContext) -> Result<usize, LoadError> {
    let input = ctx.input_index(name)?;
    if ctx.inputs[input].var_type() == VarType::String {
        return Err(LoadError::TypeDisallowed(format!(
            "cannot bin over string input {name}"
        )));
    }
    Ok(input)
}
