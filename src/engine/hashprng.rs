//! Deterministic pseudo-random draw seeded by input values.
//!
//! The seed is XXH64 (seed 0) over the concatenated 64-bit little-endian
//! images of the referenced inputs: integers sign-extend to `i64` and
//! reinterpret as `u64`, reals contribute their IEEE-754 bit pattern. The
//! seed drives a fresh pcg32_oneseq generator per evaluation, so the node
//! is a pure function of its inputs.
//!
//! The generator is implemented here rather than through a crate because
//! its outputs are contractual: the constants and the XSH-RR output
//! function follow the pcg32_oneseq reference exactly.

use smallvec::SmallVec;
use xxhash_rust::xxh64::xxh64;

use crate::engine::content::LoadContext;
use crate::engine::errors::{EvalError, LoadError};
use crate::engine::variable::{Value, VarType};
use crate::frontend::json::{element_str, Obj};
use serde_json::Value as Json;

const PCG_MULT: u64 = 6364136223846793005;
const PCG_INC: u64 = 1442695040888963407;

/// Minimal pcg32_oneseq: 64-bit LCG state, XSH-RR output of the
/// pre-advance state.
struct Pcg32 {
    state: u64,
}

impl Pcg32 {
    fn new(seed: u64) -> Self {
        Pcg32 {
            state: seed
                .wrapping_add(PCG_INC)
                .wrapping_mul(PCG_MULT)
                .wrapping_add(PCG_INC),
        }
    }

    fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.state = old.wrapping_mul(PCG_MULT).wrapping_add(PCG_INC);
        let xorshifted = (((old >> 18) ^ old) >> 27) as u32;
        let rot = (old >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    /// One draw mapped to `[0, 1)`.
    fn uniform(&mut self) -> f64 {
        const TWO_NEG32: f64 = 1.0 / 4294967296.0;
        f64::from(self.next_u32()) * TWO_NEG32
    }

    /// 53-bit uniform in `[0, 1)` from two draws.
    fn canonical(&mut self) -> f64 {
        const TWO_NEG53: f64 = 1.0 / 9007199254740992.0;
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (((hi << 32) | lo) >> 11) as f64 * TWO_NEG53
    }

    /// Marsaglia polar with 53-bit canonical uniforms.
    fn std_normal(&mut self) -> f64 {
        loop {
            let u = 2.0 * self.canonical() - 1.0;
            let v = 2.0 * self.canonical() - 1.0;
            let s = u * u + v * v;
            if s < 1.0 && s != 0.0 {
                return u * (-2.0 * s.ln() / s).sqrt();
            }
        }
    }

    /// Polar form over 31-bit draws: `u, v = ldexp(draw, -31) - 1`.
    fn polar_normal(&mut self) -> f64 {
        loop {
            let u = libm::ldexp(f64::from(self.next_u32()), -31) - 1.0;
            let v = libm::ldexp(f64::from(self.next_u32()), -31) - 1.0;
            let s = u * u + v * v;
            if s < 1.0 && s != 0.0 {
                return u * (-2.0 * s.ln() / s).sqrt();
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Distribution {
    StdFlat,
    StdNormal,
    Normal,
}

/// Pseudo-random draw node.
#[derive(Debug)]
pub(crate) struct HashPrng {
    inputs: Vec<usize>,
    dist: Distribution,
}

impl HashPrng {
    pub(crate) fn from_json(value: &Json, ctx: &LoadContext) -> Result<Self, LoadError> {
        let obj = Obj::wrap(value, "hashprng")?;
        let mut inputs = Vec::new();
        for item in obj.array_field("inputs")? {
            let name = element_str(item, "inputs")?;
            let idx = ctx.input_index(name)?;
            if ctx.inputs[idx].var_type() == VarType::String {
                return Err(LoadError::TypeDisallowed(format!(
                    "hashprng cannot be seeded by string input {name}"
                )));
            }
            inputs.push(idx);
        }
        let dist = match obj.str_field("distribution")? {
            "stdflat" => Distribution::StdFlat,
            "stdnormal" => Distribution::StdNormal,
            "normal" => Distribution::Normal,
            _ => return Err(LoadError::InvalidFieldType("distribution")),
        };
        Ok(HashPrng { inputs, dist })
    }

    pub(crate) fn evaluate(&self, values: &[Value]) -> Result<f64, EvalError> {
        let mut buf: SmallVec<[u8; 64]> = SmallVec::new();
        for &idx in &self.inputs {
            let bits = match &values[idx] {
                Value::Int(v) => i64::from(*v) as u64,
                Value::Real(v) => v.to_bits(),
                Value::Str(_) => {
                    return Err(EvalError::Internal(
                        "hashprng input became a string after load".into(),
                    ))
                }
            };
            buf.extend_from_slice(&bits.to_le_bytes());
        }
        let mut rng = Pcg32::new(xxh64(&buf, 0));
        Ok(match self.dist {
            Distribution::StdFlat => rng.uniform(),
            Distribution::StdNormal => rng.std_normal(),
            Distribution::Normal => rng.polar_normal(),
        })
    }
}
