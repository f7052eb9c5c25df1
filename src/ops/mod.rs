//! Per-operator shape inference and the operator registry.
//!
//! Each operator family lives in its own submodule as a unit struct
//! implementing [`InferShapes`]. [`OpRegistry::with_all_ops`] wires the
//! built-in vocabulary up under the operator-type names used by the host
//! graph compiler; plugins register additional operators through
//! [`OpRegistry::register_op`].

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::attr::AttrBag;
use crate::shape::Shape;
use crate::value::{Constant, DataType, TensorDescriptor};

pub mod concat;
pub mod elementwise;
pub mod generate;
pub mod layout;
pub mod norm;
pub mod pooling;
pub mod reduce;
pub mod rnn;

pub use concat::Concat;
pub use elementwise::{Binary, Identity, Variadic};
pub use generate::Range;
pub use layout::{Flatten, Reshape, Squeeze, Tile, Transpose, Unsqueeze};
pub use norm::LayerNorm;
pub use pooling::{MaxPool, PadMode};
pub use reduce::Reduce;
pub use rnn::{expand_block_lstm, InputBinding, OutputBinding, PrimitiveOp, Rewrite, SubgraphPlan};

pub use crate::slice::Slice;

/// Reasons why shape inference may fail for an operator.
///
/// Failures are always fatal to the single operator; the host decides
/// whether to abort the compile or skip the node.
#[derive(Clone, Debug, PartialEq)]
pub enum InferError {
    /// A required input, constant value or attribute was absent.
    NullInput { what: &'static str },

    /// A rank is outside the supported bound.
    InvalidRank { rank: i64, max: i64 },

    /// An axis fell outside the valid `[-rank, rank)` window.
    InvalidAxis { axis: i64, rank: usize },

    /// Input shapes are incompatible with the operator's algebraic contract.
    ShapeMismatch { reason: &'static str },

    /// A constant tensor has a dtype this rule does not implement.
    UnsupportedDtype { dtype: DataType },

    /// An input or attribute has an invalid value.
    InvalidValue { reason: &'static str },

    /// A computed divisor evaluated to zero.
    ZeroDivisor { what: &'static str },
}

impl Display for InferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferError::NullInput { what } => write!(f, "required input {} is missing", what),
            InferError::InvalidRank { rank, max } => {
                write!(f, "rank {} is outside the supported bound {}", rank, max)
            }
            InferError::InvalidAxis { axis, rank } => {
                write!(f, "axis {} is out of range for rank {}", axis, rank)
            }
            InferError::ShapeMismatch { reason } => write!(f, "incompatible shapes: {}", reason),
            InferError::UnsupportedDtype { dtype } => write!(f, "unsupported dtype {}", dtype),
            InferError::InvalidValue { reason } => {
                write!(f, "input or attribute has invalid value: {}", reason)
            }
            InferError::ZeroDivisor { what } => write!(f, "{} evaluated to zero", what),
        }
    }
}

impl Error for InferError {}

/// Resolve an axis given as a value in `[-rank, rank-1]` to a zero-based
/// dimension index.
///
/// Negative values count backwards from the last dimension. This is the
/// universal negative-indexing rule for every operator in this crate.
pub fn resolve_axis(rank: usize, axis: i64) -> Result<usize, InferError> {
    let irank = rank as i64;
    if axis < -irank || axis >= irank {
        return Err(InferError::InvalidAxis { axis, rank });
    }
    if axis >= 0 {
        Ok(axis as usize)
    } else {
        Ok((irank + axis) as usize)
    }
}

/// Resolve a sequence of possibly-negative axes against `rank`.
pub fn resolve_axes(rank: usize, axes: &[i64]) -> Result<SmallVec<[usize; 4]>, InferError> {
    let mut resolved = SmallVec::with_capacity(axes.len());
    for &axis in axes {
        resolved.push(resolve_axis(rank, axis)?);
    }
    Ok(resolved)
}

/// Borrowed view of everything an operator's shape rule may consume: input
/// descriptors, constant values for data-dependent inputs, and attributes.
pub struct InferContext<'a> {
    inputs: &'a [TensorDescriptor],
    constants: &'a [Option<Constant>],
    attrs: &'a AttrBag,
}

impl<'a> InferContext<'a> {
    pub fn new(
        inputs: &'a [TensorDescriptor],
        constants: &'a [Option<Constant>],
        attrs: &'a AttrBag,
    ) -> InferContext<'a> {
        InferContext {
            inputs,
            constants,
            attrs,
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn input(&self, index: usize) -> Result<&TensorDescriptor, InferError> {
        self.inputs
            .get(index)
            .ok_or(InferError::NullInput { what: "input tensor" })
    }

    pub fn input_shape(&self, index: usize) -> Result<&Shape, InferError> {
        self.input(index).map(|desc| &desc.shape)
    }

    pub fn inputs(&self) -> &[TensorDescriptor] {
        self.inputs
    }

    /// Constant value for a data-dependent input, required.
    pub fn constant(&self, index: usize) -> Result<&Constant, InferError> {
        self.try_constant(index)
            .ok_or(InferError::NullInput { what: "constant input value" })
    }

    /// Constant value for a data-dependent input, if the host resolved one.
    pub fn try_constant(&self, index: usize) -> Option<&Constant> {
        self.constants.get(index).and_then(|c| c.as_ref())
    }

    pub fn attrs(&self) -> &AttrBag {
        self.attrs
    }
}

/// Shape inference rule for one operator family.
///
/// Implementations are pure: the same context always produces the same
/// output, and a failure never leaves partial results behind.
pub trait InferShapes {
    /// Compute the output shape for each output slot.
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError>;

    /// Input slots whose runtime values (not just shapes) must be resolved
    /// by the host before [`infer`](InferShapes::infer) is called.
    fn const_inputs(&self) -> &'static [usize] {
        &[]
    }
}

/// Registry mapping operator-type names to shape rules.
///
/// Built once at plugin load time and read-only afterwards, so it can be
/// shared across concurrent inference calls.
#[derive(Default)]
pub struct OpRegistry {
    ops: FxHashMap<String, Box<dyn InferShapes + Send + Sync>>,
}

impl OpRegistry {
    /// Create a new empty registry.
    pub fn new() -> OpRegistry {
        OpRegistry::default()
    }

    /// Register a rule under an operator-type name.
    ///
    /// Later registrations replace earlier ones, which lets plugins override
    /// a built-in rule.
    pub fn register_op(&mut self, name: &str, op: Box<dyn InferShapes + Send + Sync>) {
        self.ops.insert(name.to_string(), op);
    }

    /// Look up the rule for an operator-type name.
    pub fn get(&self, name: &str) -> Option<&(dyn InferShapes + Send + Sync)> {
        self.ops.get(name).map(|op| op.as_ref())
    }

    /// Input slots whose values the named operator declares as
    /// data-dependent, or `None` if the operator is unknown.
    pub fn const_inputs(&self, name: &str) -> Option<&'static [usize]> {
        self.get(name).map(|op| op.const_inputs())
    }

    /// Create a registry with the whole built-in vocabulary registered.
    pub fn with_all_ops() -> OpRegistry {
        let mut reg = OpRegistry::new();

        for name in [
            "Cast", "Tanh", "Relu", "Sigmoid", "Abs", "Neg", "Exp", "Log", "Sqrt",
        ] {
            reg.register_op(name, Box::new(Identity));
        }
        for name in [
            "Add", "Sub", "Mul", "Div", "Maximum", "Minimum", "Equal", "Greater", "Less",
        ] {
            reg.register_op(name, Box::new(Binary));
        }
        reg.register_op("ClipByValue", Box::new(Variadic));

        for name in ["ReduceSum", "ReduceMean", "ReduceMax", "ReduceMin", "ReduceProd"] {
            reg.register_op(name, Box::new(Reduce));
        }

        reg.register_op("Concat", Box::new(Concat));
        reg.register_op("Slice", Box::new(Slice));
        reg.register_op("Reshape", Box::new(Reshape));
        reg.register_op("Squeeze", Box::new(Squeeze));
        reg.register_op("Unsqueeze", Box::new(Unsqueeze));
        reg.register_op("Transpose", Box::new(Transpose));
        reg.register_op("Tile", Box::new(Tile));
        reg.register_op("Flatten", Box::new(Flatten));
        reg.register_op("MaxPoolV3", Box::new(MaxPool));
        reg.register_op("LayerNorm", Box::new(LayerNorm));
        reg.register_op("Range", Box::new(Range));

        reg
    }
}
