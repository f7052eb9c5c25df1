//! Shape rules for elementwise operators.

use crate::ops::{InferContext, InferError, InferShapes};
use crate::shape::{broadcast_shapes, Shape};

/// Elementwise unary operators (Cast, Tanh, Relu, ...).
///
/// The output shape is the first input shape, unchanged. Extra inputs (eg.
/// clip bounds) do not affect the output shape.
pub struct Identity;

impl InferShapes for Identity {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        Ok(vec![ctx.input_shape(0)?.clone()])
    }
}

/// Elementwise binary operators with broadcasting (Add, Mul, compare ops).
pub struct Binary;

impl InferShapes for Binary {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let a = ctx.input_shape(0)?;
        let b = ctx.input_shape(1)?;
        Ok(vec![broadcast_shapes(a, b)?])
    }
}

/// N-ary broadcasting operators (ClipByValue).
///
/// The inputs are folded left to right, so the first incompatible pair
/// reports the failure.
pub struct Variadic;

impl InferShapes for Variadic {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let mut out = ctx.input_shape(0)?.clone();
        for desc in &ctx.inputs()[1..] {
            out = broadcast_shapes(&out, &desc.shape)?;
        }
        Ok(vec![out])
    }
}
