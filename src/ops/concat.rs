//! Shape rule for concatenation.

use crate::ops::{resolve_axis, InferContext, InferError, InferShapes};
use crate::shape::Shape;

/// Compute the shape of concatenating `shapes` along `axis`.
///
/// All inputs must agree on every axis except the concat axis. Scalar inputs
/// are promoted to rank 1 first and contribute size 1 along the concat axis
/// when the established rank is 1.
pub fn concat_shape(shapes: &[&Shape], axis: i64) -> Result<Shape, InferError> {
    let first = shapes
        .first()
        .ok_or(InferError::NullInput { what: "concat inputs" })?;

    // Scalars are promoted to `[1]` before the rank is established.
    let promote = |shape: &Shape| -> Shape {
        if shape.is_scalar() {
            [1].into()
        } else {
            (*shape).clone()
        }
    };

    let mut out = promote(first);
    let rank = out.rank();
    let axis = resolve_axis(rank, axis)?;

    for shape in &shapes[1..] {
        let shape = promote(shape);
        if shape.rank() != rank {
            return Err(InferError::ShapeMismatch {
                reason: "concat inputs must have the same rank",
            });
        }
        for d in 0..rank {
            if d == axis {
                continue;
            }
            if shape.dim(d) != out.dim(d) {
                return Err(InferError::ShapeMismatch {
                    reason: "concat inputs must agree on all non-concat axes",
                });
            }
        }
        // Unwraps are safe: `axis < rank` was checked above.
        let sum = out.dim(axis).unwrap() + shape.dim(axis).unwrap();
        out.set_dim(axis, sum);
    }

    Ok(out)
}

/// Concat operator.
///
/// The concat axis comes from the `axis` attribute and may be negative,
/// resolved against the output rank.
pub struct Concat;

impl InferShapes for Concat {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let axis = ctx.attrs().require_int("axis")?;
        let shapes: Vec<&Shape> = ctx.inputs().iter().map(|desc| &desc.shape).collect();
        Ok(vec![concat_shape(&shapes, axis)?])
    }
}
