//! Shape rule for normalization operators which also emit statistics.

use crate::ops::{InferContext, InferError, InferShapes};
use crate::shape::Shape;

/// LayerNorm-style operator.
///
/// The main output keeps the input shape. The mean and variance outputs
/// have the same rank, with every axis at or after `begin_norm_axis`
/// collapsed to size 1.
pub struct LayerNorm;

impl InferShapes for LayerNorm {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let input = ctx.input_shape(0)?;
        let begin_norm_axis = ctx.attrs().get_int("begin_norm_axis").unwrap_or(-1);

        let rank = input.rank() as i64;
        if begin_norm_axis < -rank || begin_norm_axis >= rank {
            return Err(InferError::InvalidAxis {
                axis: begin_norm_axis,
                rank: input.rank(),
            });
        }
        let begin = if begin_norm_axis >= 0 {
            begin_norm_axis
        } else {
            rank + begin_norm_axis
        } as usize;

        let mut stats = Shape::scalar();
        for (i, dim) in input.iter().enumerate() {
            stats.push_dim(if i < begin { dim } else { 1 });
        }

        Ok(vec![input.clone(), stats.clone(), stats])
    }
}
