//! Shape rule for the max-pooling family.

use crate::ops::{InferContext, InferError, InferShapes};
use crate::shape::{Shape, UNKNOWN_DIM};

/// Padding mode of a pooling operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PadMode {
    /// Explicit pad-before/pad-after amounts, with a ceil-mode flag
    /// selecting the ceil or floor variant of the stride formula.
    Calculated,
    /// Stride-only downsampling (kernel size treated as 1).
    Same,
    /// No padding.
    Valid,
}

impl PadMode {
    fn from_attr(value: &str) -> Result<PadMode, InferError> {
        match value {
            "CALCULATED" => Ok(PadMode::Calculated),
            "SAME" => Ok(PadMode::Same),
            "VALID" => Ok(PadMode::Valid),
            _ => Err(InferError::InvalidValue {
                reason: "padding_mode must be CALCULATED, SAME or VALID",
            }),
        }
    }
}

/// Pooling parameters for one spatial axis.
struct AxisParams {
    ksize: i64,
    stride: i64,
    pad_before: i64,
    pad_after: i64,
}

fn pooled_dim(dim: i64, params: &AxisParams, mode: PadMode, ceil_mode: bool) -> i64 {
    if dim == UNKNOWN_DIM {
        return UNKNOWN_DIM;
    }
    let AxisParams {
        ksize,
        stride,
        pad_before,
        pad_after,
    } = *params;
    match mode {
        PadMode::Valid => (dim - ksize + stride) / stride,
        PadMode::Same => (dim - 1 + stride) / stride,
        PadMode::Calculated => {
            let span = dim + pad_before + pad_after - ksize;
            if ceil_mode {
                (span + stride - 1) / stride + 1
            } else {
                span / stride + 1
            }
        }
    }
}

/// MaxPool-family operator (MaxPoolV3 and friends).
///
/// Attributes: `padding_mode`, `global_pooling`, `ceil_mode`, and the
/// length-4 `ksize` / `strides` / `pads` lists. The spatial axes depend on
/// the input's physical layout.
pub struct MaxPool;

impl InferShapes for MaxPool {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let input = ctx.input(0)?;
        // Plain ND tensors pool at the NCHW spatial positions.
        let (h_axis, w_axis) = input.layout.spatial_axes().unwrap_or((2, 3));
        if input.shape.rank() <= w_axis {
            return Err(InferError::InvalidRank {
                rank: input.shape.rank() as i64,
                max: 4,
            });
        }

        let mut out = input.shape.clone();

        if ctx.attrs().get_bool("global_pooling").unwrap_or(false) {
            out.set_dim(h_axis, 1);
            out.set_dim(w_axis, 1);
            return Ok(vec![out]);
        }

        let mode = PadMode::from_attr(ctx.attrs().require_string("padding_mode")?)?;
        let ceil_mode = ctx.attrs().get_bool("ceil_mode").unwrap_or(false);
        let ksize = ctx.attrs().require_int_list("ksize")?;
        let strides = ctx.attrs().require_int_list("strides")?;
        let pads = ctx.attrs().require_int_list("pads")?;

        if ksize.len() != 4 || strides.len() != 4 || pads.len() != 4 {
            return Err(InferError::InvalidValue {
                reason: "ksize, strides and pads must have exactly 4 entries",
            });
        }
        if strides[h_axis] <= 0 || strides[w_axis] <= 0 {
            return Err(InferError::ZeroDivisor {
                what: "pooling stride",
            });
        }

        // `pads` is [pad_h_before, pad_h_after, pad_w_before, pad_w_after].
        for (axis, pad_base) in [(h_axis, 0), (w_axis, 2)] {
            let params = AxisParams {
                ksize: ksize[axis],
                stride: strides[axis],
                pad_before: pads[pad_base],
                pad_after: pads[pad_base + 1],
            };
            // Unwrap is safe: rank was checked above.
            let dim = out.dim(axis).unwrap();
            out.set_dim(axis, pooled_dim(dim, &params, mode, ceil_mode));
        }

        Ok(vec![out])
    }
}
