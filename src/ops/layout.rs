//! Shape rules for operators which rearrange dimensions without touching
//! element values.

use crate::ops::{resolve_axis, InferContext, InferError, InferShapes};
use crate::shape::{Shape, MAX_RANK, UNKNOWN_DIM};

/// Compute the output shape of reshaping `input` to `target`.
///
/// `target` may contain a single `-1` wildcard which is inferred from the
/// input element count. The output element count must equal the input
/// element count exactly.
pub fn reshape_shape(input: &Shape, target: &[i64]) -> Result<Shape, InferError> {
    let mut wildcard: Option<usize> = None;
    let mut explicit_product: i64 = 1;
    for (i, &dim) in target.iter().enumerate() {
        if dim == UNKNOWN_DIM {
            if wildcard.is_some() {
                return Err(InferError::InvalidValue {
                    reason: "reshape target may contain at most one -1 entry",
                });
            }
            wildcard = Some(i);
        } else if dim < 0 {
            return Err(InferError::InvalidValue {
                reason: "reshape target dimensions must be non-negative or -1",
            });
        } else {
            explicit_product = explicit_product.saturating_mul(dim);
        }
    }

    let mut out: Shape = target.iter().copied().collect();

    let Some(in_count) = input.num_elements() else {
        // Unknown input dims: the wildcard (if any) stays unknown and the
        // element-count check is deferred to runtime.
        return Ok(out);
    };

    if let Some(wildcard) = wildcard {
        if explicit_product == 0 {
            return Err(InferError::ZeroDivisor {
                what: "product of explicit reshape dimensions",
            });
        }
        if in_count % explicit_product != 0 {
            return Err(InferError::InvalidValue {
                reason: "input element count is not divisible by the explicit reshape dimensions",
            });
        }
        out.set_dim(wildcard, in_count / explicit_product);
    } else if explicit_product != in_count {
        return Err(InferError::ShapeMismatch {
            reason: "reshape target element count does not match the input",
        });
    }

    Ok(out)
}

/// Reshape operator. The target shape is data-dependent (input 1).
pub struct Reshape;

impl InferShapes for Reshape {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let input = ctx.input_shape(0)?;
        let target = ctx.constant(1)?.as_i64_vec()?;
        Ok(vec![reshape_shape(input, &target)?])
    }

    fn const_inputs(&self) -> &'static [usize] {
        &[1]
    }
}

/// Compute the shape left after removing size-1 dimensions.
///
/// Without an axis list every size-1 dimension is removed. With one, only
/// the listed axes are removed and each must currently have size 1.
pub fn squeeze_shape(input: &Shape, axes: Option<&[i64]>) -> Result<Shape, InferError> {
    let mut out = Shape::scalar();
    match axes {
        None => {
            for dim in input.iter() {
                if dim != 1 {
                    out.push_dim(dim);
                }
            }
        }
        Some(axes) => {
            let resolved = crate::ops::resolve_axes(input.rank(), axes)?;
            for (i, dim) in input.iter().enumerate() {
                if resolved.contains(&i) {
                    if dim != 1 {
                        return Err(InferError::ShapeMismatch {
                            reason: "squeezed axes must have size 1",
                        });
                    }
                } else {
                    out.push_dim(dim);
                }
            }
        }
    }
    Ok(out)
}

/// Squeeze operator. Axes come from the optional `axes` attribute.
pub struct Squeeze;

impl InferShapes for Squeeze {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let input = ctx.input_shape(0)?;
        let axes = ctx.attrs().get_int_list("axes");
        Ok(vec![squeeze_shape(input, axes)?])
    }
}

/// Compute the shape left after inserting a size-1 dimension at each listed
/// axis.
///
/// Axes are resolved against the output (post-insertion) rank, and each
/// output slot may be claimed by at most one requested axis.
pub fn unsqueeze_shape(input: &Shape, axes: &[i64]) -> Result<Shape, InferError> {
    let out_rank = input.rank() + axes.len();
    if out_rank > MAX_RANK {
        return Err(InferError::InvalidRank {
            rank: out_rank as i64,
            max: MAX_RANK as i64,
        });
    }

    let mut claimed = [false; MAX_RANK];
    for &axis in axes {
        let resolved = resolve_axis(out_rank, axis)?;
        if claimed[resolved] {
            return Err(InferError::InvalidAxis {
                axis,
                rank: out_rank,
            });
        }
        claimed[resolved] = true;
    }

    let mut in_dims = input.iter();
    let mut out = Shape::scalar();
    for slot in claimed.iter().take(out_rank) {
        if *slot {
            out.push_dim(1);
        } else {
            // One source dim per unclaimed slot; counts match by
            // construction.
            out.push_dim(in_dims.next().unwrap());
        }
    }
    Ok(out)
}

/// Unsqueeze operator. Axes come from the `axes` attribute.
pub struct Unsqueeze;

impl InferShapes for Unsqueeze {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let input = ctx.input_shape(0)?;
        let axes = ctx.attrs().require_int_list("axes")?;
        Ok(vec![unsqueeze_shape(input, axes)?])
    }
}

/// Compute the shape of permuting `input` by `perm`.
pub fn transpose_shape(input: &Shape, perm: &[i64]) -> Result<Shape, InferError> {
    if perm.len() != input.rank() {
        return Err(InferError::InvalidRank {
            rank: perm.len() as i64,
            max: input.rank() as i64,
        });
    }
    let mut out = Shape::scalar();
    for &p in perm {
        let axis = resolve_axis(input.rank(), p)?;
        // Unwrap is safe: `resolve_axis` bounds the index.
        out.push_dim(input.dim(axis).unwrap());
    }
    Ok(out)
}

/// Transpose operator.
///
/// The permutation is data-dependent (input 1) and must be an int32 or
/// int64 tensor of length equal to the input rank.
pub struct Transpose;

impl InferShapes for Transpose {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let input = ctx.input_shape(0)?;
        let perm = ctx.constant(1)?.as_i64_vec()?;
        Ok(vec![transpose_shape(input, &perm)?])
    }

    fn const_inputs(&self) -> &'static [usize] {
        &[1]
    }
}

/// Compute the shape of tiling `input` by `multiples`.
///
/// `multiples` must be at least as long as the input rank; if longer, the
/// input shape is left-padded with 1s to match.
pub fn tile_shape(input: &Shape, multiples: &[i64]) -> Result<Shape, InferError> {
    if multiples.len() > MAX_RANK {
        return Err(InferError::InvalidRank {
            rank: multiples.len() as i64,
            max: MAX_RANK as i64,
        });
    }
    if multiples.len() < input.rank() {
        return Err(InferError::ShapeMismatch {
            reason: "tile multiples must be at least as long as the input rank",
        });
    }

    let pad = multiples.len() - input.rank();
    let mut out = Shape::scalar();
    for (i, &multiple) in multiples.iter().enumerate() {
        let dim = if i < pad {
            1
        } else {
            // Unwrap is safe: `i - pad < input.rank()`.
            input.dim(i - pad).unwrap()
        };
        if dim == UNKNOWN_DIM {
            out.push_dim(UNKNOWN_DIM);
        } else if dim < 0 {
            return Err(InferError::InvalidValue {
                reason: "tile input has a negative dimension",
            });
        } else {
            out.push_dim(dim * multiple);
        }
    }
    Ok(out)
}

/// Tile operator.
///
/// Multiples come from the `multiples` attribute if present, otherwise from
/// the data-dependent second input.
pub struct Tile;

impl InferShapes for Tile {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let input = ctx.input_shape(0)?;
        let multiples = match ctx.attrs().get_int_list("multiples") {
            Some(list) => list.to_vec(),
            None => ctx.constant(1)?.as_i64_vec()?,
        };
        Ok(vec![tile_shape(input, &multiples)?])
    }

    fn const_inputs(&self) -> &'static [usize] {
        &[1]
    }
}

/// Compute the rank-2 shape of flattening `input` at `axis`.
///
/// The output is `[product of dims before axis, product of dims from axis
/// onward]`. Unlike other rules, `axis == rank` is allowed and produces
/// `[count, 1]`.
pub fn flatten_shape(input: &Shape, axis: i64) -> Result<Shape, InferError> {
    let rank = input.rank() as i64;
    if axis < -rank || axis > rank {
        return Err(InferError::InvalidAxis {
            axis,
            rank: input.rank(),
        });
    }
    let split = if axis >= 0 { axis } else { rank + axis } as usize;

    let product = |dims: &[i64]| -> i64 {
        if dims.iter().any(|&d| d < 0) {
            UNKNOWN_DIM
        } else {
            dims.iter().product()
        }
    };

    let dims = input.dims();
    Ok([product(&dims[..split]), product(&dims[split..])].into())
}

/// Flatten operator. The split point comes from the `axis` attribute.
pub struct Flatten;

impl InferShapes for Flatten {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let input = ctx.input_shape(0)?;
        let axis = ctx.attrs().get_int("axis").unwrap_or(1);
        Ok(vec![flatten_shape(input, axis)?])
    }
}
