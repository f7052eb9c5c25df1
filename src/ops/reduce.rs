//! Shape rule for the reduction operator family.

use smallvec::SmallVec;

use crate::ops::{resolve_axes, InferContext, InferError, InferShapes};
use crate::shape::Shape;

/// Compute the shape left after reducing `axes` of `input`.
///
/// With `keep_dims` each reduced axis is retained with size 1; otherwise it
/// is removed, preserving the relative order of the remaining axes.
pub fn reduce_dims(input: &Shape, axes: &[i64], keep_dims: bool) -> Result<Shape, InferError> {
    let mut resolved: SmallVec<[usize; 4]> = resolve_axes(input.rank(), axes)?;
    resolved.sort_unstable();
    resolved.dedup();

    let mut out = Shape::scalar();
    for (i, dim) in input.iter().enumerate() {
        if !resolved.contains(&i) {
            out.push_dim(dim);
        } else if keep_dims {
            out.push_dim(1);
        }
    }
    Ok(out)
}

/// ReduceSum and friends.
///
/// The axis list is data-dependent: it must be read from the values of the
/// second input, not just its shape.
pub struct Reduce;

impl InferShapes for Reduce {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let input = ctx.input_shape(0)?;
        let axes = ctx.constant(1)?.as_i64_vec()?;
        let keep_dims = ctx.attrs().get_bool("keep_dims").unwrap_or(false);

        // An empty axis list reduces every axis.
        let all_axes: Vec<i64>;
        let axes = if axes.is_empty() {
            all_axes = (0..input.rank() as i64).collect();
            &all_axes
        } else {
            &axes
        };

        Ok(vec![reduce_dims(input, axes, keep_dims)?])
    }

    fn const_inputs(&self) -> &'static [usize] {
        &[1]
    }
}

#[cfg(test)]
mod tests {
    use tileinfer_testing::TestCases;

    use super::{reduce_dims, Reduce};
    use crate::attr::{AttrBag, AttrValue};
    use crate::ops::{InferContext, InferError, InferShapes};
    use crate::shape::Shape;
    use crate::value::{Constant, DataType, TensorDescriptor};

    #[test]
    fn test_reduce_dims() {
        #[derive(Debug)]
        struct Case {
            input: Shape,
            axes: Vec<i64>,
            keep_dims: bool,
            expected: Result<Shape, InferError>,
        }

        let cases = [
            Case {
                input: [2, 3, 4].into(),
                axes: vec![1],
                keep_dims: false,
                expected: Ok([2, 4].into()),
            },
            Case {
                input: [2, 3, 4].into(),
                axes: vec![1],
                keep_dims: true,
                expected: Ok([2, 1, 4].into()),
            },
            // Negative axes resolve against the input rank.
            Case {
                input: [2, 3, 4].into(),
                axes: vec![-1, 0],
                keep_dims: false,
                expected: Ok([3].into()),
            },
            // Duplicate axes are folded.
            Case {
                input: [2, 3, 4].into(),
                axes: vec![1, -2],
                keep_dims: false,
                expected: Ok([2, 4].into()),
            },
            Case {
                input: [2, 3, 4].into(),
                axes: vec![0, 1, 2],
                keep_dims: false,
                expected: Ok(Shape::scalar()),
            },
            Case {
                input: [2, 3, 4].into(),
                axes: vec![3],
                keep_dims: false,
                expected: Err(InferError::InvalidAxis { axis: 3, rank: 3 }),
            },
        ];

        cases.test_each(|case| {
            assert_eq!(
                reduce_dims(&case.input, &case.axes, case.keep_dims),
                case.expected
            );
        });
    }

    #[test]
    fn test_reduce_keep_dims_round_trip() {
        // With keep_dims the rank is preserved, and restoring the original
        // sizes on the reduced axes recovers the input exactly.
        let input: Shape = [2, 3, 4, 5].into();
        let axes = [1i64, 3];
        let mut reduced = reduce_dims(&input, &axes, true).unwrap();

        assert_eq!(reduced.rank(), input.rank());
        for &axis in &axes {
            reduced.set_dim(axis as usize, input.dim(axis as usize).unwrap());
        }
        assert_eq!(reduced, input);
    }

    #[test]
    fn test_reduce_op_reads_axes_from_constant() {
        let inputs = [
            TensorDescriptor::new([2, 3, 4].into(), DataType::Float),
            TensorDescriptor::new([1].into(), DataType::Int32),
        ];
        let constants = [None, Some(Constant::Int32(vec![-1]))];
        let attrs = AttrBag::new().set("keep_dims", AttrValue::Bool(true));
        let ctx = InferContext::new(&inputs, &constants, &attrs);

        assert_eq!(
            Reduce.infer(&ctx).unwrap(),
            vec![Shape::from([2, 3, 1])]
        );
    }

    #[test]
    fn test_reduce_op_requires_constant_axes() {
        let inputs = [
            TensorDescriptor::new([2, 3, 4].into(), DataType::Float),
            TensorDescriptor::new([1].into(), DataType::Int32),
        ];
        // Axes input present but its value was not resolved by the host.
        let constants = [None, None];
        let attrs = AttrBag::new();
        let ctx = InferContext::new(&inputs, &constants, &attrs);

        assert_eq!(
            Reduce.infer(&ctx),
            Err(InferError::NullInput { what: "constant input value" })
        );
    }
}
