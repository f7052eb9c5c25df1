//! Shape rules for tensor-generating operators.

use crate::ops::{InferContext, InferError, InferShapes};
use crate::shape::{Shape, UNKNOWN_DIM};
use crate::value::DataType;

/// Delta magnitudes below this are treated as zero.
const DELTA_EPSILON: f64 = 1e-9;

/// Range operator.
///
/// Consumes three scalar data-dependent inputs (start, limit, delta) and
/// produces a rank-1 output of length `ceil(|limit - start| / |delta|)`.
/// If any of the three constants could not be resolved, the length
/// degenerates to unknown rather than failing.
pub struct Range;

impl InferShapes for Range {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let (Some(start), Some(limit), Some(delta)) = (
            ctx.try_constant(0),
            ctx.try_constant(1),
            ctx.try_constant(2),
        ) else {
            return Ok(vec![[UNKNOWN_DIM].into()]);
        };

        // The three bounds must agree on a numeric type: int32, int64 or
        // double; anything else is handled as generic float.
        let dtype = start.dtype();
        let consistent = match dtype {
            DataType::Int32 | DataType::Int64 | DataType::Double => {
                limit.dtype() == dtype && delta.dtype() == dtype
            }
            _ => true,
        };
        if !consistent {
            return Err(InferError::UnsupportedDtype {
                dtype: limit.dtype(),
            });
        }

        let start = start.scalar_f64()?;
        let limit = limit.scalar_f64()?;
        let delta = delta.scalar_f64()?;

        if delta.abs() < DELTA_EPSILON {
            return Err(InferError::ZeroDivisor {
                what: "range delta",
            });
        }

        let len = ((limit - start).abs() / delta.abs()).ceil() as i64;
        Ok(vec![[len].into()])
    }

    fn const_inputs(&self) -> &'static [usize] {
        &[0, 1, 2]
    }
}

#[cfg(test)]
mod tests {
    use tileinfer_testing::TestCases;

    use super::Range;
    use crate::attr::AttrBag;
    use crate::ops::{InferContext, InferError, InferShapes};
    use crate::shape::{Shape, UNKNOWN_DIM};
    use crate::value::{Constant, DataType, TensorDescriptor};

    fn scalar_descs() -> Vec<TensorDescriptor> {
        (0..3)
            .map(|_| TensorDescriptor::new(Shape::scalar(), DataType::Int32))
            .collect()
    }

    #[test]
    fn test_range() {
        #[derive(Debug)]
        struct Case {
            start: Constant,
            limit: Constant,
            delta: Constant,
            expected: Result<Shape, InferError>,
        }

        let cases = [
            Case {
                start: Constant::Int32(vec![0]),
                limit: Constant::Int32(vec![10]),
                delta: Constant::Int32(vec![2]),
                expected: Ok([5].into()),
            },
            // Non-exact division rounds up.
            Case {
                start: Constant::Int32(vec![0]),
                limit: Constant::Int32(vec![10]),
                delta: Constant::Int32(vec![3]),
                expected: Ok([4].into()),
            },
            // Counting down.
            Case {
                start: Constant::Int64(vec![10]),
                limit: Constant::Int64(vec![0]),
                delta: Constant::Int64(vec![-2]),
                expected: Ok([5].into()),
            },
            Case {
                start: Constant::Double(vec![0.0]),
                limit: Constant::Double(vec![1.0]),
                delta: Constant::Double(vec![0.3]),
                expected: Ok([4].into()),
            },
            Case {
                start: Constant::Int32(vec![0]),
                limit: Constant::Int32(vec![10]),
                delta: Constant::Int32(vec![0]),
                expected: Err(InferError::ZeroDivisor {
                    what: "range delta",
                }),
            },
            Case {
                start: Constant::Double(vec![0.0]),
                limit: Constant::Double(vec![1.0]),
                delta: Constant::Double(vec![1e-12]),
                expected: Err(InferError::ZeroDivisor {
                    what: "range delta",
                }),
            },
            // Mixed int32/int64 bounds are inconsistent.
            Case {
                start: Constant::Int32(vec![0]),
                limit: Constant::Int64(vec![10]),
                delta: Constant::Int32(vec![1]),
                expected: Err(InferError::UnsupportedDtype {
                    dtype: DataType::Int64,
                }),
            },
        ];

        cases.test_each(|case| {
            let inputs = scalar_descs();
            let constants = [
                Some(case.start.clone()),
                Some(case.limit.clone()),
                Some(case.delta.clone()),
            ];
            let attrs = AttrBag::new();
            let ctx = InferContext::new(&inputs, &constants, &attrs);
            assert_eq!(
                Range.infer(&ctx),
                case.expected.clone().map(|s| vec![s])
            );
        });
    }

    #[test]
    fn test_range_unresolved_bounds_degenerate_to_unknown() {
        let inputs = scalar_descs();
        let constants = [Some(Constant::Int32(vec![0])), None, None];
        let attrs = AttrBag::new();
        let ctx = InferContext::new(&inputs, &constants, &attrs);
        assert_eq!(
            Range.infer(&ctx).unwrap(),
            vec![Shape::from([UNKNOWN_DIM])]
        );
    }
}
