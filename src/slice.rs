//! Slice resolution and shape normalization for the tiling engine, plus
//! the Slice operator's shape rule.

use smallvec::SmallVec;

use crate::ops::{InferContext, InferError, InferShapes};
use crate::shape::{Shape, UNKNOWN_DIM};

/// A resolved slice: source extents plus per-axis begin offsets and slice
/// lengths.
///
/// All values are non-negative and in range: construct via
/// [`SliceSpec::resolve`] to apply the negative-begin and `-1`-means-
/// remainder conventions.
#[derive(Clone, Debug, PartialEq)]
pub struct SliceSpec {
    dims: SmallVec<[i64; 8]>,
    begin: SmallVec<[i64; 8]>,
    size: SmallVec<[i64; 8]>,
}

impl SliceSpec {
    /// Resolve user-supplied begin/size lists against the true input
    /// extents.
    ///
    /// Negative begins count from the end of the axis; a size of `-1` means
    /// "everything from begin to the end of the axis".
    pub fn resolve(input: &Shape, begin: &[i64], size: &[i64]) -> Result<SliceSpec, InferError> {
        let rank = input.rank();
        if begin.len() != rank || size.len() != rank {
            return Err(InferError::ShapeMismatch {
                reason: "begin and size lists must match the input rank",
            });
        }

        let mut spec = SliceSpec {
            dims: SmallVec::with_capacity(rank),
            begin: SmallVec::with_capacity(rank),
            size: SmallVec::with_capacity(rank),
        };
        for i in 0..rank {
            // Unwrap is safe: `i < rank`.
            let extent = input.dim(i).unwrap();
            if extent < 0 {
                return Err(InferError::InvalidValue {
                    reason: "slice extents must be static",
                });
            }
            let b = if begin[i] < 0 { begin[i] + extent } else { begin[i] };
            if b < 0 || b > extent {
                return Err(InferError::InvalidValue {
                    reason: "slice begin is out of range",
                });
            }
            let s = if size[i] == -1 { extent - b } else { size[i] };
            if s < 0 || b + s > extent {
                return Err(InferError::InvalidValue {
                    reason: "slice size is out of range",
                });
            }
            spec.dims.push(extent);
            spec.begin.push(b);
            spec.size.push(s);
        }
        Ok(spec)
    }

    /// Construct from already-resolved values. Intended for tests.
    pub fn from_resolved(dims: &[i64], begin: &[i64], size: &[i64]) -> SliceSpec {
        SliceSpec {
            dims: dims.into(),
            begin: begin.into(),
            size: size.into(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    pub fn begin(&self) -> &[i64] {
        &self.begin
    }

    pub fn size(&self) -> &[i64] {
        &self.size
    }

    /// Total number of elements selected by the slice.
    pub fn num_elements(&self) -> i64 {
        self.size.iter().product()
    }

    /// Linear element offset of the first selected element in the source.
    pub fn linear_offset(&self) -> i64 {
        let mut offset = 0;
        for i in 0..self.rank() {
            offset = offset * self.dims[i] + self.begin[i];
        }
        offset
    }

    /// Collapse adjacent dimensions which do not change the element layout.
    ///
    /// Two merges are applied, in order:
    ///
    /// 1. Full-extent merge: an axis sliced at its full extent is folded
    ///    into the preceding retained axis (axis 0 always starts a new
    ///    retained axis).
    /// 2. Unit-length merge: an axis with slice length 1 is folded into the
    ///    preceding retained axis when that axis also has slice length 1.
    ///
    /// The result selects the same elements at the same offsets; only the
    /// rank the tiling engine has to reason about shrinks. The pass is
    /// idempotent.
    pub fn simplify(&self) -> SliceSpec {
        let mut out = SliceSpec {
            dims: SmallVec::new(),
            begin: SmallVec::new(),
            size: SmallVec::new(),
        };

        // Full-extent merge.
        for i in 0..self.rank() {
            let last = out.dims.len().checked_sub(1);
            match last {
                Some(j) if self.size[i] == self.dims[i] => {
                    out.dims[j] *= self.dims[i];
                    out.begin[j] = out.begin[j] * self.dims[i] + self.begin[i];
                    out.size[j] *= self.dims[i];
                }
                _ => {
                    out.dims.push(self.dims[i]);
                    out.begin.push(self.begin[i]);
                    out.size.push(self.size[i]);
                }
            }
        }

        // Unit-length merge.
        let mut merged = SliceSpec {
            dims: SmallVec::new(),
            begin: SmallVec::new(),
            size: SmallVec::new(),
        };
        for i in 0..out.rank() {
            let last = merged.dims.len().checked_sub(1);
            match last {
                Some(j) if out.size[i] == 1 && merged.size[j] == 1 => {
                    merged.dims[j] *= out.dims[i];
                    merged.begin[j] = merged.begin[j] * out.dims[i] + out.begin[i];
                }
                _ => {
                    merged.dims.push(out.dims[i]);
                    merged.begin.push(out.begin[i]);
                    merged.size.push(out.size[i]);
                }
            }
        }

        merged
    }
}

/// Slice operator.
///
/// Begin and size are data-dependent (inputs 1 and 2): the host must
/// resolve their values, not just their shapes, before inference runs.
/// The output shape is the resolved per-axis slice length.
pub struct Slice;

impl InferShapes for Slice {
    fn infer(&self, ctx: &InferContext) -> Result<Vec<Shape>, InferError> {
        let input = ctx.input_shape(0)?;
        let begin = ctx.constant(1)?.as_i64_vec()?;
        let size = ctx.constant(2)?.as_i64_vec()?;

        if input.has_unknown_dim() {
            // Unknown extents defer resolution to runtime. Explicit sizes
            // pass through; `-1` remainders stay unknown.
            if begin.len() != input.rank() || size.len() != input.rank() {
                return Err(InferError::ShapeMismatch {
                    reason: "begin and size lists must match the input rank",
                });
            }
            let out = size
                .iter()
                .map(|&s| if s == -1 { UNKNOWN_DIM } else { s })
                .collect();
            return Ok(vec![out]);
        }

        let spec = SliceSpec::resolve(input, &begin, &size)?;
        Ok(vec![spec.size().iter().copied().collect()])
    }

    fn const_inputs(&self) -> &'static [usize] {
        &[1, 2]
    }
}

#[cfg(test)]
mod tests {
    use tileinfer_testing::TestCases;

    use super::{Slice, SliceSpec};
    use crate::attr::AttrBag;
    use crate::ops::{InferContext, InferError, InferShapes, OpRegistry};
    use crate::shape::{Shape, UNKNOWN_DIM};
    use crate::value::{Constant, DataType, TensorDescriptor};

    #[test]
    fn test_resolve() {
        #[derive(Debug)]
        struct Case {
            input: Shape,
            begin: Vec<i64>,
            size: Vec<i64>,
            expected: Result<SliceSpec, InferError>,
        }

        let cases = [
            Case {
                input: [512, 50, 1324].into(),
                begin: vec![0, 0, 0],
                size: vec![-1, -1, 512],
                expected: Ok(SliceSpec::from_resolved(
                    &[512, 50, 1324],
                    &[0, 0, 0],
                    &[512, 50, 512],
                )),
            },
            // Negative begin counts from the end of the axis.
            Case {
                input: [10, 20].into(),
                begin: vec![-4, 5],
                size: vec![2, -1],
                expected: Ok(SliceSpec::from_resolved(&[10, 20], &[6, 5], &[2, 15])),
            },
            Case {
                input: [10].into(),
                begin: vec![8],
                size: vec![5],
                expected: Err(InferError::InvalidValue {
                    reason: "slice size is out of range",
                }),
            },
            Case {
                input: [10].into(),
                begin: vec![11],
                size: vec![1],
                expected: Err(InferError::InvalidValue {
                    reason: "slice begin is out of range",
                }),
            },
            Case {
                input: [10, 20].into(),
                begin: vec![0],
                size: vec![1],
                expected: Err(InferError::ShapeMismatch {
                    reason: "begin and size lists must match the input rank",
                }),
            },
        ];

        cases.test_each(|case| {
            assert_eq!(
                SliceSpec::resolve(&case.input, &case.begin, &case.size),
                case.expected
            );
        });
    }

    #[test]
    fn test_simplify() {
        #[derive(Debug)]
        struct Case {
            spec: SliceSpec,
            expected: SliceSpec,
        }

        let cases = [
            // Trailing full-extent axes fold into their predecessor.
            Case {
                spec: SliceSpec::from_resolved(&[3, 20], &[0, 0], &[1, 20]),
                expected: SliceSpec::from_resolved(&[60], &[0], &[20]),
            },
            Case {
                spec: SliceSpec::from_resolved(
                    &[512, 50, 1324],
                    &[0, 0, 0],
                    &[512, 50, 512],
                ),
                expected: SliceSpec::from_resolved(&[25600, 1324], &[0, 0], &[25600, 512]),
            },
            // Axis 0 always starts a new retained axis, even at full
            // extent.
            Case {
                spec: SliceSpec::from_resolved(&[32509728, 25], &[0, 0], &[32509728, 20]),
                expected: SliceSpec::from_resolved(&[32509728, 25], &[0, 0], &[32509728, 20]),
            },
            // Runs of unit slices collapse into one synthetic axis.
            Case {
                spec: SliceSpec::from_resolved(&[4, 5, 7], &[1, 2, 3], &[1, 1, 2]),
                expected: SliceSpec::from_resolved(&[20, 7], &[7, 3], &[1, 2]),
            },
            // Nothing to merge.
            Case {
                spec: SliceSpec::from_resolved(&[8, 9], &[1, 2], &[3, 4]),
                expected: SliceSpec::from_resolved(&[8, 9], &[1, 2], &[3, 4]),
            },
            // Full slice of the whole tensor reduces to one axis.
            Case {
                spec: SliceSpec::from_resolved(&[4, 5, 6], &[0, 0, 0], &[4, 5, 6]),
                expected: SliceSpec::from_resolved(&[120], &[0], &[120]),
            },
        ];

        cases.test_each(|case| {
            let simplified = case.spec.simplify();
            assert_eq!(simplified, case.expected);

            // Semantics are preserved exactly.
            assert_eq!(simplified.num_elements(), case.spec.num_elements());
            assert_eq!(simplified.linear_offset(), case.spec.linear_offset());

            // The pass is idempotent.
            assert_eq!(simplified.simplify(), simplified);
        });
    }

    fn slice_ctx_inputs(input: Shape) -> Vec<TensorDescriptor> {
        vec![
            TensorDescriptor::new(input, DataType::Float),
            TensorDescriptor::new([2].into(), DataType::Int64),
            TensorDescriptor::new([2].into(), DataType::Int64),
        ]
    }

    #[test]
    fn test_slice_op() {
        #[derive(Debug)]
        struct Case {
            input: Shape,
            begin: Vec<i64>,
            size: Vec<i64>,
            expected: Result<Shape, InferError>,
        }

        let cases = [
            Case {
                input: [512, 50, 1324].into(),
                begin: vec![0, 0, 0],
                size: vec![-1, -1, 512],
                expected: Ok([512, 50, 512].into()),
            },
            Case {
                input: [10, 20].into(),
                begin: vec![-4, 5],
                size: vec![2, -1],
                expected: Ok([2, 15].into()),
            },
            // Unknown extents defer resolution; `-1` stays unknown.
            Case {
                input: [UNKNOWN_DIM, 20].into(),
                begin: vec![0, 5],
                size: vec![-1, 10],
                expected: Ok([UNKNOWN_DIM, 10].into()),
            },
            Case {
                input: [10].into(),
                begin: vec![8],
                size: vec![5],
                expected: Err(InferError::InvalidValue {
                    reason: "slice size is out of range",
                }),
            },
        ];

        cases.test_each(|case| {
            let inputs = slice_ctx_inputs(case.input.clone());
            let constants = [
                None,
                Some(Constant::Int64(case.begin.clone())),
                Some(Constant::Int64(case.size.clone())),
            ];
            let attrs = AttrBag::new();
            let ctx = InferContext::new(&inputs, &constants, &attrs);
            assert_eq!(
                Slice.infer(&ctx),
                case.expected.clone().map(|s| vec![s])
            );
        });
    }

    #[test]
    fn test_slice_op_requires_constant_begin_and_size() {
        let inputs = slice_ctx_inputs([10, 20].into());
        // Begin resolved but size was not.
        let constants = [None, Some(Constant::Int64(vec![0, 0])), None];
        let attrs = AttrBag::new();
        let ctx = InferContext::new(&inputs, &constants, &attrs);
        assert_eq!(
            Slice.infer(&ctx),
            Err(InferError::NullInput { what: "constant input value" })
        );
    }

    #[test]
    fn test_slice_op_registered() {
        let reg = OpRegistry::with_all_ops();
        assert!(reg.get("Slice").is_some());
        assert_eq!(reg.const_inputs("Slice"), Some(&[1usize, 2][..]));
    }
}
