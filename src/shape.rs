//! Shape primitives shared by shape inference and tiling.

use std::fmt;
use std::fmt::Display;

use smallvec::SmallVec;

use crate::ops::InferError;

/// Sentinel dimension size meaning "unknown at graph-compile time".
pub const UNKNOWN_DIM: i64 = -1;

/// Sentinel dimension size meaning "the whole rank is unknown".
///
/// A shape whose sole dimension has this value stands for a tensor about
/// which nothing is known, not a rank-1 tensor.
pub const UNKNOWN_RANK_DIM: i64 = -2;

/// Maximum rank supported by shape inference.
///
/// The tiling engine has a tighter bound,
/// [`MAX_TILING_RANK`](crate::tiling::MAX_TILING_RANK).
pub const MAX_RANK: usize = 25;

/// An ordered sequence of signed dimension sizes.
///
/// Dimensions are non-negative, or one of the [`UNKNOWN_DIM`] /
/// [`UNKNOWN_RANK_DIM`] sentinels. Inference rules propagate the sentinels
/// without computing on them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Shape {
    dims: SmallVec<[i64; 8]>,
}

impl Shape {
    /// Create a scalar (rank 0) shape.
    pub fn scalar() -> Shape {
        Shape { dims: SmallVec::new() }
    }

    /// Create a shape representing a tensor of unknown rank.
    pub fn unknown_rank() -> Shape {
        Shape::from([UNKNOWN_RANK_DIM])
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// True if this shape is the unknown-rank sentinel.
    pub fn is_unknown_rank(&self) -> bool {
        self.dims.len() == 1 && self.dims[0] == UNKNOWN_RANK_DIM
    }

    /// Return the size of dimension `axis`, or `None` if out of range.
    pub fn dim(&self, axis: usize) -> Option<i64> {
        self.dims.get(axis).copied()
    }

    /// Set the size of an existing dimension.
    ///
    /// Panics if `axis` is out of range. Callers resolve axes via
    /// [`resolve_axis`](crate::ops::resolve_axis) first.
    pub fn set_dim(&mut self, axis: usize, size: i64) {
        self.dims[axis] = size;
    }

    pub fn push_dim(&mut self, size: i64) {
        self.dims.push(size);
    }

    pub fn remove_dim(&mut self, axis: usize) {
        self.dims.remove(axis);
    }

    pub fn insert_dim(&mut self, axis: usize, size: i64) {
        self.dims.insert(axis, size);
    }

    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.dims.iter().copied()
    }

    /// True if any dimension is unknown, or the rank itself is unknown.
    pub fn has_unknown_dim(&self) -> bool {
        self.dims.iter().any(|&d| d < 0)
    }

    /// Total element count, or `None` if any dimension is unknown.
    ///
    /// Scalars have one element. A zero-sized dimension makes the count zero.
    pub fn num_elements(&self) -> Option<i64> {
        let mut product: i64 = 1;
        for &d in &self.dims {
            if d < 0 {
                return None;
            }
            product = product.checked_mul(d)?;
        }
        Some(product)
    }
}

impl From<&[i64]> for Shape {
    fn from(dims: &[i64]) -> Shape {
        Shape { dims: dims.into() }
    }
}

impl<const N: usize> From<[i64; N]> for Shape {
    fn from(dims: [i64; N]) -> Shape {
        Shape { dims: dims.as_slice().into() }
    }
}

impl FromIterator<i64> for Shape {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Shape {
        Shape { dims: iter.into_iter().collect() }
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

/// Per-dimension (min, max) bounds for a partially dynamic shape.
///
/// Present only when some dimensions are dynamic; when present it has the
/// same length as the shape it annotates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShapeRange {
    bounds: SmallVec<[(i64, i64); 8]>,
}

impl ShapeRange {
    pub fn new(bounds: impl IntoIterator<Item = (i64, i64)>) -> ShapeRange {
        ShapeRange {
            bounds: bounds.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn bound(&self, axis: usize) -> Option<(i64, i64)> {
        self.bounds.get(axis).copied()
    }
}

/// Broadcast a pair of dimension sizes following NumPy rules.
///
/// Succeeds if either size is 1 or the sizes are equal, returning the non-1
/// size. This is a pure function over non-negative sizes; unknown-dim
/// sentinels are the caller's responsibility.
pub fn broadcast_dim(a: i64, b: i64) -> Result<i64, InferError> {
    if a == b {
        Ok(a)
    } else if a == 1 {
        Ok(b)
    } else if b == 1 {
        Ok(a)
    } else {
        Err(InferError::ShapeMismatch {
            reason: "dimensions are incompatible for broadcasting",
        })
    }
}

/// Broadcast `source` into `target`, replacing `target` with the combined
/// shape.
///
/// Dimensions are right-aligned. If `source` has more dimensions than
/// `target`, `target` is extended on the left. Scalar shapes broadcast as if
/// they were `[1]`. On failure `target` is left unmodified.
pub fn broadcast_into(source: &Shape, target: &mut Shape) -> Result<(), InferError> {
    let src_rank = source.rank().max(1);
    let dst_rank = target.rank().max(1);
    let out_rank = src_rank.max(dst_rank);

    let mut out = SmallVec::<[i64; 8]>::with_capacity(out_rank);
    for i in 0..out_rank {
        // Right-aligned: axis `out_rank - 1 - i` counted from the end.
        let src = dim_from_end(source, out_rank - 1 - i);
        let dst = dim_from_end(target, out_rank - 1 - i);
        out.push(broadcast_dim(src, dst)?);
    }
    *target = Shape { dims: out };
    Ok(())
}

/// Return the dimension `offset` positions before the end, treating missing
/// leading dimensions (and scalars) as size 1.
fn dim_from_end(shape: &Shape, offset: usize) -> i64 {
    let rank = shape.rank();
    if offset < rank {
        shape.dims[rank - 1 - offset]
    } else {
        1
    }
}

/// Unknown-aware broadcast of two shapes.
///
/// Unknown dimensions broadcast with anything and stay unknown unless the
/// other side pins them; unknown-rank inputs produce an unknown-rank output.
pub fn broadcast_shapes(a: &Shape, b: &Shape) -> Result<Shape, InferError> {
    if a.is_unknown_rank() || b.is_unknown_rank() {
        return Ok(Shape::unknown_rank());
    }

    let out_rank = a.rank().max(b.rank()).max(1);
    let mut out = Shape::scalar();
    for i in 0..out_rank {
        let da = dim_from_end(a, out_rank - 1 - i);
        let db = dim_from_end(b, out_rank - 1 - i);
        let dim = match (da, db) {
            (UNKNOWN_DIM, 1) | (1, UNKNOWN_DIM) | (UNKNOWN_DIM, UNKNOWN_DIM) => UNKNOWN_DIM,
            // A fixed size other than 1 pins the unknown side.
            (UNKNOWN_DIM, d) | (d, UNKNOWN_DIM) => d,
            (da, db) => broadcast_dim(da, db)?,
        };
        out.push_dim(dim);
    }

    if a.is_scalar() && b.is_scalar() {
        Ok(Shape::scalar())
    } else {
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use tileinfer_testing::TestCases;

    use super::{broadcast_dim, broadcast_into, broadcast_shapes, Shape, UNKNOWN_DIM};
    use crate::ops::InferError;

    #[test]
    fn test_num_elements() {
        #[derive(Debug)]
        struct Case {
            shape: Shape,
            expected: Option<i64>,
        }

        let cases = [
            Case {
                shape: Shape::scalar(),
                expected: Some(1),
            },
            Case {
                shape: [2, 100, 4].into(),
                expected: Some(800),
            },
            Case {
                shape: [2, 0, 4].into(),
                expected: Some(0),
            },
            Case {
                shape: [2, UNKNOWN_DIM].into(),
                expected: None,
            },
        ];

        cases.test_each(|case| {
            assert_eq!(case.shape.num_elements(), case.expected);
        });
    }

    #[test]
    fn test_broadcast_dim() {
        assert_eq!(broadcast_dim(1, 5), Ok(5));
        assert_eq!(broadcast_dim(5, 1), Ok(5));
        assert_eq!(broadcast_dim(5, 5), Ok(5));
        assert!(broadcast_dim(4, 5).is_err());
    }

    #[test]
    fn test_broadcast_shapes() {
        #[derive(Debug)]
        struct Case {
            a: Shape,
            b: Shape,
            expected: Result<Shape, InferError>,
        }

        let cases = [
            Case {
                a: [2, 3].into(),
                b: [2, 3].into(),
                expected: Ok([2, 3].into()),
            },
            Case {
                a: [1, 5].into(),
                b: [4, 1].into(),
                expected: Ok([4, 5].into()),
            },
            // Right-aligned rank extension.
            Case {
                a: [5].into(),
                b: [2, 3, 5].into(),
                expected: Ok([2, 3, 5].into()),
            },
            // Scalars broadcast as `[1]`.
            Case {
                a: Shape::scalar(),
                b: [7].into(),
                expected: Ok([7].into()),
            },
            Case {
                a: Shape::scalar(),
                b: Shape::scalar(),
                expected: Ok(Shape::scalar()),
            },
            // Unknown dims survive unless pinned by the other side.
            Case {
                a: [UNKNOWN_DIM, 3].into(),
                b: [2, 1].into(),
                expected: Ok([2, 3].into()),
            },
            Case {
                a: [UNKNOWN_DIM, 3].into(),
                b: [1, 3].into(),
                expected: Ok([UNKNOWN_DIM, 3].into()),
            },
            Case {
                a: [4, 3].into(),
                b: [5, 3].into(),
                expected: Err(InferError::ShapeMismatch {
                    reason: "dimensions are incompatible for broadcasting",
                }),
            },
        ];

        cases.test_each(|case| {
            let out = broadcast_shapes(&case.a, &case.b);
            assert_eq!(out, case.expected);

            // Broadcasting is commutative whenever it succeeds.
            let flipped = broadcast_shapes(&case.b, &case.a);
            assert_eq!(flipped.is_ok(), out.is_ok());
            if let (Ok(out), Ok(flipped)) = (out, flipped) {
                assert_eq!(out, flipped);
            }
        });
    }

    #[test]
    fn test_broadcast_identity() {
        let shape: Shape = [3, 4, 5].into();
        for ones_rank in 0..=3 {
            let ones: Shape = std::iter::repeat(1).take(ones_rank).collect();
            assert_eq!(broadcast_shapes(&shape, &ones), Ok(shape.clone()));
        }
    }

    #[test]
    fn test_broadcast_into() {
        let source: Shape = [3, 1, 5].into();
        let mut target: Shape = [4, 5].into();
        broadcast_into(&source, &mut target).unwrap();
        assert_eq!(target, [3, 4, 5].into());

        // Target is untouched on failure.
        let source: Shape = [3].into();
        let mut target: Shape = [4, 5].into();
        assert!(broadcast_into(&source, &mut target).is_err());
        assert_eq!(target, [4, 5].into());
    }

    #[test]
    fn test_display() {
        let shape: Shape = [2, 100, 12].into();
        assert_eq!(shape.to_string(), "[2, 100, 12]");
        assert_eq!(Shape::scalar().to_string(), "[]");
    }
}
