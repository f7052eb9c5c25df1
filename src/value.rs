//! Data types, constant tensor values and tensor descriptors.

use std::fmt;
use std::fmt::Display;

use crate::ops::InferError;
use crate::shape::{Shape, ShapeRange};

/// Element type of a tensor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataType {
    Float,
    Float16,
    Double,
    Int8,
    Uint8,
    Int32,
    Int64,
    Bool,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn byte_size(self) -> i64 {
        match self {
            DataType::Int8 | DataType::Uint8 | DataType::Bool => 1,
            DataType::Float16 => 2,
            DataType::Float | DataType::Int32 => 4,
            DataType::Double | DataType::Int64 => 8,
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Float => "float",
            DataType::Float16 => "float16",
            DataType::Double => "double",
            DataType::Int8 => "int8",
            DataType::Uint8 => "uint8",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Bool => "bool",
        };
        write!(f, "{}", name)
    }
}

/// Value of a constant tensor resolved by the host at graph-compile time.
///
/// Operators whose shape inference is data-dependent (Reduce axes, Reshape
/// target, Transpose permutation, Range bounds, Tile multiples, Slice
/// begin/size) receive their constant inputs through this type.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl Constant {
    pub fn dtype(&self) -> DataType {
        match self {
            Constant::Int32(_) => DataType::Int32,
            Constant::Int64(_) => DataType::Int64,
            Constant::Float(_) => DataType::Float,
            Constant::Double(_) => DataType::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Constant::Int32(v) => v.len(),
            Constant::Int64(v) => v.len(),
            Constant::Float(v) => v.len(),
            Constant::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read this constant as a vector of integers.
    ///
    /// Fails with [`InferError::UnsupportedDtype`] for float constants. Rules
    /// which consume axis lists, permutations and target shapes accept only
    /// int32 and int64 tensors.
    pub fn as_i64_vec(&self) -> Result<Vec<i64>, InferError> {
        match self {
            Constant::Int32(v) => Ok(v.iter().map(|&x| x as i64).collect()),
            Constant::Int64(v) => Ok(v.clone()),
            Constant::Float(_) | Constant::Double(_) => Err(InferError::UnsupportedDtype {
                dtype: self.dtype(),
            }),
        }
    }

    /// Read a scalar (single element) constant as `f64`, accepting any
    /// numeric dtype.
    pub fn scalar_f64(&self) -> Result<f64, InferError> {
        let get = |len: usize| -> Result<(), InferError> {
            if len == 1 {
                Ok(())
            } else {
                Err(InferError::InvalidValue {
                    reason: "expected a scalar constant",
                })
            }
        };
        match self {
            Constant::Int32(v) => get(v.len()).map(|_| v[0] as f64),
            Constant::Int64(v) => get(v.len()).map(|_| v[0] as f64),
            Constant::Float(v) => get(v.len()).map(|_| v[0] as f64),
            Constant::Double(v) => get(v.len()).map(|_| v[0]),
        }
    }
}

/// Logical tensor axis, independent of the physical layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogicalAxis {
    N,
    C,
    H,
    W,
}

/// Physical layout format of a tensor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Layout {
    /// Plain row-major N-dimensional layout.
    #[default]
    Nd,
    Nchw,
    Nhwc,
    /// Blocked layout with the channel dimension split for alignment.
    Nc1hwc0,
}

impl Layout {
    /// Map a logical axis to its physical index, or `None` if the layout has
    /// no such axis.
    pub fn axis_index(self, axis: LogicalAxis) -> Option<usize> {
        match self {
            Layout::Nd => None,
            Layout::Nchw | Layout::Nc1hwc0 => match axis {
                LogicalAxis::N => Some(0),
                LogicalAxis::C => Some(1),
                LogicalAxis::H => Some(2),
                LogicalAxis::W => Some(3),
            },
            Layout::Nhwc => match axis {
                LogicalAxis::N => Some(0),
                LogicalAxis::H => Some(1),
                LogicalAxis::W => Some(2),
                LogicalAxis::C => Some(3),
            },
        }
    }

    /// Physical indices of the two spatial axes (H, W).
    pub fn spatial_axes(self) -> Option<(usize, usize)> {
        match (
            self.axis_index(LogicalAxis::H),
            self.axis_index(LogicalAxis::W),
        ) {
            (Some(h), Some(w)) => Some((h, w)),
            _ => None,
        }
    }
}

/// Description of a tensor at an operator boundary.
///
/// The runtime shape is a layout-dependent transform of the origin shape
/// (eg. blocked formats pad and split the channel dimension). Shape rules
/// work on the runtime shape; axis translation between the two is done via
/// [`Layout::axis_index`].
#[derive(Clone, Debug, PartialEq)]
pub struct TensorDescriptor {
    pub shape: Shape,
    pub origin_shape: Shape,
    pub dtype: DataType,
    pub layout: Layout,
    /// Bounds for dynamic dimensions; empty when the shape is fully static
    /// or entirely unbounded.
    pub range: ShapeRange,
}

impl TensorDescriptor {
    /// Create a descriptor for a plain ND tensor whose runtime and origin
    /// shapes coincide.
    pub fn new(shape: Shape, dtype: DataType) -> TensorDescriptor {
        TensorDescriptor {
            origin_shape: shape.clone(),
            shape,
            dtype,
            layout: Layout::Nd,
            range: ShapeRange::default(),
        }
    }

    pub fn with_layout(mut self, layout: Layout) -> TensorDescriptor {
        self.layout = layout;
        self
    }

    pub fn with_range(mut self, range: ShapeRange) -> TensorDescriptor {
        self.range = range;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{Constant, DataType, Layout, LogicalAxis};
    use crate::ops::InferError;

    #[test]
    fn test_constant_as_i64_vec() {
        let c = Constant::Int32(vec![1, -1, 2]);
        assert_eq!(c.as_i64_vec(), Ok(vec![1, -1, 2]));

        let c = Constant::Int64(vec![5]);
        assert_eq!(c.as_i64_vec(), Ok(vec![5]));

        let c = Constant::Float(vec![1.0]);
        assert_eq!(
            c.as_i64_vec(),
            Err(InferError::UnsupportedDtype {
                dtype: DataType::Float
            })
        );
    }

    #[test]
    fn test_constant_scalar_f64() {
        let c = Constant::Double(vec![2.5]);
        assert_eq!(c.scalar_f64(), Ok(2.5));

        let c = Constant::Int32(vec![1, 2]);
        assert!(c.scalar_f64().is_err());
    }

    #[test]
    fn test_layout_axes() {
        assert_eq!(Layout::Nchw.spatial_axes(), Some((2, 3)));
        assert_eq!(Layout::Nhwc.spatial_axes(), Some((1, 2)));
        assert_eq!(Layout::Nd.spatial_axes(), None);
        assert_eq!(Layout::Nhwc.axis_index(LogicalAxis::C), Some(3));
        assert_eq!(Layout::Nc1hwc0.axis_index(LogicalAxis::C), Some(1));
    }
}
