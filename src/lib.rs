//! Shape inference and tiling-parameter computation for tensor-graph
//! operator plugins.
//!
//! # About this crate
//!
//! An operator plugin for a tensor-graph compiler has two host-facing
//! duties. At graph-build time it must answer "given these input shapes and
//! attributes, what shapes come out?" for every operator it registers. At
//! kernel-launch time it must turn a concrete workload, here a tensor
//! slice, into the handful of integers the device kernel reads: which
//! kernel variant to dispatch, how many cores to launch, and how the work
//! is cut across cores and on-chip buffer iterations.
//!
//! The first duty is served by the [`InferShapes`](ops::InferShapes) trait
//! and the [`OpRegistry`](ops::OpRegistry) mapping operator type names to
//! inference rules. Shapes may contain unknown dimensions; rules propagate
//! what they can and leave the rest unknown rather than failing.
//!
//! The second duty is served by the [`tiling`] module. A slice request is
//! resolved and normalized by [`SliceSpec`](slice::SliceSpec), then
//! [`tile_slice`](tiling::tile_slice) picks a data-movement strategy and
//! splits the work against the hardware description in
//! [`CompileInfo`](tiling::CompileInfo).
//!
//! # Example
//!
//! ```
//! use tileinfer::ops::{InferContext, InferShapes, OpRegistry};
//! use tileinfer::attr::AttrBag;
//! use tileinfer::value::{DataType, TensorDescriptor};
//!
//! let registry = OpRegistry::with_all_ops();
//! let add = registry.get("Add").unwrap();
//!
//! let inputs = [
//!     TensorDescriptor::new([4, 1, 100].into(), DataType::Float),
//!     TensorDescriptor::new([16, 100].into(), DataType::Float),
//! ];
//! let attrs = AttrBag::new();
//! let ctx = InferContext::new(&inputs, &[], &attrs);
//!
//! let outputs = add.infer(&ctx).unwrap();
//! assert_eq!(outputs, vec![[4, 16, 100].into()]);
//! ```

pub mod attr;
pub mod ops;
pub mod shape;
pub mod slice;
pub mod tiling;
pub mod value;

pub use ops::{InferContext, InferError, InferShapes, OpRegistry};
pub use shape::{Shape, UNKNOWN_DIM, UNKNOWN_RANK_DIM};
pub use slice::SliceSpec;
pub use tiling::{tile_slice, CompileInfo, TilingError, TilingMode, TilingResult};
