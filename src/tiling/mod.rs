//! Tiling-parameter computation for slicing kernels.
//!
//! Given a resolved slice (see [`SliceSpec`](crate::slice::SliceSpec)) and
//! the hardware description in [`CompileInfo`], the engine picks one of a
//! fixed set of data-movement strategies, splits the work across cores
//! (block split) and across unified-buffer iterations (buffer split), and
//! emits a [`TilingResult`] for the downstream code generator.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

mod compile_info;
mod engine;

pub use compile_info::{Coexist, CompileInfo, ConstTiling};
pub use engine::tile_slice;

use crate::ops::InferError;

/// Maximum rank the tiling engine accepts (after simplification).
pub const MAX_TILING_RANK: usize = 8;

/// Base of the tiling-key encoding.
pub const BASE_KEY: i64 = 500_000_000;

/// Data-movement strategy chosen for a slice.
///
/// Modes are evaluated in a fixed priority order; see
/// [`tile_slice`] for the predicates. The numeric ids feed the key
/// encoding, which the consuming kernel dispatch table depends on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TilingMode {
    /// Rank-1 shape after simplification.
    OneDim,
    /// Slice length and source last dim are both alignment multiples.
    BothAlign,
    /// Plain block-granular data movement (default fallback).
    DataMov,
    /// Stride-aligned movement for short unaligned rows with enough
    /// parallelism.
    StrideAlign,
    /// Alignment-aware movement with padding removal on the slice rows.
    Depad,
    /// Degenerate single-element rows.
    Scalar,
    /// Depad variant for a rank-2 slice of whole left rows.
    LRDepad,
}

impl TilingMode {
    pub fn id(self) -> i64 {
        match self {
            TilingMode::OneDim => 1,
            TilingMode::BothAlign => 2,
            TilingMode::DataMov => 3,
            TilingMode::StrideAlign => 4,
            TilingMode::Depad => 5,
            TilingMode::Scalar => 6,
            TilingMode::LRDepad => 7,
        }
    }
}

/// Encode the kernel-variant dispatch key.
///
/// The encoding is a contract with the consuming kernel launcher and must
/// stay bit-exact: distinct `(shape_len, mode, block_axis, buffer_axis)`
/// tuples never collide within the supported rank bound.
pub fn encode_key(shape_len: usize, mode: TilingMode, block_axis: usize, buffer_axis: usize) -> i64 {
    BASE_KEY
        + shape_len as i64 * 10_000_000
        + mode.id() * 1_000_000
        + (block_axis * shape_len + buffer_axis) as i64
}

/// Reasons why tiling computation may fail.
#[derive(Clone, Debug, PartialEq)]
pub enum TilingError {
    /// Slice resolution or validation failed.
    Infer(InferError),

    /// The simplified shape still exceeds [`MAX_TILING_RANK`].
    RankExceeded { rank: usize },

    /// A computed divisor evaluated to zero. Never silently clamped, since
    /// that would corrupt the tiling result.
    ZeroDivisor { what: &'static str },

    /// The compile info has no slot layout for the computed key.
    UnknownKey { key: i64 },

    /// The slot layout names a value the engine did not produce.
    UnknownSlot { name: String },

    /// A slot value does not fit the 32-bit tiling-data encoding.
    SlotOverflow { name: String },
}

impl From<InferError> for TilingError {
    fn from(err: InferError) -> TilingError {
        TilingError::Infer(err)
    }
}

impl Display for TilingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TilingError::Infer(err) => write!(f, "{}", err),
            TilingError::RankExceeded { rank } => {
                write!(f, "rank {} exceeds the tiling bound {}", rank, MAX_TILING_RANK)
            }
            TilingError::ZeroDivisor { what } => write!(f, "{} evaluated to zero", what),
            TilingError::UnknownKey { key } => {
                write!(f, "no tiling-data layout for key {}", key)
            }
            TilingError::UnknownSlot { name } => {
                write!(f, "tiling-data layout names unknown slot {}", name)
            }
            TilingError::SlotOverflow { name } => {
                write!(f, "slot {} does not fit the tiling-data width", name)
            }
        }
    }
}

impl Error for TilingError {}

/// Output of the tiling engine.
///
/// Named scalar slots are serialized into the positional tiling-data blob
/// through the key→slot-layout table in [`CompileInfo`], so that the same
/// key always serializes in the order the downstream kernel expects.
#[derive(Clone, Debug, PartialEq)]
pub struct TilingResult {
    key: i64,
    block_dims: i64,
    slots: Vec<(String, i64)>,
    precomputed: Option<Vec<i32>>,
}

impl TilingResult {
    pub(crate) fn new(key: i64, block_dims: i64, slots: Vec<(String, i64)>) -> TilingResult {
        TilingResult {
            key,
            block_dims,
            slots,
            precomputed: None,
        }
    }

    pub(crate) fn precomputed(key: i64, block_dims: i64, data: Vec<i32>) -> TilingResult {
        TilingResult {
            key,
            block_dims,
            slots: Vec::new(),
            precomputed: Some(data),
        }
    }

    /// Kernel-variant selector.
    pub fn key(&self) -> i64 {
        self.key
    }

    /// Number of parallel cores to launch.
    pub fn block_dims(&self) -> i64 {
        self.block_dims
    }

    /// Look up a named scalar produced by the engine.
    pub fn slot(&self, name: &str) -> Option<i64> {
        match name {
            "tiling_key" => Some(self.key),
            "block_dims" => Some(self.block_dims),
            _ => self
                .slots
                .iter()
                .find(|(n, _)| n == name)
                .map(|&(_, v)| v),
        }
    }

    /// Serialize the tiling data in the slot order configured for this
    /// result's key.
    pub fn to_blob(&self, info: &CompileInfo) -> Result<Vec<i32>, TilingError> {
        if let Some(data) = &self.precomputed {
            return Ok(data.clone());
        }

        let names = info
            .slots_for_key(self.key)
            .ok_or(TilingError::UnknownKey { key: self.key })?;

        let mut blob = Vec::with_capacity(names.len());
        for name in names {
            let value = self.slot(name).ok_or_else(|| TilingError::UnknownSlot {
                name: name.clone(),
            })?;
            let value = i32::try_from(value).map_err(|_| TilingError::SlotOverflow {
                name: name.clone(),
            })?;
            blob.push(value);
        }
        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{encode_key, TilingMode, BASE_KEY, MAX_TILING_RANK};

    const ALL_MODES: [TilingMode; 7] = [
        TilingMode::OneDim,
        TilingMode::BothAlign,
        TilingMode::DataMov,
        TilingMode::StrideAlign,
        TilingMode::Depad,
        TilingMode::Scalar,
        TilingMode::LRDepad,
    ];

    #[test]
    fn test_key_encoding_is_deterministic_and_collision_free() {
        let mut seen = HashSet::new();
        let mut count = 0usize;

        for shape_len in 1..=MAX_TILING_RANK {
            for mode in ALL_MODES {
                for block_axis in 0..shape_len {
                    for buffer_axis in 0..shape_len {
                        let key = encode_key(shape_len, mode, block_axis, buffer_axis);
                        assert_eq!(key, encode_key(shape_len, mode, block_axis, buffer_axis));
                        assert!(key > BASE_KEY);
                        assert!(seen.insert(key), "key collision: {}", key);
                        count += 1;
                    }
                }
            }
        }
        assert_eq!(seen.len(), count);
    }

    #[test]
    fn test_key_encoding_values() {
        // LRDepad on a rank-2 shape, block and buffer both on axis 0.
        assert_eq!(encode_key(2, TilingMode::LRDepad, 0, 0), 527_000_000);
        assert_eq!(encode_key(1, TilingMode::OneDim, 0, 0), 511_000_000);
        assert_eq!(encode_key(2, TilingMode::DataMov, 0, 1), 523_000_001);
    }
}
