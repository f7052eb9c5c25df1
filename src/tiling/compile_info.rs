//! Compile-time hardware and kernel description for the tiling engine.
//!
//! Deserialized from the JSON blob the offline compiler attaches to each
//! slice kernel. All capacities are expressed in elements of the slice's
//! data type, not bytes.

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::tiling::{TilingError, TilingMode};

/// Buffer coexistence divisors per movement strategy.
///
/// The unified-buffer budget for a strategy is `ub_size / divisor`, where
/// the divisor counts how many copies of the working set the strategy
/// keeps resident at once.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Coexist {
    #[serde(default = "default_divisor")]
    pub data_mov: i64,
    #[serde(default = "default_divisor")]
    pub depad: i64,
    #[serde(default = "default_divisor")]
    pub stride_align: i64,
}

fn default_divisor() -> i64 {
    1
}

impl Default for Coexist {
    fn default() -> Coexist {
        Coexist {
            data_mov: 1,
            depad: 1,
            stride_align: 1,
        }
    }
}

/// Precomputed tiling answer for a fully static shape.
///
/// When present, the engine skips all computation and returns these values
/// directly.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ConstTiling {
    pub key: i64,
    pub block_dims: i64,
    #[serde(default)]
    pub data: Vec<i32>,
}

/// Hardware description plus kernel-variant metadata.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CompileInfo {
    /// Number of parallel cores available.
    pub core_num: i64,

    /// Usable unified-buffer capacity, in elements.
    pub ub_size: i64,

    /// Byte width of the element type.
    pub elem_bytes: i64,

    /// Data-movement alignment unit, in elements.
    pub align: i64,

    #[serde(default)]
    pub coexist: Coexist,

    /// Override for the depad eligibility bounds `(last_dim_max, co2co)`.
    /// When absent, the per-byte-width defaults apply.
    #[serde(default)]
    pub depad_limit: Option<(i64, i64)>,

    #[serde(default)]
    pub const_tiling: Option<ConstTiling>,

    /// Tiling-data layout per kernel key: the ordered slot names to
    /// serialize. Keys are decimal strings for JSON compatibility.
    #[serde(default)]
    pub slot_map: FxHashMap<String, Vec<String>>,
}

impl CompileInfo {
    pub fn from_json(json: &str) -> Result<CompileInfo, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reject configurations the engine cannot divide by.
    pub fn validate(&self) -> Result<(), TilingError> {
        if self.core_num <= 0 {
            return Err(TilingError::ZeroDivisor { what: "core count" });
        }
        if self.align <= 0 {
            return Err(TilingError::ZeroDivisor {
                what: "alignment unit",
            });
        }
        if self.elem_bytes <= 0 {
            return Err(TilingError::ZeroDivisor {
                what: "element width",
            });
        }
        if self.coexist.data_mov <= 0
            || self.coexist.depad <= 0
            || self.coexist.stride_align <= 0
        {
            return Err(TilingError::ZeroDivisor {
                what: "coexistence divisor",
            });
        }
        if self.ub_size <= 0 {
            return Err(TilingError::ZeroDivisor {
                what: "buffer capacity",
            });
        }
        Ok(())
    }

    /// Round `v` up to the next multiple of the alignment unit.
    pub fn align_up(&self, v: i64) -> i64 {
        (v + self.align - 1) / self.align * self.align
    }

    /// Unified-buffer element budget for a movement strategy.
    pub fn budget(&self, mode: TilingMode) -> i64 {
        let divisor = match mode {
            TilingMode::Depad | TilingMode::LRDepad => self.coexist.depad,
            TilingMode::StrideAlign => self.coexist.stride_align,
            _ => self.coexist.data_mov,
        };
        self.ub_size / divisor
    }

    /// Depad eligibility bounds `(last_dim_max, co2co)` for the element
    /// width, unless overridden.
    pub fn depad_limits(&self) -> (i64, i64) {
        if let Some(limits) = self.depad_limit {
            return limits;
        }
        match self.elem_bytes {
            1 => (64, 1024),
            2 => (160, 256),
            4 => (168, 128),
            _ => (168, 64),
        }
    }

    pub fn slots_for_key(&self, key: i64) -> Option<&[String]> {
        self.slot_map.get(&key.to_string()).map(|v| v.as_slice())
    }
}
