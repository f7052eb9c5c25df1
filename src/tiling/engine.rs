//! The tiling decision engine.
//!
//! Splits a resolved slice across cores and unified-buffer iterations.
//! The flow is: simplify the slice, pick a movement strategy, split the
//! first non-degenerate axis across cores (block split), split the
//! remaining work against the buffer budget (buffer split), then apply a
//! rounding improvement and, for the alignment-sensitive strategies, a
//! downgrade when too few rows stay resident per iteration.

use crate::slice::SliceSpec;
use crate::tiling::{
    encode_key, CompileInfo, TilingError, TilingMode, TilingResult, BASE_KEY, MAX_TILING_RANK,
};

/// Shapes below this element count take the single-core fast path.
const SMALL_SHAPE_LIMIT: i64 = 2048;

/// Longest unaligned row the stride-aligned strategy will carry.
const STRIDE_LAST_DIM_MAX: i64 = 2048;

/// Stride-aligned movement needs at least this many rows per core.
const STRIDE_ROWS_PER_CORE: i64 = 16;

/// Below this many resident rows per iteration, the alignment-sensitive
/// strategies lose to plain data movement.
const MIN_UB_ROWS: i64 = 16;

/// Buffer factors above this many alignment units get rounded down.
const IMPROVE_THRESHOLD_UNITS: i64 = 8;

fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

/// Compute tiling parameters for a resolved slice.
pub fn tile_slice(spec: &SliceSpec, info: &CompileInfo) -> Result<TilingResult, TilingError> {
    info.validate()?;

    if let Some(ct) = &info.const_tiling {
        return Ok(TilingResult::precomputed(ct.key, ct.block_dims, ct.data.clone()));
    }

    let s = spec.simplify();
    // A scalar slice tiles like a single-element vector.
    let s = if s.rank() == 0 {
        SliceSpec::from_resolved(&[1], &[0], &[1])
    } else {
        s
    };
    let rank = s.rank();
    if rank > MAX_TILING_RANK {
        return Err(TilingError::RankExceeded { rank });
    }

    if s.num_elements() == 0 {
        return Ok(TilingResult::new(BASE_KEY, 1, axis_slots(&s)));
    }

    let mut mode = select_mode(&s, info);
    let (block_axis, block_factor, block_dims) = block_split(&s, info)?;
    let (mut ub_axis, mut ub_factor) = buffer_split(&s, info, mode, block_axis, block_factor)?;
    ub_factor = improve(&s, info, block_axis, block_factor, ub_axis, ub_factor);

    // Depad and stride-aligned movement only pay off when enough whole
    // rows stay resident per iteration.
    if matches!(mode, TilingMode::Depad | TilingMode::StrideAlign) {
        let last = rank - 1;
        let rows = if ub_axis == last {
            0
        } else {
            let inner: i64 = s.size()[ub_axis + 1..last].iter().product();
            ub_factor * inner
        };
        if rows < MIN_UB_ROWS {
            mode = if s.size()[last] == 1 {
                TilingMode::Scalar
            } else {
                TilingMode::DataMov
            };
            let (axis, factor) = buffer_split(&s, info, mode, block_axis, block_factor)?;
            ub_axis = axis;
            ub_factor = improve(&s, info, block_axis, block_factor, axis, factor);
        }
    }

    let mut slots = axis_slots(&s);
    slots.push(("block_factor".to_string(), block_factor));
    slots.push(("ub_factor".to_string(), ub_factor));
    match mode {
        TilingMode::LRDepad => {
            let raw = s.dims()[rank - 1];
            slots.push(("src_pad".to_string(), info.align_up(raw) - raw));
        }
        TilingMode::Depad => {
            let raw = s.size()[rank - 1];
            slots.push(("src_pad".to_string(), info.align_up(raw) - raw));
        }
        _ => {}
    }

    let key = encode_key(rank, mode, block_axis, ub_axis);
    Ok(TilingResult::new(key, block_dims, slots))
}

/// Pick the movement strategy for a simplified slice, in priority order.
fn select_mode(s: &SliceSpec, info: &CompileInfo) -> TilingMode {
    let rank = s.rank();
    if rank == 1 {
        return TilingMode::OneDim;
    }
    let dims = s.dims();
    let size = s.size();
    let last = rank - 1;

    if size[last] % info.align == 0 && dims[last] % info.align == 0 {
        return TilingMode::BothAlign;
    }

    // Whole left rows: a rank-2 slice taking every row and a prefix of
    // each, with the source row short enough to depad in place.
    if rank == 2 && size[0] == dims[0] && s.begin()[last] == 0 && depad_eligible(dims[last], info)
    {
        return TilingMode::LRDepad;
    }

    if depad_eligible(size[last], info) {
        return TilingMode::Depad;
    }

    let outer: i64 = size[..last].iter().product();
    if size[last] <= STRIDE_LAST_DIM_MAX
        && size[last] % info.align != 0
        && outer >= info.core_num * STRIDE_ROWS_PER_CORE
    {
        return TilingMode::StrideAlign;
    }

    TilingMode::DataMov
}

fn depad_eligible(raw_last: i64, info: &CompileInfo) -> bool {
    if raw_last % info.align == 0 {
        return false;
    }
    let aligned = info.align_up(raw_last);
    let (last_dim_max, co2co) = info.depad_limits();
    aligned <= last_dim_max && co2co * aligned <= info.budget(TilingMode::Depad)
}

/// Split the first axis with slice length above one across cores.
///
/// The factor is raised until each core's chunk spans at least one
/// alignment unit of trailing elements, so no core moves a fragment
/// shorter than the movement granule.
fn block_split(s: &SliceSpec, info: &CompileInfo) -> Result<(usize, i64, i64), TilingError> {
    let rank = s.rank();
    let size = s.size();

    let total: i64 = size.iter().product();
    let tail: i64 = size[1..].iter().product();
    if tail < info.align && total < SMALL_SHAPE_LIMIT {
        // Too small to spread: one core takes all of axis 0.
        return Ok((0, size[0], 1));
    }

    let block_axis = size.iter().position(|&d| d > 1).unwrap_or(rank - 1);
    let len = size[block_axis];
    let trailing: i64 = size[block_axis + 1..].iter().product();
    if trailing == 0 {
        return Err(TilingError::ZeroDivisor {
            what: "trailing element product",
        });
    }

    let mut factor = ceil_div(len, info.core_num);
    factor = factor.max(ceil_div(info.align, trailing));
    factor = factor.min(len);
    let block_dims = ceil_div(len, factor);
    Ok((block_axis, factor, block_dims))
}

/// Choose the axis and factor of the per-iteration buffer chunk.
///
/// Works in whole aligned rows: the budget is divided by the aligned row
/// length, then axes are walked outward from the row until enough rows
/// accumulate. A budget smaller than a single row splits within the row
/// instead.
fn buffer_split(
    s: &SliceSpec,
    info: &CompileInfo,
    mode: TilingMode,
    block_axis: usize,
    block_factor: i64,
) -> Result<(usize, i64), TilingError> {
    let rank = s.rank();
    let size = s.size();
    let last = rank - 1;

    let budget = info.budget(mode);
    if budget == 0 {
        return Err(TilingError::ZeroDivisor {
            what: "buffer budget",
        });
    }

    if block_axis == last {
        // The per-core chunk is a run of the last axis; sub-split it
        // directly.
        return Ok((last, block_factor.min(budget)));
    }

    let last_dim_factor = match mode {
        // Rows are read at the source width, padding included.
        TilingMode::LRDepad => info.align_up(s.dims()[last]),
        _ => info.align_up(size[last]),
    };
    let row_num = budget / last_dim_factor;
    if row_num == 0 {
        return Ok((last, budget));
    }

    let mut inner = 1i64;
    let mut axis = last - 1;
    loop {
        let len = if axis == block_axis {
            block_factor
        } else {
            size[axis]
        };
        if len * inner >= row_num {
            return Ok((axis, row_num / inner));
        }
        inner *= len;
        if axis == block_axis {
            break;
        }
        axis -= 1;
    }
    // The whole per-core slice fits in one iteration.
    Ok((block_axis, block_factor))
}

/// Round a large second-to-last-axis buffer factor down to an alignment
/// multiple.
///
/// Kept only when the tail fragment left by the rounded factor still
/// spans at least one alignment unit of elements; a degenerate factor
/// covering the whole block chunk is left alone.
fn improve(
    s: &SliceSpec,
    info: &CompileInfo,
    block_axis: usize,
    block_factor: i64,
    ub_axis: usize,
    ub_factor: i64,
) -> i64 {
    let rank = s.rank();
    if rank < 2 || ub_axis != rank - 2 {
        return ub_factor;
    }
    if ub_factor <= IMPROVE_THRESHOLD_UNITS * info.align {
        return ub_factor;
    }
    if ub_axis == block_axis && ub_factor == block_factor {
        return ub_factor;
    }

    let rounded = ub_factor / info.align * info.align;
    let span = if ub_axis == block_axis {
        block_factor
    } else {
        s.size()[ub_axis]
    };
    let tail = span % rounded;
    if tail == 0 || tail * s.size()[rank - 1] >= info.align {
        rounded
    } else {
        ub_factor
    }
}

fn axis_slots(s: &SliceSpec) -> Vec<(String, i64)> {
    let mut slots = Vec::with_capacity(3 * s.rank() + 3);
    for i in 0..s.rank() {
        slots.push((format!("dim_{}", i), s.dims()[i]));
        slots.push((format!("begin_{}", i), s.begin()[i]));
        slots.push((format!("size_{}", i), s.size()[i]));
    }
    slots
}
