//! Subgraph expansion for fused RNN operators.
//!
//! BlockLSTM-style operators are not lowered directly. The parser instead
//! emits a small fixed subgraph of primitive operators wired to the
//! original operator's inputs and outputs through explicit index remapping
//! tables. This is a graph rewrite, not a shape computation: the host
//! applies the returned plan to the graph and then runs ordinary shape
//! inference over the primitives.

use crate::attr::{AttrBag, AttrValue};
use crate::ops::InferError;
use crate::value::DataType;

/// Where a primitive operator's input comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum InputBinding {
    /// Input slot of the original operator.
    Original(usize),
    /// Output of an earlier primitive in the plan.
    Produced { op: usize, output: usize },
}

/// Output slot of a primitive in the plan.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputBinding {
    pub op: usize,
    pub output: usize,
}

/// One primitive operator instance to be inserted into the graph.
#[derive(Clone, Debug)]
pub struct PrimitiveOp {
    pub op_type: String,
    pub attrs: AttrBag,
    pub inputs: Vec<InputBinding>,
}

/// A fixed set of primitives plus the mapping from each original output
/// slot to the subgraph output that replaces it.
#[derive(Clone, Debug)]
pub struct SubgraphPlan {
    pub ops: Vec<PrimitiveOp>,
    /// `outputs[i]` is the producer of the original operator's output `i`.
    pub outputs: Vec<OutputBinding>,
}

/// Outcome of a graph rewrite.
///
/// `NotChanged` means a precondition for the rewrite was not met and the
/// node should be left alone; it is distinct from a hard failure so that
/// callers can continue rather than abort.
#[derive(Clone, Debug)]
pub enum Rewrite {
    Changed(SubgraphPlan),
    NotChanged,
}

/// BlockLSTM input slots.
const SEQ_LEN_MAX: usize = 0;
const X: usize = 1;
const CS_PREV: usize = 2;
const H_PREV: usize = 3;
const W: usize = 4;
const B: usize = 8;

/// Expand a BlockLSTM operator into a Cast plus a fused-RNN primitive.
///
/// The plan emits:
///
/// 1. `Cast` of the int64 `seq_len_max` scalar to the int32 the fused
///    primitive expects;
/// 2. `DynamicRNN` consuming the original `x`, `w`, `b`, the cast output
///    and the initial `h`/`c` states.
///
/// The original outputs `(i, cs, f, o, ci, co, h)` map onto the primitive's
/// `(i, c, f, o, j, tanhc, h)` outputs.
///
/// Returns [`Rewrite::NotChanged`] when peephole connections are requested,
/// since the fused primitive has no peephole path.
pub fn expand_block_lstm(attrs: &AttrBag, num_inputs: usize) -> Result<Rewrite, InferError> {
    if num_inputs <= B {
        return Err(InferError::NullInput {
            what: "BlockLSTM inputs",
        });
    }
    if attrs.get_bool("use_peephole").unwrap_or(false) {
        return Ok(Rewrite::NotChanged);
    }

    let cast = PrimitiveOp {
        op_type: "Cast".to_string(),
        attrs: AttrBag::new().set("dst_type", AttrValue::String(DataType::Int32.to_string())),
        inputs: vec![InputBinding::Original(SEQ_LEN_MAX)],
    };

    let mut rnn_attrs = AttrBag::new()
        .set("direction", AttrValue::String("UNIDIRECTIONAL".into()))
        .set("cell_type", AttrValue::String("LSTM".into()));
    if let Some(forget_bias) = attrs.get_float("forget_bias") {
        rnn_attrs = rnn_attrs.set("forget_bias", AttrValue::Float(forget_bias));
    }
    if let Some(cell_clip) = attrs.get_float("cell_clip") {
        rnn_attrs = rnn_attrs.set("cell_clip", AttrValue::Float(cell_clip));
    }

    let rnn = PrimitiveOp {
        op_type: "DynamicRNN".to_string(),
        attrs: rnn_attrs,
        inputs: vec![
            InputBinding::Original(X),
            InputBinding::Original(W),
            InputBinding::Original(B),
            InputBinding::Produced { op: 0, output: 0 },
            InputBinding::Original(H_PREV),
            InputBinding::Original(CS_PREV),
        ],
    };

    // DynamicRNN output order: y, h, c, i, j, f, o, tanhc.
    let rnn_out = |output: usize| OutputBinding { op: 1, output };
    let outputs = vec![
        rnn_out(3), // i
        rnn_out(2), // cs
        rnn_out(5), // f
        rnn_out(6), // o
        rnn_out(4), // ci
        rnn_out(7), // co
        rnn_out(1), // h
    ];

    Ok(Rewrite::Changed(SubgraphPlan {
        ops: vec![cast, rnn],
        outputs,
    }))
}
