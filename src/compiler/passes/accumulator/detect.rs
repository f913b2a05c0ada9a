//! Accumulator recursion detection.
//!
//! A function is a candidate when some block contains a direct self-call whose result
//! is folded into an associative and commutative binary operation right away:
//!
//! ```text
//! recurse:
//!   %call = call @sum(%sub, %acc)
//!   dbg %call                      ; debug markers are skipped
//!   %add = add %call, %n           ; exactly one operand is %call
//!   store %add, %retval
//!   jump label %exit               ; the block must end in a jump
//! ```
//!
//! Detection only proves that the call/update pair exists. Whether the rest of the
//! function has the shape the rewrite needs is decided by
//! [`analyze`](super::transform::analyze).

use crate::ir::{BlockId, Function, InstId};

/// A self-call and the accumulating operation that consumes its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursionSite {
    /// Block holding the call and the update.
    pub block: BlockId,
    /// The self-call.
    pub call: InstId,
    /// Position of the call within the block.
    pub call_index: usize,
    /// The associative, commutative operation consuming the call result.
    pub update: InstId,
    /// Position of the update within the block.
    pub update_index: usize,
}

/// Finds the first accumulator recursion site in layout order.
///
/// Only the first self-call of each block is examined. If it does not qualify, the
/// block is skipped even when a later call in it would.
#[must_use]
pub fn detect(func: &Function) -> Option<RecursionSite> {
    func.iter_blocks().find_map(|(block_id, block)| {
        let (call_index, call) = block
            .instructions()
            .iter()
            .copied()
            .enumerate()
            .find(|&(_, inst)| func.is_self_call(inst))?;
        examine(func, block_id, call_index, call)
    })
}

/// Returns true if the function holds an accumulator recursion site.
#[must_use]
pub fn matches(func: &Function) -> bool {
    detect(func).is_some()
}

fn examine(
    func: &Function,
    block: BlockId,
    call_index: usize,
    call: InstId,
) -> Option<RecursionSite> {
    let result = func.inst(call)?.result()?;

    let (update_index, update) = func.next_non_debug(block, call_index)?;
    let (op, lhs, rhs) = func.inst(update)?.op().as_binary()?;
    if !op.is_associative_commutative() {
        return None;
    }
    // exactly one operand is the call result
    if lhs.is_value(result) == rhs.is_value(result) {
        return None;
    }

    if !func.block(block)?.terminator()?.is_jump() {
        return None;
    }

    Some(RecursionSite {
        block,
        call,
        call_index,
        update,
        update_index,
    })
}
