//! Instructions and block terminators.

use crate::ir::{BlockId, Op, Operand, ValueId};

/// A non-terminator instruction.
///
/// The instruction's position is defined by the owning block's instruction list; the
/// instruction itself only knows what it computes and which value it defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    op: Op,
    result: Option<ValueId>,
}

impl Instruction {
    /// Creates an instruction.
    ///
    /// # Arguments
    ///
    /// * `op` - The operation performed
    /// * `result` - The value defined by the instruction, `None` for stores and void calls
    #[must_use]
    pub const fn new(op: Op, result: Option<ValueId>) -> Self {
        Self { op, result }
    }

    /// Returns the operation.
    #[must_use]
    pub const fn op(&self) -> &Op {
        &self.op
    }

    /// Returns the operation mutably.
    pub fn op_mut(&mut self) -> &mut Op {
        &mut self.op
    }

    /// Returns the defined value, if any.
    #[must_use]
    pub const fn result(&self) -> Option<ValueId> {
        self.result
    }

    pub(crate) fn set_result(&mut self, result: Option<ValueId>) {
        self.result = result;
    }

    /// Returns true for debug-only markers.
    #[must_use]
    pub const fn is_debug(&self) -> bool {
        self.op.is_debug()
    }
}

/// The control transfer ending a basic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Unconditional branch.
    Jump {
        /// Destination block.
        target: BlockId,
    },
    /// Two-way conditional branch on a `bool`.
    Branch {
        /// Branch condition.
        cond: Operand,
        /// Destination when the condition holds.
        true_target: BlockId,
        /// Destination otherwise.
        false_target: BlockId,
    },
    /// Function return.
    Return {
        /// Returned value, `None` for `void` functions.
        value: Option<Operand>,
    },
}

impl Terminator {
    /// Returns the successor blocks in branch order.
    ///
    /// A conditional branch with identical targets yields the target twice.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Self::Jump { target } => vec![*target],
            Self::Branch {
                true_target,
                false_target,
                ..
            } => vec![*true_target, *false_target],
            Self::Return { .. } => Vec::new(),
        }
    }

    /// Returns the value operands of the terminator.
    #[must_use]
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Self::Jump { .. } | Self::Return { value: None } => Vec::new(),
            Self::Branch { cond, .. } => vec![*cond],
            Self::Return { value: Some(value) } => vec![*value],
        }
    }

    /// Redirects every use of `old` to `new`. Returns the number of rewritten operands.
    pub fn replace_uses(&mut self, old: ValueId, new: Operand) -> usize {
        match self {
            Self::Branch { cond, .. } => usize::from(cond.replace(old, new)),
            Self::Return { value: Some(value) } => usize::from(value.replace(old, new)),
            Self::Jump { .. } | Self::Return { value: None } => 0,
        }
    }

    /// Retargets every edge to `old` towards `new`. Returns the number of edges changed.
    pub fn replace_target(&mut self, old: BlockId, new: BlockId) -> usize {
        let mut changed = 0;
        match self {
            Self::Jump { target } => {
                if *target == old {
                    *target = new;
                    changed += 1;
                }
            }
            Self::Branch {
                true_target,
                false_target,
                ..
            } => {
                for target in [true_target, false_target] {
                    if *target == old {
                        *target = new;
                        changed += 1;
                    }
                }
            }
            Self::Return { .. } => {}
        }
        changed
    }

    /// Returns true for unconditional jumps.
    #[must_use]
    pub const fn is_jump(&self) -> bool {
        matches!(self, Self::Jump { .. })
    }
}
