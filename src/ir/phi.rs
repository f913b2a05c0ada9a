//! Phi nodes.
//!
//! A phi node `v3 = phi [v1, B1], [v2, B2]` selects `v1` when control arrives from `B1`
//! and `v2` when it arrives from `B2`. Phi nodes are evaluated at block entry, before any
//! instruction of the block executes, and all phis of a block read their operands
//! simultaneously.
//!
//! # Invariants
//!
//! - A phi node has exactly one operand per predecessor of its block
//! - The result value is defined by the phi and by nothing else

use crate::ir::{BlockId, Operand, ValueId};

/// An incoming value of a phi node together with the edge it arrives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiOperand {
    /// The incoming value.
    pub value: Operand,
    /// The predecessor block the value flows in from.
    pub predecessor: BlockId,
}

impl PhiOperand {
    /// Creates a new phi operand.
    #[must_use]
    pub const fn new(value: Operand, predecessor: BlockId) -> Self {
        Self { value, predecessor }
    }
}

/// A phi node merging values at a control flow join point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhiNode {
    result: ValueId,
    operands: Vec<PhiOperand>,
}

impl PhiNode {
    /// Creates a phi node without operands.
    #[must_use]
    pub const fn new(result: ValueId) -> Self {
        Self {
            result,
            operands: Vec::new(),
        }
    }

    /// Returns the value defined by this phi.
    #[must_use]
    pub const fn result(&self) -> ValueId {
        self.result
    }

    /// Returns the incoming operands.
    #[must_use]
    pub fn operands(&self) -> &[PhiOperand] {
        &self.operands
    }

    /// Returns the number of incoming operands.
    #[must_use]
    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    /// Adds an incoming operand.
    pub fn add_operand(&mut self, operand: PhiOperand) {
        self.operands.push(operand);
    }

    /// Sets the incoming value for `predecessor`, replacing an existing entry.
    pub fn set_operand(&mut self, predecessor: BlockId, value: Operand) {
        if let Some(existing) = self
            .operands
            .iter_mut()
            .find(|op| op.predecessor == predecessor)
        {
            existing.value = value;
        } else {
            self.operands.push(PhiOperand::new(value, predecessor));
        }
    }

    /// Returns the value flowing in from `predecessor`.
    #[must_use]
    pub fn operand_from(&self, predecessor: BlockId) -> Option<Operand> {
        self.operands
            .iter()
            .find(|op| op.predecessor == predecessor)
            .map(|op| op.value)
    }

    /// Removes every operand arriving from `predecessor`.
    ///
    /// Returns true if an operand was removed.
    pub fn remove_operand_from(&mut self, predecessor: BlockId) -> bool {
        let before = self.operands.len();
        self.operands.retain(|op| op.predecessor != predecessor);
        self.operands.len() != before
    }

    /// Redirects incoming values that reference `old`. Returns the number of rewrites.
    pub fn replace_uses(&mut self, old: ValueId, new: Operand) -> usize {
        self.operands
            .iter_mut()
            .map(|op| op.value.replace(old, new))
            .filter(|&replaced| replaced)
            .count()
    }

    /// Renames the predecessor edge `old` to `new`. Returns the number of rewrites.
    pub fn replace_predecessor(&mut self, old: BlockId, new: BlockId) -> usize {
        let mut changed = 0;
        for op in &mut self.operands {
            if op.predecessor == old {
                op.predecessor = new;
                changed += 1;
            }
        }
        changed
    }

    /// Returns the SSA values read by this phi.
    #[must_use]
    pub fn uses(&self) -> Vec<ValueId> {
        self.operands
            .iter()
            .filter_map(|op| op.value.as_value())
            .collect()
    }
}
