//! Basic blocks.

use crate::ir::{BlockId, InstId, PhiNode, Terminator, ValueId};

/// A basic block: phi nodes, straight-line instructions and one terminator.
///
/// Instructions are stored as handles into the owning function's instruction arena,
/// in execution order. Predecessors are never stored; they are derived from the
/// terminators of the function's blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    name: String,
    phis: Vec<PhiNode>,
    instructions: Vec<InstId>,
    terminator: Option<Terminator>,
}

impl BasicBlock {
    /// Creates an empty block with the given label.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phis: Vec::new(),
            instructions: Vec::new(),
            terminator: None,
        }
    }

    /// Returns the block label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces the block label.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns the phi nodes of the block.
    #[must_use]
    pub fn phis(&self) -> &[PhiNode] {
        &self.phis
    }

    /// Returns the phi nodes mutably.
    pub fn phis_mut(&mut self) -> &mut Vec<PhiNode> {
        &mut self.phis
    }

    /// Returns the phi node defining `value`.
    #[must_use]
    pub fn phi_defining(&self, value: ValueId) -> Option<&PhiNode> {
        self.phis.iter().find(|phi| phi.result() == value)
    }

    /// Returns the phi node defining `value` mutably.
    pub fn phi_defining_mut(&mut self, value: ValueId) -> Option<&mut PhiNode> {
        self.phis.iter_mut().find(|phi| phi.result() == value)
    }

    /// Returns the instruction handles in execution order.
    #[must_use]
    pub fn instructions(&self) -> &[InstId] {
        &self.instructions
    }

    /// Returns the instruction handles mutably.
    pub fn instructions_mut(&mut self) -> &mut Vec<InstId> {
        &mut self.instructions
    }

    /// Returns the position of `inst` within the block.
    #[must_use]
    pub fn position_of(&self, inst: InstId) -> Option<usize> {
        self.instructions.iter().position(|&i| i == inst)
    }

    /// Returns the terminator, `None` while the block is under construction.
    #[must_use]
    pub const fn terminator(&self) -> Option<&Terminator> {
        self.terminator.as_ref()
    }

    /// Returns the terminator mutably.
    pub fn terminator_mut(&mut self) -> Option<&mut Terminator> {
        self.terminator.as_mut()
    }

    /// Sets the terminator, returning the previous one.
    pub fn set_terminator(&mut self, terminator: Terminator) -> Option<Terminator> {
        self.terminator.replace(terminator)
    }

    /// Returns the successor blocks named by the terminator.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator
            .as_ref()
            .map(Terminator::successors)
            .unwrap_or_default()
    }

    /// Returns the number of phi nodes.
    #[must_use]
    pub fn phi_count(&self) -> usize {
        self.phis.len()
    }

    /// Returns the number of instructions, excluding phis and the terminator.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }
}
