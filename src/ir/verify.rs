//! Structural and SSA verification.
//!
//! [`Function::validate`] checks, in order:
//!
//! 1. The layout is non-empty and every layout handle resolves exactly once
//! 2. Every block has a terminator whose targets are live blocks, and the entry block
//!    has no predecessors
//! 3. Every instruction is placed in exactly one block and its result points back at it
//! 4. No operand references a deleted value
//! 5. Every phi has exactly one operand per predecessor of its block
//! 6. In blocks reachable from the entry, every use is dominated by its definition
//!    (phi operands are checked at the end of the incoming edge)
//! 7. Return values agree with the declared return type and branch conditions are
//!    booleans
//!
//! Unreachable blocks are allowed; the dead block eliminator removes them.

use std::collections::{HashMap, HashSet};

use crate::{
    ir::{
        BlockId, DominatorTree, Function, FunctionCfg, InstId, Operand, Terminator, Type,
        ValueDef, ValueId,
    },
    Error, Result,
};

/// Where a value becomes available.
#[derive(Debug, Clone, Copy)]
enum DefPoint {
    /// Available everywhere (arguments).
    Everywhere,
    /// At the start of a block (phi results).
    BlockStart(usize),
    /// After an instruction at the given block node and position.
    After(usize, usize),
}

impl Function {
    /// Validates the function, returning a description of the first violation.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message describing the first problem found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.validate_layout()?;
        let placement = self.validate_placement()?;
        self.validate_terminators()?;
        self.validate_phis()?;
        self.validate_dominance(&placement)?;
        Ok(())
    }

    fn validate_layout(&self) -> std::result::Result<(), String> {
        if self.layout().is_empty() {
            return Err(format!("{}: function has no blocks", self.name()));
        }
        let mut seen = HashSet::new();
        for &block in self.layout() {
            if self.block(block).is_none() {
                return Err(format!("{}: layout references deleted block", self.name()));
            }
            if !seen.insert(block) {
                return Err(format!("{}: block listed twice in layout", self.name()));
            }
        }
        Ok(())
    }

    /// Returns, for every placed instruction, its block node and position.
    fn validate_placement(&self) -> std::result::Result<HashMap<InstId, (usize, usize)>, String> {
        let mut placement = HashMap::new();
        for (node, (_, block)) in self.iter_blocks().enumerate() {
            for (position, &inst) in block.instructions().iter().enumerate() {
                let Some(data) = self.inst(inst) else {
                    return Err(format!(
                        "{}: block '{}' lists a deleted instruction",
                        self.name(),
                        block.name()
                    ));
                };
                if placement.insert(inst, (node, position)).is_some() {
                    return Err(format!(
                        "{}: instruction placed twice (again in '{}')",
                        self.name(),
                        block.name()
                    ));
                }
                if let Some(result) = data.result() {
                    let points_back = self
                        .value(result)
                        .is_some_and(|v| v.def == ValueDef::Instruction(inst));
                    if !points_back {
                        return Err(format!(
                            "{}: result of instruction in '{}' is not defined by it",
                            self.name(),
                            block.name()
                        ));
                    }
                }
                for operand in data.op().operands() {
                    self.check_operand_live(&operand, block.name())?;
                }
            }
        }
        if placement.len() != self.instruction_count() {
            return Err(format!(
                "{}: {} instructions are not placed in any block",
                self.name(),
                self.instruction_count() - placement.len()
            ));
        }
        Ok(placement)
    }

    fn check_operand_live(&self, operand: &Operand, block: &str) -> std::result::Result<(), String> {
        match operand {
            Operand::Value(v) if !self.contains_value(*v) => Err(format!(
                "{}: block '{}' references a deleted value",
                self.name(),
                block
            )),
            _ => Ok(()),
        }
    }

    fn validate_terminators(&self) -> std::result::Result<(), String> {
        for (id, block) in self.iter_blocks() {
            let Some(term) = block.terminator() else {
                return Err(format!(
                    "{}: block '{}' has no terminator",
                    self.name(),
                    block.name()
                ));
            };
            for succ in term.successors() {
                if self.block_position(succ).is_none() {
                    return Err(format!(
                        "{}: block '{}' branches to a deleted block",
                        self.name(),
                        block.name()
                    ));
                }
            }
            for operand in term.operands() {
                self.check_operand_live(&operand, block.name())?;
            }
            match term {
                Terminator::Return { value } => {
                    let returns_value = value.is_some();
                    if returns_value == (self.return_type() == Type::Void) {
                        return Err(format!(
                            "{}: return in '{}' does not match return type {}",
                            self.name(),
                            block.name(),
                            self.return_type()
                        ));
                    }
                }
                Terminator::Branch { cond, .. } => {
                    if self.operand_type(cond) != Some(Type::Bool) {
                        return Err(format!(
                            "{}: branch condition in '{}' is not a bool",
                            self.name(),
                            block.name()
                        ));
                    }
                }
                Terminator::Jump { .. } => {}
            }
            if Some(id) == self.entry() && !self.block_predecessors(id).is_empty() {
                return Err(format!(
                    "{}: entry block '{}' has predecessors",
                    self.name(),
                    block.name()
                ));
            }
        }
        Ok(())
    }

    fn validate_phis(&self) -> std::result::Result<(), String> {
        for (id, block) in self.iter_blocks() {
            let preds: HashSet<BlockId> = self.block_predecessors(id).into_iter().collect();
            for phi in block.phis() {
                let incoming: Vec<BlockId> =
                    phi.operands().iter().map(|op| op.predecessor).collect();
                let unique: HashSet<BlockId> = incoming.iter().copied().collect();
                if incoming.len() != unique.len() || unique != preds {
                    return Err(format!(
                        "{}: phi in '{}' has {} operands for {} predecessors",
                        self.name(),
                        block.name(),
                        incoming.len(),
                        preds.len()
                    ));
                }
                for op in phi.operands() {
                    self.check_operand_live(&op.value, block.name())?;
                }
            }
        }
        Ok(())
    }

    fn def_point(
        &self,
        value: ValueId,
        placement: &HashMap<InstId, (usize, usize)>,
    ) -> Option<DefPoint> {
        match self.value(value)?.def {
            ValueDef::Argument(_) => Some(DefPoint::Everywhere),
            ValueDef::Phi(block) => self.block_position(block).map(DefPoint::BlockStart),
            ValueDef::Instruction(inst) => placement
                .get(&inst)
                .map(|&(node, position)| DefPoint::After(node, position)),
        }
    }

    /// Checks that `value` is available at `position` of `node`.
    ///
    /// `position` is the instruction index, or `usize::MAX` for the block's end.
    fn available_at(
        &self,
        value: ValueId,
        node: usize,
        position: usize,
        placement: &HashMap<InstId, (usize, usize)>,
        dom: &DominatorTree,
    ) -> bool {
        match self.def_point(value, placement) {
            Some(DefPoint::Everywhere) => true,
            Some(DefPoint::BlockStart(def_node)) => dom.dominates(def_node, node),
            Some(DefPoint::After(def_node, def_pos)) => {
                if def_node == node {
                    def_pos < position
                } else {
                    dom.dominates(def_node, node)
                }
            }
            None => false,
        }
    }

    fn validate_dominance(
        &self,
        placement: &HashMap<InstId, (usize, usize)>,
    ) -> std::result::Result<(), String> {
        let cfg = FunctionCfg::new(self);
        let dom = cfg.dominators();

        for (node, (_, block)) in self.iter_blocks().enumerate() {
            if !dom.is_reachable(node) {
                continue;
            }
            let violation = |what: &str| {
                format!(
                    "{}: {} in '{}' uses a value that does not dominate it",
                    self.name(),
                    what,
                    block.name()
                )
            };

            for phi in block.phis() {
                for op in phi.operands() {
                    let Some(value) = op.value.as_value() else {
                        continue;
                    };
                    let Some(pred) = self.block_position(op.predecessor) else {
                        return Err(violation("phi"));
                    };
                    if dom.is_reachable(pred)
                        && !self.available_at(value, pred, usize::MAX, placement, &dom)
                    {
                        return Err(violation("phi"));
                    }
                }
            }

            for (position, &inst) in block.instructions().iter().enumerate() {
                let Some(data) = self.inst(inst) else {
                    continue;
                };
                for value in data.op().uses() {
                    if !self.available_at(value, node, position, placement, &dom) {
                        return Err(violation(data.op().mnemonic()));
                    }
                }
            }

            if let Some(term) = block.terminator() {
                for value in term.operands().iter().filter_map(Operand::as_value) {
                    if !self.available_at(value, node, usize::MAX, placement, &dom) {
                        return Err(violation("terminator"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Verifies a function, wrapping the first violation in [`Error::Verification`].
///
/// # Errors
///
/// Returns [`Error::Verification`] describing the first violation found.
pub fn verify_function(func: &Function) -> Result<()> {
    func.validate().map_err(|message| Error::Verification {
        function: func.name().to_string(),
        message,
    })
}
