//! Functions: the unit every pass operates on.
//!
//! A [`Function`] owns three arenas (blocks, instructions, values) plus a layout vector
//! giving the program order of its blocks. The first block of the layout is the entry,
//! the last one is the function's final block.
//!
//! # Use-Def Primitives
//!
//! - [`Function::replace_all_uses`] redirects every operand that references a value,
//!   across instructions, terminators and phi nodes
//! - [`Function::replace_block_uses`] retargets branch edges and phi predecessors
//! - [`Function::uses_of`] lists every use site of a value
//!
//! # Position Queries
//!
//! Positions inside a block are plain indices into its instruction list.
//! [`Function::next_non_debug`] and [`Function::prev_non_debug`] walk that list while
//! skipping debug markers.

use slotmap::SlotMap;

use crate::{
    ir::{
        BasicBlock, BlockId, InstId, Instruction, Op, Operand, PhiNode, Terminator, Type,
        ValueData, ValueDef, ValueId,
    },
    Result,
};

/// A place where a value is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseSite {
    /// An operand of an instruction.
    Instruction(InstId),
    /// An operand of the terminator of a block.
    Terminator(BlockId),
    /// An incoming value of a phi node.
    Phi {
        /// Block owning the phi.
        block: BlockId,
        /// Result of the phi.
        phi: ValueId,
    },
}

/// A direct call of a function to itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfCall {
    /// Block containing the call.
    pub block: BlockId,
    /// Position of the call within the block.
    pub index: usize,
    /// The call instruction.
    pub inst: InstId,
}

/// Structural summary of a function, used to compare functions before and after a pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionStats {
    /// Number of blocks.
    pub blocks: usize,
    /// Number of non-terminator instructions.
    pub instructions: usize,
    /// Number of phi nodes.
    pub phis: usize,
    /// Control flow edges as `(from, to)` layout positions.
    pub edges: Vec<(usize, usize)>,
}

/// A function in CFG/SSA form.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    params: Vec<ValueId>,
    return_type: Type,
    blocks: SlotMap<BlockId, BasicBlock>,
    layout: Vec<BlockId>,
    insts: SlotMap<InstId, Instruction>,
    values: SlotMap<ValueId, ValueData>,
}

impl Function {
    /// Creates an empty function without parameters or blocks.
    ///
    /// # Arguments
    ///
    /// * `name` - The function name; direct calls using this name are self-calls
    /// * `return_type` - The declared return type
    #[must_use]
    pub fn new(name: impl Into<String>, return_type: Type) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type,
            blocks: SlotMap::with_key(),
            layout: Vec::new(),
            insts: SlotMap::with_key(),
            values: SlotMap::with_key(),
        }
    }

    /// Appends a parameter and returns its argument value.
    pub fn add_param(&mut self, ty: Type, name: impl Into<String>) -> ValueId {
        let index = self.params.len();
        let value = self.values.insert(ValueData::new(
            ty,
            ValueDef::Argument(index),
            Some(name.into()),
        ));
        self.params.push(value);
        value
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared return type.
    #[must_use]
    pub const fn return_type(&self) -> Type {
        self.return_type
    }

    /// Returns the argument values in parameter order.
    #[must_use]
    pub fn params(&self) -> &[ValueId] {
        &self.params
    }

    /// Returns the argument index of `value`, if it is an argument of this function.
    #[must_use]
    pub fn argument_index(&self, value: ValueId) -> Option<usize> {
        self.values.get(value).and_then(ValueData::argument_index)
    }

    /// Returns the blocks in program order.
    #[must_use]
    pub fn layout(&self) -> &[BlockId] {
        &self.layout
    }

    /// Returns the entry block.
    #[must_use]
    pub fn entry(&self) -> Option<BlockId> {
        self.layout.first().copied()
    }

    /// Returns the final block in program order.
    #[must_use]
    pub fn last_block(&self) -> Option<BlockId> {
        self.layout.last().copied()
    }

    /// Returns the layout position of `block`.
    #[must_use]
    pub fn block_position(&self, block: BlockId) -> Option<usize> {
        self.layout.iter().position(|&b| b == block)
    }

    /// Returns a block by handle.
    #[must_use]
    pub fn block(&self, block: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(block)
    }

    /// Returns a block mutably.
    pub fn block_mut(&mut self, block: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(block)
    }

    /// Returns a block or a malformed error naming the missing handle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the handle does not resolve.
    pub fn try_block(&self, block: BlockId) -> Result<&BasicBlock> {
        self.blocks
            .get(block)
            .ok_or_else(|| malformed_error!("{}: block {:?} does not exist", self.name, block))
    }

    fn try_block_mut(&mut self, block: BlockId) -> Result<&mut BasicBlock> {
        let name = &self.name;
        self.blocks
            .get_mut(block)
            .ok_or_else(|| malformed_error!("{}: block {:?} does not exist", name, block))
    }

    /// Finds a block by label.
    #[must_use]
    pub fn block_by_name(&self, name: &str) -> Option<BlockId> {
        self.layout
            .iter()
            .copied()
            .find(|&b| self.blocks.get(b).is_some_and(|blk| blk.name() == name))
    }

    /// Returns an instruction by handle.
    #[must_use]
    pub fn inst(&self, inst: InstId) -> Option<&Instruction> {
        self.insts.get(inst)
    }

    /// Returns an instruction or a malformed error naming the missing handle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the handle does not resolve.
    pub fn try_inst(&self, inst: InstId) -> Result<&Instruction> {
        self.insts
            .get(inst)
            .ok_or_else(|| malformed_error!("{}: instruction {:?} does not exist", self.name, inst))
    }

    /// Returns an instruction mutably.
    pub fn inst_mut(&mut self, inst: InstId) -> Option<&mut Instruction> {
        self.insts.get_mut(inst)
    }

    /// Returns value metadata by handle.
    #[must_use]
    pub fn value(&self, value: ValueId) -> Option<&ValueData> {
        self.values.get(value)
    }

    /// Returns true if `value` is live in this function.
    #[must_use]
    pub fn contains_value(&self, value: ValueId) -> bool {
        self.values.contains_key(value)
    }

    /// Returns the type of an operand.
    #[must_use]
    pub fn operand_type(&self, operand: &Operand) -> Option<Type> {
        match operand {
            Operand::Value(v) => self.values.get(*v).map(|data| data.ty),
            Operand::Const(c) => Some(c.ty()),
            Operand::Undef(ty) => Some(*ty),
        }
    }

    /// Renames a value.
    pub fn set_value_name(&mut self, value: ValueId, name: impl Into<String>) {
        if let Some(data) = self.values.get_mut(value) {
            data.name = Some(name.into());
        }
    }

    /// Returns the instruction defining `value`, if it is an instruction result.
    #[must_use]
    pub fn defining_inst(&self, value: ValueId) -> Option<InstId> {
        match self.values.get(value)?.def {
            ValueDef::Instruction(inst) => Some(inst),
            ValueDef::Argument(_) | ValueDef::Phi(_) => None,
        }
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.layout.len()
    }

    /// Returns the number of non-terminator instructions.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.insts.len()
    }

    /// Returns the number of phi nodes across all blocks.
    #[must_use]
    pub fn phi_count(&self) -> usize {
        self.blocks.values().map(BasicBlock::phi_count).sum()
    }

    /// Iterates blocks in program order.
    pub fn iter_blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> + '_ {
        self.layout
            .iter()
            .filter_map(|&id| self.blocks.get(id).map(|block| (id, block)))
    }

    /// Iterates the instructions of `block` in execution order.
    pub fn block_insts(&self, block: BlockId) -> impl Iterator<Item = (InstId, &Instruction)> + '_ {
        self.blocks
            .get(block)
            .map(BasicBlock::instructions)
            .unwrap_or_default()
            .iter()
            .filter_map(|&id| self.insts.get(id).map(|inst| (id, inst)))
    }

    /// Appends a new block at the end of the layout.
    pub fn add_block(&mut self, name: impl Into<String>) -> BlockId {
        let id = self.blocks.insert(BasicBlock::new(name));
        self.layout.push(id);
        id
    }

    /// Inserts a new block into the layout right before `before`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `before` is not part of the layout.
    pub fn insert_block_before(
        &mut self,
        before: BlockId,
        name: impl Into<String>,
    ) -> Result<BlockId> {
        let pos = self
            .block_position(before)
            .ok_or_else(|| malformed_error!("{}: block {:?} is not in the layout", self.name, before))?;
        let id = self.blocks.insert(BasicBlock::new(name));
        self.layout.insert(pos, id);
        Ok(id)
    }

    /// Inserts an instruction at `position` in `block`.
    ///
    /// # Arguments
    ///
    /// * `block` - The block receiving the instruction
    /// * `position` - Index in the block's instruction list, clamped to its length
    /// * `op` - The operation
    /// * `result` - Type and optional name of the defined value, `None` for no result
    ///
    /// # Returns
    ///
    /// The new instruction handle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `block` does not exist.
    pub fn insert_inst(
        &mut self,
        block: BlockId,
        position: usize,
        op: Op,
        result: Option<(Type, Option<String>)>,
    ) -> Result<InstId> {
        self.try_block(block)?;
        let inst = self.insts.insert(Instruction::new(op, None));
        if let Some((ty, name)) = result {
            let value = self
                .values
                .insert(ValueData::new(ty, ValueDef::Instruction(inst), name));
            if let Some(data) = self.insts.get_mut(inst) {
                data.set_result(Some(value));
            }
        }
        let list = self.try_block_mut(block)?.instructions_mut();
        let position = position.min(list.len());
        list.insert(position, inst);
        Ok(inst)
    }

    /// Appends an instruction to `block`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `block` does not exist.
    pub fn append_inst(
        &mut self,
        block: BlockId,
        op: Op,
        result: Option<(Type, Option<String>)>,
    ) -> Result<InstId> {
        self.insert_inst(block, usize::MAX, op, result)
    }

    /// Returns the value defined by `inst`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the instruction does not exist or defines
    /// no value.
    pub fn inst_result(&self, inst: InstId) -> Result<ValueId> {
        self.try_inst(inst)?
            .result()
            .ok_or_else(|| malformed_error!("{}: instruction {:?} defines no value", self.name, inst))
    }

    /// Adds a phi node without operands to `block`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `block` does not exist.
    pub fn add_phi(&mut self, block: BlockId, ty: Type, name: Option<String>) -> Result<ValueId> {
        self.try_block(block)?;
        let value = self
            .values
            .insert(ValueData::new(ty, ValueDef::Phi(block), name));
        self.try_block_mut(block)?
            .phis_mut()
            .push(PhiNode::new(value));
        Ok(value)
    }

    /// Sets the terminator of `block`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `block` does not exist.
    pub fn set_terminator(&mut self, block: BlockId, terminator: Terminator) -> Result<()> {
        self.try_block_mut(block)?.set_terminator(terminator);
        Ok(())
    }

    /// Returns the block containing `inst`.
    #[must_use]
    pub fn block_of(&self, inst: InstId) -> Option<BlockId> {
        self.iter_blocks()
            .find(|(_, block)| block.instructions().contains(&inst))
            .map(|(id, _)| id)
    }

    /// Moves `inst` to `position` in block `to`, keeping its handle and result.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the instruction is not placed in any block
    /// or `to` does not exist.
    pub fn move_inst(&mut self, inst: InstId, to: BlockId, position: usize) -> Result<()> {
        let from = self
            .block_of(inst)
            .ok_or_else(|| malformed_error!("{}: instruction {:?} is not placed", self.name, inst))?;
        self.try_block(to)?;
        self.try_block_mut(from)?
            .instructions_mut()
            .retain(|&i| i != inst);
        let list = self.try_block_mut(to)?.instructions_mut();
        let position = position.min(list.len());
        list.insert(position, inst);
        Ok(())
    }

    /// Deletes an instruction and its result value.
    ///
    /// Remaining uses of the result become dangling; callers redirect them first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the instruction does not exist.
    pub fn remove_inst(&mut self, inst: InstId) -> Result<()> {
        let removed = self
            .insts
            .remove(inst)
            .ok_or_else(|| malformed_error!("{}: instruction {:?} does not exist", self.name, inst))?;
        if let Some(value) = removed.result() {
            self.values.remove(value);
        }
        for block in self.blocks.values_mut() {
            block.instructions_mut().retain(|&i| i != inst);
        }
        Ok(())
    }

    /// Deletes a block, its phi nodes and its instructions.
    ///
    /// Edges into the block and uses of its values are left alone; callers sever them
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the block does not exist.
    pub fn remove_block(&mut self, block: BlockId) -> Result<()> {
        let removed = self
            .blocks
            .remove(block)
            .ok_or_else(|| malformed_error!("{}: block {:?} does not exist", self.name, block))?;
        for &inst in removed.instructions() {
            if let Some(data) = self.insts.remove(inst) {
                if let Some(value) = data.result() {
                    self.values.remove(value);
                }
            }
        }
        for phi in removed.phis() {
            self.values.remove(phi.result());
        }
        self.layout.retain(|&b| b != block);
        Ok(())
    }

    /// Returns the successors of `block` in branch order.
    #[must_use]
    pub fn block_successors(&self, block: BlockId) -> Vec<BlockId> {
        self.blocks
            .get(block)
            .map(BasicBlock::successors)
            .unwrap_or_default()
    }

    /// Returns the distinct predecessors of `block` in program order.
    ///
    /// Predecessors are derived by scanning every terminator of the function.
    #[must_use]
    pub fn block_predecessors(&self, block: BlockId) -> Vec<BlockId> {
        self.iter_blocks()
            .filter(|(_, b)| b.successors().contains(&block))
            .map(|(id, _)| id)
            .collect()
    }

    /// Redirects every use of `old` to `new` across instructions, terminators and phis.
    ///
    /// # Returns
    ///
    /// The number of operands rewritten.
    pub fn replace_all_uses(&mut self, old: ValueId, new: Operand) -> usize {
        let mut count: usize = self
            .insts
            .values_mut()
            .map(|inst| inst.op_mut().replace_uses(old, new))
            .sum();
        for block in self.blocks.values_mut() {
            for phi in block.phis_mut() {
                count += phi.replace_uses(old, new);
            }
            if let Some(term) = block.terminator_mut() {
                count += term.replace_uses(old, new);
            }
        }
        count
    }

    /// Retargets every branch edge to `old` towards `new` and renames `old` as a phi
    /// predecessor to `new`.
    ///
    /// # Returns
    ///
    /// The number of edges and phi operands rewritten.
    pub fn replace_block_uses(&mut self, old: BlockId, new: BlockId) -> usize {
        let mut count = 0;
        for block in self.blocks.values_mut() {
            if let Some(term) = block.terminator_mut() {
                count += term.replace_target(old, new);
            }
            for phi in block.phis_mut() {
                count += phi.replace_predecessor(old, new);
            }
        }
        count
    }

    /// Lists every place `value` is read, in program order.
    #[must_use]
    pub fn uses_of(&self, value: ValueId) -> Vec<UseSite> {
        let mut sites = Vec::new();
        for (block_id, block) in self.iter_blocks() {
            for phi in block.phis() {
                if phi.uses().contains(&value) {
                    sites.push(UseSite::Phi {
                        block: block_id,
                        phi: phi.result(),
                    });
                }
            }
            for (inst_id, inst) in self.block_insts(block_id) {
                if inst.op().uses().contains(&value) {
                    sites.push(UseSite::Instruction(inst_id));
                }
            }
            if block
                .terminator()
                .is_some_and(|t| t.operands().iter().any(|op| op.is_value(value)))
            {
                sites.push(UseSite::Terminator(block_id));
            }
        }
        sites
    }

    /// Returns the first non-debug instruction of `block` after `position`.
    ///
    /// # Returns
    ///
    /// The index and handle of the instruction, or `None` if only debug markers (or
    /// nothing) follow.
    #[must_use]
    pub fn next_non_debug(&self, block: BlockId, position: usize) -> Option<(usize, InstId)> {
        let list = self.blocks.get(block)?.instructions();
        list.iter()
            .enumerate()
            .skip(position.saturating_add(1))
            .find(|(_, &id)| self.insts.get(id).is_some_and(|i| !i.is_debug()))
            .map(|(idx, &id)| (idx, id))
    }

    /// Returns the last non-debug instruction of `block` before `position`.
    ///
    /// Passing the block's instruction count yields the last non-debug instruction
    /// before the terminator.
    #[must_use]
    pub fn prev_non_debug(&self, block: BlockId, position: usize) -> Option<(usize, InstId)> {
        let list = self.blocks.get(block)?.instructions();
        list.iter()
            .enumerate()
            .take(position.min(list.len()))
            .rev()
            .find(|(_, &id)| self.insts.get(id).is_some_and(|i| !i.is_debug()))
            .map(|(idx, &id)| (idx, id))
    }

    /// Returns the last non-debug instruction before the terminator of `block`.
    #[must_use]
    pub fn last_non_debug(&self, block: BlockId) -> Option<(usize, InstId)> {
        let len = self.blocks.get(block)?.instruction_count();
        self.prev_non_debug(block, len)
    }

    /// Returns true if `inst` is a direct call of this function to itself.
    #[must_use]
    pub fn is_self_call(&self, inst: InstId) -> bool {
        self.insts
            .get(inst)
            .is_some_and(|i| i.op().is_direct_call_to(&self.name))
    }

    /// Lists every direct self-call in program order.
    #[must_use]
    pub fn self_calls(&self) -> Vec<SelfCall> {
        let mut calls = Vec::new();
        for (block_id, block) in self.iter_blocks() {
            for (index, &inst) in block.instructions().iter().enumerate() {
                if self.is_self_call(inst) {
                    calls.push(SelfCall {
                        block: block_id,
                        index,
                        inst,
                    });
                }
            }
        }
        calls
    }

    /// Computes a structural summary of the function.
    #[must_use]
    pub fn stats(&self) -> FunctionStats {
        let mut edges = Vec::new();
        for (from, (_, block)) in self.iter_blocks().enumerate() {
            for succ in block.successors() {
                if let Some(to) = self.block_position(succ) {
                    edges.push((from, to));
                }
            }
        }
        FunctionStats {
            blocks: self.block_count(),
            instructions: self.instruction_count(),
            phis: self.phi_count(),
            edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Callee, Constant};

    fn two_block_function() -> (Function, BlockId, BlockId, ValueId) {
        let mut func = Function::new("f", Type::I32);
        let n = func.add_param(Type::I32, "n");
        let b0 = func.add_block("entry");
        let b1 = func.add_block("exit");
        func.set_terminator(b0, Terminator::Jump { target: b1 }).unwrap();
        func.set_terminator(
            b1,
            Terminator::Return {
                value: Some(Operand::Value(n)),
            },
        )
        .unwrap();
        (func, b0, b1, n)
    }

    #[test]
    fn test_predecessors_are_derived() {
        let (func, b0, b1, _) = two_block_function();
        assert_eq!(func.block_predecessors(b1), vec![b0]);
        assert!(func.block_predecessors(b0).is_empty());
        assert_eq!(func.entry(), Some(b0));
        assert_eq!(func.last_block(), Some(b1));
    }

    #[test]
    fn test_replace_all_uses_reaches_terminators_and_instructions() {
        let (mut func, b0, b1, n) = two_block_function();
        let add = func
            .append_inst(
                b0,
                Op::Binary {
                    op: BinaryOp::Add,
                    lhs: Operand::Value(n),
                    rhs: Operand::Value(n),
                },
                Some((Type::I32, None)),
            )
            .unwrap();

        let replaced = func.replace_all_uses(n, Operand::Const(Constant::I32(7)));
        assert_eq!(replaced, 3);
        assert!(func.uses_of(n).is_empty());
        assert_eq!(
            func.inst(add).unwrap().op().operands(),
            vec![Operand::Const(Constant::I32(7)); 2]
        );
        assert_eq!(
            func.block(b1).unwrap().terminator(),
            Some(&Terminator::Return {
                value: Some(Operand::Const(Constant::I32(7)))
            })
        );
    }

    #[test]
    fn test_non_debug_navigation_skips_markers() {
        let (mut func, b0, _, n) = two_block_function();
        let call = func
            .append_inst(
                b0,
                Op::Call {
                    callee: Callee::Direct("f".into()),
                    args: vec![Operand::Value(n)],
                },
                Some((Type::I32, None)),
            )
            .unwrap();
        func.append_inst(b0, Op::Debug { value: Operand::Value(n) }, None)
            .unwrap();
        let add = func
            .append_inst(
                b0,
                Op::Binary {
                    op: BinaryOp::Add,
                    lhs: Operand::Value(n),
                    rhs: Operand::Value(n),
                },
                Some((Type::I32, None)),
            )
            .unwrap();

        assert_eq!(func.next_non_debug(b0, 0), Some((2, add)));
        assert_eq!(func.prev_non_debug(b0, 2), Some((0, call)));
        assert_eq!(func.last_non_debug(b0), Some((2, add)));
        assert_eq!(func.self_calls().len(), 1);
    }

    #[test]
    fn test_remove_block_drops_owned_values() {
        let (mut func, b0, b1, n) = two_block_function();
        let extra = func.insert_block_before(b1, "middle").unwrap();
        let phi = func.add_phi(extra, Type::I32, None).unwrap();
        func.set_terminator(extra, Terminator::Jump { target: b1 }).unwrap();
        assert_eq!(func.layout(), &[b0, extra, b1]);

        func.remove_block(extra).unwrap();
        assert!(!func.contains_value(phi));
        assert!(func.contains_value(n));
        assert_eq!(func.block_count(), 2);
    }

    #[test]
    fn test_replace_block_uses_renames_edges() {
        let (mut func, b0, b1, _) = two_block_function();
        let other = func.add_block("other");
        func.set_terminator(other, Terminator::Return { value: None }).unwrap();

        assert_eq!(func.replace_block_uses(b1, other), 1);
        assert_eq!(func.block_successors(b0), vec![other]);
        assert!(func.block_predecessors(b1).is_empty());
    }
}
