//! Dead block elimination.
//!
//! Removes blocks that no edge leads to. The accumulator rewrite leaves its base case
//! block in that state: the loop header branches straight to the final block, and the
//! base case block keeps only its outgoing jump.
//!
//! # Algorithm
//!
//! Predecessors are computed once, before anything is removed. Every non-entry block
//! without predecessors is then severed from the function:
//!
//! 1. Its entries in the phi nodes of its successors are dropped
//! 2. Remaining uses of the values it defines become `undef` of the value's type
//! 3. The block and everything in it is deleted
//!
//! Blocks that only become unreachable because a removed block was their sole
//! predecessor are kept until the next run.

use crate::{
    compiler::{pass::FunctionPass, EventKind, EventLog},
    ir::{BlockId, Function, FunctionCfg, Operand, ValueId},
    Result,
};

/// Dead block elimination pass.
pub struct DeadBlockPass;

impl Default for DeadBlockPass {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadBlockPass {
    /// Creates a new dead block elimination pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FunctionPass for DeadBlockPass {
    fn name(&self) -> &'static str {
        "dead-block-elimination"
    }

    fn description(&self) -> &'static str {
        "Removes non-entry blocks without predecessors"
    }

    fn should_run(&self, func: &Function) -> bool {
        func.block_count() > 1
    }

    fn is_cleanup(&self) -> bool {
        true
    }

    fn run_on_function(&self, func: &mut Function, events: &EventLog) -> Result<bool> {
        let dead = dead_blocks(func);
        if dead.is_empty() {
            return Ok(false);
        }

        for block in dead {
            let location = func.block_position(block).unwrap_or_default();
            let label = func.try_block(block)?.name().to_string();
            let removed = sever(func, block)?;
            log::debug!("{}: removed dead block '{}'", func.name(), label);
            events
                .record(EventKind::BlockRemoved)
                .at(func.name(), location)
                .message(format!(
                    "{}: removed dead block '{}' ({} instructions)",
                    func.name(),
                    label,
                    removed
                ))
                .pass(self.name());
        }
        Ok(true)
    }
}

/// Returns the non-entry blocks without predecessors, in layout order.
#[must_use]
pub fn dead_blocks(func: &Function) -> Vec<BlockId> {
    let cfg = FunctionCfg::new(func);
    (1..cfg.node_count())
        .filter(|&node| cfg.predecessors(node).is_empty())
        .filter_map(|node| cfg.block(node))
        .collect()
}

/// Removes every non-entry block without predecessors.
///
/// Returns true if at least one block was removed.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the function refers to blocks or values that
/// no longer exist.
pub fn remove_dead_blocks(func: &mut Function) -> Result<bool> {
    let dead = dead_blocks(func);
    for &block in &dead {
        sever(func, block)?;
    }
    Ok(!dead.is_empty())
}

/// Detaches `block` from the rest of the function and deletes it.
///
/// Returns the number of deleted instructions.
fn sever(func: &mut Function, block: BlockId) -> Result<usize> {
    for successor in func.block_successors(block) {
        if let Some(succ) = func.block_mut(successor) {
            for phi in succ.phis_mut() {
                phi.remove_operand_from(block);
            }
        }
    }

    let data = func.try_block(block)?;
    let count = data.instruction_count();
    let defined: Vec<ValueId> = data
        .phis()
        .iter()
        .map(|phi| phi.result())
        .chain(
            data.instructions()
                .iter()
                .filter_map(|&inst| func.inst(inst).and_then(|i| i.result())),
        )
        .collect();

    for value in defined {
        if let Some(ty) = func.value(value).map(|v| v.ty) {
            func.replace_all_uses(value, Operand::Undef(ty));
        }
    }

    func.remove_block(block)?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::passes::accumulator::{detect, transform},
        fixtures,
        ir::{verify_function, Constant, FunctionBuilder, Terminator, Type},
    };

    fn orphaned() -> Function {
        // "dead" and "tail" have no predecessors; "dead" feeds the phi in "join"
        FunctionBuilder::new("orphaned", Type::I32)
            .param("x", Type::I32)
            .build_with(|f| {
                let x = f.arg(0);
                f.block(0, "entry", |b| b.jump(1));
                f.block(1, "join", |b| {
                    let phi = b.phi(Type::I32, &[(x.into(), 0), (Constant::I32(7).into(), 2)]);
                    b.ret(phi);
                });
                f.block(2, "dead", |b| {
                    b.add(x, Constant::I32(1));
                    b.jump(1);
                });
                f.block(3, "tail", |b| {
                    let v = b.add(x, Constant::I32(2));
                    b.ret(v);
                });
            })
            .unwrap()
    }

    #[test]
    fn test_dead_blocks_lists_orphans_in_layout_order() {
        let func = orphaned();
        let names: Vec<_> = dead_blocks(&func)
            .into_iter()
            .map(|b| func.block(b).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["dead", "tail"]);
    }

    #[test]
    fn test_phi_entries_are_dropped() {
        let mut func = orphaned();
        assert!(remove_dead_blocks(&mut func).unwrap());

        assert_eq!(func.block_count(), 2);
        let join = func.block_by_name("join").unwrap();
        let phi = &func.block(join).unwrap().phis()[0];
        assert_eq!(phi.operand_count(), 1);
        assert_eq!(phi.operands()[0].predecessor, func.entry().unwrap());
        verify_function(&func).unwrap();

        assert!(!remove_dead_blocks(&mut func).unwrap());
    }

    #[test]
    fn test_no_cascade() {
        // block 2 is only reachable from the dead block 1
        let mut func = FunctionBuilder::new("chain", Type::I32)
            .build_with(|f| {
                f.block(0, "entry", |b| b.ret(Constant::I32(0)));
                f.block(1, "dead", |b| b.jump(2));
                f.block(2, "reached_from_dead", |b| b.ret(Constant::I32(1)));
            })
            .unwrap();

        assert!(remove_dead_blocks(&mut func).unwrap());
        assert_eq!(func.block_count(), 2);
        assert!(func.block_by_name("reached_from_dead").is_some());

        assert!(remove_dead_blocks(&mut func).unwrap());
        assert_eq!(func.block_count(), 1);
    }

    #[test]
    fn test_uses_in_surviving_blocks_become_undef() {
        // the dead block defines a value that a later orphan reads
        let mut func = FunctionBuilder::new("undef", Type::I32)
            .build_with(|f| {
                let mut defined = ValueId::default();
                f.block(0, "entry", |b| b.ret(Constant::I32(0)));
                f.block(1, "dead", |b| {
                    defined = b.add(Constant::I32(1), Constant::I32(2));
                    b.jump(2);
                });
                f.block(2, "user", |b| b.ret(defined));
            })
            .unwrap();

        assert!(remove_dead_blocks(&mut func).unwrap());
        let user = func.block_by_name("user").unwrap();
        assert_eq!(
            func.block(user).unwrap().terminator(),
            Some(&Terminator::Return {
                value: Some(Operand::Undef(Type::I32))
            })
        );
    }

    #[test]
    fn test_cleans_up_after_rewrite() {
        let mut func = fixtures::sum_accumulate().unwrap();
        let site = detect(&func).unwrap();
        transform(&mut func, &site).unwrap();
        assert!(func.block_by_name("base").is_some());

        let pass = DeadBlockPass::new();
        let events = EventLog::new();
        assert!(pass.run_on_function(&mut func, &events).unwrap());

        assert!(func.block_by_name("base").is_none());
        assert_eq!(events.count_kind(EventKind::BlockRemoved), 1);
        assert!(dead_blocks(&func).is_empty());
        verify_function(&func).unwrap();
    }

    #[test]
    fn test_entry_is_never_removed() {
        let mut func = FunctionBuilder::new("single", Type::I32)
            .build_with(|f| {
                f.block(0, "entry", |b| b.ret(Constant::I32(3)));
            })
            .unwrap();
        let pass = DeadBlockPass::new();
        assert!(!pass.should_run(&func));
        assert!(!remove_dead_blocks(&mut func).unwrap());
        assert_eq!(func.block_count(), 1);
    }
}
