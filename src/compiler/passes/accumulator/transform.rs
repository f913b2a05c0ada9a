//! Rewriting an accumulator recursion into a loop.
//!
//! The rewrite runs in three stages so a caller never observes a half-edited function:
//!
//! 1. [`analyze`] inspects the function read-only and produces a [`LoopPlan`], or the
//!    [`CandidateDefect`] that makes the function unsuitable
//! 2. The plan is committed on a clone of the function
//! 3. The clone is verified and swapped in with a single assignment
//!
//! # Result Shape
//!
//! ```text
//! entry:                                   ; pre-header, keeps the entry's name
//!   %retval = alloca i32                   ; allocations are hoisted here
//!   jump label %loop.header
//! loop.header:                             ; the former entry block
//!   %curr_n = phi i32 [%n, %entry], [%r_sub, %loop.body]
//!   %curr_acc = phi i32 [%acc, %entry], [%curr_acc, %loop.body]
//!   %accumulator = phi i32 [%acc, %entry], [%r_add, %loop.body]
//!   %rec_cmp = cmp eq %curr_n, 0
//!   br %rec_cmp, label %exit, label %loop.body
//! loop.body:
//!   %r_sub = sub %curr_n, 1
//!   %r_add = add %accumulator, %curr_n
//!   jump label %loop.header
//! exit:
//!   ret %accumulator
//! ```
//!
//! The base case block loses its only predecessor and is left for the dead block
//! eliminator.

use crate::{
    compiler::passes::accumulator::RecursionSite,
    ir::{
        verify_function, BinaryOp, BlockId, CmpPredicate, Function, InstId, Op, Operand,
        PhiOperand, Terminator, Type, UseSite, ValueId,
    },
    CandidateDefect, Error, Result,
};

/// Everything the rewrite needs, gathered without modifying the function.
#[derive(Debug, Clone)]
pub struct LoopPlan {
    site: RecursionSite,
    entry: BlockId,
    base: BlockId,
    exit: BlockId,
    guard: InstId,
    predicate: CmpPredicate,
    induction: usize,
    base_value: Operand,
    step: InstId,
    step_op: BinaryOp,
    update_op: BinaryOp,
    result: InstId,
    allocas: Vec<InstId>,
}

impl LoopPlan {
    /// Returns the recursion site the plan was built for.
    #[must_use]
    pub const fn site(&self) -> &RecursionSite {
        &self.site
    }

    /// Returns the index of the argument the guard tests and the step advances.
    #[must_use]
    pub const fn induction(&self) -> usize {
        self.induction
    }

    /// Returns the block that becomes the loop header.
    #[must_use]
    pub const fn header(&self) -> BlockId {
        self.entry
    }

    /// Returns the base case block.
    #[must_use]
    pub const fn base(&self) -> BlockId {
        self.base
    }

    /// Returns the final block.
    #[must_use]
    pub const fn exit(&self) -> BlockId {
        self.exit
    }

    /// Returns the value the base case produces, as an operand of the original function.
    #[must_use]
    pub const fn base_value(&self) -> Operand {
        self.base_value
    }
}

/// What a committed rewrite created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSummary {
    /// The new entry block.
    pub preheader: BlockId,
    /// The former entry block, now the loop header.
    pub header: BlockId,
    /// The new loop body.
    pub body: BlockId,
    /// One phi per argument, in parameter order.
    pub argument_phis: Vec<ValueId>,
    /// The accumulator phi.
    pub accumulator: ValueId,
    /// Operands redirected by use replacement.
    pub rewired_uses: usize,
    /// Instructions deleted, including those of the recursive block.
    pub removed_instructions: usize,
}

/// Checks every structural precondition of the rewrite.
///
/// # Errors
///
/// Returns [`Error::MalformedCandidate`] naming the first violated precondition, or
/// [`Error::Malformed`] if `site` does not belong to `func`.
pub fn analyze(func: &Function, site: &RecursionSite) -> Result<LoopPlan> {
    let reject = |defect| Error::MalformedCandidate {
        function: func.name().to_string(),
        defect,
    };

    let entry = func
        .entry()
        .ok_or_else(|| malformed_error!("{}: function has no blocks", func.name()))?;
    let exit = func
        .last_block()
        .ok_or_else(|| malformed_error!("{}: function has no blocks", func.name()))?;
    let recursive = site.block;
    func.try_block(recursive)?;

    // Guard: the entry branches on a comparison of an argument.
    let Some(Terminator::Branch {
        cond,
        true_target,
        false_target,
    }) = func.try_block(entry)?.terminator()
    else {
        return Err(reject(CandidateDefect::GuardMissing));
    };
    let (_, guard) = func
        .last_non_debug(entry)
        .ok_or_else(|| reject(CandidateDefect::GuardMissing))?;
    let guard_inst = func.try_inst(guard)?;
    let Op::Cmp {
        predicate, lhs, ..
    } = guard_inst.op()
    else {
        return Err(reject(CandidateDefect::GuardMissing));
    };
    if guard_inst.result().map(Operand::Value) != Some(*cond) {
        return Err(reject(CandidateDefect::GuardMissing));
    }
    let induction = lhs
        .as_value()
        .and_then(|value| func.argument_index(value))
        .ok_or_else(|| reject(CandidateDefect::GuardNotOnArgument))?;
    let induction_value = func.params()[induction];

    let entry_block = func.try_block(entry)?;
    if entry_block.phi_count() > 0
        || func
            .block_insts(entry)
            .any(|(_, inst)| inst.op().has_side_effects())
    {
        return Err(reject(CandidateDefect::UnexpectedInstruction));
    }

    // Base case: another block jumping to the final block right after a store.
    let base = func
        .iter_blocks()
        .find(|&(id, block)| {
            id != recursive
                && id != exit
                && matches!(block.terminator(), Some(Terminator::Jump { target }) if *target == exit)
        })
        .map(|(id, _)| id)
        .ok_or_else(|| reject(CandidateDefect::BaseCaseMissing))?;
    let (_, store) = func
        .last_non_debug(base)
        .ok_or_else(|| reject(CandidateDefect::BaseCaseWithoutStore))?;
    let Op::Store {
        value: base_value,
        ptr: slot,
    } = func.try_inst(store)?.op()
    else {
        return Err(reject(CandidateDefect::BaseCaseWithoutStore));
    };
    let (base_value, slot) = (*base_value, *slot);
    let supported = match base_value {
        Operand::Const(_) => true,
        Operand::Value(value) => func
            .argument_index(value)
            .is_some_and(|index| index != induction),
        Operand::Undef(_) => false,
    };
    if !supported || func.operand_type(&base_value) != Some(func.return_type()) {
        return Err(reject(CandidateDefect::BaseCaseValueUnsupported));
    }

    if *true_target != base || *false_target != recursive {
        return Err(reject(CandidateDefect::GuardTargetsMismatch));
    }

    // Recursive block: step, call, update, stores of the update, jump to the exit.
    match func.try_block(recursive)?.terminator() {
        Some(Terminator::Jump { target }) if *target == exit => {}
        _ => return Err(reject(CandidateDefect::RecursiveBlockNotTail)),
    }

    let (_, step) = func
        .prev_non_debug(recursive, site.call_index)
        .ok_or_else(|| reject(CandidateDefect::StepMissing))?;
    let step_inst = func.try_inst(step)?;
    let (step_op, step_lhs, _) = step_inst
        .op()
        .as_binary()
        .ok_or_else(|| reject(CandidateDefect::StepMissing))?;
    let step_result = func.inst_result(step)?;
    if !step_lhs.is_value(induction_value) {
        return Err(reject(CandidateDefect::StepMissing));
    }

    let Op::Call { args, .. } = func.try_inst(site.call)?.op() else {
        return Err(malformed_error!("{}: recursion site is not a call", func.name()));
    };
    if !args
        .get(induction)
        .is_some_and(|arg| arg.is_value(step_result))
    {
        return Err(reject(CandidateDefect::StepMissing));
    }
    let passes_through = args.len() == func.params().len()
        && args
            .iter()
            .zip(func.params())
            .enumerate()
            .all(|(index, (arg, &param))| index == induction || arg.is_value(param));
    if !passes_through {
        return Err(reject(CandidateDefect::MultiArgumentChain));
    }

    let call_result = func.inst_result(site.call)?;
    let update_result = func.inst_result(site.update)?;
    let (update_op, update_lhs, update_rhs) = func
        .try_inst(site.update)?
        .op()
        .as_binary()
        .ok_or_else(|| malformed_error!("{}: update is not a binary operation", func.name()))?;
    let other = if update_lhs.is_value(call_result) {
        update_rhs
    } else {
        update_lhs
    };
    if !other.is_value(induction_value) {
        return Err(reject(CandidateDefect::UpdateOperandMismatch));
    }

    let recursive_block = func.try_block(recursive)?;
    let carried = recursive_block.phi_count() == 0
        && func.block_insts(recursive).all(|(id, inst)| {
            id == step
                || id == site.call
                || id == site.update
                || inst.is_debug()
                || matches!(inst.op(), Op::Store { value, .. } if value.is_value(update_result))
        });
    let contained = [step_result, call_result, update_result]
        .into_iter()
        .flat_map(|value| func.uses_of(value))
        .all(|use_site| match use_site {
            UseSite::Instruction(inst) => func.block_of(inst) == Some(recursive),
            UseSite::Terminator(block) => block == recursive,
            UseSite::Phi { .. } => false,
        });
    if !carried || !contained {
        return Err(reject(CandidateDefect::UnexpectedInstruction));
    }

    if func
        .self_calls()
        .iter()
        .any(|call| call.block == entry || call.block == exit)
    {
        return Err(reject(CandidateDefect::ExtraSelfCall));
    }

    // Final block: returns the return slot, loaded right before the return. Both the
    // base case and the recursive block must store into that slot.
    let exit_block = func.try_block(exit)?;
    let Some(Terminator::Return { value: Some(returned) }) = exit_block.terminator() else {
        return Err(reject(CandidateDefect::FinalBlockShape));
    };
    let mut exit_insts = func.block_insts(exit).filter(|(_, inst)| !inst.is_debug());
    let (Some((result, result_inst)), None) = (exit_insts.next(), exit_insts.next()) else {
        return Err(reject(CandidateDefect::FinalBlockShape));
    };
    let loads_slot = matches!(result_inst.op(), Op::Load { ptr, .. } if *ptr == slot);
    let slot_reused = func
        .block_insts(exit)
        .any(|(id, inst)| id != result && inst.op().operands().contains(&slot));
    let stores_update = func.block_insts(recursive).any(|(_, inst)| match inst.op() {
        Op::Store { value, ptr } => value.is_value(update_result) && *ptr == slot,
        _ => false,
    });
    if exit_block.phi_count() > 0
        || !loads_slot
        || slot_reused
        || !stores_update
        || result_inst.result().map(Operand::Value) != Some(*returned)
    {
        return Err(reject(CandidateDefect::FinalBlockShape));
    }

    if func
        .layout()
        .iter()
        .any(|block| ![entry, base, recursive, exit].contains(block))
    {
        return Err(reject(CandidateDefect::UnexpectedBlock));
    }

    let allocas = func
        .block_insts(entry)
        .filter(|(_, inst)| matches!(inst.op(), Op::Alloca { .. }))
        .map(|(id, _)| id)
        .collect();

    Ok(LoopPlan {
        site: *site,
        entry,
        base,
        exit,
        guard,
        predicate: *predicate,
        induction,
        base_value,
        step,
        step_op,
        update_op,
        result,
        allocas,
    })
}

/// Rewrites the recursion at `site` into a loop.
///
/// On success `func` is replaced by the verified rewrite. On failure `func` is left
/// exactly as it was.
///
/// # Errors
///
/// - [`Error::MalformedCandidate`] if a precondition does not hold
/// - [`Error::Verification`] if the rewritten function fails verification
pub fn transform(func: &mut Function, site: &RecursionSite) -> Result<TransformSummary> {
    let plan = analyze(func, site)?;
    let (scratch, summary) = commit(func, &plan)?;
    verify_function(&scratch)?;
    *func = scratch;
    Ok(summary)
}

fn commit(func: &Function, plan: &LoopPlan) -> Result<(Function, TransformSummary)> {
    let mut scratch = func.clone();
    let header = plan.entry;
    let recursive = plan.site.block;
    let mut rewired = 0;
    let mut removed = 0;

    // Split the entry: the pre-header takes over its name and its allocations.
    let entry_name = scratch.try_block(header)?.name().to_string();
    let preheader = scratch.insert_block_before(header, entry_name)?;
    if let Some(block) = scratch.block_mut(header) {
        block.set_name("loop.header");
    }
    for (position, &alloca) in plan.allocas.iter().enumerate() {
        scratch.move_inst(alloca, preheader, position)?;
    }
    scratch.set_terminator(preheader, Terminator::Jump { target: header })?;

    // One phi per argument, seeded from the pre-header with the incoming argument.
    let params = scratch.params().to_vec();
    let mut argument_phis = Vec::with_capacity(params.len());
    for (index, &param) in params.iter().enumerate() {
        let data = scratch
            .value(param)
            .ok_or_else(|| malformed_error!("{}: argument {} is missing", func.name(), index))?;
        let ty = data.ty;
        let name = data
            .name
            .clone()
            .unwrap_or_else(|| format!("arg{index}"));
        let phi = scratch.add_phi(header, ty, Some(format!("curr_{name}")))?;
        rewired += scratch.replace_all_uses(param, Operand::Value(phi));
        add_incoming(&mut scratch, header, phi, param.into(), preheader)?;
        argument_phis.push(phi);
    }
    let induction_phi = argument_phis[plan.induction];

    let accumulator = scratch.add_phi(
        header,
        scratch.return_type(),
        Some("accumulator".to_string()),
    )?;
    add_incoming(&mut scratch, header, accumulator, plan.base_value, preheader)?;

    // The loop body recomputes step and update from the header phis.
    let step_result = scratch.inst_result(plan.step)?;
    let update_result = scratch.inst_result(plan.site.update)?;
    let (_, _, step_rhs) = scratch
        .try_inst(plan.step)?
        .op()
        .as_binary()
        .ok_or_else(|| malformed_error!("{}: step is not a binary operation", func.name()))?;

    let body = scratch.insert_block_before(plan.exit, "loop.body")?;
    let new_step = scratch.append_inst(
        body,
        Op::Binary {
            op: plan.step_op,
            lhs: induction_phi.into(),
            rhs: step_rhs,
        },
        Some((value_type(&scratch, step_result), Some(renamed(&scratch, step_result)))),
    )?;
    let new_step = scratch.inst_result(new_step)?;
    let new_update = scratch.append_inst(
        body,
        Op::Binary {
            op: plan.update_op,
            lhs: accumulator.into(),
            rhs: induction_phi.into(),
        },
        Some((
            value_type(&scratch, update_result),
            Some(renamed(&scratch, update_result)),
        )),
    )?;
    let new_update = scratch.inst_result(new_update)?;
    scratch.set_terminator(body, Terminator::Jump { target: header })?;

    // Loop-back edges: the induction argument advances, the others are carried.
    for (index, &phi) in argument_phis.iter().enumerate() {
        let value = if index == plan.induction { new_step } else { phi };
        add_incoming(&mut scratch, header, phi, value.into(), body)?;
    }
    add_incoming(&mut scratch, header, accumulator, new_update.into(), body)?;

    // Rebuild the guard on the induction phi.
    let old_guard = scratch.inst_result(plan.guard)?;
    let Op::Cmp { rhs: bound, .. } = scratch.try_inst(plan.guard)?.op().clone() else {
        return Err(malformed_error!("{}: guard is not a comparison", func.name()));
    };
    let position = scratch
        .try_block(header)?
        .position_of(plan.guard)
        .unwrap_or(usize::MAX);
    let rec_cmp = scratch.insert_inst(
        header,
        position,
        Op::Cmp {
            predicate: plan.predicate,
            lhs: induction_phi.into(),
            rhs: bound,
        },
        Some((Type::Bool, Some("rec_cmp".to_string()))),
    )?;
    let rec_cmp = scratch.inst_result(rec_cmp)?;
    rewired += scratch.replace_all_uses(old_guard, rec_cmp.into());
    scratch.remove_inst(plan.guard)?;
    removed += 1;
    scratch.set_terminator(
        header,
        Terminator::Branch {
            cond: rec_cmp.into(),
            true_target: plan.exit,
            false_target: body,
        },
    )?;

    // The final block returns the accumulator.
    let result = scratch.inst_result(plan.result)?;
    rewired += scratch.replace_all_uses(result, accumulator.into());
    scratch.remove_inst(plan.result)?;
    removed += 1;

    // Retire the recursive block.
    rewired += scratch.replace_all_uses(step_result, new_step.into());
    rewired += scratch.replace_all_uses(update_result, new_update.into());
    rewired += scratch.replace_block_uses(recursive, body);
    removed += scratch.try_block(recursive)?.instruction_count();
    scratch.remove_block(recursive)?;

    Ok((
        scratch,
        TransformSummary {
            preheader,
            header,
            body,
            argument_phis,
            accumulator,
            rewired_uses: rewired,
            removed_instructions: removed,
        },
    ))
}

fn add_incoming(
    func: &mut Function,
    block: BlockId,
    phi: ValueId,
    value: Operand,
    predecessor: BlockId,
) -> Result<()> {
    let name = func.name().to_string();
    let node = func
        .block_mut(block)
        .and_then(|b| b.phi_defining_mut(phi))
        .ok_or_else(|| malformed_error!("{}: {:?} is not a phi of {:?}", name, phi, block))?;
    node.add_operand(PhiOperand::new(value, predecessor));
    Ok(())
}

fn value_type(func: &Function, value: ValueId) -> Type {
    func.value(value).map_or(func.return_type(), |data| data.ty)
}

/// Name of the loop body's copy of `value`: `r_<name>`.
fn renamed(func: &Function, value: ValueId) -> String {
    match func.value(value).and_then(|data| data.name.as_deref()) {
        Some(name) => format!("r_{name}"),
        None => "r".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::passes::accumulator::detect,
        fixtures,
        ir::{Constant, Evaluator, EvaluatorConfig, FunctionBuilder, FunctionCfg, Module},
    };

    fn rewrite(func: &mut Function) -> Result<TransformSummary> {
        let site = detect(func).unwrap();
        transform(func, &site)
    }

    fn defect_of(func: &Function) -> CandidateDefect {
        let site = detect(func).unwrap();
        match analyze(func, &site) {
            Err(Error::MalformedCandidate { defect, .. }) => defect,
            other => panic!("expected a malformed candidate, got {other:?}"),
        }
    }

    #[test]
    fn test_sum_structure() {
        let mut func = fixtures::sum_accumulate().unwrap();
        let summary = rewrite(&mut func).unwrap();

        assert_eq!(func.entry(), Some(summary.preheader));
        assert_eq!(func.block(summary.preheader).unwrap().name(), "entry");
        assert_eq!(func.block(summary.header).unwrap().name(), "loop.header");
        assert_eq!(func.block(summary.body).unwrap().name(), "loop.body");
        assert!(func.block_predecessors(summary.preheader).is_empty());
        assert!(func.self_calls().is_empty());

        // the alloca moved to the pre-header
        let hoisted: Vec<_> = func.block_insts(summary.preheader).collect();
        assert_eq!(hoisted.len(), 1);
        assert!(matches!(hoisted[0].1.op(), Op::Alloca { .. }));

        // every header phi has one entry from the pre-header and one from the body
        let header = func.block(summary.header).unwrap();
        assert_eq!(header.phi_count(), 3);
        for phi in header.phis() {
            let preds: Vec<_> = phi.operands().iter().map(|op| op.predecessor).collect();
            assert_eq!(preds, vec![summary.preheader, summary.body]);
        }

        // the final block returns the accumulator
        let exit = func.last_block().unwrap();
        assert_eq!(
            func.block(exit).unwrap().terminator(),
            Some(&Terminator::Return {
                value: Some(Operand::Value(summary.accumulator))
            })
        );
        assert_eq!(
            func.value(summary.accumulator).unwrap().name.as_deref(),
            Some("accumulator")
        );
        assert_eq!(
            func.value(summary.argument_phis[0]).unwrap().name.as_deref(),
            Some("curr_n")
        );

        let cfg = FunctionCfg::new(&func);
        assert_eq!(cfg.back_edges().len(), 1);
    }

    #[test]
    fn test_body_recomputes_step_and_update() {
        let mut func = fixtures::sum_accumulate().unwrap();
        let summary = rewrite(&mut func).unwrap();

        let ops: Vec<Op> = func
            .block_insts(summary.body)
            .map(|(_, inst)| inst.op().clone())
            .collect();
        let n = summary.argument_phis[0];
        assert_eq!(
            ops,
            vec![
                Op::Binary {
                    op: BinaryOp::Sub,
                    lhs: n.into(),
                    rhs: Constant::I32(1).into(),
                },
                Op::Binary {
                    op: BinaryOp::Add,
                    lhs: summary.accumulator.into(),
                    rhs: n.into(),
                },
            ]
        );
        let names: Vec<_> = func
            .block_insts(summary.body)
            .filter_map(|(_, inst)| inst.result())
            .filter_map(|v| func.value(v).and_then(|d| d.name.clone()))
            .collect();
        assert_eq!(names, vec!["r_sub", "r_add"]);
    }

    #[test]
    fn test_results_are_preserved() {
        for build in [fixtures::sum_accumulate, fixtures::factorial, fixtures::xor_fold] {
            let original = build().unwrap();
            let mut rewritten = original.clone();
            rewrite(&mut rewritten).unwrap();

            let before: Module = [original].into_iter().collect();
            let after: Module = [rewritten].into_iter().collect();
            let name = before.functions()[0].name().to_string();
            let arity = before.functions()[0].params().len();

            for n in 0..12 {
                let args: Vec<Constant> = std::iter::once(Constant::I32(n))
                    .chain(std::iter::repeat(Constant::I32(3)).take(arity - 1))
                    .collect();
                let mut eval = Evaluator::new(&before, EvaluatorConfig::default());
                let expected = eval.call(&name, &args).unwrap();
                let mut eval = Evaluator::new(&after, EvaluatorConfig::default());
                assert_eq!(eval.call(&name, &args).unwrap(), expected, "{name}({n})");
                assert_eq!(eval.max_depth(), 1);
            }
        }
    }

    #[test]
    fn test_factorial_of_five() {
        let mut func = fixtures::factorial().unwrap();
        rewrite(&mut func).unwrap();
        let module: Module = [func].into_iter().collect();
        let mut eval = Evaluator::new(&module, EvaluatorConfig::default());
        assert_eq!(
            eval.call("fact", &[Constant::I32(5)]).unwrap(),
            Some(Constant::I32(120))
        );
    }

    #[test]
    fn test_rejections_leave_function_untouched() {
        let mut func = fixtures::multi_argument_chain().unwrap();
        let before = func.to_string();
        let result = rewrite(&mut func);

        assert!(matches!(
            result,
            Err(Error::MalformedCandidate {
                defect: CandidateDefect::MultiArgumentChain,
                ..
            })
        ));
        assert_eq!(func.to_string(), before);
    }

    #[test]
    fn test_base_without_store() {
        let func = fixtures::base_without_store().unwrap();
        assert_eq!(defect_of(&func), CandidateDefect::BaseCaseWithoutStore);
    }

    /// One deviation from the well-formed return-slot layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tweak {
        None,
        GuardOffArgument,
        SwapTargets,
        BaseFromInduction,
        BaseReturns,
        UpdateWithAcc,
        RecurseToBase,
        StepOnAcc,
        ExtraInRecurse,
        StepEscapes,
        ExitAdjusts,
        SecondSlot,
        ExitSelfCall,
        SecondSite,
        ExtraBlock,
    }

    /// Builds `s(n, acc)` in the return-slot layout with `tweak` applied.
    fn shaped(tweak: Tweak) -> Function {
        let exit = if tweak == Tweak::ExtraBlock { 4 } else { 3 };
        FunctionBuilder::new("s", Type::I32)
            .param("n", Type::I32)
            .param("acc", Type::I32)
            .build_with(|f| {
                let (n, acc) = (f.arg(0), f.arg(1));
                let mut retval = ValueId::default();
                let mut other = ValueId::default();
                let mut step = ValueId::default();
                f.block(0, "entry", |b| {
                    retval = b.alloca(Type::I32);
                    other = b.alloca(Type::I32);
                    let tested = if tweak == Tweak::GuardOffArgument {
                        b.add(n, Constant::I32(0))
                    } else {
                        n
                    };
                    let cmp = b.cmp_eq(tested, Constant::I32(0));
                    if tweak == Tweak::SwapTargets {
                        b.branch(cmp, 2, 1);
                    } else {
                        b.branch(cmp, 1, 2);
                    }
                });
                f.block(1, "base", |b| {
                    if tweak == Tweak::BaseReturns {
                        b.ret(acc);
                        return;
                    }
                    b.store(if tweak == Tweak::BaseFromInduction { n } else { acc }, retval);
                    b.jump(exit);
                });
                f.block(2, "recurse", |b| {
                    if tweak == Tweak::ExtraInRecurse {
                        b.mul(n, Constant::I32(2));
                    }
                    step = b.sub(if tweak == Tweak::StepOnAcc { acc } else { n }, Constant::I32(1));
                    let call = b.call("s", &[step.into(), acc.into()], Type::I32);
                    let add = b.add(call, if tweak == Tweak::UpdateWithAcc { acc } else { n });
                    if tweak == Tweak::SecondSite {
                        let again = b.call("s", &[step.into(), acc.into()], Type::I32);
                        b.add(again, add);
                    }
                    b.store(add, if tweak == Tweak::SecondSlot { other } else { retval });
                    b.jump(if tweak == Tweak::RecurseToBase { 1 } else { exit });
                });
                if tweak == Tweak::ExtraBlock {
                    f.block(3, "orphan", |b| b.jump(4));
                }
                f.block(exit, "exit", |b| {
                    if tweak == Tweak::StepEscapes {
                        b.phi(Type::I32, &[(acc.into(), 1), (step.into(), 2)]);
                    }
                    if tweak == Tweak::ExitSelfCall {
                        b.call("s", &[n.into(), acc.into()], Type::I32);
                    }
                    let ret = b.load(retval, Type::I32);
                    if tweak == Tweak::ExitAdjusts {
                        let adjusted = b.add(ret, Constant::I32(1));
                        b.ret(adjusted);
                    } else {
                        b.ret(ret);
                    }
                });
            })
            .unwrap()
    }

    #[test]
    fn test_well_formed_shape_is_accepted() {
        let func = shaped(Tweak::None);
        let site = detect(&func).unwrap();
        let plan = analyze(&func, &site).unwrap();
        assert_eq!(plan.induction(), 0);
        assert_eq!(plan.base_value(), Operand::Value(func.params()[1]));
        assert_eq!(plan.header(), func.entry().unwrap());
    }

    #[test]
    fn test_defects() {
        let cases = [
            (Tweak::GuardOffArgument, CandidateDefect::GuardNotOnArgument),
            (Tweak::SwapTargets, CandidateDefect::GuardTargetsMismatch),
            (Tweak::BaseFromInduction, CandidateDefect::BaseCaseValueUnsupported),
            (Tweak::BaseReturns, CandidateDefect::BaseCaseMissing),
            (Tweak::UpdateWithAcc, CandidateDefect::UpdateOperandMismatch),
            (Tweak::RecurseToBase, CandidateDefect::RecursiveBlockNotTail),
            (Tweak::StepOnAcc, CandidateDefect::StepMissing),
            (Tweak::ExtraInRecurse, CandidateDefect::UnexpectedInstruction),
            (Tweak::StepEscapes, CandidateDefect::UnexpectedInstruction),
            (Tweak::ExitAdjusts, CandidateDefect::FinalBlockShape),
            (Tweak::SecondSlot, CandidateDefect::FinalBlockShape),
            (Tweak::ExitSelfCall, CandidateDefect::ExtraSelfCall),
            (Tweak::SecondSite, CandidateDefect::UnexpectedInstruction),
            (Tweak::ExtraBlock, CandidateDefect::UnexpectedBlock),
        ];
        for (tweak, expected) in cases {
            assert_eq!(defect_of(&shaped(tweak)), expected, "{tweak:?}");
        }
    }

    #[test]
    fn test_exit_must_return_the_slot() {
        let mut func = shaped(Tweak::ExitAdjusts);
        let before = func.to_string();
        let module: Module = [func.clone()].into_iter().collect();
        let mut eval = Evaluator::new(&module, EvaluatorConfig::default());
        let expected = eval.call("s", &[Constant::I32(3), Constant::I32(0)]).unwrap();
        assert_eq!(expected, Some(Constant::I32(10)));

        assert!(matches!(
            rewrite(&mut func),
            Err(Error::MalformedCandidate {
                defect: CandidateDefect::FinalBlockShape,
                ..
            })
        ));
        assert_eq!(func.to_string(), before);
    }

    #[test]
    fn test_guard_missing() {
        let func = FunctionBuilder::new("g", Type::I32)
            .param("n", Type::I32)
            .build_with(|f| {
                let n = f.arg(0);
                f.block(0, "entry", |b| b.jump(1));
                f.block(1, "recurse", |b| {
                    let sub = b.sub(n, Constant::I32(1));
                    let call = b.call("g", &[sub.into()], Type::I32);
                    b.add(call, n);
                    b.jump(2);
                });
                f.block(2, "exit", |b| b.ret(n));
            })
            .unwrap();
        assert_eq!(defect_of(&func), CandidateDefect::GuardMissing);
    }
}
