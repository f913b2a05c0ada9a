//! Pipeline integration tests.
//!
//! These tests drive the public API end to end:
//! 1. Build functions from the bundled fixtures
//! 2. Run the pass scheduler over a module
//! 3. Check the rewritten structure, the reported outcomes and the event log

use tailfold::{
    compiler::passes::{accumulator, dead_blocks},
    fixtures::{self, Expectation, FIXTURES},
    prelude::*,
};

/// Builds a module holding every fixture.
fn fixture_module() -> Result<Module> {
    FIXTURES.iter().map(|fixture| fixture.build()).collect()
}

fn header_of(func: &Function) -> Option<BlockId> {
    func.block_by_name("loop.header")
}

#[test]
fn test_outcomes_follow_expectations() -> Result<()> {
    let mut module = fixture_module()?;
    let report = PassScheduler::default().run(&mut module)?;

    for fixture in FIXTURES {
        let outcome = report.outcome(fixture.name).unwrap();
        match fixture.expectation {
            Expectation::Rewritten => {
                assert!(outcome.is_transformed(), "{}: {outcome}", fixture.name);
            }
            Expectation::Unchanged => {
                assert!(
                    matches!(outcome, FunctionOutcome::Unchanged),
                    "{}: {outcome}",
                    fixture.name
                );
            }
            Expectation::Rejected(defect) => match outcome.error() {
                Some(Error::MalformedCandidate { defect: found, .. }) => {
                    assert_eq!(*found, defect, "{}", fixture.name);
                }
                other => panic!("{}: expected rejection, got {other:?}", fixture.name),
            },
        }
    }
    Ok(())
}

#[test]
fn test_sum_scenario() -> Result<()> {
    let mut module = Module::new();
    module.add_function(fixtures::sum_accumulate()?);
    PassScheduler::default().run(&mut module)?;

    let sum = module.function("sum").unwrap();
    assert!(sum.self_calls().is_empty());
    assert_eq!(FunctionCfg::new(sum).back_edges().len(), 1);

    let mut eval = Evaluator::new(&module, EvaluatorConfig::default());
    assert_eq!(
        eval.call("sum", &[Constant::I32(5), Constant::I32(0)])?,
        Some(Constant::I32(15))
    );
    assert_eq!(eval.max_depth(), 1);
    Ok(())
}

#[test]
fn test_factorial_scenario() -> Result<()> {
    let mut module = Module::new();
    module.add_function(fixtures::factorial()?);
    PassScheduler::default().run(&mut module)?;

    let mut eval = Evaluator::new(&module, EvaluatorConfig::default());
    assert_eq!(
        eval.call("fact", &[Constant::I32(5)])?,
        Some(Constant::I32(120))
    );
    assert_eq!(eval.max_depth(), 1);
    Ok(())
}

#[test]
fn test_structural_invariants() -> Result<()> {
    let mut module = fixture_module()?;
    PassScheduler::default().run(&mut module)?;

    for fixture in FIXTURES
        .iter()
        .filter(|f| f.expectation == Expectation::Rewritten)
    {
        let func = module.function(fixture.name).unwrap();
        let preheader = func.entry().unwrap();
        let header = header_of(func).unwrap();
        let body = func.block_by_name("loop.body").unwrap();

        assert!(func.block_predecessors(preheader).is_empty(), "{}", fixture.name);
        assert_eq!(func.block_successors(preheader), vec![header]);

        let header_block = func.block(header).unwrap();
        assert_eq!(
            header_block.phi_count(),
            func.params().len() + 1,
            "{}",
            fixture.name
        );
        for phi in header_block.phis() {
            let preds: Vec<_> = phi.operands().iter().map(|o| o.predecessor).collect();
            assert_eq!(preds, vec![preheader, body], "{}", fixture.name);
        }

        // the final block returns the accumulator phi
        let exit = func.last_block().unwrap();
        let Some(Terminator::Return {
            value: Some(Operand::Value(returned)),
        }) = func.block(exit).unwrap().terminator()
        else {
            panic!("{}: final block does not return a value", fixture.name);
        };
        assert!(header_block.phi_defining(*returned).is_some());
        assert_eq!(
            func.value(*returned).unwrap().name.as_deref(),
            Some("accumulator")
        );

        // dead block cleanup left nothing behind
        assert!(dead_blocks(func).is_empty(), "{}", fixture.name);
        verify_function(func)?;
    }
    Ok(())
}

#[test]
fn test_non_matching_functions_are_identical() -> Result<()> {
    for fixture in FIXTURES
        .iter()
        .filter(|f| f.expectation == Expectation::Unchanged)
    {
        let original = fixture.build()?;
        let mut func = original.clone();

        assert!(!PassScheduler::default().run_function(&mut func)?);
        assert_eq!(func.stats(), original.stats(), "{}", fixture.name);
        assert_eq!(func.to_string(), original.to_string(), "{}", fixture.name);
    }
    Ok(())
}

#[test]
fn test_rejected_candidates_are_restored() -> Result<()> {
    let mut module = fixture_module()?;
    let before: Vec<String> = module.functions().iter().map(ToString::to_string).collect();
    let report = PassScheduler::default().run(&mut module)?;

    assert!(report.failed() > 0);
    for (name, _) in report.failures() {
        let index = FIXTURES.iter().position(|f| f.name == name).unwrap();
        assert_eq!(module.functions()[index].to_string(), before[index]);
    }
    assert_eq!(report.events().errors().count(), report.failed());
    Ok(())
}

#[test]
fn test_one_loop_per_transformed_function() -> Result<()> {
    let mut module = fixture_module()?;
    let report = PassScheduler::default().run(&mut module)?;

    let events = report.events();
    assert_eq!(events.count_kind(EventKind::LoopRewritten), report.transformed());
    for fixture in FIXTURES
        .iter()
        .filter(|f| f.expectation == Expectation::Rewritten)
    {
        let rewritten = events
            .filter_function(fixture.name)
            .filter(|e| e.kind == EventKind::LoopRewritten)
            .count();
        assert_eq!(rewritten, 1, "{}", fixture.name);
    }
    Ok(())
}

#[test]
fn test_parallel_and_sequential_agree() -> Result<()> {
    let mut parallel = fixture_module()?;
    let mut sequential = fixture_module()?;

    let a = PassScheduler::new(PipelineConfig::new().with_parallel(true)).run(&mut parallel)?;
    let b = PassScheduler::new(PipelineConfig::new().with_parallel(false)).run(&mut sequential)?;

    assert_eq!(parallel.to_string(), sequential.to_string());
    assert_eq!(a.transformed(), b.transformed());
    assert_eq!(a.failed(), b.failed());
    Ok(())
}

#[test]
fn test_without_dead_block_elimination() -> Result<()> {
    let mut func = fixtures::sum_accumulate()?;
    let scheduler = PassScheduler::new(PipelineConfig::new().with_dead_block_elimination(false));
    assert!(scheduler.run_function(&mut func)?);

    // the orphaned base case stays until the eliminator runs
    assert_eq!(dead_blocks(&func).len(), 1);
    assert!(func.block_by_name("base").is_some());
    Ok(())
}

#[test]
fn test_staged_api() -> Result<()> {
    let mut func = fixtures::or_fold()?;
    let site = accumulator::detect(&func).unwrap();
    let plan = accumulator::analyze(&func, &site)?;
    assert_eq!(plan.induction(), 0);

    let summary = accumulator::transform(&mut func, &site)?;
    assert_eq!(summary.argument_phis.len(), 1);
    assert_eq!(header_of(&func), Some(summary.header));
    assert!(!accumulator::matches(&func));
    Ok(())
}
