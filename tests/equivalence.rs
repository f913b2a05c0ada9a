//! Semantic equivalence tests.
//!
//! Every fixture is evaluated over its sample inputs before and after the pipeline. The
//! results must agree, and rewritten functions must run without recursion.

use tailfold::{
    fixtures::{Expectation, FIXTURES},
    prelude::*,
};

fn evaluate(module: &Module, name: &str, args: &[Constant]) -> (Option<Constant>, usize) {
    let mut eval = Evaluator::new(module, EvaluatorConfig::default());
    let result = eval.call(name, args).ok().flatten();
    (result, eval.max_depth())
}

#[test]
fn test_fixture_samples_agree() -> Result<()> {
    let original: Module = FIXTURES
        .iter()
        .map(|fixture| fixture.build())
        .collect::<Result<_>>()?;
    let mut optimized = original.clone();
    PassScheduler::default().run(&mut optimized)?;

    for fixture in FIXTURES {
        let func = original.function(fixture.name).unwrap();
        for args in fixture.samples(func) {
            let (expected, _) = evaluate(&original, fixture.name, &args);
            let (actual, depth) = evaluate(&optimized, fixture.name, &args);

            assert_eq!(actual, expected, "{}{:?}", fixture.name, args);
            if fixture.expectation == Expectation::Rewritten {
                assert_eq!(depth, 1, "{}{:?}", fixture.name, args);
            }
        }
    }
    Ok(())
}

#[test]
fn test_recursion_limit_lifted() -> Result<()> {
    // deep enough to exhaust a small call depth budget before the rewrite
    let config = EvaluatorConfig::new().with_max_call_depth(64);
    let args = [Constant::I32(1000), Constant::I32(0)];

    let mut module = Module::new();
    module.add_function(tailfold::fixtures::sum_accumulate()?);
    {
        let mut eval = Evaluator::new(&module, config.clone());
        assert!(matches!(
            eval.call("sum", &args),
            Err(Error::RecursionLimit(64))
        ));
    }

    PassScheduler::default().run(&mut module)?;
    let mut eval = Evaluator::new(&module, config);
    assert_eq!(eval.call("sum", &args)?, Some(Constant::I32(500_500)));
    Ok(())
}

#[test]
fn test_wrapping_matches() -> Result<()> {
    // factorial overflows i32 past 12; both versions must wrap identically
    let mut module = Module::new();
    module.add_function(tailfold::fixtures::factorial()?);
    let original = module.clone();
    PassScheduler::default().run(&mut module)?;

    for n in [12, 13, 20, 31] {
        let args = [Constant::I32(n)];
        assert_eq!(
            evaluate(&module, "fact", &args).0,
            evaluate(&original, "fact", &args).0,
            "fact({n})"
        );
    }
    Ok(())
}
