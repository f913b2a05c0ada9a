use anyhow::bail;
use serde::Serialize;
use tailfold::{
    compiler::{FunctionOutcome, PassScheduler, PipelineConfig},
    fixtures::{Expectation, FIXTURES},
    ir::{Evaluator, EvaluatorConfig, Module},
};

use crate::{
    app::GlobalOptions,
    commands::common::{expectation_label, value_label},
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct FixtureCheck {
    name: &'static str,
    expected: String,
    outcome: String,
    outcome_ok: bool,
    samples: usize,
    mismatches: Vec<String>,
    max_depth: usize,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    fixtures: Vec<FixtureCheck>,
    summary: String,
    passed: bool,
}

pub fn run(parallel: bool, opts: &GlobalOptions) -> anyhow::Result<()> {
    let original: Module = FIXTURES
        .iter()
        .map(|fixture| fixture.build())
        .collect::<tailfold::Result<_>>()?;
    let mut optimized = original.clone();
    let scheduler = PassScheduler::new(PipelineConfig::new().with_parallel(parallel));
    let report = scheduler.run(&mut optimized)?;

    let mut fixtures = Vec::with_capacity(FIXTURES.len());
    for fixture in FIXTURES {
        let Some(func) = original.function(fixture.name) else {
            continue;
        };
        let outcome = report.outcome(fixture.name);
        let outcome_ok = match (fixture.expectation, outcome) {
            (Expectation::Rewritten, Some(FunctionOutcome::Transformed))
            | (Expectation::Unchanged, Some(FunctionOutcome::Unchanged)) => true,
            (Expectation::Rejected(defect), Some(FunctionOutcome::Failed(error))) => matches!(
                error,
                tailfold::Error::MalformedCandidate { defect: found, .. } if *found == defect
            ),
            _ => false,
        };

        let samples = fixture.samples(func);
        let mut mismatches = Vec::new();
        let mut max_depth = 0;
        for args in &samples {
            let mut before = Evaluator::new(&original, EvaluatorConfig::default());
            let expected = before.call(fixture.name, args).ok().flatten();
            let mut after = Evaluator::new(&optimized, EvaluatorConfig::default());
            let actual = after.call(fixture.name, args).ok().flatten();
            max_depth = max_depth.max(after.max_depth());

            if expected != actual {
                let shown: Vec<_> = args.iter().map(ToString::to_string).collect();
                mismatches.push(format!(
                    "{}({}): {} before, {} after",
                    fixture.name,
                    shown.join(", "),
                    value_label(expected),
                    value_label(actual)
                ));
            }
        }

        fixtures.push(FixtureCheck {
            name: fixture.name,
            expected: expectation_label(fixture.expectation),
            outcome: outcome.map_or_else(|| "missing".to_string(), ToString::to_string),
            outcome_ok,
            samples: samples.len(),
            mismatches,
            max_depth,
        });
    }

    let passed = fixtures
        .iter()
        .all(|check| check.outcome_ok && check.mismatches.is_empty());
    let check = CheckReport {
        fixtures,
        summary: report.summary(),
        passed,
    };

    print_output(&check, opts, |check| {
        let mut table = TabWriter::new(&[
            ("NAME", Align::Left),
            ("EXPECTED", Align::Left),
            ("OUTCOME", Align::Left),
            ("SAMPLES", Align::Right),
            ("DEPTH", Align::Right),
            ("STATUS", Align::Left),
        ]);
        for fixture in &check.fixtures {
            let ok = fixture.outcome_ok && fixture.mismatches.is_empty();
            table.row(vec![
                fixture.name.to_string(),
                fixture.expected.clone(),
                fixture.outcome.clone(),
                fixture.samples.to_string(),
                fixture.max_depth.to_string(),
                if ok { "ok" } else { "FAIL" }.to_string(),
            ]);
        }
        table.print();

        for fixture in &check.fixtures {
            for mismatch in &fixture.mismatches {
                println!("  mismatch: {mismatch}");
            }
        }
        println!();
        println!("{}", check.summary);
    })?;

    if !check.passed {
        bail!("fixture check failed");
    }
    Ok(())
}
