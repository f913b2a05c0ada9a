use anyhow::Context;
use serde::Serialize;
use tailfold::{
    compiler::PassScheduler,
    ir::{Evaluator, EvaluatorConfig, Module},
};

use crate::{
    app::GlobalOptions,
    commands::common::{convert_args, resolve_fixture, value_label},
    output::print_output,
};

pub struct RunOptions {
    pub optimize: bool,
    pub max_depth: usize,
    pub max_steps: u64,
}

#[derive(Debug, Serialize)]
struct RunInfo {
    function: &'static str,
    args: Vec<String>,
    optimized: bool,
    result: String,
    max_depth: usize,
    steps: u64,
}

pub fn run(
    name: &str,
    raw_args: &[i64],
    options: &RunOptions,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let fixture = resolve_fixture(name)?;
    let mut func = fixture.build()?;
    let args = convert_args(&func, raw_args)?;

    if options.optimize {
        PassScheduler::default()
            .run_function(&mut func)
            .with_context(|| format!("pipeline failed on '{}'", fixture.name))?;
    }

    let module: Module = std::iter::once(func).collect();
    let config = EvaluatorConfig::new()
        .with_max_call_depth(options.max_depth)
        .with_max_steps(options.max_steps);
    let mut eval = Evaluator::new(&module, config);
    let result = eval
        .call(fixture.name, &args)
        .with_context(|| format!("evaluation of '{}' failed", fixture.name))?;

    let info = RunInfo {
        function: fixture.name,
        args: args.iter().map(ToString::to_string).collect(),
        optimized: options.optimize,
        result: value_label(result),
        max_depth: eval.max_depth(),
        steps: eval.steps(),
    };

    print_output(&info, opts, |info| {
        println!("{}({}) = {}", info.function, info.args.join(", "), info.result);
        println!("  max call depth: {}", info.max_depth);
        println!("  steps:          {}", info.steps);
    })
}
