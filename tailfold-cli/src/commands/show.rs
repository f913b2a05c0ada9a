use anyhow::anyhow;
use serde::Serialize;
use tailfold::{
    compiler::{FunctionOutcome, PassScheduler},
    ir::Module,
};

use crate::{app::GlobalOptions, commands::common::resolve_fixture, output::print_output};

#[derive(Debug, Serialize)]
struct ShowInfo {
    name: &'static str,
    before: String,
    after: Option<String>,
    changed: Option<bool>,
    changes: Vec<String>,
}

pub fn run(name: &str, optimize: bool, opts: &GlobalOptions) -> anyhow::Result<()> {
    let fixture = resolve_fixture(name)?;
    let func = fixture.build()?;
    let before = func.to_string();

    let (after, changed, changes) = if optimize {
        let mut module: Module = [func].into_iter().collect();
        let report = PassScheduler::default().run(&mut module)?;
        if let Some(FunctionOutcome::Failed(error)) = report.outcome(fixture.name) {
            return Err(anyhow!("pipeline failed on '{}': {error}", fixture.name));
        }
        let changes = report
            .events()
            .filter_function(fixture.name)
            .filter(|event| event.kind.is_transformation())
            .map(ToString::to_string)
            .collect();
        let changed = report
            .outcome(fixture.name)
            .is_some_and(FunctionOutcome::is_transformed);
        let after = module.function(fixture.name).map(ToString::to_string);
        (after, Some(changed), changes)
    } else {
        (None, None, Vec::new())
    };

    let info = ShowInfo {
        name: fixture.name,
        before,
        after,
        changed,
        changes,
    };

    print_output(&info, opts, |info| {
        println!("; {}", fixture.description);
        print!("{}", info.before);
        if let (Some(after), Some(changed)) = (&info.after, info.changed) {
            println!();
            if changed {
                println!("; after the pipeline");
                for change in &info.changes {
                    println!(";   {change}");
                }
                print!("{after}");
            } else {
                println!("; unchanged by the pipeline");
            }
        }
    })
}
