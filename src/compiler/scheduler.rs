//! Pass scheduler for orchestrating pass execution.
//!
//! The `PassScheduler` runs its passes over every function of a module, repeating the
//! sequence per function until it reaches a fixpoint or the configured iteration limit.

use std::{collections::HashSet, time::Instant};

use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    compiler::{
        pass::FunctionPass, AccumulatorPass, DeadBlockPass, EventKind, EventLog, FunctionOutcome,
        PipelineConfig, PipelineReport,
    },
    ir::{verify_function, Function, Module},
    Result,
};

/// Orchestrates pass execution over a module.
///
/// Functions are independent: each one is processed on its own, in parallel when
/// [`PipelineConfig::parallel`] is set. For every function the passes run in order,
/// and the whole sequence is repeated until no pass reports a change. Cleanup passes
/// ([`FunctionPass::is_cleanup`]) are skipped until another pass has changed the
/// function, so a function nothing applies to comes out exactly as it went in.
///
/// A failing pass only affects its own function. The function is restored to the state
/// it had before the pipeline started and the error is recorded in the report.
pub struct PassScheduler {
    config: PipelineConfig,
    passes: Vec<Box<dyn FunctionPass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl PassScheduler {
    /// Creates a scheduler with the standard pipeline for `config`.
    ///
    /// The pipeline holds the [`AccumulatorPass`] followed by the [`DeadBlockPass`]
    /// when dead block elimination is enabled.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let mut passes: Vec<Box<dyn FunctionPass>> = vec![Box::new(AccumulatorPass::new())];
        if config.eliminate_dead_blocks {
            passes.push(Box::new(DeadBlockPass::new()));
        }
        Self { config, passes }
    }

    /// Replaces the pass list.
    #[must_use]
    pub fn with_passes(mut self, passes: Vec<Box<dyn FunctionPass>>) -> Self {
        self.passes = passes;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the names of the scheduled passes, in execution order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Runs the pipeline over every function of `module`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if two functions share a name. Failures of
    /// individual functions are reported in the [`PipelineReport`] instead.
    pub fn run(&self, module: &mut Module) -> Result<PipelineReport> {
        let mut names = HashSet::new();
        for func in module.functions() {
            if !names.insert(func.name()) {
                return Err(malformed_error!(
                    "module defines '{}' more than once",
                    func.name()
                ));
            }
        }

        let start = Instant::now();
        let events = EventLog::new();
        let outcomes: DashMap<String, FunctionOutcome> = DashMap::new();

        let process = |func: &mut Function| {
            let name = func.name().to_string();
            let outcome = match self.process(func, &events) {
                Ok(true) => FunctionOutcome::Transformed,
                Ok(false) => FunctionOutcome::Unchanged,
                Err(error) => {
                    log::warn!("{name}: pipeline failed, function restored: {error}");
                    events
                        .record(EventKind::Error)
                        .function(name.as_str())
                        .message(format!("{name}: {error}"));
                    FunctionOutcome::Failed(error)
                }
            };
            events
                .record(EventKind::FunctionProcessed)
                .function(name.as_str())
                .message(format!("{name}: {outcome}"));
            outcomes.insert(name, outcome);
        };

        if self.config.parallel {
            module.functions_mut().par_iter_mut().for_each(process);
        } else {
            module.functions_mut().iter_mut().for_each(process);
        }

        let report = PipelineReport::new(outcomes.into_iter().collect(), events)
            .with_timing(start.elapsed());
        log::debug!("pipeline finished: {}", report.summary());
        Ok(report)
    }

    /// Runs the pipeline over a single function.
    ///
    /// Returns `true` if the function was changed.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing pass or verification. The function is
    /// left as it was before the call.
    pub fn run_function(&self, func: &mut Function) -> Result<bool> {
        self.process(func, &EventLog::new())
    }

    /// Runs the pipeline on `func`, restoring it if any step fails.
    fn process(&self, func: &mut Function, events: &EventLog) -> Result<bool> {
        let snapshot = func.clone();
        match self.run_to_fixpoint(func, events) {
            Ok(changed) => Ok(changed),
            Err(error) => {
                *func = snapshot;
                Err(error)
            }
        }
    }

    /// Repeats the pass sequence until nothing changes or the iteration cap is hit.
    fn run_to_fixpoint(&self, func: &mut Function, events: &EventLog) -> Result<bool> {
        let mut any_changed = false;

        for iteration in 0..self.config.max_iterations {
            let mut changed = false;

            for pass in &self.passes {
                if pass.is_cleanup() && !(any_changed || changed) {
                    continue;
                }
                if !pass.should_run(func) {
                    continue;
                }

                events
                    .record(EventKind::PassStarted)
                    .function(func.name())
                    .pass(pass.name());
                let pass_changed = pass.run_on_function(func, events)?;
                events
                    .record(EventKind::PassCompleted)
                    .function(func.name())
                    .message(format!(
                        "{}: {} {}",
                        func.name(),
                        pass.name(),
                        if pass_changed { "changed" } else { "unchanged" }
                    ))
                    .pass(pass.name());

                if pass_changed {
                    if self.config.verify {
                        verify_function(func)?;
                    }
                    changed = true;
                }
            }

            if !changed {
                break;
            }
            any_changed = true;
            log::debug!("{}: iteration {} changed the function", func.name(), iteration + 1);
        }

        Ok(any_changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fixtures,
        ir::{FunctionBuilder, Type},
        Error,
    };

    struct TestPass {
        name: &'static str,
        changes_to_make: usize,
    }

    impl TestPass {
        fn new(name: &'static str, changes: usize) -> Self {
            Self {
                name,
                changes_to_make: changes,
            }
        }
    }

    impl FunctionPass for TestPass {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run_on_function(&self, func: &mut Function, events: &EventLog) -> Result<bool> {
            for i in 0..self.changes_to_make {
                events
                    .record(EventKind::BlockRemoved)
                    .at(func.name(), i)
                    .message("test");
            }
            Ok(self.changes_to_make > 0)
        }
    }

    /// Breaks every function it touches, then fails.
    struct FailingPass;

    impl FunctionPass for FailingPass {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn run_on_function(&self, func: &mut Function, _events: &EventLog) -> Result<bool> {
            if let Some(entry) = func.entry() {
                func.remove_block(entry)?;
            }
            Err(Error::Evaluation("failing pass".to_string()))
        }
    }

    fn module() -> Module {
        [
            fixtures::sum_accumulate(),
            fixtures::factorial(),
            fixtures::no_recursion(),
            fixtures::multi_argument_chain(),
        ]
        .into_iter()
        .collect::<Result<Module>>()
        .unwrap()
    }

    #[test]
    fn test_default_pipeline() {
        let scheduler = PassScheduler::default();
        assert_eq!(
            scheduler.pass_names(),
            vec!["accumulator-tail-recursion", "dead-block-elimination"]
        );

        let scheduler =
            PassScheduler::new(PipelineConfig::new().with_dead_block_elimination(false));
        assert_eq!(scheduler.pass_names(), vec!["accumulator-tail-recursion"]);
    }

    #[test]
    fn test_iteration_cap() {
        // a pass that always reports changes stops at the cap
        let scheduler = PassScheduler::new(PipelineConfig::new().with_max_iterations(3))
            .with_passes(vec![Box::new(TestPass::new("always", 1))]);
        let mut func = fixtures::no_recursion().unwrap();
        assert!(scheduler.run_function(&mut func).unwrap());

        let events = EventLog::new();
        scheduler.process(&mut func, &events).unwrap();
        assert_eq!(events.count_kind(EventKind::BlockRemoved), 3);
    }

    #[test]
    fn test_idle_pass_runs_once() {
        let scheduler =
            PassScheduler::default().with_passes(vec![Box::new(TestPass::new("idle", 0))]);
        let mut func = fixtures::no_recursion().unwrap();
        let events = EventLog::new();
        assert!(!scheduler.process(&mut func, &events).unwrap());
        assert_eq!(events.count_kind(EventKind::PassStarted), 1);
    }

    #[test]
    fn test_failure_restores_function() {
        let scheduler = PassScheduler::default().with_passes(vec![Box::new(FailingPass)]);
        let mut func = fixtures::sum_accumulate().unwrap();
        let before = func.to_string();

        assert!(scheduler.run_function(&mut func).is_err());
        assert_eq!(func.to_string(), before);
    }

    #[test]
    fn test_module_run() {
        let mut module = module();
        let report = PassScheduler::default().run(&mut module).unwrap();

        assert_eq!(report.transformed(), 2);
        assert_eq!(report.unchanged(), 1);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.outcome("climb"),
            Some(FunctionOutcome::Failed(Error::MalformedCandidate { .. }))
        ));
        assert_eq!(report.events().count_kind(EventKind::LoopRewritten), 2);
        assert_eq!(report.events().count_kind(EventKind::FunctionProcessed), 4);
        assert_eq!(report.events().errors().count(), 1);

        for func in module.functions() {
            verify_function(func).unwrap();
        }
        let sum = module.function("sum").unwrap();
        assert!(sum.self_calls().is_empty());
        assert!(sum.block_by_name("base").is_none());
    }

    #[test]
    fn test_cleanup_waits_for_a_change() {
        let orphaned = FunctionBuilder::new("g", Type::I32)
            .param("n", Type::I32)
            .build_with(|f| {
                let n = f.arg(0);
                f.block(0, "entry", |b| b.jump(2));
                f.block(1, "orphan", |b| b.jump(2));
                f.block(2, "exit", |b| b.ret(n));
            })
            .unwrap();
        let before = orphaned.to_string();
        let mut module = Module::new();
        module.add_function(orphaned);

        let report = PassScheduler::default().run(&mut module).unwrap();
        assert!(matches!(report.outcome("g"), Some(FunctionOutcome::Unchanged)));
        assert_eq!(report.events().count_kind(EventKind::BlockRemoved), 0);
        let func = module.function("g").unwrap();
        assert_eq!(func.block_count(), 3);
        assert_eq!(func.to_string(), before);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut module = Module::new();
        module.add_function(fixtures::sum_accumulate().unwrap());
        module.add_function(fixtures::sum_accumulate().unwrap());
        assert!(matches!(
            PassScheduler::default().run(&mut module),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut parallel = module();
        let mut sequential = module();
        let scheduler = PassScheduler::default();
        scheduler.run(&mut parallel).unwrap();
        PassScheduler::new(PipelineConfig::new().with_parallel(false))
            .run(&mut sequential)
            .unwrap();

        assert_eq!(parallel.to_string(), sequential.to_string());
    }
}
