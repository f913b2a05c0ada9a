//! Pipeline result types.
//!
//! This module contains the [`PipelineReport`] returned by
//! [`PassScheduler::run`](crate::compiler::PassScheduler::run), which pairs the outcome
//! of every function with the events recorded while processing the module.

use std::{collections::HashMap, fmt, time::Duration};

use crate::{compiler::EventLog, Error};

/// What the pipeline did to a single function.
#[derive(Debug)]
pub enum FunctionOutcome {
    /// At least one pass changed the function.
    Transformed,
    /// No pass changed the function.
    Unchanged,
    /// A pass failed. The function was restored to its state before the pipeline.
    Failed(Error),
}

impl FunctionOutcome {
    /// Returns true if the function was changed.
    #[must_use]
    pub const fn is_transformed(&self) -> bool {
        matches!(self, Self::Transformed)
    }

    /// Returns the error if the function failed.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for FunctionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transformed => write!(f, "transformed"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Failed(error) => write!(f, "failed: {error}"),
        }
    }
}

/// Result of running the pipeline over a module.
///
/// # Example
///
/// ```rust
/// use tailfold::prelude::*;
///
/// let mut module = Module::new();
/// module.add_function(tailfold::fixtures::sum_accumulate()?);
/// module.add_function(tailfold::fixtures::no_recursion()?);
/// let report = PassScheduler::new(PipelineConfig::default()).run(&mut module)?;
///
/// assert_eq!(report.transformed(), 1);
/// assert_eq!(report.unchanged(), 1);
/// assert!(report.outcome("sum").is_some_and(FunctionOutcome::is_transformed));
/// # Ok::<(), tailfold::Error>(())
/// ```
#[derive(Debug)]
pub struct PipelineReport {
    outcomes: HashMap<String, FunctionOutcome>,
    events: EventLog,
    total_time: Duration,
}

impl PipelineReport {
    /// Creates a report from per-function outcomes and the shared event log.
    #[must_use]
    pub fn new(outcomes: HashMap<String, FunctionOutcome>, events: EventLog) -> Self {
        Self {
            outcomes,
            events,
            total_time: Duration::ZERO,
        }
    }

    /// Sets the wall-clock time the run took.
    #[must_use]
    pub fn with_timing(mut self, time: Duration) -> Self {
        self.total_time = time;
        self
    }

    /// Returns the number of functions changed by the pipeline.
    #[must_use]
    pub fn transformed(&self) -> usize {
        self.count(|o| matches!(o, FunctionOutcome::Transformed))
    }

    /// Returns the number of functions the pipeline left alone.
    #[must_use]
    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, FunctionOutcome::Unchanged))
    }

    /// Returns the number of functions on which a pass failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FunctionOutcome::Failed(_)))
    }

    /// Returns the outcome for the named function.
    #[must_use]
    pub fn outcome(&self, function: &str) -> Option<&FunctionOutcome> {
        self.outcomes.get(function)
    }

    /// Iterates over all outcomes in unspecified order.
    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &FunctionOutcome)> {
        self.outcomes.iter().map(|(name, o)| (name.as_str(), o))
    }

    /// Returns the failed functions with their errors, sorted by name.
    #[must_use]
    pub fn failures(&self) -> Vec<(&str, &Error)> {
        let mut failures: Vec<_> = self
            .outcomes
            .iter()
            .filter_map(|(name, o)| o.error().map(|e| (name.as_str(), e)))
            .collect();
        failures.sort_by_key(|(name, _)| *name);
        failures
    }

    /// Returns the events recorded during the run.
    #[must_use]
    pub const fn events(&self) -> &EventLog {
        &self.events
    }

    /// Returns the wall-clock time the run took.
    #[must_use]
    pub const fn total_time(&self) -> Duration {
        self.total_time
    }

    /// Generates a one-line summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} functions: {} transformed, {} unchanged, {} failed ({})",
            self.outcomes.len(),
            self.transformed(),
            self.unchanged(),
            self.failed(),
            self.events.summary()
        )
    }

    fn count(&self, predicate: impl Fn(&FunctionOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| predicate(o)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compiler::EventKind, CandidateDefect};

    fn report() -> PipelineReport {
        let events = EventLog::new();
        events.record(EventKind::LoopRewritten).function("sum");
        let outcomes = HashMap::from([
            ("sum".to_string(), FunctionOutcome::Transformed),
            ("max".to_string(), FunctionOutcome::Unchanged),
            (
                "climb".to_string(),
                FunctionOutcome::Failed(Error::MalformedCandidate {
                    function: "climb".to_string(),
                    defect: CandidateDefect::MultiArgumentChain,
                }),
            ),
        ]);
        PipelineReport::new(outcomes, events)
    }

    #[test]
    fn test_counts() {
        let report = report();
        assert_eq!(report.transformed(), 1);
        assert_eq!(report.unchanged(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.outcome("missing").is_none());
    }

    #[test]
    fn test_failures() {
        let report = report();
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "climb");
    }

    #[test]
    fn test_summary() {
        let summary = report().summary();
        assert!(summary.starts_with("3 functions: 1 transformed, 1 unchanged, 1 failed"));
        assert!(summary.ends_with("(1 loop rewritten)"));
    }
}
