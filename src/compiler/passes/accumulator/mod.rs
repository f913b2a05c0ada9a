//! Accumulator tail recursion elimination.
//!
//! Functions of the form
//!
//! ```text
//! f(n, ...) = if guard(n) { base } else { f(step(n), ...) ⊕ n }
//! ```
//!
//! where `⊕` is associative and commutative are turned into a loop that folds `n` into
//! an accumulator seeded with `base`. The pass is split into:
//!
//! - [`detect`]: finds the self-call and the operation folding its result
//! - [`analyze`]: checks the surrounding shape and produces a [`LoopPlan`]
//! - [`transform`]: commits the plan on a copy and swaps it in once verified
//!
//! Detection failures leave a function alone. A function that passes detection but
//! fails analysis is reported as a malformed candidate.

mod detect;
mod transform;

pub use detect::{detect, matches, RecursionSite};
pub use transform::{analyze, transform, LoopPlan, TransformSummary};

use crate::{
    compiler::{pass::FunctionPass, EventKind, EventLog},
    ir::Function,
    Error, Result,
};

/// Rewrites accumulator tail recursion into loops.
///
/// The first recursion site the detector finds is the only one considered. A function
/// with more than one self-call is rejected: a second call in the recursive block is an
/// unexpected instruction, one in another block either adds a block outside the shape
/// or would survive the rewrite.
pub struct AccumulatorPass;

impl Default for AccumulatorPass {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulatorPass {
    /// Creates a new accumulator rewrite pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FunctionPass for AccumulatorPass {
    fn name(&self) -> &'static str {
        "accumulator-tail-recursion"
    }

    fn description(&self) -> &'static str {
        "Turns self-calls folded by an associative operation into accumulator loops"
    }

    fn run_on_function(&self, func: &mut Function, events: &EventLog) -> Result<bool> {
        let Some(site) = detect(func) else {
            log::info!("{}: no accumulator tail recursion", func.name());
            return Ok(false);
        };
        log::info!("{}: accumulator tail recursion found", func.name());

        let location = func.block_position(site.block).unwrap_or_default();
        events
            .record(EventKind::CandidateFound)
            .at(func.name(), location)
            .pass(self.name());

        match transform(func, &site) {
            Ok(summary) => {
                let header = func.block_position(summary.header).unwrap_or_default();
                events
                    .record(EventKind::LoopRewritten)
                    .at(func.name(), header)
                    .message(format!(
                        "{}: recursion rewritten into a loop ({} uses rewired, {} instructions removed)",
                        func.name(),
                        summary.rewired_uses,
                        summary.removed_instructions
                    ))
                    .pass(self.name());
                for phi in summary
                    .argument_phis
                    .iter()
                    .chain(std::iter::once(&summary.accumulator))
                {
                    let name = func
                        .value(*phi)
                        .and_then(|data| data.name.clone())
                        .unwrap_or_default();
                    events
                        .record(EventKind::PhiInserted)
                        .at(func.name(), header)
                        .message(format!("{}: inserted %{}", func.name(), name))
                        .pass(self.name());
                }
                Ok(true)
            }
            Err(error @ Error::MalformedCandidate { defect, .. }) => {
                log::warn!("{}: candidate rejected: {}", func.name(), defect);
                events
                    .record(EventKind::CandidateRejected)
                    .at(func.name(), location)
                    .message(format!("{}: {}", func.name(), defect))
                    .pass(self.name());
                Err(error)
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fixtures, CandidateDefect};

    #[test]
    fn test_rewrites_and_records_events() {
        let pass = AccumulatorPass::new();
        let events = EventLog::new();
        let mut func = fixtures::sum_accumulate().unwrap();

        assert!(pass.run_on_function(&mut func, &events).unwrap());
        assert_eq!(events.count_kind(EventKind::CandidateFound), 1);
        assert_eq!(events.count_kind(EventKind::LoopRewritten), 1);
        // curr_n, curr_acc and the accumulator
        assert_eq!(events.count_kind(EventKind::PhiInserted), 3);
        assert!(func.self_calls().is_empty());

        // nothing left to do on the second run
        assert!(!pass.run_on_function(&mut func, &events).unwrap());
        assert_eq!(events.count_kind(EventKind::LoopRewritten), 1);
    }

    #[test]
    fn test_non_candidates_are_untouched() {
        let pass = AccumulatorPass::new();
        let events = EventLog::new();
        let mut func = fixtures::no_recursion().unwrap();
        let before = func.to_string();

        assert!(!pass.run_on_function(&mut func, &events).unwrap());
        assert!(events.is_empty());
        assert_eq!(func.to_string(), before);
    }

    #[test]
    fn test_malformed_candidate_is_reported() {
        let pass = AccumulatorPass::new();
        let events = EventLog::new();
        let mut func = fixtures::multi_argument_chain().unwrap();

        let err = pass.run_on_function(&mut func, &events).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedCandidate {
                defect: CandidateDefect::MultiArgumentChain,
                ..
            }
        ));
        assert_eq!(events.count_kind(EventKind::CandidateRejected), 1);
        assert!(!events.has(EventKind::LoopRewritten));
    }
}
