//! The trait every pass implements.

use crate::{compiler::EventLog, ir::Function, Result};

/// A transformation over a single function.
///
/// All passes must be thread-safe (`Send + Sync`) so the scheduler can run them on
/// independent functions in parallel. Passes hold no mutable state; everything they
/// learn about a function is recomputed on every run.
pub trait FunctionPass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Should this pass run on a specific function?
    ///
    /// Called before `run_on_function`. Override to skip functions that cannot
    /// benefit from the pass.
    fn should_run(&self, _func: &Function) -> bool {
        true
    }

    /// Runs the pass on a single function.
    ///
    /// Returns `true` if the function was modified, `false` otherwise. Events are
    /// recorded to `events`.
    ///
    /// # Arguments
    ///
    /// * `func` - The function to transform.
    /// * `events` - The shared event log.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass fails. A failing pass must leave `func` untouched.
    fn run_on_function(&self, func: &mut Function, events: &EventLog) -> Result<bool>;

    /// Does this pass only tidy up after other passes?
    ///
    /// A cleanup pass is skipped until some other pass has changed the function, so
    /// functions no transformation applies to are never touched.
    fn is_cleanup(&self) -> bool {
        false
    }

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
