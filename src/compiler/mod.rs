//! Pass infrastructure and the accumulator rewrite.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Compiler Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  PassScheduler               Per-function fixpoint execution     │
//! │    ├─ snapshot                (restored if any pass fails)       │
//! │    ├─ passes in order         (verified after every change)      │
//! │    └─ functions in parallel   (rayon, one arena per function)    │
//! │                                                                  │
//! │  FunctionPass trait          Interface for all passes            │
//! │    ├─ should_run()            Cheap pre-check                    │
//! │    └─ run_on_function()       Per-function transformation        │
//! │                                                                  │
//! │  Passes                                                          │
//! │    ├─ AccumulatorPass         detect → analyze → commit → verify │
//! │    └─ DeadBlockPass           removes orphaned blocks            │
//! │                                                                  │
//! │  EventLog                    Change tracking and diagnostics     │
//! │  PipelineReport              Per-function outcomes               │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use tailfold::compiler::{PassScheduler, PipelineConfig};
//!
//! let mut func = tailfold::fixtures::factorial()?;
//! let scheduler = PassScheduler::new(PipelineConfig::new().with_parallel(false));
//!
//! assert!(scheduler.run_function(&mut func)?);
//! assert!(func.self_calls().is_empty());
//! # Ok::<(), tailfold::Error>(())
//! ```

mod config;
mod events;
mod pass;
pub mod passes;
mod report;
mod scheduler;

pub use config::PipelineConfig;
pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::FunctionPass;
pub use passes::{AccumulatorPass, DeadBlockPass};
pub use report::{FunctionOutcome, PipelineReport};
pub use scheduler::PassScheduler;
