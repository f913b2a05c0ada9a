//! Built-in function passes.
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`AccumulatorPass`] | Rewrites accumulator tail recursion into a loop |
//! | [`DeadBlockPass`] | Removes non-entry blocks without predecessors |
//!
//! # Pass Execution
//!
//! The [`PassScheduler`](crate::compiler::PassScheduler) runs the passes in the order
//! above and repeats the sequence until no pass changes the function. Each pass
//! implements the [`FunctionPass`](crate::compiler::FunctionPass) trait.
//!
//! The detection and rewrite stages of the accumulator pass are also exposed on their
//! own through the [`accumulator`] module.

pub mod accumulator;
mod deadblocks;

pub use self::accumulator::AccumulatorPass;
pub use self::deadblocks::{dead_blocks, remove_dead_blocks, DeadBlockPass};
