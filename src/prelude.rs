//! # tailfold Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the tailfold library. Import this module to get quick access to the IR, the
//! pass pipeline and the interpreter.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all tailfold operations
pub use crate::Error;

/// The result type used throughout tailfold
pub use crate::Result;

/// Structural preconditions a rewrite candidate can violate
pub use crate::CandidateDefect;

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Containers and handles
pub use crate::ir::{BasicBlock, BlockId, Function, InstId, Module, ValueId};

/// Instructions and operands
pub use crate::ir::{
    BinaryOp, Callee, CmpPredicate, Constant, Instruction, Op, Operand, PhiNode, PhiOperand,
    Terminator, Type,
};

/// Programmatic construction
pub use crate::ir::{BlockBuilder, FunctionBuilder, FunctionContext};

/// Control flow analysis and verification
pub use crate::ir::{verify_function, DominatorTree, FunctionCfg};

/// Reference interpreter
pub use crate::ir::{Evaluator, EvaluatorConfig};

// ================================================================================================
// Pass Pipeline
// ================================================================================================

/// Scheduler, configuration and results
pub use crate::compiler::{FunctionOutcome, PassScheduler, PipelineConfig, PipelineReport};

/// Pass trait and built-in passes
pub use crate::compiler::{AccumulatorPass, DeadBlockPass, FunctionPass};

/// Event tracking
pub use crate::compiler::{Event, EventKind, EventLog};
