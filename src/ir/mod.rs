//! Intermediate representation in CFG/SSA form.
//!
//! This module provides the data model every pass operates on, organized into focused
//! sub-modules:
//!
//! - `types` - Value types and constants
//! - `value` - Arena handles, value definitions and operands
//! - `ops` - Operations, operator properties and callees
//! - `instruction` - Instructions and block terminators
//! - `phi` - Merge values at control flow joins
//! - `block` - Basic blocks
//! - `function` - Functions owning the block, instruction and value arenas
//! - `module` - Collections of functions
//! - `builder` - Closure-based construction
//! - `cfg` - Graph view, reverse post-order and dominators
//! - `verify` - Structural and SSA verification
//! - `evaluator` - Reference interpreter
//!
//! Functions print in a readable textual form through their `Display` implementation.
//!
//! # Ownership
//!
//! A [`Function`] owns everything it contains. Blocks, instructions and values are
//! referred to through `slotmap` keys ([`BlockId`], [`InstId`], [`ValueId`]); nothing
//! holds a reference into another entity, so a function can be cloned, mutated and
//! swapped freely.

mod block;
mod builder;
mod cfg;
mod display;
mod evaluator;
mod function;
mod instruction;
mod module;
mod ops;
mod phi;
mod types;
mod value;
mod verify;

pub use block::BasicBlock;
pub use builder::{BlockBuilder, FunctionBuilder, FunctionContext};
pub use cfg::{DominatorTree, FunctionCfg};
pub use evaluator::{Evaluator, EvaluatorConfig};
pub use function::{Function, FunctionStats, SelfCall, UseSite};
pub use instruction::{Instruction, Terminator};
pub use module::Module;
pub use ops::{BinaryOp, Callee, CmpPredicate, Op, OpFlags};
pub use phi::{PhiNode, PhiOperand};
pub use types::{Constant, Type};
pub use value::{BlockId, InstId, Operand, ValueData, ValueDef, ValueId};
pub use verify::verify_function;
