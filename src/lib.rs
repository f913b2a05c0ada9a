// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # tailfold
//!
//! Accumulator tail-recursion elimination for a CFG/SSA intermediate representation.
//!
//! `tailfold` recognises functions of the shape
//!
//! ```text
//! f(n, ...) = base            if guard(n)
//!           = f(step(n), ...) ⊕ n   otherwise
//! ```
//!
//! where `⊕` is an associative and commutative operator, and rewrites them into
//! a loop with a pre-header, a guarded header carrying phi nodes for every argument
//! plus an accumulator, and a loop body that recomputes the step and the update.
//! The recursive call and its stack growth disappear.
//!
//! ## Features
//!
//! - **Arena IR** - Blocks, instructions and values live in `slotmap` arenas and are
//!   referenced through generational handles
//! - **Closure builder** - [`ir::FunctionBuilder`] constructs functions with the control
//!   flow visible at a glance
//! - **All-or-nothing rewrites** - The transformer plans on a read-only view, commits on a
//!   scratch copy, verifies it and only then swaps it in
//! - **Verification** - [`ir::verify_function`] checks terminators, phi arity and dominance
//! - **Reference interpreter** - [`ir::Evaluator`] runs modules and reports the deepest call
//!   stack, which makes semantic equivalence testable
//! - **Parallel driver** - [`compiler::PassScheduler`] processes independent functions with
//!   `rayon` and isolates failures per function
//!
//! ## Quick Start
//!
//! ```rust
//! use tailfold::prelude::*;
//!
//! let mut module = Module::new();
//! module.add_function(tailfold::fixtures::sum_accumulate()?);
//!
//! let report = PassScheduler::new(PipelineConfig::default()).run(&mut module)?;
//! assert_eq!(report.transformed(), 1);
//!
//! let mut eval = Evaluator::new(&module, EvaluatorConfig::default());
//! let result = eval.call("sum", &[Constant::I32(5), Constant::I32(0)])?;
//! assert_eq!(result, Some(Constant::I32(15)));
//! assert_eq!(eval.max_depth(), 1);
//! # Ok::<(), tailfold::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - The intermediate representation, CFG view, verifier, printer and interpreter
//! - [`compiler`] - Passes, event log, configuration and the pass scheduler
//! - [`fixtures`] - Canonical sample functions used by tests, benchmarks and the CLI
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. Structural precondition violations found
//! while planning a rewrite are reported as [`Error::MalformedCandidate`] together with the
//! specific [`CandidateDefect`].

#[macro_use]
pub(crate) mod error;

pub mod compiler;
pub mod fixtures;
pub mod ir;
pub mod prelude;

pub use error::{CandidateDefect, Error};

/// `tailfold` Result type.
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
