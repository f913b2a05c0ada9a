//! Reference interpreter for modules.
//!
//! The [`Evaluator`] executes functions of a [`Module`] on concrete constants. It exists
//! to make rewrites testable: a function and its transformed version must return the same
//! values, and the transformed version must not grow the call stack.
//!
//! Calls are executed on an explicit frame stack, so deep recursion in the interpreted
//! program never recurses in the interpreter itself. Every instruction and terminator
//! counts as one step against [`EvaluatorConfig::max_steps`].
//!
//! # Example
//!
//! ```rust
//! use tailfold::ir::{Constant, Evaluator, EvaluatorConfig, Module};
//!
//! let module: Module = [tailfold::fixtures::sum_accumulate()?].into_iter().collect();
//! let mut eval = Evaluator::new(&module, EvaluatorConfig::default());
//!
//! let result = eval.call("sum", &[Constant::I32(5), Constant::I32(0)])?;
//! assert_eq!(result, Some(Constant::I32(15)));
//! assert_eq!(eval.max_depth(), 6);
//! # Ok::<(), tailfold::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    ir::{BlockId, Callee, Constant, Function, Module, Op, Operand, Terminator, ValueId},
    Error, Result,
};

/// Limits applied while evaluating.
///
/// | Setting | Default Value |
/// |---------|---------------|
/// | `max_steps` | 1,000,000 |
/// | `max_call_depth` | 10,000 |
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Maximum number of executed instructions and terminators per top-level call.
    pub max_steps: u64,

    /// Maximum number of simultaneously active frames.
    pub max_call_depth: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_call_depth: 10_000,
        }
    }
}

impl EvaluatorConfig {
    /// Creates a configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum step count.
    ///
    /// # Arguments
    ///
    /// * `max` - Maximum instructions and terminators to execute
    ///
    /// # Returns
    ///
    /// Returns `self` for method chaining.
    #[must_use]
    pub const fn with_max_steps(mut self, max: u64) -> Self {
        self.max_steps = max;
        self
    }

    /// Sets the maximum call depth.
    ///
    /// # Arguments
    ///
    /// * `max` - Maximum number of nested calls, the outermost call included
    ///
    /// # Returns
    ///
    /// Returns `self` for method chaining.
    #[must_use]
    pub const fn with_max_call_depth(mut self, max: usize) -> Self {
        self.max_call_depth = max;
        self
    }
}

/// A runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Const(Constant),
    /// Index into the evaluator's stack memory.
    Ptr(usize),
}

struct Frame<'m> {
    func: &'m Function,
    env: HashMap<ValueId, Slot>,
    block: BlockId,
    position: usize,
    /// Receives the result of the call this frame is waiting on.
    pending: Option<ValueId>,
}

enum Action<'m> {
    Continue,
    Call {
        callee: &'m Function,
        args: Vec<Slot>,
        dest: Option<ValueId>,
    },
    Return(Option<Slot>),
}

/// Interpreter over the functions of one module.
#[derive(Debug)]
pub struct Evaluator<'m> {
    module: &'m Module,
    config: EvaluatorConfig,
    memory: Vec<Option<Constant>>,
    steps: u64,
    max_depth: usize,
}

impl<'m> Evaluator<'m> {
    /// Creates an evaluator for `module`.
    #[must_use]
    pub fn new(module: &'m Module, config: EvaluatorConfig) -> Self {
        Self {
            module,
            config,
            memory: Vec::new(),
            steps: 0,
            max_depth: 0,
        }
    }

    /// Returns the deepest call stack of the most recent [`call`](Self::call).
    ///
    /// The outermost call counts as depth 1.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the number of steps executed by the most recent call.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Calls the function `name` with constant arguments.
    ///
    /// # Returns
    ///
    /// The returned constant, or `None` for `void` functions.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownFunction`] if `name` or a callee is not part of the module
    /// - [`Error::StepLimit`] or [`Error::RecursionLimit`] if a limit is exceeded
    /// - [`Error::Evaluation`] for operations that cannot execute, such as a division by
    ///   zero, a read of `undef` or a load from a slot never stored to
    pub fn call(&mut self, name: &str, args: &[Constant]) -> Result<Option<Constant>> {
        self.memory.clear();
        self.steps = 0;
        self.max_depth = 0;

        let func = self
            .module
            .function(name)
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))?;
        let args = args.iter().copied().map(Slot::Const).collect();

        match self.run(func, args)? {
            None => Ok(None),
            Some(Slot::Const(value)) => Ok(Some(value)),
            Some(Slot::Ptr(_)) => Err(Error::Evaluation(format!(
                "{name}: returned a stack address"
            ))),
        }
    }

    fn run(&mut self, func: &'m Function, args: Vec<Slot>) -> Result<Option<Slot>> {
        let mut stack = vec![self.enter(func, args)?];
        self.max_depth = 1;

        loop {
            let Some(frame) = stack.last_mut() else {
                return Err(Error::Evaluation("call stack underflow".to_string()));
            };
            match self.step(frame)? {
                Action::Continue => {}
                Action::Call { callee, args, dest } => {
                    frame.pending = dest;
                    if stack.len() >= self.config.max_call_depth {
                        return Err(Error::RecursionLimit(self.config.max_call_depth));
                    }
                    let frame = self.enter(callee, args)?;
                    stack.push(frame);
                    self.max_depth = self.max_depth.max(stack.len());
                }
                Action::Return(value) => {
                    stack.pop();
                    let Some(caller) = stack.last_mut() else {
                        return Ok(value);
                    };
                    if let Some(dest) = caller.pending.take() {
                        let value = value.ok_or_else(|| {
                            Error::Evaluation(format!(
                                "{}: used the result of a void call",
                                caller.func.name()
                            ))
                        })?;
                        caller.env.insert(dest, value);
                    }
                }
            }
        }
    }

    fn enter(&self, func: &'m Function, args: Vec<Slot>) -> Result<Frame<'m>> {
        if args.len() != func.params().len() {
            return Err(Error::Evaluation(format!(
                "{}: expected {} arguments, got {}",
                func.name(),
                func.params().len(),
                args.len()
            )));
        }
        let entry = func
            .entry()
            .ok_or_else(|| Error::Evaluation(format!("{}: function has no blocks", func.name())))?;
        if func.try_block(entry)?.phi_count() > 0 {
            return Err(Error::Evaluation(format!(
                "{}: entry block has phi nodes",
                func.name()
            )));
        }

        Ok(Frame {
            func,
            env: func.params().iter().copied().zip(args).collect(),
            block: entry,
            position: 0,
            pending: None,
        })
    }

    fn tick(&mut self) -> Result<()> {
        if self.steps >= self.config.max_steps {
            return Err(Error::StepLimit(self.config.max_steps));
        }
        self.steps += 1;
        Ok(())
    }

    /// Executes the instruction or terminator at the frame's position.
    fn step(&mut self, frame: &mut Frame<'m>) -> Result<Action<'m>> {
        self.tick()?;
        let func = frame.func;
        let block = func.try_block(frame.block)?;

        let Some(&inst_id) = block.instructions().get(frame.position) else {
            let term = block.terminator().ok_or_else(|| {
                Error::Evaluation(format!(
                    "{}: block '{}' has no terminator",
                    func.name(),
                    block.name()
                ))
            })?;
            return match term {
                Terminator::Return { value } => {
                    let value = value.as_ref().map(|v| read(frame, v)).transpose()?;
                    Ok(Action::Return(value))
                }
                Terminator::Jump { target } => {
                    transfer(frame, *target)?;
                    Ok(Action::Continue)
                }
                Terminator::Branch {
                    cond,
                    true_target,
                    false_target,
                } => {
                    let target = match read(frame, cond)? {
                        Slot::Const(Constant::Bool(true)) => *true_target,
                        Slot::Const(Constant::Bool(false)) => *false_target,
                        other => {
                            return Err(Error::Evaluation(format!(
                                "{}: branch on non-boolean {other:?}",
                                func.name()
                            )))
                        }
                    };
                    transfer(frame, target)?;
                    Ok(Action::Continue)
                }
            };
        };

        let inst = func.try_inst(inst_id)?;
        frame.position += 1;

        let value = match inst.op() {
            Op::Binary { op, lhs, rhs } => {
                let (lhs, rhs) = (constant(frame, lhs)?, constant(frame, rhs)?);
                let folded = op.apply(lhs, rhs).ok_or_else(|| {
                    Error::Evaluation(format!("{}: cannot evaluate {op} {lhs}, {rhs}", func.name()))
                })?;
                Some(Slot::Const(folded))
            }
            Op::Cmp {
                predicate,
                lhs,
                rhs,
            } => {
                let (lhs, rhs) = (constant(frame, lhs)?, constant(frame, rhs)?);
                let outcome = predicate.evaluate(lhs, rhs).ok_or_else(|| {
                    Error::Evaluation(format!(
                        "{}: cannot compare {lhs} and {rhs}",
                        func.name()
                    ))
                })?;
                Some(Slot::Const(Constant::Bool(outcome)))
            }
            Op::Call { callee, args } => {
                let Callee::Direct(name) = callee else {
                    return Err(Error::Evaluation(format!(
                        "{}: indirect calls cannot be evaluated",
                        func.name()
                    )));
                };
                let callee = self
                    .module
                    .function(name)
                    .ok_or_else(|| Error::UnknownFunction(name.clone()))?;
                let args = args
                    .iter()
                    .map(|arg| read(frame, arg))
                    .collect::<Result<Vec<_>>>()?;
                return Ok(Action::Call {
                    callee,
                    args,
                    dest: inst.result(),
                });
            }
            Op::Alloca { .. } => {
                self.memory.push(None);
                Some(Slot::Ptr(self.memory.len() - 1))
            }
            Op::Load { ptr, .. } => {
                let address = self.address(frame, ptr)?;
                let loaded = self.memory.get(address).copied().flatten().ok_or_else(|| {
                    Error::Evaluation(format!(
                        "{}: load from a slot that was never stored to",
                        func.name()
                    ))
                })?;
                Some(Slot::Const(loaded))
            }
            Op::Store { value, ptr } => {
                let value = constant(frame, value)?;
                let address = self.address(frame, ptr)?;
                if let Some(cell) = self.memory.get_mut(address) {
                    *cell = Some(value);
                }
                None
            }
            Op::Debug { .. } => None,
        };

        if let (Some(result), Some(value)) = (inst.result(), value) {
            frame.env.insert(result, value);
        }
        Ok(Action::Continue)
    }

    fn address(&self, frame: &Frame<'_>, ptr: &Operand) -> Result<usize> {
        match read(frame, ptr)? {
            Slot::Ptr(address) if address < self.memory.len() => Ok(address),
            other => Err(Error::Evaluation(format!(
                "{}: {other:?} is not a stack address",
                frame.func.name()
            ))),
        }
    }
}

/// Moves the frame into `target`, evaluating its phis against the edge just taken.
///
/// All phis read their inputs before any of them is written.
fn transfer(frame: &mut Frame<'_>, target: BlockId) -> Result<()> {
    let func = frame.func;
    let block = func.try_block(target)?;
    let incoming = block
        .phis()
        .iter()
        .map(|phi| {
            let operand = phi.operand_from(frame.block).ok_or_else(|| {
                Error::Evaluation(format!(
                    "{}: phi in '{}' has no input for the taken edge",
                    func.name(),
                    block.name()
                ))
            })?;
            Ok((phi.result(), read(frame, &operand)?))
        })
        .collect::<Result<Vec<_>>>()?;

    frame.env.extend(incoming);
    frame.block = target;
    frame.position = 0;
    Ok(())
}

fn read(frame: &Frame<'_>, operand: &Operand) -> Result<Slot> {
    match operand {
        Operand::Value(value) => frame.env.get(value).copied().ok_or_else(|| {
            Error::Evaluation(format!(
                "{}: value read before it was defined",
                frame.func.name()
            ))
        }),
        Operand::Const(c) => Ok(Slot::Const(*c)),
        Operand::Undef(ty) => Err(Error::Evaluation(format!(
            "{}: read of undef {ty}",
            frame.func.name()
        ))),
    }
}

fn constant(frame: &Frame<'_>, operand: &Operand) -> Result<Constant> {
    match read(frame, operand)? {
        Slot::Const(value) => Ok(value),
        Slot::Ptr(_) => Err(Error::Evaluation(format!(
            "{}: stack address used as a number",
            frame.func.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, Type};

    fn countdown() -> Function {
        // countdown(n) = n == 0 ? 0 : countdown(n - 1)
        FunctionBuilder::new("countdown", Type::I32)
            .param("n", Type::I32)
            .build_with(|f| {
                let n = f.arg(0);
                f.block(0, "entry", |b| {
                    let done = b.cmp_eq(n, Constant::I32(0));
                    b.branch(done, 1, 2);
                });
                f.block(1, "base", |b| b.ret(Constant::I32(0)));
                f.block(2, "recurse", |b| {
                    let next = b.sub(n, Constant::I32(1));
                    let r = b.call("countdown", &[next.into()], Type::I32);
                    b.ret(r);
                });
            })
            .unwrap()
    }

    #[test]
    fn test_recursion_depth_is_tracked() {
        let module: Module = [countdown()].into_iter().collect();
        let mut eval = Evaluator::new(&module, EvaluatorConfig::default());

        assert_eq!(
            eval.call("countdown", &[Constant::I32(10)]).unwrap(),
            Some(Constant::I32(0))
        );
        assert_eq!(eval.max_depth(), 11);
        assert!(eval.steps() > 0);
    }

    #[test]
    fn test_recursion_limit() {
        let module: Module = [countdown()].into_iter().collect();
        let mut eval = Evaluator::new(&module, EvaluatorConfig::new().with_max_call_depth(4));

        let result = eval.call("countdown", &[Constant::I32(10)]);
        assert!(matches!(result, Err(Error::RecursionLimit(4))));
    }

    #[test]
    fn test_step_limit() {
        let module: Module = [countdown()].into_iter().collect();
        let mut eval = Evaluator::new(&module, EvaluatorConfig::new().with_max_steps(5));

        let result = eval.call("countdown", &[Constant::I32(10)]);
        assert!(matches!(result, Err(Error::StepLimit(5))));
    }

    #[test]
    fn test_loop_phis_and_memory() {
        // total(n) = 1 + 2 + ... + n, stored through a stack slot
        let func = FunctionBuilder::new("total", Type::I32)
            .param("n", Type::I32)
            .build_with(|f| {
                let n = f.arg(0);
                let mut slot = ValueId::default();
                f.block(0, "entry", |b| {
                    slot = b.alloca(Type::I32);
                    b.jump(1);
                });
                let (mut i, mut acc) = (ValueId::default(), ValueId::default());
                f.block(1, "header", |b| {
                    i = b.phi(Type::I32, &[(Constant::I32(1).into(), 0)]);
                    acc = b.phi(Type::I32, &[(Constant::I32(0).into(), 0)]);
                    let done = b.cmp(crate::ir::CmpPredicate::Sgt, i, n);
                    b.branch(done, 3, 2);
                });
                let (mut next_i, mut next_acc) = (ValueId::default(), ValueId::default());
                f.block(2, "body", |b| {
                    next_acc = b.add(acc, i);
                    next_i = b.add(i, Constant::I32(1));
                    b.jump(1);
                });
                f.add_incoming(i, next_i, 2);
                f.add_incoming(acc, next_acc, 2);
                f.block(3, "exit", |b| {
                    b.store(acc, slot);
                    let out = b.load(slot, Type::I32);
                    b.ret(out);
                });
            })
            .unwrap();

        let module: Module = [func].into_iter().collect();
        let mut eval = Evaluator::new(&module, EvaluatorConfig::default());
        assert_eq!(
            eval.call("total", &[Constant::I32(10)]).unwrap(),
            Some(Constant::I32(55))
        );
        assert_eq!(eval.max_depth(), 1);
    }

    #[test]
    fn test_errors() {
        let func = FunctionBuilder::new("div", Type::I32)
            .param("x", Type::I32)
            .build_with(|f| {
                let x = f.arg(0);
                f.block(0, "entry", |b| {
                    let q = b.binary(crate::ir::BinaryOp::SDiv, Constant::I32(1), x);
                    b.ret(q);
                });
            })
            .unwrap();
        let module: Module = [func].into_iter().collect();
        let mut eval = Evaluator::new(&module, EvaluatorConfig::default());

        assert!(matches!(
            eval.call("div", &[Constant::I32(0)]),
            Err(Error::Evaluation(_))
        ));
        assert!(matches!(
            eval.call("div", &[]),
            Err(Error::Evaluation(_))
        ));
        assert!(matches!(
            eval.call("missing", &[]),
            Err(Error::UnknownFunction(name)) if name == "missing"
        ));
    }
}
