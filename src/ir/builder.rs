//! Builder pattern for programmatic function construction.
//!
//! The builder uses a closure-based API where all blocks are defined within a single
//! expression, making the CFG structure visually clear:
//!
//! ```rust
//! use tailfold::ir::{Constant, FunctionBuilder, Type};
//!
//! let func = FunctionBuilder::new("abs", Type::I32)
//!     .param("x", Type::I32)
//!     .build_with(|f| {
//!         let x = f.arg(0);
//!         f.block(0, "entry", |b| {
//!             let neg = b.cmp_slt(x, Constant::I32(0));
//!             b.branch(neg, 1, 2);
//!         });
//!         f.block(1, "negate", |b| {
//!             let r = b.sub(Constant::I32(0), x);
//!             b.ret(r);
//!         });
//!         f.block(2, "keep", |b| b.ret(x));
//!     })?;
//!
//! assert_eq!(func.block_count(), 3);
//! # Ok::<(), tailfold::Error>(())
//! ```
//!
//! # Block Indices
//!
//! Blocks are addressed by index inside the closure. Referencing an index that has not
//! been defined yet (a forward jump) creates the block on the spot, so the layout always
//! follows index order. Index 0 is the entry block.
//!
//! # Errors
//!
//! The closures cannot propagate errors. The first failure is remembered and returned
//! from [`FunctionBuilder::build_with`].

use crate::{
    ir::{
        BinaryOp, BlockId, Callee, CmpPredicate, Function, Op, Operand, PhiOperand, Terminator,
        Type, ValueDef, ValueId,
    },
    Error, Result,
};

/// Builder for constructing functions programmatically.
#[derive(Debug)]
pub struct FunctionBuilder {
    func: Function,
}

impl FunctionBuilder {
    /// Creates a builder for a function with the given name and return type.
    #[must_use]
    pub fn new(name: impl Into<String>, return_type: Type) -> Self {
        Self {
            func: Function::new(name, return_type),
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.func.add_param(ty, name);
        self
    }

    /// Builds the function using a closure that defines all blocks.
    ///
    /// # Arguments
    ///
    /// * `f` - A closure that receives a [`FunctionContext`] for defining blocks
    ///
    /// # Returns
    ///
    /// The constructed function. The result is not verified, so deliberately broken
    /// shapes can be built for tests.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while building.
    pub fn build_with<F>(self, f: F) -> Result<Function>
    where
        F: FnOnce(&mut FunctionContext),
    {
        let mut ctx = FunctionContext {
            func: self.func,
            blocks: Vec::new(),
            error: None,
        };
        f(&mut ctx);
        match ctx.error {
            Some(err) => Err(err),
            None => Ok(ctx.func),
        }
    }
}

/// Context passed to the build closure for defining blocks.
#[derive(Debug)]
pub struct FunctionContext {
    func: Function,
    blocks: Vec<BlockId>,
    error: Option<Error>,
}

impl FunctionContext {
    /// Returns the argument value at `index`.
    ///
    /// An out-of-range index records an error and returns a null handle.
    pub fn arg(&mut self, index: usize) -> ValueId {
        match self.func.params().get(index) {
            Some(&value) => value,
            None => {
                let err = malformed_error!("argument {} does not exist", index);
                self.fail(err);
                ValueId::default()
            }
        }
    }

    /// Defines (or fills in) the block at `index`.
    ///
    /// # Arguments
    ///
    /// * `index` - Layout index of the block
    /// * `name` - Block label
    /// * `f` - Closure emitting the block's contents
    pub fn block<F>(&mut self, index: usize, name: &str, f: F) -> BlockId
    where
        F: FnOnce(&mut BlockBuilder<'_>),
    {
        let id = self.handle(index);
        if let Some(block) = self.func.block_mut(id) {
            block.set_name(name);
        }
        let mut builder = BlockBuilder { ctx: self, block: id };
        f(&mut builder);
        id
    }

    /// Adds an incoming value to a phi node defined earlier.
    ///
    /// Used for loop-carried values whose definition comes after the phi.
    pub fn add_incoming(&mut self, phi: ValueId, value: impl Into<Operand>, pred: usize) {
        let pred = self.handle(pred);
        let value = value.into();
        let owner = self.func.value(phi).and_then(|data| match data.def {
            ValueDef::Phi(block) => Some(block),
            _ => None,
        });
        let node = owner
            .and_then(|block| self.func.block_mut(block))
            .and_then(|block| block.phi_defining_mut(phi));
        match node {
            Some(node) => node.add_operand(PhiOperand::new(value, pred)),
            None => self.fail(malformed_error!("{:?} is not a phi result", phi)),
        }
    }

    /// Renames a value for printing.
    pub fn name_value(&mut self, value: ValueId, name: &str) {
        self.func.set_value_name(value, name);
    }

    fn handle(&mut self, index: usize) -> BlockId {
        while self.blocks.len() <= index {
            let id = self.func.add_block(format!("bb{}", self.blocks.len()));
            self.blocks.push(id);
        }
        self.blocks[index]
    }

    fn fail(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

/// Emits the contents of one block.
pub struct BlockBuilder<'a> {
    ctx: &'a mut FunctionContext,
    block: BlockId,
}

impl BlockBuilder<'_> {
    /// Returns the handle of the block being built.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.block
    }

    fn emit(&mut self, op: Op, result: Option<Type>) -> Option<ValueId> {
        let inserted = self
            .ctx
            .func
            .append_inst(self.block, op, result.map(|ty| (ty, None)))
            .and_then(|inst| match result {
                Some(_) => self.ctx.func.inst_result(inst).map(Some),
                None => Ok(None),
            });
        match inserted {
            Ok(value) => value,
            Err(err) => {
                self.ctx.fail(err);
                None
            }
        }
    }

    fn emit_value(&mut self, op: Op, ty: Type) -> ValueId {
        self.emit(op, Some(ty)).unwrap_or_default()
    }

    fn type_of(&self, operand: &Operand) -> Type {
        self.ctx.func.operand_type(operand).unwrap_or(Type::I32)
    }

    /// Gives a value a printable name.
    pub fn name(&mut self, value: ValueId, name: &str) -> ValueId {
        self.ctx.func.set_value_name(value, name);
        value
    }

    /// Emits a binary operation. The result has the type of `lhs`.
    pub fn binary(
        &mut self,
        op: BinaryOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> ValueId {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        let ty = self.type_of(&lhs);
        self.emit_value(Op::Binary { op, lhs, rhs }, ty)
    }

    /// Emits `lhs + rhs`.
    pub fn add(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> ValueId {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    /// Emits `lhs - rhs`.
    pub fn sub(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> ValueId {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    /// Emits `lhs * rhs`.
    pub fn mul(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> ValueId {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    /// Emits a comparison.
    pub fn cmp(
        &mut self,
        predicate: CmpPredicate,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> ValueId {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        self.emit_value(
            Op::Cmp {
                predicate,
                lhs,
                rhs,
            },
            Type::Bool,
        )
    }

    /// Emits `lhs == rhs`.
    pub fn cmp_eq(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> ValueId {
        self.cmp(CmpPredicate::Eq, lhs, rhs)
    }

    /// Emits `lhs < rhs` (signed).
    pub fn cmp_slt(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> ValueId {
        self.cmp(CmpPredicate::Slt, lhs, rhs)
    }

    /// Emits `lhs <= rhs` (signed).
    pub fn cmp_sle(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> ValueId {
        self.cmp(CmpPredicate::Sle, lhs, rhs)
    }

    /// Emits a direct call returning a value of type `ty`.
    pub fn call(&mut self, callee: &str, args: &[Operand], ty: Type) -> ValueId {
        self.emit_value(
            Op::Call {
                callee: Callee::Direct(callee.to_string()),
                args: args.to_vec(),
            },
            ty,
        )
    }

    /// Emits a call through a function pointer.
    pub fn call_indirect(
        &mut self,
        target: impl Into<Operand>,
        args: &[Operand],
        ty: Type,
    ) -> ValueId {
        self.emit_value(
            Op::Call {
                callee: Callee::Indirect(target.into()),
                args: args.to_vec(),
            },
            ty,
        )
    }

    /// Emits a stack slot allocation.
    pub fn alloca(&mut self, ty: Type) -> ValueId {
        self.emit_value(Op::Alloca { ty }, Type::Ptr)
    }

    /// Emits a load of type `ty`.
    pub fn load(&mut self, ptr: impl Into<Operand>, ty: Type) -> ValueId {
        self.emit_value(
            Op::Load {
                ptr: ptr.into(),
                ty,
            },
            ty,
        )
    }

    /// Emits a store.
    pub fn store(&mut self, value: impl Into<Operand>, ptr: impl Into<Operand>) {
        self.emit(
            Op::Store {
                value: value.into(),
                ptr: ptr.into(),
            },
            None,
        );
    }

    /// Emits a debug marker for `value`.
    pub fn debug(&mut self, value: impl Into<Operand>) {
        self.emit(
            Op::Debug {
                value: value.into(),
            },
            None,
        );
    }

    /// Adds a phi node with the given incoming `(value, predecessor index)` pairs.
    pub fn phi(&mut self, ty: Type, incoming: &[(Operand, usize)]) -> ValueId {
        let value = match self.ctx.func.add_phi(self.block, ty, None) {
            Ok(value) => value,
            Err(err) => {
                self.ctx.fail(err);
                return ValueId::default();
            }
        };
        for &(operand, pred) in incoming {
            self.ctx.add_incoming(value, operand, pred);
        }
        value
    }

    /// Terminates the block with an unconditional jump.
    pub fn jump(&mut self, target: usize) {
        let target = self.ctx.handle(target);
        self.terminate(Terminator::Jump { target });
    }

    /// Terminates the block with a conditional branch.
    pub fn branch(&mut self, cond: impl Into<Operand>, true_target: usize, false_target: usize) {
        let true_target = self.ctx.handle(true_target);
        let false_target = self.ctx.handle(false_target);
        self.terminate(Terminator::Branch {
            cond: cond.into(),
            true_target,
            false_target,
        });
    }

    /// Terminates the block with a value return.
    pub fn ret(&mut self, value: impl Into<Operand>) {
        self.terminate(Terminator::Return {
            value: Some(value.into()),
        });
    }

    /// Terminates the block with a `void` return.
    pub fn ret_void(&mut self) {
        self.terminate(Terminator::Return { value: None });
    }

    fn terminate(&mut self, terminator: Terminator) {
        if let Err(err) = self.ctx.func.set_terminator(self.block, terminator) {
            self.ctx.fail(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Constant;

    #[test]
    fn test_forward_references_keep_index_order() {
        let func = FunctionBuilder::new("f", Type::Void)
            .build_with(|f| {
                f.block(0, "entry", |b| b.jump(2));
                f.block(2, "exit", |b| b.ret_void());
                f.block(1, "middle", |b| b.jump(2));
            })
            .unwrap();

        let names: Vec<&str> = func
            .iter_blocks()
            .map(|(_, block)| block.name())
            .collect();
        assert_eq!(names, vec!["entry", "middle", "exit"]);
    }

    #[test]
    fn test_loop_phi_with_late_incoming() {
        let func = FunctionBuilder::new("count", Type::I32)
            .param("n", Type::I32)
            .build_with(|f| {
                let n = f.arg(0);
                f.block(0, "entry", |b| b.jump(1));
                let mut i = ValueId::default();
                f.block(1, "header", |b| {
                    i = b.phi(Type::I32, &[(Operand::Const(Constant::I32(0)), 0)]);
                    let done = b.cmp_eq(i, n);
                    b.branch(done, 3, 2);
                });
                let mut next = ValueId::default();
                f.block(2, "body", |b| {
                    next = b.add(i, Constant::I32(1));
                    b.jump(1);
                });
                f.add_incoming(i, next, 2);
                f.block(3, "exit", |b| b.ret(i));
            })
            .unwrap();

        let header = func.block_by_name("header").unwrap();
        assert_eq!(func.block(header).unwrap().phis()[0].operand_count(), 2);
    }

    #[test]
    fn test_bad_argument_index_is_reported() {
        let result = FunctionBuilder::new("f", Type::I32).build_with(|f| {
            let missing = f.arg(3);
            f.block(0, "entry", |b| b.ret(missing));
        });
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }
}
