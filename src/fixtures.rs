//! Canonical sample functions.
//!
//! Fixtures are small functions built with [`FunctionBuilder`] that exercise the
//! pipeline: shapes the accumulator rewrite handles, shapes the detector must ignore and
//! shapes the detector accepts but the rewrite rejects. Tests, benchmarks and the CLI all
//! draw from the same set.
//!
//! The recursive fixtures follow the layout a front end produces for
//! `f(n) = guard(n) ? base : f(step(n)) ⊕ n` with a return slot:
//!
//! ```text
//! entry:    %retval = alloca; %cmp = cmp guard %n, bound; br %cmp, base, recurse
//! base:     store base, %retval; jump exit
//! recurse:  %sub = step %n, k; %call = call @f(%sub, ...); %add = ⊕ %call, %n
//!           store %add, %retval; jump exit
//! exit:     %ret = load %retval; ret %ret
//! ```
//!
//! # Example
//!
//! ```rust
//! use tailfold::fixtures::{self, Expectation};
//!
//! let fixture = fixtures::find("fact").unwrap();
//! assert_eq!(fixture.expectation, Expectation::Rewritten);
//!
//! let func = fixture.build()?;
//! assert_eq!(func.self_calls().len(), 1);
//! # Ok::<(), tailfold::Error>(())
//! ```

use crate::{
    ir::{BinaryOp, CmpPredicate, Constant, Function, FunctionBuilder, Operand, Type, ValueId},
    CandidateDefect, Result,
};

/// What the pipeline is expected to do with a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// The function is rewritten into a loop.
    Rewritten,
    /// The detector does not match; the function is left alone.
    Unchanged,
    /// The detector matches but the rewrite rejects the function.
    Rejected(CandidateDefect),
}

/// A named sample function with sample inputs.
#[derive(Debug, Clone, Copy)]
pub struct Fixture {
    /// Name of the function the fixture builds.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Expected pipeline outcome.
    pub expectation: Expectation,
    build: fn() -> Result<Function>,
    samples: &'static [&'static [i64]],
}

impl Fixture {
    /// Builds a fresh copy of the function.
    ///
    /// # Errors
    ///
    /// Returns the builder's error if construction fails.
    pub fn build(&self) -> Result<Function> {
        (self.build)()
    }

    /// Returns the sample argument lists, converted to the parameter types of `func`.
    ///
    /// Fixtures whose evaluation cannot succeed have no samples.
    #[must_use]
    pub fn samples(&self, func: &Function) -> Vec<Vec<Constant>> {
        self.samples
            .iter()
            .filter_map(|args| {
                func.params()
                    .iter()
                    .zip(args.iter())
                    .map(|(&param, &raw)| {
                        func.value(param)
                            .and_then(|data| Constant::from_i64(data.ty, raw))
                    })
                    .collect::<Option<Vec<_>>>()
            })
            .collect()
    }
}

/// Every bundled fixture, matching shapes first.
pub const FIXTURES: &[Fixture] = &[
    Fixture {
        name: "sum",
        description: "sum(n, acc) = n == 0 ? acc : sum(n - 1, acc) + n",
        expectation: Expectation::Rewritten,
        build: sum_accumulate,
        samples: &[&[0, 0], &[1, 0], &[5, 0], &[10, 7], &[100, -3]],
    },
    Fixture {
        name: "fact",
        description: "fact(n) = n <= 1 ? 1 : fact(n - 1) * n",
        expectation: Expectation::Rewritten,
        build: factorial,
        samples: &[&[0], &[1], &[5], &[10], &[-4]],
    },
    Fixture {
        name: "parity",
        description: "parity(n, seed) = n == 0 ? seed : n ^ parity(n - 1, seed)",
        expectation: Expectation::Rewritten,
        build: xor_fold,
        samples: &[&[0, 1], &[7, 0], &[64, 12345]],
    },
    Fixture {
        name: "bits",
        description: "bits(n) = n <= 0 ? 0 : bits(n >> 1) | n (i64)",
        expectation: Expectation::Rewritten,
        build: or_fold,
        samples: &[&[0], &[1], &[1000], &[0x7fff_0000], &[-8]],
    },
    Fixture {
        name: "sum_traced",
        description: "sum with debug markers between the call, the update and the stores",
        expectation: Expectation::Rewritten,
        build: sum_traced,
        samples: &[&[0, 0], &[6, 1], &[50, 0]],
    },
    Fixture {
        name: "countdown",
        description: "countdown(n) = n == 0 ? 0 : countdown(n - 1) - n (non-commutative update)",
        expectation: Expectation::Unchanged,
        build: sub_update,
        samples: &[&[0], &[4], &[20]],
    },
    Fixture {
        name: "halving",
        description: "halving(n) = n == 0 ? 1 : halving(n - 1) / n (division update)",
        expectation: Expectation::Unchanged,
        build: div_update,
        samples: &[&[0], &[3]],
    },
    Fixture {
        name: "doubling",
        description: "doubling(n) = n == 0 ? 1 : d + d where d = doubling(n - 1)",
        expectation: Expectation::Unchanged,
        build: double_use_update,
        samples: &[&[0], &[5]],
    },
    Fixture {
        name: "detached",
        description: "the operation after the call ignores the call result",
        expectation: Expectation::Unchanged,
        build: detached_update,
        samples: &[&[0], &[3]],
    },
    Fixture {
        name: "conditional",
        description: "the recursive block ends in a conditional branch",
        expectation: Expectation::Unchanged,
        build: conditional_tail,
        samples: &[&[0], &[9]],
    },
    Fixture {
        name: "max",
        description: "max(a, b) without recursion",
        expectation: Expectation::Unchanged,
        build: no_recursion,
        samples: &[&[1, 2], &[7, -7], &[3, 3]],
    },
    Fixture {
        name: "climb",
        description: "climb(n, acc) = n == 0 ? acc : climb(n - 1, acc + 1) + n",
        expectation: Expectation::Rejected(CandidateDefect::MultiArgumentChain),
        build: multi_argument_chain,
        samples: &[&[0, 0], &[5, 2]],
    },
    Fixture {
        name: "broken",
        description: "the base case jumps to the exit without storing a result",
        expectation: Expectation::Rejected(CandidateDefect::BaseCaseWithoutStore),
        build: base_without_store,
        samples: &[],
    },
];

/// Looks up a fixture by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static Fixture> {
    FIXTURES.iter().find(|fixture| fixture.name == name)
}

/// Value returned by the base case of an accumulator shape.
#[derive(Clone, Copy)]
enum Base {
    Const(Constant),
    Arg(usize),
}

/// Parameters of the return-slot accumulator layout described in the module docs.
struct Shape {
    name: &'static str,
    ty: Type,
    params: &'static [&'static str],
    guard: CmpPredicate,
    bound: Constant,
    base: Base,
    step: (BinaryOp, Constant),
    update: BinaryOp,
    /// Call result as the first operand of the update.
    call_first: bool,
    /// Interleave debug markers.
    traced: bool,
}

fn accumulator_shape(shape: &Shape) -> Result<Function> {
    let mut builder = FunctionBuilder::new(shape.name, shape.ty);
    for &param in shape.params {
        builder = builder.param(param, shape.ty);
    }

    builder.build_with(|f| {
        let args: Vec<ValueId> = (0..shape.params.len()).map(|i| f.arg(i)).collect();
        let n = args.first().copied().unwrap_or_default();
        let mut retval = ValueId::default();

        f.block(0, "entry", |b| {
            retval = b.alloca(shape.ty);
            b.name(retval, "retval");
            let cmp = b.cmp(shape.guard, n, shape.bound);
            b.name(cmp, "cmp");
            b.branch(cmp, 1, 2);
        });
        f.block(1, "base", |b| {
            let value: Operand = match shape.base {
                Base::Const(c) => c.into(),
                Base::Arg(index) => args.get(index).copied().unwrap_or_default().into(),
            };
            if shape.traced {
                b.debug(value);
            }
            b.store(value, retval);
            if shape.traced {
                b.debug(value);
            }
            b.jump(3);
        });
        f.block(2, "recurse", |b| {
            let (step_op, step_rhs) = shape.step;
            let sub = b.binary(step_op, n, step_rhs);
            b.name(sub, "sub");
            let call_args: Vec<Operand> = std::iter::once(sub.into())
                .chain(args.iter().skip(1).map(|&a| a.into()))
                .collect();
            let call = b.call(shape.name, &call_args, shape.ty);
            b.name(call, "call");
            if shape.traced {
                b.debug(call);
            }
            let add = if shape.call_first {
                b.binary(shape.update, call, n)
            } else {
                b.binary(shape.update, n, call)
            };
            b.name(add, "add");
            if shape.traced {
                b.debug(add);
            }
            b.store(add, retval);
            b.jump(3);
        });
        f.block(3, "exit", |b| {
            let ret = b.load(retval, shape.ty);
            b.name(ret, "ret");
            if shape.traced {
                b.debug(ret);
            }
            b.ret(ret);
        });
    })
}

/// `sum(n, acc)`: adds `n, n - 1, ..., 1` onto `acc`.
///
/// # Errors
///
/// Returns the builder's error if construction fails.
pub fn sum_accumulate() -> Result<Function> {
    accumulator_shape(&Shape {
        name: "sum",
        ty: Type::I32,
        params: &["n", "acc"],
        guard: CmpPredicate::Eq,
        bound: Constant::I32(0),
        base: Base::Arg(1),
        step: (BinaryOp::Sub, Constant::I32(1)),
        update: BinaryOp::Add,
        call_first: true,
        traced: false,
    })
}

/// `fact(n)` with the constant base case `1`.
///
/// # Errors
///
/// Returns the builder's error if construction fails.
pub fn factorial() -> Result<Function> {
    accumulator_shape(&Shape {
        name: "fact",
        ty: Type::I32,
        params: &["n"],
        guard: CmpPredicate::Sle,
        bound: Constant::I32(1),
        base: Base::Const(Constant::I32(1)),
        step: (BinaryOp::Sub, Constant::I32(1)),
        update: BinaryOp::Mul,
        call_first: true,
        traced: false,
    })
}

/// `parity(n, seed)`: xor of `1..=n` onto `seed`, with the call result as the second
/// update operand.
///
/// # Errors
///
/// Returns the builder's error if construction fails.
pub fn xor_fold() -> Result<Function> {
    accumulator_shape(&Shape {
        name: "parity",
        ty: Type::I32,
        params: &["n", "seed"],
        guard: CmpPredicate::Eq,
        bound: Constant::I32(0),
        base: Base::Arg(1),
        step: (BinaryOp::Sub, Constant::I32(1)),
        update: BinaryOp::Xor,
        call_first: false,
        traced: false,
    })
}

/// `bits(n)`: or of `n, n >> 1, n >> 2, ...` on 64-bit integers.
///
/// # Errors
///
/// Returns the builder's error if construction fails.
pub fn or_fold() -> Result<Function> {
    accumulator_shape(&Shape {
        name: "bits",
        ty: Type::I64,
        params: &["n"],
        guard: CmpPredicate::Sle,
        bound: Constant::I64(0),
        base: Base::Const(Constant::I64(0)),
        step: (BinaryOp::AShr, Constant::I64(1)),
        update: BinaryOp::Or,
        call_first: true,
        traced: false,
    })
}

/// [`sum_accumulate`] with debug markers around the call, the update and the stores.
///
/// # Errors
///
/// Returns the builder's error if construction fails.
pub fn sum_traced() -> Result<Function> {
    accumulator_shape(&Shape {
        name: "sum_traced",
        ty: Type::I32,
        params: &["n", "acc"],
        guard: CmpPredicate::Eq,
        bound: Constant::I32(0),
        base: Base::Arg(1),
        step: (BinaryOp::Sub, Constant::I32(1)),
        update: BinaryOp::Add,
        call_first: true,
        traced: true,
    })
}

/// `countdown(n)`: the update subtracts, which is neither associative nor commutative.
///
/// # Errors
///
/// Returns the builder's error if construction fails.
pub fn sub_update() -> Result<Function> {
    accumulator_shape(&Shape {
        name: "countdown",
        ty: Type::I32,
        params: &["n"],
        guard: CmpPredicate::Eq,
        bound: Constant::I32(0),
        base: Base::Const(Constant::I32(0)),
        step: (BinaryOp::Sub, Constant::I32(1)),
        update: BinaryOp::Sub,
        call_first: true,
        traced: false,
    })
}

/// `halving(n)`: the update divides the call result by `n`.
///
/// # Errors
///
/// Returns the builder's error if construction fails.
pub fn div_update() -> Result<Function> {
    accumulator_shape(&Shape {
        name: "halving",
        ty: Type::I32,
        params: &["n"],
        guard: CmpPredicate::Eq,
        bound: Constant::I32(0),
        base: Base::Const(Constant::I32(1)),
        step: (BinaryOp::Sub, Constant::I32(1)),
        update: BinaryOp::SDiv,
        call_first: true,
        traced: false,
    })
}

/// Self-call and update in a single-parameter function, with `body` emitting the
/// recursive block after the guard.
fn single_recursion<F>(name: &'static str, body: F) -> Result<Function>
where
    F: FnOnce(&mut crate::ir::BlockBuilder<'_>, ValueId, ValueId),
{
    FunctionBuilder::new(name, Type::I32)
        .param("n", Type::I32)
        .build_with(|f| {
            let n = f.arg(0);
            let mut retval = ValueId::default();
            f.block(0, "entry", |b| {
                retval = b.alloca(Type::I32);
                b.name(retval, "retval");
                let cmp = b.cmp_eq(n, Constant::I32(0));
                b.branch(cmp, 1, 2);
            });
            f.block(1, "base", |b| {
                b.store(Constant::I32(1), retval);
                b.jump(3);
            });
            f.block(2, "recurse", |b| body(b, n, retval));
            f.block(3, "exit", |b| {
                let ret = b.load(retval, Type::I32);
                b.ret(ret);
            });
        })
}

/// `doubling(n)`: the update adds the call result to itself.
///
/// # Errors
///
/// Returns the builder's error if construction fails.
pub fn double_use_update() -> Result<Function> {
    single_recursion("doubling", |b, n, retval| {
        let sub = b.sub(n, Constant::I32(1));
        let call = b.call("doubling", &[sub.into()], Type::I32);
        let add = b.add(call, call);
        b.store(add, retval);
        b.jump(3);
    })
}

/// `detached(n)`: the operation following the call does not read its result.
///
/// # Errors
///
/// Returns the builder's error if construction fails.
pub fn detached_update() -> Result<Function> {
    single_recursion("detached", |b, n, retval| {
        let sub = b.sub(n, Constant::I32(1));
        let call = b.call("detached", &[sub.into()], Type::I32);
        let twice = b.add(n, n);
        let add = b.add(twice, call);
        b.store(add, retval);
        b.jump(3);
    })
}

/// `conditional(n)`: a well-formed update, but the recursive block branches.
///
/// # Errors
///
/// Returns the builder's error if construction fails.
pub fn conditional_tail() -> Result<Function> {
    single_recursion("conditional", |b, n, retval| {
        let sub = b.sub(n, Constant::I32(1));
        let call = b.call("conditional", &[sub.into()], Type::I32);
        let add = b.add(call, n);
        b.store(add, retval);
        let odd = b.binary(BinaryOp::And, n, Constant::I32(1));
        let is_odd = b.cmp_eq(odd, Constant::I32(1));
        b.branch(is_odd, 3, 3);
    })
}

/// `max(a, b)`: a diamond without any call.
///
/// # Errors
///
/// Returns the builder's error if construction fails.
pub fn no_recursion() -> Result<Function> {
    FunctionBuilder::new("max", Type::I32)
        .param("a", Type::I32)
        .param("b", Type::I32)
        .build_with(|f| {
            let (a, b_arg) = (f.arg(0), f.arg(1));
            f.block(0, "entry", |b| {
                let less = b.cmp_slt(a, b_arg);
                b.branch(less, 1, 2);
            });
            f.block(1, "take_b", |b| b.jump(3));
            f.block(2, "take_a", |b| b.jump(3));
            f.block(3, "exit", |b| {
                let result = b.phi(Type::I32, &[(b_arg.into(), 1), (a.into(), 2)]);
                b.ret(result);
            });
        })
}

/// `climb(n, acc)`: the second argument changes between calls.
///
/// # Errors
///
/// Returns the builder's error if construction fails.
pub fn multi_argument_chain() -> Result<Function> {
    FunctionBuilder::new("climb", Type::I32)
        .param("n", Type::I32)
        .param("acc", Type::I32)
        .build_with(|f| {
            let (n, acc) = (f.arg(0), f.arg(1));
            let mut retval = ValueId::default();
            f.block(0, "entry", |b| {
                retval = b.alloca(Type::I32);
                let cmp = b.cmp_eq(n, Constant::I32(0));
                b.branch(cmp, 1, 2);
            });
            f.block(1, "base", |b| {
                b.store(acc, retval);
                b.jump(3);
            });
            f.block(2, "recurse", |b| {
                let bump = b.add(acc, Constant::I32(1));
                let sub = b.sub(n, Constant::I32(1));
                let call = b.call("climb", &[sub.into(), bump.into()], Type::I32);
                let add = b.add(call, n);
                b.store(add, retval);
                b.jump(3);
            });
            f.block(3, "exit", |b| {
                let ret = b.load(retval, Type::I32);
                b.ret(ret);
            });
        })
}

/// `broken(n)`: the base case never writes the return slot.
///
/// # Errors
///
/// Returns the builder's error if construction fails.
pub fn base_without_store() -> Result<Function> {
    FunctionBuilder::new("broken", Type::I32)
        .param("n", Type::I32)
        .build_with(|f| {
            let n = f.arg(0);
            let mut retval = ValueId::default();
            f.block(0, "entry", |b| {
                retval = b.alloca(Type::I32);
                let cmp = b.cmp_eq(n, Constant::I32(0));
                b.branch(cmp, 1, 2);
            });
            f.block(1, "base", |b| b.jump(3));
            f.block(2, "recurse", |b| {
                let sub = b.sub(n, Constant::I32(1));
                let call = b.call("broken", &[sub.into()], Type::I32);
                let add = b.add(call, n);
                b.store(add, retval);
                b.jump(3);
            });
            f.block(3, "exit", |b| {
                let ret = b.load(retval, Type::I32);
                b.ret(ret);
            });
        })
}
