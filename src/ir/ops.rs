//! Instruction operations.
//!
//! [`Op`] is the payload of every non-terminator instruction. Binary operators carry
//! algebraic properties as [`OpFlags`], which is what the accumulator detector keys on.
//!
//! # Operand Access
//!
//! All operations expose their operands uniformly through [`Op::operands`] and
//! [`Op::replace_uses`], so use-def rewriting never needs to know the opcode.

use std::fmt;

use bitflags::bitflags;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::ir::{Constant, Operand, Type, ValueId};

bitflags! {
    /// Algebraic properties of a binary operator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpFlags: u8 {
        /// `(a op b) op c == a op (b op c)`
        const ASSOCIATIVE = 0b0000_0001;
        /// `a op b == b op a`
        const COMMUTATIVE = 0b0000_0010;
        /// May trap for some inputs (division by zero).
        const MAY_TRAP = 0b0000_0100;
    }
}

/// Binary integer operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    /// Wrapping addition.
    Add,
    /// Wrapping subtraction.
    Sub,
    /// Wrapping multiplication.
    Mul,
    /// Signed division.
    SDiv,
    /// Signed remainder.
    SRem,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise exclusive or.
    Xor,
    /// Shift left.
    Shl,
    /// Arithmetic shift right.
    AShr,
}

impl BinaryOp {
    /// Returns the algebraic properties of this operator.
    #[must_use]
    pub const fn flags(self) -> OpFlags {
        match self {
            Self::Add | Self::Mul | Self::And | Self::Or | Self::Xor => {
                OpFlags::ASSOCIATIVE.union(OpFlags::COMMUTATIVE)
            }
            Self::SDiv | Self::SRem => OpFlags::MAY_TRAP,
            Self::Sub | Self::Shl | Self::AShr => OpFlags::empty(),
        }
    }

    /// Returns true if the operator is both associative and commutative.
    #[must_use]
    pub const fn is_associative_commutative(self) -> bool {
        self.flags()
            .contains(OpFlags::ASSOCIATIVE.union(OpFlags::COMMUTATIVE))
    }

    /// Applies the operator to two constants of the same integer type.
    ///
    /// Arithmetic wraps at the type's width. Returns `None` on type mismatch, for
    /// non-integer operands and for division or remainder by zero.
    #[must_use]
    pub fn apply(self, lhs: Constant, rhs: Constant) -> Option<Constant> {
        match (lhs, rhs) {
            (Constant::I32(a), Constant::I32(b)) => {
                let value = match self {
                    Self::Add => a.wrapping_add(b),
                    Self::Sub => a.wrapping_sub(b),
                    Self::Mul => a.wrapping_mul(b),
                    Self::SDiv => a.checked_div(b)?,
                    Self::SRem => a.checked_rem(b)?,
                    Self::And => a & b,
                    Self::Or => a | b,
                    Self::Xor => a ^ b,
                    #[allow(clippy::cast_sign_loss)]
                    Self::Shl => a.wrapping_shl(b as u32),
                    #[allow(clippy::cast_sign_loss)]
                    Self::AShr => a.wrapping_shr(b as u32),
                };
                Some(Constant::I32(value))
            }
            (Constant::I64(a), Constant::I64(b)) => {
                let value = match self {
                    Self::Add => a.wrapping_add(b),
                    Self::Sub => a.wrapping_sub(b),
                    Self::Mul => a.wrapping_mul(b),
                    Self::SDiv => a.checked_div(b)?,
                    Self::SRem => a.checked_rem(b)?,
                    Self::And => a & b,
                    Self::Or => a | b,
                    Self::Xor => a ^ b,
                    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                    Self::Shl => a.wrapping_shl(b as u32),
                    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                    Self::AShr => a.wrapping_shr(b as u32),
                };
                Some(Constant::I64(value))
            }
            (Constant::Bool(a), Constant::Bool(b)) => match self {
                Self::And => Some(Constant::Bool(a & b)),
                Self::Or => Some(Constant::Bool(a | b)),
                Self::Xor => Some(Constant::Bool(a ^ b)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Signed integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum CmpPredicate {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Signed less than.
    Slt,
    /// Signed less than or equal.
    Sle,
    /// Signed greater than.
    Sgt,
    /// Signed greater than or equal.
    Sge,
}

impl CmpPredicate {
    /// Evaluates the predicate on two constants of the same type.
    #[must_use]
    pub fn evaluate(self, lhs: Constant, rhs: Constant) -> Option<bool> {
        if lhs.ty() != rhs.ty() {
            return None;
        }
        let (a, b) = (lhs.as_i64(), rhs.as_i64());
        Some(match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Slt => a < b,
            Self::Sle => a <= b,
            Self::Sgt => a > b,
            Self::Sge => a >= b,
        })
    }
}

/// Target of a call instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Callee {
    /// A function of the module, referenced by name.
    Direct(String),
    /// A computed function pointer. Never treated as recursion.
    Indirect(Operand),
}

impl Callee {
    /// Returns the function name of a direct call.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Direct(name) => Some(name),
            Self::Indirect(_) => None,
        }
    }
}

/// The operation performed by a non-terminator instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Binary arithmetic or bitwise operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
    },
    /// Integer comparison producing a `bool`.
    Cmp {
        /// Predicate.
        predicate: CmpPredicate,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
    },
    /// Function call.
    Call {
        /// Called function.
        callee: Callee,
        /// Call arguments in parameter order.
        args: Vec<Operand>,
    },
    /// Reserves a stack slot of the given type and yields a pointer to it.
    Alloca {
        /// Type of the slot.
        ty: Type,
    },
    /// Reads a stack slot.
    Load {
        /// Pointer to the slot.
        ptr: Operand,
        /// Type of the loaded value.
        ty: Type,
    },
    /// Writes a stack slot.
    Store {
        /// Stored value.
        value: Operand,
        /// Pointer to the slot.
        ptr: Operand,
    },
    /// Debug-only marker attached to a value. Has no runtime effect.
    Debug {
        /// Described value.
        value: Operand,
    },
}

impl Op {
    /// Returns all operands in a fixed order.
    #[must_use]
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Self::Binary { lhs, rhs, .. } | Self::Cmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            Self::Call { callee, args } => {
                let mut ops = Vec::with_capacity(args.len() + 1);
                if let Callee::Indirect(target) = callee {
                    ops.push(*target);
                }
                ops.extend(args.iter().copied());
                ops
            }
            Self::Alloca { .. } => Vec::new(),
            Self::Load { ptr, .. } => vec![*ptr],
            Self::Store { value, ptr } => vec![*value, *ptr],
            Self::Debug { value } => vec![*value],
        }
    }

    /// Returns the SSA values used by this operation.
    #[must_use]
    pub fn uses(&self) -> Vec<ValueId> {
        self.operands()
            .iter()
            .filter_map(Operand::as_value)
            .collect()
    }

    /// Mutable access to every operand.
    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Self::Binary { lhs, rhs, .. } | Self::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
            Self::Call { callee, args } => {
                let mut ops: Vec<&mut Operand> = Vec::with_capacity(args.len() + 1);
                if let Callee::Indirect(target) = callee {
                    ops.push(target);
                }
                ops.extend(args.iter_mut());
                ops
            }
            Self::Alloca { .. } => Vec::new(),
            Self::Load { ptr, .. } => vec![ptr],
            Self::Store { value, ptr } => vec![value, ptr],
            Self::Debug { value } => vec![value],
        }
    }

    /// Redirects every use of `old` to `new`.
    ///
    /// Returns the number of operands rewritten.
    pub fn replace_uses(&mut self, old: ValueId, new: Operand) -> usize {
        self.operands_mut()
            .into_iter()
            .map(|op| op.replace(old, new))
            .filter(|&replaced| replaced)
            .count()
    }

    /// Returns true for debug-only markers.
    #[must_use]
    pub const fn is_debug(&self) -> bool {
        matches!(self, Self::Debug { .. })
    }

    /// Returns true if the operation writes memory, calls out, or may trap.
    #[must_use]
    pub fn has_side_effects(&self) -> bool {
        match self {
            Self::Store { .. } | Self::Call { .. } => true,
            Self::Binary { op, .. } => op.flags().contains(OpFlags::MAY_TRAP),
            Self::Cmp { .. } | Self::Alloca { .. } | Self::Load { .. } | Self::Debug { .. } => {
                false
            }
        }
    }

    /// Returns the binary operator and operands if this is a binary operation.
    #[must_use]
    pub const fn as_binary(&self) -> Option<(BinaryOp, Operand, Operand)> {
        match self {
            Self::Binary { op, lhs, rhs } => Some((*op, *lhs, *rhs)),
            _ => None,
        }
    }

    /// Returns true if this is a direct call to the function named `name`.
    #[must_use]
    pub fn is_direct_call_to(&self, name: &str) -> bool {
        matches!(self, Self::Call { callee: Callee::Direct(callee), .. } if callee == name)
    }

    /// Returns the mnemonic used by the printer.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Binary { op, .. } => (*op).into(),
            Self::Cmp { .. } => "cmp",
            Self::Call { .. } => "call",
            Self::Alloca { .. } => "alloca",
            Self::Load { .. } => "load",
            Self::Store { .. } => "store",
            Self::Debug { .. } => "dbg",
        }
    }
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(name) => write!(f, "@{name}"),
            Self::Indirect(_) => f.write_str("<indirect>"),
        }
    }
}
