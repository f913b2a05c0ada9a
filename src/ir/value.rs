//! Handles, value definitions and operands.
//!
//! Every entity of a [`Function`](crate::ir::Function) lives in a `slotmap` arena and is
//! referred to by a generational key. A key that outlives its entity never resolves
//! again, so a dangling reference shows up as a lookup failure instead of aliasing a
//! newer entity.

use slotmap::new_key_type;

use crate::ir::{Constant, Type};

new_key_type! {
    /// Handle of a basic block.
    pub struct BlockId;
    /// Handle of a non-terminator instruction.
    pub struct InstId;
    /// Handle of an SSA value (argument, instruction result or phi result).
    pub struct ValueId;
}

/// Where a value is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueDef {
    /// The n-th function argument.
    Argument(usize),
    /// The result of an instruction.
    Instruction(InstId),
    /// The result of a phi node at the start of the given block.
    Phi(BlockId),
}

/// Metadata of an SSA value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueData {
    /// Type of the value.
    pub ty: Type,
    /// Defining entity.
    pub def: ValueDef,
    /// Optional source-level name used by the printer.
    pub name: Option<String>,
}

impl ValueData {
    /// Creates value metadata.
    #[must_use]
    pub fn new(ty: Type, def: ValueDef, name: Option<String>) -> Self {
        Self { ty, def, name }
    }

    /// Returns the argument index if this value is a function argument.
    #[must_use]
    pub const fn argument_index(&self) -> Option<usize> {
        match self.def {
            ValueDef::Argument(index) => Some(index),
            _ => None,
        }
    }
}

/// An operand of an instruction, terminator or phi node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Reference to an SSA value.
    Value(ValueId),
    /// An immediate constant.
    Const(Constant),
    /// An explicitly undefined value of the given type.
    Undef(Type),
}

impl Operand {
    /// Returns the referenced value, if any.
    #[must_use]
    pub const fn as_value(&self) -> Option<ValueId> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the constant, if this operand is one.
    #[must_use]
    pub const fn as_const(&self) -> Option<Constant> {
        match self {
            Self::Const(c) => Some(*c),
            _ => None,
        }
    }

    /// Returns true if this operand references `value`.
    #[must_use]
    pub fn is_value(&self, value: ValueId) -> bool {
        self.as_value() == Some(value)
    }

    /// Redirects this operand to `new` if it currently references `old`.
    ///
    /// Returns true if the operand was rewritten.
    pub fn replace(&mut self, old: ValueId, new: Operand) -> bool {
        if self.is_value(old) {
            *self = new;
            true
        } else {
            false
        }
    }
}

impl From<ValueId> for Operand {
    fn from(value: ValueId) -> Self {
        Self::Value(value)
    }
}

impl From<Constant> for Operand {
    fn from(value: Constant) -> Self {
        Self::Const(value)
    }
}
