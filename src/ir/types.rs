//! Value types and constants.

use std::fmt;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// The type of an IR value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Type {
    /// A one-bit boolean, produced by comparisons.
    Bool,
    /// 32-bit two's complement integer.
    I32,
    /// 64-bit two's complement integer.
    I64,
    /// Pointer to a stack slot created by `alloca`.
    Ptr,
    /// No value. Only valid as a function return type.
    Void,
}

impl Type {
    /// Returns true for the integer types.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::I32 | Self::I64)
    }

    /// Returns the zero value of this type, if it has one.
    #[must_use]
    pub const fn zero(self) -> Option<Constant> {
        match self {
            Self::Bool => Some(Constant::Bool(false)),
            Self::I32 => Some(Constant::I32(0)),
            Self::I64 => Some(Constant::I64(0)),
            Self::Ptr | Self::Void => None,
        }
    }
}

/// A compile-time constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    /// Boolean constant.
    Bool(bool),
    /// 32-bit integer constant.
    I32(i32),
    /// 64-bit integer constant.
    I64(i64),
}

impl Constant {
    /// Returns the type of this constant.
    #[must_use]
    pub const fn ty(&self) -> Type {
        match self {
            Self::Bool(_) => Type::Bool,
            Self::I32(_) => Type::I32,
            Self::I64(_) => Type::I64,
        }
    }

    /// Widens the constant to an `i64`. Booleans map to 0 and 1.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        match *self {
            Self::Bool(b) => b as i64,
            Self::I32(v) => v as i64,
            Self::I64(v) => v,
        }
    }

    /// Builds a constant of type `ty` from an `i64`, truncating to the type's width.
    ///
    /// Returns `None` for types without constants (`ptr`, `void`).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_i64(ty: Type, value: i64) -> Option<Self> {
        match ty {
            Type::Bool => Some(Self::Bool(value & 1 != 0)),
            Type::I32 => Some(Self::I32(value as i32)),
            Type::I64 => Some(Self::I64(value)),
            Type::Ptr | Type::Void => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_i64_truncates() {
        assert_eq!(
            Constant::from_i64(Type::I32, i64::from(i32::MAX) + 1),
            Some(Constant::I32(i32::MIN))
        );
        assert_eq!(Constant::from_i64(Type::Bool, 2), Some(Constant::Bool(false)));
        assert_eq!(Constant::from_i64(Type::Ptr, 0), None);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Type::I32.to_string(), "i32");
        assert_eq!("i64".parse::<Type>().ok(), Some(Type::I64));
        assert!(Type::I64.is_integer());
        assert!(!Type::Bool.is_integer());
    }
}
