//! Column data types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    BigInt,
    /// Boolean.
    Boolean,
    /// Bounded string; the payload is the maximum length in characters.
    Varchar(u32),
    /// 64-bit float.
    Float,
    /// Unbounded string.
    String,
}

impl DataType {
    /// Returns true for `Int`, `BigInt` and `Float`.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::BigInt | Self::Float)
    }

    /// Returns true for `Varchar` and `String`.
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Varchar(_) | Self::String)
    }

    /// Result type of arithmetic between two numeric types.
    ///
    /// Float wins over BigInt, which wins over Int.
    #[must_use]
    pub const fn promote(self, other: Self) -> Option<Self> {
        match (self, other) {
            (Self::Float, o) | (o, Self::Float) if o.is_numeric() => Some(Self::Float),
            (Self::BigInt, o) | (o, Self::BigInt) if o.is_numeric() => Some(Self::BigInt),
            (Self::Int, Self::Int) => Some(Self::Int),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "INT"),
            Self::BigInt => write!(f, "BIGINT"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Varchar(len) => write!(f, "VARCHAR({len})"),
            Self::Float => write!(f, "FLOAT"),
            Self::String => write!(f, "STRING"),
        }
    }
}
