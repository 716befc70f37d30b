// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT
use serde::{Deserialize, Serialize};

/// Width of a pointer in bits. The IR only models 64-bit targets.
pub const POINTER_WIDTH: u32 = 64;

/// Widest integer type the IR supports.
pub const MAX_INT_WIDTH: u32 = 64;

/// First class types of the IR.
///
/// Integers are limited to 64 bits, which is enough for every scalar the engine
/// instruments. Booleans are represented as `i1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Void,
    Int { width: u32 },
    Ptr,
}

/// Constructors
impl Type {
    pub const fn bool() -> Type {
        Type::Int { width: 1 }
    }

    pub const fn int(width: u32) -> Type {
        Type::Int { width }
    }

    pub const fn i8() -> Type {
        Type::int(8)
    }

    pub const fn i32() -> Type {
        Type::int(32)
    }

    pub const fn i64() -> Type {
        Type::int(64)
    }
}

/// Predicates
impl Type {
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Int { width: 1 })
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int { .. })
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, Type::Ptr)
    }
}

/// Layout
impl Type {
    /// Number of bits in a value of this type. `None` for `void`.
    pub fn bit_width(&self) -> Option<u32> {
        match self {
            Type::Void => None,
            Type::Int { width } => Some(*width),
            Type::Ptr => Some(POINTER_WIDTH),
        }
    }

    /// Number of bytes this type occupies in memory. Booleans take a full byte.
    pub fn byte_size(&self) -> u64 {
        match self.bit_width() {
            None => 0,
            Some(bits) => u64::from(bits.div_ceil(8)),
        }
    }
}
