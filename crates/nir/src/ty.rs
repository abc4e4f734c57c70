//! The NIR type algebra.

use crate::name::Global;
use serde::{Deserialize, Serialize};

/// NIR types.
///
/// Backends only accept the low-level subset: `Void`, `Vararg`, `Ptr`,
/// `Bool`, `I(n)`, `Float`, `Double`, `ArrayValue`, `StructValue` and
/// `Function`. The remaining variants are the high-level types the
/// lowering passes are required to eliminate; a backend that encounters
/// one reports the definition as unsupported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Void,
    /// Variadic tail marker inside a `Function` argument list.
    Vararg,
    /// Untyped pointer. All pointers cross instruction boundaries as
    /// `Ptr`; memory operations cast to a concrete type internally.
    Ptr,
    Bool,
    /// Fixed-width integer, e.g. `I(8)`, `I(32)`.
    I(u32),
    Float,
    Double,
    /// Value array of a fixed length.
    ArrayValue(Box<Type>, usize),
    /// Value struct. Named structs print as a reference to their layout
    /// definition; anonymous structs carry their field types inline.
    StructValue(Option<Global>, Vec<Type>),
    /// Function signature: argument types and return type.
    Function(Vec<Type>, Box<Type>),

    // High-level types, eliminated by lowering.
    Unit,
    Nothing,
    Array(Box<Type>),
    Class(Global),
    Trait(Global),
    Module(Global),
}
