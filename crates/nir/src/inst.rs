//! Function-body instructions, operations and branch targets.

use crate::name::{Global, Local};
use crate::ty::Type;
use crate::val::Val;
use serde::{Deserialize, Serialize};

/// One instruction of a function body.
///
/// Bodies are flat sequences: a `Label` opens a basic block, `Let` binds
/// the result of an operation, and the remaining variants terminate the
/// current block. `Throw` is high-level and must have been lowered away
/// before a backend sees the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inst {
    Label {
        name: Local,
        params: Vec<(Local, Type)>,
    },
    Let {
        name: Local,
        op: Op,
        unwind: Next,
    },
    /// Return. `Val::None` returns void.
    Ret(Val),
    Jump(Next),
    If {
        cond: Val,
        then_dst: Next,
        else_dst: Next,
    },
    Switch {
        scrut: Val,
        default: Next,
        cases: Vec<Next>,
    },
    Throw {
        value: Val,
        unwind: Next,
    },
    Unreachable,
    None,
}

/// Right-hand side of a `Let`.
///
/// The low-level subset runs from `Call` through `Copy`; the remaining
/// variants must have been eliminated by lowering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    Call {
        sig: Type,
        ptr: Val,
        args: Vec<Val>,
    },
    Load {
        ty: Type,
        ptr: Val,
        volatile: bool,
    },
    Store {
        ty: Type,
        ptr: Val,
        value: Val,
        volatile: bool,
    },
    /// Address arithmetic: the first index steps the pointer itself, the
    /// rest navigate into the aggregate.
    Elem {
        ty: Type,
        ptr: Val,
        indexes: Vec<Val>,
    },
    Stackalloc {
        ty: Type,
        /// Element count; `Val::None` allocates a single slot.
        n: Val,
    },
    Extract {
        aggr: Val,
        indexes: Vec<usize>,
    },
    Insert {
        aggr: Val,
        value: Val,
        indexes: Vec<usize>,
    },
    Bin {
        bin: Bin,
        ty: Type,
        l: Val,
        r: Val,
    },
    Comp {
        comp: Comp,
        ty: Type,
        l: Val,
        r: Val,
    },
    Conv {
        conv: Conv,
        ty: Type,
        value: Val,
    },
    Select {
        cond: Val,
        then_v: Val,
        else_v: Val,
    },
    /// Alias of another value; elided during emission.
    Copy { value: Val },

    // High-level operations, eliminated by lowering.
    Classalloc { name: Global },
    Method { obj: Val, name: String },
    Is { ty: Type, obj: Val },
    As { ty: Type, obj: Val },
    Sizeof { ty: Type },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bin {
    Iadd,
    Fadd,
    Isub,
    Fsub,
    Imul,
    Fmul,
    Sdiv,
    Udiv,
    Fdiv,
    Srem,
    Urem,
    Frem,
    Shl,
    Lshr,
    Ashr,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comp {
    Ieq,
    Ine,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
    Feq,
    Fne,
    Fgt,
    Fge,
    Flt,
    Fle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conv {
    Trunc,
    Zext,
    Sext,
    Fptrunc,
    Fpext,
    Fptoui,
    Fptosi,
    Uitofp,
    Sitofp,
    Ptrtoint,
    Inttoptr,
    Bitcast,
}

/// Branch target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Next {
    /// Branch to a block, supplying its parameters.
    Label { name: Local, args: Vec<Val> },
    /// One arm of a `Switch`.
    Case { value: Val, name: Local },
    /// Exception edge of a `Let`: the landing block on unwind.
    Unwind { name: Local },
    None,
}

impl Next {
    pub fn label(name: Local) -> Next {
        Next::Label {
            name,
            args: Vec::new(),
        }
    }
}
