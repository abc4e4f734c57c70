//! Top-level definitions.

use crate::inst::Inst;
use crate::name::Global;
use crate::ty::Type;
use crate::val::Val;
use serde::{Deserialize, Serialize};

/// Inlining hint carried on function definitions and declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Inline {
    /// No constraint; the optimizer decides.
    #[default]
    May,
    Hint,
    No,
    Always,
}

/// Definition attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attrs {
    pub inline: Inline,
}

/// A top-level NIR definition.
///
/// `Var`/`Const` with `rhs: Val::None` are header declarations for
/// globals defined elsewhere; they carry their type only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Defn {
    Struct {
        attrs: Attrs,
        name: Global,
        fields: Vec<Type>,
    },
    Var {
        attrs: Attrs,
        name: Global,
        ty: Type,
        rhs: Val,
    },
    Const {
        attrs: Attrs,
        name: Global,
        ty: Type,
        rhs: Val,
    },
    Declare {
        attrs: Attrs,
        name: Global,
        sig: Type,
    },
    Define {
        attrs: Attrs,
        name: Global,
        sig: Type,
        insts: Vec<Inst>,
    },
}

impl Defn {
    pub fn name(&self) -> &Global {
        match self {
            Defn::Struct { name, .. }
            | Defn::Var { name, .. }
            | Defn::Const { name, .. }
            | Defn::Declare { name, .. }
            | Defn::Define { name, .. } => name,
        }
    }

    pub fn attrs(&self) -> &Attrs {
        match self {
            Defn::Struct { attrs, .. }
            | Defn::Var { attrs, .. }
            | Defn::Const { attrs, .. }
            | Defn::Declare { attrs, .. }
            | Defn::Define { attrs, .. } => attrs,
        }
    }
}
