//! Printing of types, values and globals; constant interning.
//!
//! Every value goes through [`Emitter::deconstify`] before it is
//! printed: copy aliases are substituted, and `Const` wrappers are
//! replaced by the address of an interned private global. Interning is
//! structural over the deconstified value, so identical constants
//! collapse to one `__const` member no matter where they occur in the
//! shard.

use super::escape;
use super::Emitter;
use crate::error::CodeGenError;
use vela_nir::{Defn, Global, Type, Val};

impl Emitter<'_> {
    /// Render a type. Mentioning a named struct records it as a
    /// dependency so its layout is present in every module that uses it.
    pub(super) fn show_ty(&mut self, ty: &Type) -> Result<String, CodeGenError> {
        Ok(match ty {
            Type::Void => "void".to_string(),
            Type::Vararg => "...".to_string(),
            Type::Ptr => "i8*".to_string(),
            Type::Bool => "i1".to_string(),
            Type::I(width) => format!("i{}", width),
            Type::Float => "float".to_string(),
            Type::Double => "double".to_string(),
            Type::ArrayValue(elem, n) => format!("[{} x {}]", n, self.show_ty(elem)?),
            Type::StructValue(Some(name), _) => {
                let norm = name.normalized();
                self.deps.insert(norm.clone());
                format!("%\"{}\"", norm.show())
            }
            Type::StructValue(None, fields) => {
                if fields.is_empty() {
                    "{}".to_string()
                } else {
                    let fields = fields
                        .iter()
                        .map(|f| self.show_ty(f))
                        .collect::<Result<Vec<_>, _>>()?;
                    format!("{{ {} }}", fields.join(", "))
                }
            }
            Type::Function(args, ret) => {
                let args = args
                    .iter()
                    .map(|a| self.show_ty(a))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("{} ({})", self.show_ty(ret)?, args.join(", "))
            }
            other => return Err(CodeGenError::unsupported(other)),
        })
    }

    /// Type of a value operand.
    pub(super) fn ty_of(&self, v: &Val) -> Result<Type, CodeGenError> {
        Ok(match v {
            Val::True | Val::False => Type::Bool,
            Val::Null => Type::Ptr,
            Val::Zero(t) | Val::Undef(t) => t.clone(),
            Val::Byte(_) => Type::I(8),
            Val::Short(_) => Type::I(16),
            Val::Int(_) => Type::I(32),
            Val::Long(_) => Type::I(64),
            Val::Float(_) => Type::Float,
            Val::Double(_) => Type::Double,
            // zero-terminated on emission, hence the +1
            Val::Chars(s) => Type::ArrayValue(Box::new(Type::I(8)), escape::decoded_len(s) + 1),
            Val::Struct(name, vals) => Type::StructValue(
                name.clone(),
                vals.iter()
                    .map(|v| self.ty_of(v))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Val::Array(elem, vals) => Type::ArrayValue(Box::new(elem.clone()), vals.len()),
            Val::Local(_, t) | Val::Global(_, t) => t.clone(),
            Val::Const(_) => Type::Ptr,
            Val::None => Type::Void,
            other => return Err(CodeGenError::unsupported(other)),
        })
    }

    /// Substitute copy aliases and lift `Const` wrappers to interned
    /// globals, recursively. Idempotent: the result contains neither
    /// `Const` nor aliased locals.
    pub(super) fn deconstify(&mut self, v: &Val) -> Result<Val, CodeGenError> {
        Ok(match v {
            Val::Local(l, _) if self.copies.contains_key(l) => {
                let aliased = self.copies[l].clone();
                self.deconstify(&aliased)?
            }
            Val::Struct(name, vals) => Val::Struct(name.clone(), self.deconstify_all(vals)?),
            Val::Array(elem, vals) => Val::Array(elem.clone(), self.deconstify_all(vals)?),
            Val::Const(inner) => {
                let closed = self.deconstify(inner)?;
                let name = self.const_for(closed)?;
                Val::Global(name, Type::Ptr)
            }
            other => other.clone(),
        })
    }

    fn deconstify_all(&mut self, vals: &[Val]) -> Result<Vec<Val>, CodeGenError> {
        vals.iter().map(|v| self.deconstify(v)).collect()
    }

    /// Intern a deconstified constant, returning its global name.
    pub(super) fn const_for(&mut self, v: Val) -> Result<Global, CodeGenError> {
        if let Some(name) = self.const_map.get(&v) {
            return Ok(name.clone());
        }
        let name = Global::member(Global::top("__const"), self.const_map.len().to_string());
        self.const_ty.insert(name.clone(), self.ty_of(&v)?);
        self.const_map.insert(v, name.clone());
        Ok(name)
    }

    /// Type of a referenced global, recording it as a shard dependency.
    /// Interned constants are served from the emitter's own table.
    pub(super) fn lookup(&mut self, name: &Global) -> Result<Type, CodeGenError> {
        if name.top_id() == "__const" {
            return self
                .const_ty
                .get(name)
                .cloned()
                .ok_or_else(|| CodeGenError::MissingSymbol(name.show()));
        }
        let norm = name.normalized();
        self.deps.insert(norm.clone());
        match self.env.get(&norm) {
            Some(Defn::Var { ty, .. }) | Some(Defn::Const { ty, .. }) => Ok(ty.clone()),
            Some(Defn::Declare { sig, .. }) | Some(Defn::Define { sig, .. }) => Ok(sig.clone()),
            Some(Defn::Struct { name, fields, .. }) => {
                Ok(Type::StructValue(Some(name.clone()), fields.clone()))
            }
            None => Err(CodeGenError::MissingSymbol(norm.show())),
        }
    }

    pub(super) fn gen_val(&mut self, v: &Val) -> Result<String, CodeGenError> {
        let v = self.deconstify(v)?;
        self.gen_closed_val(&v)
    }

    pub(super) fn gen_typed_val(&mut self, v: &Val) -> Result<String, CodeGenError> {
        let v = self.deconstify(v)?;
        let ty = self.ty_of(&v)?;
        let ty = self.show_ty(&ty)?;
        Ok(format!("{} {}", ty, self.gen_closed_val(&v)?))
    }

    /// Print a value that already went through `deconstify`.
    pub(super) fn gen_closed_val(&mut self, v: &Val) -> Result<String, CodeGenError> {
        Ok(match v {
            Val::True => "true".to_string(),
            Val::False => "false".to_string(),
            Val::Null => "null".to_string(),
            Val::Zero(_) => "zeroinitializer".to_string(),
            Val::Undef(_) => "undef".to_string(),
            Val::Byte(x) => x.to_string(),
            Val::Short(x) => x.to_string(),
            Val::Int(x) => x.to_string(),
            Val::Long(x) => x.to_string(),
            // IEEE hex is the one decimal-free form that is exact for
            // both float and double
            Val::Float(x) => format!("0x{:016X}", (f64::from(*x)).to_bits()),
            Val::Double(x) => format!("0x{:016X}", x.to_bits()),
            Val::Chars(s) => format!("c\"{}\\00\"", escape::encode(&escape::decode(s))),
            Val::Struct(_, vals) => self.gen_aggregate(vals, "{ ", " }", "{}")?,
            Val::Array(_, vals) => self.gen_aggregate(vals, "[", "]", "[]")?,
            Val::Local(l, _) => format!("%_{}", l.0),
            Val::Global(name, _) => {
                let ty = self.lookup(name)?;
                let ty = self.show_ty(&ty)?;
                format!("bitcast ({}* @\"{}\" to i8*)", ty, name.show())
            }
            other => return Err(CodeGenError::unsupported(other)),
        })
    }

    fn gen_aggregate(
        &mut self,
        vals: &[Val],
        open: &str,
        close: &str,
        empty: &str,
    ) -> Result<String, CodeGenError> {
        if vals.is_empty() {
            return Ok(empty.to_string());
        }
        let elems = vals
            .iter()
            .map(|v| {
                let ty = self.ty_of(v)?;
                let ty = self.show_ty(&ty)?;
                Ok(format!("{} {}", ty, self.gen_closed_val(v)?))
            })
            .collect::<Result<Vec<_>, CodeGenError>>()?;
        Ok(format!("{}{}{}", open, elems.join(", "), close))
    }
}
