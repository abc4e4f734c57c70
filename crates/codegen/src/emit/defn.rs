//! Definition dispatch, prelude assembly and extern declarations.

use super::runtime;
use super::Emitter;
use crate::error::CodeGenError;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use vela_nir::{Attrs, Defn, Global, Inline, Type, Val};

/// Emission order of definition kinds: layouts first, then data, then
/// function headers, then bodies.
fn kind_rank(defn: &Defn) -> usize {
    match defn {
        Defn::Struct { .. } => 0,
        Defn::Const { .. } => 1,
        Defn::Var { .. } => 2,
        Defn::Declare { .. } => 3,
        Defn::Define { .. } => 4,
    }
}

pub(super) fn inline_attr(attrs: &Attrs) -> &'static str {
    match attrs.inline {
        Inline::May => "",
        Inline::Hint => " inlinehint",
        Inline::No => " noinline",
        Inline::Always => " alwaysinline",
    }
}

impl Emitter<'_> {
    /// Emit a whole shard and assemble the final module text.
    ///
    /// Bodies are emitted first so that constant interning and
    /// dependency discovery have run by the time the prelude is built;
    /// the returned text is `prelude || bodies`.
    pub fn gen_module(mut self, defns: &[Defn]) -> Result<String, CodeGenError> {
        for rank in 0..5 {
            for defn in defns.iter().filter(|d| kind_rank(d) == rank) {
                self.gen_defn(defn)?;
            }
        }
        let mut module = self.gen_prelude()?;
        module.push_str(&self.buf);
        Ok(module)
    }

    fn gen_defn(&mut self, defn: &Defn) -> Result<(), CodeGenError> {
        if !self.generated.insert(defn.name().normalized()) {
            return Ok(());
        }
        match defn {
            Defn::Struct { name, fields, .. } => {
                let line = self.struct_line(name, fields)?;
                writeln!(self.buf, "{}", line)?;
                writeln!(self.buf)?;
            }
            Defn::Var { name, ty, rhs, .. } => self.gen_global(name, ty, rhs, false)?,
            Defn::Const { name, ty, rhs, .. } => self.gen_global(name, ty, rhs, true)?,
            Defn::Declare { attrs, name, sig } => {
                let line = self.declare_line(attrs, name, sig)?;
                writeln!(self.buf, "{}", line)?;
                writeln!(self.buf)?;
            }
            Defn::Define {
                attrs,
                name,
                sig,
                insts,
            } => self.gen_define(attrs, name, sig, insts)?,
        }
        Ok(())
    }

    fn struct_line(&mut self, name: &Global, fields: &[Type]) -> Result<String, CodeGenError> {
        let fields = fields
            .iter()
            .map(|f| self.show_ty(f))
            .collect::<Result<Vec<_>, _>>()?;
        if fields.is_empty() {
            Ok(format!("%\"{}\" = type {{}}", name.show()))
        } else {
            Ok(format!(
                "%\"{}\" = type {{ {} }}",
                name.show(),
                fields.join(", ")
            ))
        }
    }

    /// `Var`/`Const` emission. A definition with no right-hand side is a
    /// header declaration and prints its type only.
    fn gen_global(
        &mut self,
        name: &Global,
        ty: &Type,
        rhs: &Val,
        constant: bool,
    ) -> Result<(), CodeGenError> {
        let keyword = if constant { "constant" } else { "global" };
        if matches!(rhs, Val::None) {
            let ty = self.show_ty(ty)?;
            writeln!(
                self.buf,
                "@\"{}\" = external {} {}",
                name.show(),
                keyword,
                ty
            )?;
        } else {
            let init = self.gen_typed_val(rhs)?;
            writeln!(
                self.buf,
                "@\"{}\" = hidden {} {}",
                name.show(),
                keyword,
                init
            )?;
        }
        writeln!(self.buf)?;
        Ok(())
    }

    pub(super) fn declare_line(
        &mut self,
        attrs: &Attrs,
        name: &Global,
        sig: &Type,
    ) -> Result<String, CodeGenError> {
        let Type::Function(args, ret) = sig else {
            return Err(CodeGenError::unsupported(sig));
        };
        let args = args
            .iter()
            .map(|a| self.show_ty(a))
            .collect::<Result<Vec<_>, _>>()?;
        let ret = self.show_ty(ret)?;
        Ok(format!(
            "declare {} @\"{}\"({}){}",
            ret,
            name.show(),
            args.join(", "),
            inline_attr(attrs)
        ))
    }

    fn gen_prelude(&mut self) -> Result<String, CodeGenError> {
        let mut out = String::new();
        writeln!(out, "; ModuleID = '{}'", self.module_id)?;
        if !self.triple.is_empty() {
            writeln!(out, "target triple = \"{}\"", self.triple)?;
        }
        writeln!(out)?;
        runtime::emit_runtime_decls(&mut out)?;
        writeln!(out)?;

        // Interned constants, sorted by emitted name. Printing them can
        // still grow `deps` (a constant may hold global addresses), so
        // this precedes the dependency pass.
        let mut consts: Vec<(Global, Val)> = self
            .const_map
            .iter()
            .map(|(v, g)| (g.clone(), v.clone()))
            .collect();
        consts.sort_by_cached_key(|(name, _)| name.show());
        let had_consts = !consts.is_empty();
        for (name, value) in consts {
            let ty = self
                .const_ty
                .get(&name)
                .cloned()
                .ok_or_else(|| CodeGenError::MissingSymbol(name.show()))?;
            let ty = self.show_ty(&ty)?;
            let value = self.gen_val(&value)?;
            writeln!(
                out,
                "@\"{}\" = private unnamed_addr constant {} {}",
                name.show(),
                ty,
                value
            )?;
        }
        if had_consts {
            writeln!(out)?;
        }

        self.gen_dep_decls(&mut out)?;
        Ok(out)
    }

    /// Extern declarations for everything referenced but not defined in
    /// this shard. Runs to a fixpoint: declaring an extern global can
    /// mention named struct types that are themselves new dependencies.
    fn gen_dep_decls(&mut self, out: &mut String) -> Result<(), CodeGenError> {
        let mut emitted: BTreeSet<Global> = BTreeSet::new();
        let mut wrote = false;
        loop {
            let pending: Vec<Global> = self
                .deps
                .iter()
                .filter(|n| !self.generated.contains(*n) && !emitted.contains(*n))
                .cloned()
                .collect();
            if pending.is_empty() {
                break;
            }
            for name in pending {
                emitted.insert(name.clone());
                let defn = self
                    .env
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| CodeGenError::MissingSymbol(name.show()))?;
                self.gen_extern_decl(out, &defn)?;
                wrote = true;
            }
        }
        if wrote {
            writeln!(out)?;
        }
        Ok(())
    }

    fn gen_extern_decl(&mut self, out: &mut String, defn: &Defn) -> Result<(), CodeGenError> {
        match defn {
            // layouts are needed verbatim wherever they are mentioned
            Defn::Struct { name, fields, .. } => {
                let line = self.struct_line(name, fields)?;
                writeln!(out, "{}", line)?;
            }
            Defn::Var { name, ty, .. } => {
                let ty = self.show_ty(ty)?;
                writeln!(out, "@\"{}\" = external global {}", name.show(), ty)?;
            }
            Defn::Const { name, ty, .. } => {
                let ty = self.show_ty(ty)?;
                writeln!(out, "@\"{}\" = external constant {}", name.show(), ty)?;
            }
            Defn::Declare { attrs, name, sig } | Defn::Define { attrs, name, sig, .. } => {
                let line = self.declare_line(attrs, name, sig)?;
                writeln!(out, "{}", line)?;
            }
        }
        Ok(())
    }
}
