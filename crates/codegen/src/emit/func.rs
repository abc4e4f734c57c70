//! Function definition emission: headers, blocks, phis, landing pads.

use super::cfg;
use super::defn::inline_attr;
use super::runtime;
use super::Emitter;
use crate::error::CodeGenError;
use std::fmt::Write as _;
use vela_nir::{Attrs, Global, Inst, Op, Type};

impl Emitter<'_> {
    pub(super) fn gen_define(
        &mut self,
        attrs: &Attrs,
        name: &Global,
        sig: &Type,
        insts: &[Inst],
    ) -> Result<(), CodeGenError> {
        let Type::Function(_, ret) = sig else {
            return Err(CodeGenError::unsupported(sig));
        };

        // Copy aliases are collected up front; their Lets emit nothing
        // and every use is substituted during deconstify.
        self.copies.clear();
        for inst in insts {
            if let Inst::Let {
                name: dst,
                op: Op::Copy { value },
                ..
            } = inst
            {
                self.copies.insert(*dst, value.clone());
            }
        }
        self.fresh = next_free_local(insts);

        let graph = cfg::Graph::build(insts)?;

        // Parameter names come from the entry block's label parameters
        // so the header lines up with the body.
        let mut params = Vec::new();
        for (local, ty) in graph.blocks[0].params {
            let ty = self.show_ty(ty)?;
            params.push(format!("{} %_{}", ty, local.0));
        }
        let ret = self.show_ty(ret)?;
        writeln!(
            self.buf,
            "define {} @\"{}\"({}){} {} {{",
            ret,
            name.show(),
            params.join(", "),
            inline_attr(attrs),
            runtime::personality()
        )?;
        for (i, block) in graph.blocks.iter().enumerate() {
            self.gen_block(&graph, block, i == 0)?;
        }
        writeln!(self.buf, "}}")?;
        writeln!(self.buf)?;

        self.copies.clear();
        Ok(())
    }

    fn gen_block(
        &mut self,
        graph: &cfg::Graph<'_>,
        block: &cfg::Block<'_>,
        is_entry: bool,
    ) -> Result<(), CodeGenError> {
        self.block_name = block.name;
        self.block_split = 0;
        writeln!(self.buf, "_{}.0:", block.name.0)?;

        if block.handler {
            self.gen_landing_pad(block)?;
            self.block_split = 1;
        } else if !is_entry {
            let preds = graph
                .preds
                .get(&block.name)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            for (k, (param, ty)) in block.params.iter().enumerate() {
                let ty = self.show_ty(ty)?;
                let mut phi = format!("  %_{} = phi {}", param.0, ty);
                for (i, edge) in preds.iter().enumerate() {
                    let arg = edge.args.get(k).ok_or_else(|| {
                        CodeGenError::Unsupported(format!(
                            "branch from _{} into _{} misses argument {}",
                            edge.pred.0, block.name.0, k
                        ))
                    })?;
                    let value = self.gen_val(arg)?;
                    let split = graph.splits.get(&edge.pred).copied().unwrap_or(0);
                    let sep = if i == 0 { " " } else { ", " };
                    write!(phi, "{}[ {}, %_{}.{} ]", sep, value, edge.pred.0, split)?;
                }
                writeln!(self.buf, "{}", phi)?;
            }
        }

        for inst in block.insts {
            self.gen_inst(inst)?;
        }
        Ok(())
    }

    /// Fixed landing-pad prologue of an exception handler.
    ///
    /// The unwinder delivers exceptions inside the runtime's C++ wrapper
    /// object; the pad selects on the wrapper's typeinfo, resumes on any
    /// other exception, and on match unwraps the payload pointer at
    /// offset 1 into the handler's block parameter. The success
    /// continuation is the handler's first split (`<name>.1`).
    fn gen_landing_pad(&mut self, block: &cfg::Block<'_>) -> Result<(), CodeGenError> {
        let [(exc, _)] = block.params else {
            return Err(CodeGenError::Unsupported(format!(
                "exception handler _{} must take exactly the exception value",
                block.name.0
            )));
        };
        let b = block.name.0;
        let exc = exc.0;
        let ti = runtime::typeinfo_cast();
        writeln!(
            self.buf,
            "  %_{b}.rec = landingpad {{ i8*, i32 }} catch i8* {ti}"
        )?;
        writeln!(self.buf, "  %_{b}.r0 = extractvalue {{ i8*, i32 }} %_{b}.rec, 0")?;
        writeln!(self.buf, "  %_{b}.r1 = extractvalue {{ i8*, i32 }} %_{b}.rec, 1")?;
        writeln!(self.buf, "  %_{b}.id = call i32 @llvm.eh.typeid.for(i8* {ti})")?;
        writeln!(self.buf, "  %_{b}.cmp = icmp eq i32 %_{b}.r1, %_{b}.id")?;
        writeln!(
            self.buf,
            "  br i1 %_{b}.cmp, label %_{b}.1, label %_{b}.fail"
        )?;
        writeln!(self.buf, "_{b}.fail:")?;
        writeln!(self.buf, "  resume {{ i8*, i32 }} %_{b}.rec")?;
        writeln!(self.buf, "_{b}.1:")?;
        writeln!(self.buf, "  %_{b}.w0 = call i8* @__cxa_begin_catch(i8* %_{b}.r0)")?;
        writeln!(self.buf, "  %_{b}.w1 = bitcast i8* %_{b}.w0 to i8**")?;
        writeln!(self.buf, "  %_{b}.w2 = getelementptr i8*, i8** %_{b}.w1, i32 1")?;
        writeln!(self.buf, "  %_{exc} = load i8*, i8** %_{b}.w2")?;
        writeln!(self.buf, "  call void @__cxa_end_catch()")?;
        Ok(())
    }
}

/// First register id above everything the function binds itself.
fn next_free_local(insts: &[Inst]) -> u64 {
    let mut max = 0;
    for inst in insts {
        match inst {
            Inst::Label { name, params } => {
                max = max.max(name.0);
                for (param, _) in params {
                    max = max.max(param.0);
                }
            }
            Inst::Let { name, .. } => max = max.max(name.0),
            _ => {}
        }
    }
    max + 1
}
