//! Instruction and operation emission.
//!
//! Pointers cross every instruction boundary as `i8*`; typed pointers
//! only exist for the length of one load/store/getelementptr pair, via
//! localized bitcasts. Calls with an unwind edge become `invoke`s, and
//! since LLVM requires `invoke` to terminate its block, each one bumps
//! the current block's split counter and opens a fresh `<name>.<k>`
//! block for the instructions that follow.

use super::Emitter;
use crate::error::CodeGenError;
use std::fmt::Write as _;
use vela_nir::{Bin, Comp, Conv, Inst, Local, Next, Op, Type, Val};

impl Emitter<'_> {
    pub(super) fn gen_inst(&mut self, inst: &Inst) -> Result<(), CodeGenError> {
        match inst {
            Inst::Let { name, op, unwind } => self.gen_let(*name, op, unwind)?,
            Inst::Ret(Val::None) => writeln!(self.buf, "  ret void")?,
            Inst::Ret(v) => {
                let v = self.gen_typed_val(v)?;
                writeln!(self.buf, "  ret {}", v)?;
            }
            Inst::Jump(next) => {
                let next = self.gen_next(next)?;
                writeln!(self.buf, "  br {}", next)?;
            }
            Inst::If {
                cond,
                then_dst,
                else_dst,
            } => {
                let cond = self.gen_val(cond)?;
                let then_dst = self.gen_next(then_dst)?;
                let else_dst = self.gen_next(else_dst)?;
                writeln!(self.buf, "  br i1 {}, {}, {}", cond, then_dst, else_dst)?;
            }
            Inst::Switch {
                scrut,
                default,
                cases,
            } => {
                let scrut = self.gen_typed_val(scrut)?;
                let default = self.gen_next(default)?;
                writeln!(self.buf, "  switch {}, {} [", scrut, default)?;
                for case in cases {
                    let case = self.gen_next(case)?;
                    writeln!(self.buf, "    {}", case)?;
                }
                writeln!(self.buf, "  ]")?;
            }
            Inst::Unreachable => writeln!(self.buf, "  unreachable")?,
            Inst::None => {}
            Inst::Label { .. } | Inst::Throw { .. } => {
                return Err(CodeGenError::unsupported(inst))
            }
        }
        Ok(())
    }

    fn gen_next(&mut self, next: &Next) -> Result<String, CodeGenError> {
        match next {
            Next::Label { name, .. } | Next::Unwind { name } => {
                Ok(format!("label %_{}.0", name.0))
            }
            Next::Case { value, name } => {
                let value = self.gen_typed_val(value)?;
                Ok(format!("{}, label %_{}.0", value, name.0))
            }
            Next::None => Err(CodeGenError::unsupported(next)),
        }
    }

    fn gen_let(&mut self, dst: Local, op: &Op, unwind: &Next) -> Result<(), CodeGenError> {
        if let Op::Copy { .. } = op {
            // elided; uses were rewritten through the copy map
            return Ok(());
        }
        if let Op::Call { sig, ptr, args } = op {
            return self.gen_call(dst, sig, ptr, args, unwind);
        }
        if !matches!(unwind, Next::None) {
            return Err(CodeGenError::Unsupported(format!(
                "unwind edge on non-call op: {:?}",
                op
            )));
        }
        match op {
            Op::Load { ty, ptr, volatile } => {
                let ptr = self.gen_val(ptr)?;
                let ty = self.show_ty(ty)?;
                let cast = self.fresh_local();
                let volatile = if *volatile { "volatile " } else { "" };
                writeln!(self.buf, "  %_{} = bitcast i8* {} to {}*", cast.0, ptr, ty)?;
                writeln!(
                    self.buf,
                    "  %_{} = load {}{}, {}* %_{}",
                    dst.0, volatile, ty, ty, cast.0
                )?;
            }
            Op::Store {
                ty,
                ptr,
                value,
                volatile,
            } => {
                let ptr = self.gen_val(ptr)?;
                let value = self.gen_val(value)?;
                let ty = self.show_ty(ty)?;
                let cast = self.fresh_local();
                let volatile = if *volatile { "volatile " } else { "" };
                writeln!(self.buf, "  %_{} = bitcast i8* {} to {}*", cast.0, ptr, ty)?;
                writeln!(
                    self.buf,
                    "  store {}{} {}, {}* %_{}",
                    volatile, ty, value, ty, cast.0
                )?;
            }
            Op::Elem { ty, ptr, indexes } => {
                if indexes.is_empty() {
                    return Err(CodeGenError::unsupported(op));
                }
                let ptr = self.gen_val(ptr)?;
                let elem = elem_ty(ty, &indexes[1..])?;
                let elem = self.show_ty(&elem)?;
                let ty = self.show_ty(ty)?;
                let indexes = indexes
                    .iter()
                    .map(|i| self.gen_typed_val(i))
                    .collect::<Result<Vec<_>, _>>()?;
                let cast = self.fresh_local();
                let addr = self.fresh_local();
                writeln!(self.buf, "  %_{} = bitcast i8* {} to {}*", cast.0, ptr, ty)?;
                writeln!(
                    self.buf,
                    "  %_{} = getelementptr {}, {}* %_{}, {}",
                    addr.0,
                    ty,
                    ty,
                    cast.0,
                    indexes.join(", ")
                )?;
                writeln!(
                    self.buf,
                    "  %_{} = bitcast {}* %_{} to i8*",
                    dst.0, elem, addr.0
                )?;
            }
            Op::Stackalloc { ty, n } => {
                let ty = self.show_ty(ty)?;
                let slot = self.fresh_local();
                match n {
                    Val::None => writeln!(self.buf, "  %_{} = alloca {}", slot.0, ty)?,
                    n => {
                        let n = self.gen_typed_val(n)?;
                        writeln!(self.buf, "  %_{} = alloca {}, {}", slot.0, ty, n)?;
                    }
                }
                writeln!(
                    self.buf,
                    "  %_{} = bitcast {}* %_{} to i8*",
                    dst.0, ty, slot.0
                )?;
            }
            Op::Extract { aggr, indexes } => {
                let aggr = self.gen_typed_val(aggr)?;
                writeln!(
                    self.buf,
                    "  %_{} = extractvalue {}, {}",
                    dst.0,
                    aggr,
                    join_indexes(indexes)
                )?;
            }
            Op::Insert {
                aggr,
                value,
                indexes,
            } => {
                let aggr = self.gen_typed_val(aggr)?;
                let value = self.gen_typed_val(value)?;
                writeln!(
                    self.buf,
                    "  %_{} = insertvalue {}, {}, {}",
                    dst.0,
                    aggr,
                    value,
                    join_indexes(indexes)
                )?;
            }
            Op::Bin { bin, ty, l, r } => {
                let ty = self.show_ty(ty)?;
                let l = self.gen_val(l)?;
                let r = self.gen_val(r)?;
                writeln!(
                    self.buf,
                    "  %_{} = {} {} {}, {}",
                    dst.0,
                    bin_word(*bin),
                    ty,
                    l,
                    r
                )?;
            }
            Op::Comp { comp, ty, l, r } => {
                let (word, pred) = comp_pred(*comp);
                let ty = self.show_ty(ty)?;
                let l = self.gen_val(l)?;
                let r = self.gen_val(r)?;
                writeln!(
                    self.buf,
                    "  %_{} = {} {} {} {}, {}",
                    dst.0, word, pred, ty, l, r
                )?;
            }
            Op::Conv { conv, ty, value } => {
                let value = self.gen_typed_val(value)?;
                let ty = self.show_ty(ty)?;
                writeln!(
                    self.buf,
                    "  %_{} = {} {} to {}",
                    dst.0,
                    conv_word(*conv),
                    value,
                    ty
                )?;
            }
            Op::Select {
                cond,
                then_v,
                else_v,
            } => {
                let cond = self.gen_val(cond)?;
                let then_v = self.gen_typed_val(then_v)?;
                let else_v = self.gen_typed_val(else_v)?;
                writeln!(
                    self.buf,
                    "  %_{} = select i1 {}, {}, {}",
                    dst.0, cond, then_v, else_v
                )?;
            }
            Op::Call { .. } | Op::Copy { .. } => {}
            Op::Classalloc { .. }
            | Op::Method { .. }
            | Op::Is { .. }
            | Op::As { .. }
            | Op::Sizeof { .. } => return Err(CodeGenError::unsupported(op)),
        }
        Ok(())
    }

    /// Call emission. The callee stays a bare `@"name"` only when it is
    /// a known global whose recorded signature matches the call site;
    /// anything else is first bitcast to the required function-pointer
    /// type. A call with an unwind edge becomes an `invoke` and splits
    /// the current block.
    fn gen_call(
        &mut self,
        dst: Local,
        sig: &Type,
        ptr: &Val,
        args: &[Val],
        unwind: &Next,
    ) -> Result<(), CodeGenError> {
        let Type::Function(arg_tys, ret) = sig else {
            return Err(CodeGenError::unsupported(sig));
        };

        let callee = {
            let target = self.deconstify(ptr)?;
            let direct = match &target {
                Val::Global(name, _) => self.lookup(name)? == *sig,
                _ => false,
            };
            match target {
                Val::Global(name, _) if direct => format!("@\"{}\"", name.show()),
                other => {
                    let value = self.gen_closed_val(&other)?;
                    let fn_ty = self.show_ty(sig)?;
                    let cast = self.fresh_local();
                    writeln!(
                        self.buf,
                        "  %_{} = bitcast i8* {} to {}*",
                        cast.0, value, fn_ty
                    )?;
                    format!("%_{}", cast.0)
                }
            }
        };

        // variadic calls must spell out the whole signature
        let variadic = arg_tys.iter().any(|t| matches!(t, Type::Vararg));
        let printed_ty = if variadic {
            self.show_ty(sig)?
        } else {
            self.show_ty(ret)?
        };

        let args = args
            .iter()
            .map(|a| self.gen_typed_val(a))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let bind = if matches!(**ret, Type::Void) {
            String::new()
        } else {
            format!("%_{} = ", dst.0)
        };

        match unwind {
            Next::None => {
                writeln!(self.buf, "  {}call {} {}({})", bind, printed_ty, callee, args)?;
            }
            Next::Unwind { name } => {
                let split = self.block_split + 1;
                writeln!(
                    self.buf,
                    "  {}invoke {} {}({}) to label %_{}.{} unwind label %_{}.0",
                    bind, printed_ty, callee, args, self.block_name.0, split, name.0
                )?;
                self.block_split = split;
                writeln!(self.buf, "_{}.{}:", self.block_name.0, split)?;
            }
            other => return Err(CodeGenError::unsupported(other)),
        }
        Ok(())
    }
}

/// Element type addressed by the non-leading indexes of an `Elem`.
fn elem_ty(ty: &Type, path: &[Val]) -> Result<Type, CodeGenError> {
    let mut cur = ty;
    for index in path {
        cur = match cur {
            Type::StructValue(_, fields) => {
                let i = const_index(index).ok_or_else(|| CodeGenError::unsupported(index))?;
                fields
                    .get(i)
                    .ok_or_else(|| CodeGenError::unsupported(index))?
            }
            Type::ArrayValue(elem, _) => elem,
            other => return Err(CodeGenError::unsupported(other)),
        };
    }
    Ok(cur.clone())
}

fn const_index(v: &Val) -> Option<usize> {
    match v {
        Val::Byte(x) => usize::try_from(*x).ok(),
        Val::Short(x) => usize::try_from(*x).ok(),
        Val::Int(x) => usize::try_from(*x).ok(),
        Val::Long(x) => usize::try_from(*x).ok(),
        _ => None,
    }
}

fn join_indexes(indexes: &[usize]) -> String {
    indexes
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn bin_word(bin: Bin) -> &'static str {
    match bin {
        Bin::Iadd => "add",
        Bin::Isub => "sub",
        Bin::Imul => "mul",
        Bin::Fadd => "fadd",
        Bin::Fsub => "fsub",
        Bin::Fmul => "fmul",
        Bin::Sdiv => "sdiv",
        Bin::Udiv => "udiv",
        Bin::Fdiv => "fdiv",
        Bin::Srem => "srem",
        Bin::Urem => "urem",
        Bin::Frem => "frem",
        Bin::Shl => "shl",
        Bin::Lshr => "lshr",
        Bin::Ashr => "ashr",
        Bin::And => "and",
        Bin::Or => "or",
        Bin::Xor => "xor",
    }
}

fn comp_pred(comp: Comp) -> (&'static str, &'static str) {
    match comp {
        Comp::Ieq => ("icmp", "eq"),
        Comp::Ine => ("icmp", "ne"),
        Comp::Ugt => ("icmp", "ugt"),
        Comp::Uge => ("icmp", "uge"),
        Comp::Ult => ("icmp", "ult"),
        Comp::Ule => ("icmp", "ule"),
        Comp::Sgt => ("icmp", "sgt"),
        Comp::Sge => ("icmp", "sge"),
        Comp::Slt => ("icmp", "slt"),
        Comp::Sle => ("icmp", "sle"),
        Comp::Feq => ("fcmp", "oeq"),
        Comp::Fne => ("fcmp", "une"),
        Comp::Fgt => ("fcmp", "ogt"),
        Comp::Fge => ("fcmp", "oge"),
        Comp::Flt => ("fcmp", "olt"),
        Comp::Fle => ("fcmp", "ole"),
    }
}

fn conv_word(conv: Conv) -> &'static str {
    match conv {
        Conv::Trunc => "trunc",
        Conv::Zext => "zext",
        Conv::Sext => "sext",
        Conv::Fptrunc => "fptrunc",
        Conv::Fpext => "fpext",
        Conv::Fptoui => "fptoui",
        Conv::Fptosi => "fptosi",
        Conv::Uitofp => "uitofp",
        Conv::Sitofp => "sitofp",
        Conv::Ptrtoint => "ptrtoint",
        Conv::Inttoptr => "inttoptr",
        Conv::Bitcast => "bitcast",
    }
}
