//! Fixed runtime support declarations.
//!
//! Exceptions raised by Vela code travel through the C++ unwinder inside
//! a `vela::ExceptionWrapper` object; every module therefore declares the
//! Itanium personality, the catch intrinsics, and the wrapper's typeinfo
//! symbol. The runtime link step provides all of these.

use crate::error::CodeGenError;
use std::fmt::Write as _;

/// Itanium-mangled typeinfo of `vela::ExceptionWrapper`.
pub(super) const WRAPPER_TYPEINFO: &str = "@_ZTIN4vela16ExceptionWrapperE";

/// Layout of an Itanium typeinfo object, as referenced from IR.
pub(super) const WRAPPER_TYPEINFO_TY: &str = "{ i8*, i8*, i8* }";

const DECLS: &[&str] = &[
    "declare i32 @llvm.eh.typeid.for(i8*)",
    "declare i32 @__gxx_personality_v0(...)",
    "declare i8* @__cxa_begin_catch(i8*)",
    "declare void @__cxa_end_catch()",
    "@_ZTIN4vela16ExceptionWrapperE = external constant { i8*, i8*, i8* }",
];

/// The wrapper typeinfo as an `i8*`, for landing-pad clauses and
/// `llvm.eh.typeid.for` calls.
pub(super) fn typeinfo_cast() -> String {
    format!(
        "bitcast ({}* {} to i8*)",
        WRAPPER_TYPEINFO_TY, WRAPPER_TYPEINFO
    )
}

/// Personality clause attached to every function definition.
pub(super) fn personality() -> &'static str {
    "personality i8* bitcast (i32 (...)* @__gxx_personality_v0 to i8*)"
}

pub(super) fn emit_runtime_decls(out: &mut String) -> Result<(), CodeGenError> {
    for decl in DECLS {
        writeln!(out, "{}", decl)?;
    }
    Ok(())
}
