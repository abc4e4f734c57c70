//! LLVM IR emission.
//!
//! One [`Emitter`] produces one `.ll` module as text. The emission is
//! split into focused submodules:
//!
//! - `state.rs`: the `Emitter` struct and its per-shard tables
//! - `defn.rs`: definition dispatch, prelude assembly, extern
//!   declarations for cross-shard references
//! - `func.rs`: function headers, block layout, phi prologues and
//!   exception landing pads
//! - `inst.rs`: instruction and operation rendering
//! - `value.rs`: type/value/global printing and constant interning
//! - `cfg.rs`: the block graph built over a function's instructions
//! - `escape.rs`: string-literal decoding and LLVM re-encoding
//! - `runtime.rs`: the fixed runtime-support declarations
//!
//! # Key conventions
//!
//! Globals print as quoted identifiers (`@"a.b::c"`), locals as
//! `%_<id>`, block labels as `_<id>.<split>`. The split counter starts
//! at 0 and increments every time an `invoke` terminates the block
//! early, so any label reference — branch, switch arm, phi edge — must
//! go through the block's final split, which the CFG precomputes.
//!
//! Pointers are `i8*` everywhere at instruction boundaries. Typed
//! pointers appear only between a localized bitcast and the one memory
//! instruction that needs them, which keeps call sites uniform and the
//! module ready for opaque-pointer toolchains.
//!
//! Bodies are emitted before the prelude: interning and dependency
//! discovery happen during body emission, and the prelude then carries
//! the target triple, the runtime declarations, the interned constants
//! and an extern declaration for every name owned by another shard.

mod cfg;
mod defn;
mod escape;
mod func;
mod inst;
mod runtime;
mod state;
mod value;

pub use state::Emitter;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use vela_nir::{Attrs, Defn, Global, Inst, Local, Next, Op, Type, Val};

    fn emit(defns: &[Defn]) -> String {
        emit_with(defns, &[])
    }

    /// Emit `defns` as one shard, with `extra` visible in the program
    /// environment but owned by other shards.
    fn emit_with(defns: &[Defn], extra: &[Defn]) -> String {
        let env: HashMap<Global, Defn> = defns
            .iter()
            .chain(extra)
            .map(|d| (d.name().normalized(), d.clone()))
            .collect();
        Emitter::new(&env, "", "test").gen_module(defns).unwrap()
    }

    fn fn_ty(args: Vec<Type>, ret: Type) -> Type {
        Type::Function(args, Box::new(ret))
    }

    fn define(name: &str, sig: Type, insts: Vec<Inst>) -> Defn {
        Defn::Define {
            attrs: Attrs::default(),
            name: Global::top(name),
            sig,
            insts,
        }
    }

    fn declare(name: &str, sig: Type) -> Defn {
        Defn::Declare {
            attrs: Attrs::default(),
            name: Global::top(name),
            sig,
        }
    }

    fn label(id: u64, params: Vec<(Local, Type)>) -> Inst {
        Inst::Label {
            name: Local(id),
            params,
        }
    }

    fn let_(id: u64, op: Op) -> Inst {
        Inst::Let {
            name: Local(id),
            op,
            unwind: Next::None,
        }
    }

    fn local(id: u64, ty: Type) -> Val {
        Val::Local(Local(id), ty)
    }

    fn call_op(callee: &str, sig: Type, args: Vec<Val>) -> Op {
        Op::Call {
            sig,
            ptr: Val::Global(Global::top(callee), Type::Ptr),
            args,
        }
    }

    /// Assert the needles occur in `ir` in the given order.
    fn assert_ordered(ir: &str, needles: &[&str]) {
        let mut pos = 0;
        for needle in needles {
            match ir[pos..].find(needle) {
                Some(i) => pos += i + needle.len(),
                None => panic!("missing (or out of order): {:?}\nin:\n{}", needle, ir),
            }
        }
    }

    #[test]
    fn empty_function() {
        let ir = emit(&[define(
            "f",
            fn_ty(vec![], Type::Void),
            vec![label(0, vec![]), Inst::Ret(Val::None)],
        )]);
        assert!(ir.contains("define void @\"f\"()"));
        assert_ordered(&ir, &["_0.0:", "  ret void", "}"]);
    }

    #[test]
    fn identity_function_params_line_up_with_body() {
        let ir = emit(&[define(
            "id",
            fn_ty(vec![Type::I(32)], Type::I(32)),
            vec![
                label(0, vec![(Local(1), Type::I(32))]),
                Inst::Ret(local(1, Type::I(32))),
            ],
        )]);
        assert!(ir.contains("define i32 @\"id\"(i32 %_1)"));
        assert_ordered(&ir, &["_0.0:", "  ret i32 %_1"]);
    }

    #[test]
    fn direct_call_with_matching_signature() {
        let sig = fn_ty(vec![Type::I(32)], Type::I(32));
        let ir = emit(&[
            declare("g", sig.clone()),
            define(
                "f",
                fn_ty(vec![], Type::I(32)),
                vec![
                    label(0, vec![]),
                    let_(1, call_op("g", sig.clone(), vec![Val::Int(7)])),
                    Inst::Ret(local(1, Type::I(32))),
                ],
            ),
        ]);
        assert!(ir.contains("%_1 = call i32 @\"g\"(i32 7)"));
        assert!(!ir.contains("invoke"));
        // no bitcast of the callee on the direct path
        assert!(!ir.contains("to i32 (i32)*"));
    }

    #[test]
    fn indirect_call_bitcasts_the_callee() {
        let ir = emit(&[define(
            "f",
            fn_ty(vec![Type::Ptr], Type::I(64)),
            vec![
                label(0, vec![(Local(1), Type::Ptr)]),
                let_(
                    2,
                    Op::Call {
                        sig: fn_ty(vec![Type::I(64)], Type::I(64)),
                        ptr: local(1, Type::Ptr),
                        args: vec![Val::Long(9)],
                    },
                ),
                Inst::Ret(local(2, Type::I(64))),
            ],
        )]);
        assert!(ir.contains("%_3 = bitcast i8* %_1 to i64 (i64)*"));
        assert!(ir.contains("%_2 = call i64 %_3(i64 9)"));
    }

    #[test]
    fn variadic_call_prints_the_full_signature() {
        let sig = fn_ty(vec![Type::Ptr, Type::Vararg], Type::I(32));
        let ir = emit(&[
            declare("printf_like", sig.clone()),
            define(
                "f",
                fn_ty(vec![Type::Ptr], Type::I(32)),
                vec![
                    label(0, vec![(Local(1), Type::Ptr)]),
                    let_(
                        2,
                        call_op(
                            "printf_like",
                            sig.clone(),
                            vec![local(1, Type::Ptr), Val::Int(42)],
                        ),
                    ),
                    Inst::Ret(local(2, Type::I(32))),
                ],
            ),
        ]);
        assert!(ir.contains("call i32 (i8*, ...) @\"printf_like\"(i8* %_1, i32 42)"));
    }

    #[test]
    fn constants_intern_once_across_functions() {
        let chars = Val::Const(Box::new(Val::Array(
            Type::I(8),
            vec![Val::Byte(1), Val::Byte(2), Val::Byte(3)],
        )));
        let ret_ptr = fn_ty(vec![], Type::Ptr);
        let body = |v: Val| vec![label(0, vec![]), Inst::Ret(v)];
        let ir = emit(&[
            define("f", ret_ptr.clone(), body(chars.clone())),
            define("g", ret_ptr, body(chars)),
        ]);

        let def = "@\"__const::0\" = private unnamed_addr constant [3 x i8] [i8 1, i8 2, i8 3]";
        assert_eq!(ir.matches(def).count(), 1);
        assert_eq!(
            ir.matches("ret i8* bitcast ([3 x i8]* @\"__const::0\" to i8*)")
                .count(),
            2
        );
    }

    #[test]
    fn chars_constants_are_zero_terminated_and_escaped() {
        let msg = Val::Const(Box::new(Val::Chars(r"hi\n".to_string())));
        let ir = emit(&[define(
            "f",
            fn_ty(vec![], Type::Ptr),
            vec![label(0, vec![]), Inst::Ret(msg)],
        )]);
        assert!(ir.contains(
            "@\"__const::0\" = private unnamed_addr constant [4 x i8] c\"hi\\0A\\00\""
        ));
    }

    #[test]
    fn copy_lets_are_elided_and_uses_substituted() {
        let ir = emit(&[define(
            "f",
            fn_ty(vec![], Type::I(32)),
            vec![
                label(0, vec![]),
                let_(1, Op::Copy { value: Val::Int(5) }),
                let_(
                    2,
                    Op::Copy {
                        value: local(1, Type::I(32)),
                    },
                ),
                Inst::Ret(local(2, Type::I(32))),
            ],
        )]);
        assert!(!ir.contains("%_1"));
        assert!(!ir.contains("%_2"));
        assert!(ir.contains("ret i32 5"));
    }

    #[test]
    fn invoke_splits_the_block_and_phis_use_final_splits() {
        let void_sig = fn_ty(vec![], Type::Void);
        let ir = emit(&[
            declare("may_throw", void_sig.clone()),
            define(
                "f",
                fn_ty(vec![], Type::I(32)),
                vec![
                    label(0, vec![]),
                    Inst::Let {
                        name: Local(1),
                        op: call_op("may_throw", void_sig.clone(), vec![]),
                        unwind: Next::Unwind { name: Local(4) },
                    },
                    Inst::Jump(Next::Label {
                        name: Local(2),
                        args: vec![Val::Int(1)],
                    }),
                    label(2, vec![(Local(3), Type::I(32))]),
                    Inst::Ret(local(3, Type::I(32))),
                    label(4, vec![(Local(5), Type::Ptr)]),
                    Inst::Jump(Next::Label {
                        name: Local(2),
                        args: vec![Val::Int(7)],
                    }),
                ],
            ),
        ]);
        // the invoke terminates _0.0 and a fresh _0.1 follows immediately
        assert_ordered(
            &ir,
            &[
                "invoke void @\"may_throw\"() to label %_0.1 unwind label %_4.0",
                "_0.1:",
                "  br label %_2.0",
            ],
        );
        // both predecessors reach the merge block through their final
        // split: _0 split once by the invoke, _4 split by its pad
        assert!(ir.contains("%_3 = phi i32 [ 1, %_0.1 ], [ 7, %_4.1 ]"));
    }

    #[test]
    fn phi_arity_matches_params_and_edges() {
        let ir = emit(&[define(
            "f",
            fn_ty(vec![Type::Bool], Type::I(32)),
            vec![
                label(0, vec![(Local(1), Type::Bool)]),
                Inst::If {
                    cond: local(1, Type::Bool),
                    then_dst: Next::label(Local(2)),
                    else_dst: Next::label(Local(3)),
                },
                label(2, vec![]),
                Inst::Jump(Next::Label {
                    name: Local(4),
                    args: vec![Val::Int(1), Val::Long(10)],
                }),
                label(3, vec![]),
                Inst::Jump(Next::Label {
                    name: Local(4),
                    args: vec![Val::Int(2), Val::Long(20)],
                }),
                label(4, vec![(Local(5), Type::I(32)), (Local(6), Type::I(64))]),
                Inst::Ret(local(5, Type::I(32))),
            ],
        )]);
        assert!(ir.contains("br i1 %_1, label %_2.0, label %_3.0"));
        // two params, two incoming edges: two phis with two pairs each
        assert!(ir.contains("%_5 = phi i32 [ 1, %_2.0 ], [ 2, %_3.0 ]"));
        assert!(ir.contains("%_6 = phi i64 [ 10, %_2.0 ], [ 20, %_3.0 ]"));
    }

    #[test]
    fn landing_pad_prologue_is_emitted_verbatim() {
        let void_sig = fn_ty(vec![], Type::Void);
        let ir = emit(&[
            declare("may_throw", void_sig.clone()),
            define(
                "f",
                fn_ty(vec![], Type::Void),
                vec![
                    label(0, vec![]),
                    Inst::Let {
                        name: Local(1),
                        op: call_op("may_throw", void_sig.clone(), vec![]),
                        unwind: Next::Unwind { name: Local(2) },
                    },
                    Inst::Ret(Val::None),
                    label(2, vec![(Local(3), Type::Ptr)]),
                    Inst::Ret(Val::None),
                ],
            ),
        ]);
        let ti = "bitcast ({ i8*, i8*, i8* }* @_ZTIN4vela16ExceptionWrapperE to i8*)";
        assert_ordered(
            &ir,
            &[
                "_2.0:",
                &format!("  %_2.rec = landingpad {{ i8*, i32 }} catch i8* {}", ti),
                "  %_2.r0 = extractvalue { i8*, i32 } %_2.rec, 0",
                "  %_2.r1 = extractvalue { i8*, i32 } %_2.rec, 1",
                &format!("  %_2.id = call i32 @llvm.eh.typeid.for(i8* {})", ti),
                "  %_2.cmp = icmp eq i32 %_2.r1, %_2.id",
                "  br i1 %_2.cmp, label %_2.1, label %_2.fail",
                "_2.fail:",
                "  resume { i8*, i32 } %_2.rec",
                "_2.1:",
                "  %_2.w0 = call i8* @__cxa_begin_catch(i8* %_2.r0)",
                "  %_2.w1 = bitcast i8* %_2.w0 to i8**",
                "  %_2.w2 = getelementptr i8*, i8** %_2.w1, i32 1",
                "  %_3 = load i8*, i8** %_2.w2",
                "  call void @__cxa_end_catch()",
            ],
        );
    }

    #[test]
    fn memory_ops_bitcast_through_typed_pointers() {
        let ir = emit(&[define(
            "f",
            fn_ty(vec![Type::Ptr], Type::I(32)),
            vec![
                label(0, vec![(Local(1), Type::Ptr)]),
                let_(
                    2,
                    Op::Load {
                        ty: Type::I(32),
                        ptr: local(1, Type::Ptr),
                        volatile: false,
                    },
                ),
                let_(
                    3,
                    Op::Store {
                        ty: Type::I(32),
                        ptr: local(1, Type::Ptr),
                        value: Val::Int(0),
                        volatile: true,
                    },
                ),
                Inst::Ret(local(2, Type::I(32))),
            ],
        )]);
        assert_ordered(
            &ir,
            &[
                "%_4 = bitcast i8* %_1 to i32*",
                "%_2 = load i32, i32* %_4",
                "%_5 = bitcast i8* %_1 to i32*",
                "store volatile i32 0, i32* %_5",
            ],
        );
    }

    #[test]
    fn elem_computes_addresses_and_returns_an_untyped_pointer() {
        let pair = Type::StructValue(None, vec![Type::I(32), Type::Double]);
        let ir = emit(&[define(
            "f",
            fn_ty(vec![Type::Ptr], Type::Ptr),
            vec![
                label(0, vec![(Local(1), Type::Ptr)]),
                let_(
                    2,
                    Op::Elem {
                        ty: pair.clone(),
                        ptr: local(1, Type::Ptr),
                        indexes: vec![Val::Int(0), Val::Int(1)],
                    },
                ),
                Inst::Ret(local(2, Type::Ptr)),
            ],
        )]);
        assert_ordered(
            &ir,
            &[
                "%_3 = bitcast i8* %_1 to { i32, double }*",
                "%_4 = getelementptr { i32, double }, { i32, double }* %_3, i32 0, i32 1",
                "%_2 = bitcast double* %_4 to i8*",
            ],
        );
    }

    #[test]
    fn switch_renders_cases_on_their_own_lines() {
        let ir = emit(&[define(
            "f",
            fn_ty(vec![Type::I(64)], Type::I(64)),
            vec![
                label(0, vec![(Local(1), Type::I(64))]),
                Inst::Switch {
                    scrut: local(1, Type::I(64)),
                    default: Next::label(Local(2)),
                    cases: vec![
                        Next::Case {
                            value: Val::Long(0),
                            name: Local(3),
                        },
                        Next::Case {
                            value: Val::Long(1),
                            name: Local(4),
                        },
                    ],
                },
                label(2, vec![]),
                Inst::Ret(Val::Long(-1)),
                label(3, vec![]),
                Inst::Ret(Val::Long(10)),
                label(4, vec![]),
                Inst::Ret(Val::Long(11)),
            ],
        )]);
        assert_ordered(
            &ir,
            &[
                "  switch i64 %_1, label %_2.0 [",
                "    i64 0, label %_3.0",
                "    i64 1, label %_4.0",
                "  ]",
            ],
        );
    }

    #[test]
    fn no_global_is_defined_twice() {
        let sig = fn_ty(vec![], Type::Void);
        let ir = emit(&[declare("g", sig.clone()), declare("g", sig.clone())]);
        assert_eq!(ir.matches("declare void @\"g\"()").count(), 1);
    }

    #[test]
    fn alias_tagged_names_collapse_to_one_symbol() {
        let sig = fn_ty(vec![], Type::Void);
        let tagged = Defn::Declare {
            attrs: Attrs::default(),
            name: Global::member(Global::top("A"), "m!v1"),
            sig: sig.clone(),
        };
        let plain = Defn::Declare {
            attrs: Attrs::default(),
            name: Global::member(Global::top("A"), "m"),
            sig,
        };
        let ir = emit(&[tagged, plain]);
        assert_eq!(ir.matches("declare void @\"A::m\"()").count(), 1);
    }

    #[test]
    fn cross_shard_references_become_extern_declarations() {
        let point = Defn::Struct {
            attrs: Attrs::default(),
            name: Global::top("Point"),
            fields: vec![Type::Double, Type::Double],
        };
        let origin = Defn::Var {
            attrs: Attrs::default(),
            name: Global::top("origin"),
            ty: Type::StructValue(Some(Global::top("Point")), vec![]),
            rhs: Val::Zero(Type::StructValue(Some(Global::top("Point")), vec![])),
        };
        let helper_sig = fn_ty(vec![], Type::Void);
        let helper = define(
            "helper",
            helper_sig.clone(),
            vec![label(0, vec![]), Inst::Ret(Val::None)],
        );

        // this shard only holds `f`; everything it touches lives elsewhere
        let f = define(
            "f",
            fn_ty(vec![], Type::Ptr),
            vec![
                label(0, vec![]),
                let_(1, call_op("helper", helper_sig, vec![])),
                Inst::Ret(Val::Global(Global::top("origin"), Type::Ptr)),
            ],
        );
        let ir = emit_with(&[f], &[point, origin, helper]);

        assert!(ir.contains("declare void @\"helper\"()"));
        assert!(ir.contains("@\"origin\" = external global %\"Point\""));
        // the struct layout is re-emitted verbatim via the dep fixpoint
        assert!(ir.contains("%\"Point\" = type { double, double }"));
        assert_closed(&ir);
    }

    #[test]
    fn var_and_const_defns_render_linkage_and_initializers() {
        let ir = emit(&[
            Defn::Var {
                attrs: Attrs::default(),
                name: Global::top("counter"),
                ty: Type::I(64),
                rhs: Val::Long(0),
            },
            Defn::Var {
                attrs: Attrs::default(),
                name: Global::top("imported"),
                ty: Type::I(64),
                rhs: Val::None,
            },
            Defn::Const {
                attrs: Attrs::default(),
                name: Global::top("limit"),
                ty: Type::I(32),
                rhs: Val::Int(512),
            },
        ]);
        assert!(ir.contains("@\"counter\" = hidden global i64 0"));
        assert!(ir.contains("@\"imported\" = external global i64"));
        assert!(ir.contains("@\"limit\" = hidden constant i32 512"));
    }

    #[test]
    fn inline_hints_annotate_function_headers() {
        let sig = fn_ty(vec![], Type::Void);
        let noinline = Defn::Define {
            attrs: Attrs { inline: vela_nir::Inline::No },
            name: Global::top("cold"),
            sig: sig.clone(),
            insts: vec![label(0, vec![]), Inst::Ret(Val::None)],
        };
        let always = Defn::Declare {
            attrs: Attrs { inline: vela_nir::Inline::Always },
            name: Global::top("hot"),
            sig,
        };
        let ir = emit(&[noinline, always]);
        assert!(ir.contains("define void @\"cold\"() noinline personality"));
        assert!(ir.contains("declare void @\"hot\"() alwaysinline"));
    }

    #[test]
    fn deconstify_is_idempotent_and_interning_is_structural() {
        let env = HashMap::new();
        let mut e = Emitter::new(&env, "", "t");

        let nested = Val::Const(Box::new(Val::Struct(
            None,
            vec![
                Val::Int(1),
                Val::Const(Box::new(Val::Chars("hi".to_string()))),
            ],
        )));
        let once = e.deconstify(&nested).unwrap();
        let twice = e.deconstify(&once).unwrap();
        assert_eq!(once, twice);

        let arr = |x: i8| Val::Const(Box::new(Val::Array(Type::I(8), vec![Val::Byte(x)])));
        let Val::Global(n1, _) = e.deconstify(&arr(7)).unwrap() else {
            panic!("expected interned global")
        };
        let Val::Global(n2, _) = e.deconstify(&arr(7)).unwrap() else {
            panic!("expected interned global")
        };
        let Val::Global(n3, _) = e.deconstify(&arr(8)).unwrap() else {
            panic!("expected interned global")
        };
        assert_eq!(n1, n2);
        assert_ne!(n1, n3);
    }

    #[test]
    fn unsupported_constructs_abort_with_their_textual_form() {
        let err = emit_err(&[define(
            "f",
            fn_ty(vec![], Type::Void),
            vec![
                label(0, vec![]),
                let_(
                    1,
                    Op::Classalloc {
                        name: Global::top("Box"),
                    },
                ),
                Inst::Ret(Val::None),
            ],
        )]);
        let msg = err.to_string();
        assert!(msg.contains("unsupported construct"));
        assert!(msg.contains("Classalloc"));
    }

    #[test]
    fn missing_environment_entries_abort_the_shard() {
        let sig = fn_ty(vec![], Type::Void);
        let err = emit_err(&[define(
            "f",
            fn_ty(vec![], Type::Void),
            vec![
                label(0, vec![]),
                let_(1, call_op("phantom", sig, vec![])),
                Inst::Ret(Val::None),
            ],
        )]);
        assert!(err.to_string().contains("phantom"));
    }

    fn emit_err(defns: &[Defn]) -> crate::error::CodeGenError {
        let env: HashMap<Global, Defn> = defns
            .iter()
            .map(|d| (d.name().normalized(), d.clone()))
            .collect();
        match Emitter::new(&env, "", "test").gen_module(defns) {
            Ok(ir) => panic!("expected an error, got:\n{}", ir),
            Err(e) => e,
        }
    }

    /// Closure check: every `@"name"` referenced in the module has a
    /// definition or declaration in the same module.
    fn assert_closed(ir: &str) {
        let mut referenced = BTreeSet::new();
        let mut rest = ir;
        while let Some(i) = rest.find("@\"") {
            let tail = &rest[i + 2..];
            let end = tail.find('"').expect("unterminated global name");
            referenced.insert(tail[..end].to_string());
            rest = &tail[end..];
        }
        for name in referenced {
            let header = format!("@\"{}\"(", name);
            let defined = ir.lines().any(|line| {
                line.starts_with(&format!("@\"{}\" =", name))
                    || ((line.starts_with("declare ") || line.starts_with("define "))
                        && line.contains(&header))
            });
            assert!(defined, "referenced but never declared: {}", name);
        }
    }
}
