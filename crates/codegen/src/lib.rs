//! Vela LLVM backend
//!
//! Final stage of the Vela compilation pipeline: takes the linked,
//! reachability-pruned NIR definition set and writes textual LLVM IR
//! modules (`.ll`) into a working directory for `clang`/`opt`/`llc` to
//! consume.
//!
//! The stage is data-parallel end to end. Definitions are grouped by
//! their top-level owner and run through the (externally supplied)
//! lowering transform group by group; the lowered set is then bucketed
//! into shards, and one [`emit::Emitter`] per shard renders a complete,
//! self-contained module. Shards share no mutable state and write
//! distinct files, so the whole stage needs no locking. A failure in
//! any shard fails the stage; partial `.ll` files are left behind and
//! are invalid until the next successful run replaces them.
//!
//! ```rust,ignore
//! use vela_codegen::{codegen, Config};
//!
//! let mut config = Config::new("target/vela");
//! config.target_triple = "x86_64-unknown-linux-gnu".to_string();
//! let written = codegen(&config, linked_defns)?;
//! ```

pub mod config;
pub mod emit;
pub mod error;
pub mod partition;

pub use config::{Config, Lto, Mode};
pub use emit::Emitter;
pub use error::CodeGenError;

use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, info_span};
use vela_nir::{Defn, Global};

/// Run the backend over an already-lowered definition set.
pub fn codegen(config: &Config, defns: Vec<Defn>) -> Result<Vec<PathBuf>, CodeGenError> {
    codegen_with_lowering(config, defns, |group| Ok(group))
}

/// Run the backend, applying `lower` to each top-level name group
/// first. The transform runs once per group, in parallel; its output
/// must stay within the low-level NIR subset.
pub fn codegen_with_lowering<L>(
    config: &Config,
    defns: Vec<Defn>,
    lower: L,
) -> Result<Vec<PathBuf>, CodeGenError>
where
    L: Fn(Vec<Defn>) -> Result<Vec<Defn>, CodeGenError> + Sync,
{
    let lowered = lower_groups(defns, &lower)?;

    let env: HashMap<Global, Defn> = lowered
        .iter()
        .map(|d| (d.name().normalized(), d.clone()))
        .collect();

    let shards = config.shard_count();
    info!(shards, defns = lowered.len(), "generating llvm ir");
    fs::create_dir_all(&config.workdir)?;

    let mut written = partition::partition(lowered, shards)
        .into_par_iter()
        .enumerate()
        .map(|(index, shard)| {
            let span = info_span!("shard", index);
            let _enter = span.enter();
            let filename = partition::shard_filename(index, shards);
            let module_id = filename.trim_end_matches(".ll").to_string();
            let emitter = Emitter::new(&env, &config.target_triple, module_id);
            let text = emitter.gen_module(&shard)?;
            let path = config.workdir.join(&filename);
            fs::write(&path, &text)?;
            debug!(file = %path.display(), bytes = text.len(), "wrote module");
            Ok(path)
        })
        .collect::<Result<Vec<PathBuf>, CodeGenError>>()?;

    written.sort();
    Ok(written)
}

/// Group definitions by top-level owner and lower each group. Group
/// order is irrelevant downstream (shards re-sort), but a `BTreeMap`
/// keeps this stage deterministic too.
fn lower_groups<L>(defns: Vec<Defn>, lower: &L) -> Result<Vec<Defn>, CodeGenError>
where
    L: Fn(Vec<Defn>) -> Result<Vec<Defn>, CodeGenError> + Sync,
{
    let mut groups: BTreeMap<String, Vec<Defn>> = BTreeMap::new();
    for defn in defns {
        groups
            .entry(defn.name().top_id().to_string())
            .or_default()
            .push(defn);
    }
    let lowered = groups
        .into_values()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(lower)
        .collect::<Result<Vec<Vec<Defn>>, CodeGenError>>()?;
    Ok(lowered.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_nir::{Attrs, Inst, Type, Val};

    fn sample_program() -> Vec<Defn> {
        let mut defns = Vec::new();
        for owner in ["app.Main", "app.Util", "collections.List"] {
            defns.push(Defn::Var {
                attrs: Attrs::default(),
                name: Global::member(Global::top(owner), "state"),
                ty: Type::I(64),
                rhs: Val::Long(0),
            });
            defns.push(Defn::Define {
                attrs: Attrs::default(),
                name: Global::member(Global::top(owner), "init"),
                sig: Type::Function(Vec::new(), Box::new(Type::Void)),
                insts: vec![
                    Inst::Label {
                        name: vela_nir::Local(0),
                        params: Vec::new(),
                    },
                    Inst::Ret(Val::None),
                ],
            });
        }
        defns
    }

    #[test]
    fn release_without_lto_writes_a_single_module() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(dir.path());
        config.mode = Mode::Release;
        config.lto = Lto::None;

        let written = codegen(&config, sample_program()).unwrap();
        assert_eq!(written, vec![dir.path().join("out.ll")]);
    }

    #[test]
    fn debug_mode_writes_numbered_shards() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(dir.path());
        config.mode = Mode::Debug;
        config.procs = 3;

        let written = codegen(&config, sample_program()).unwrap();
        assert_eq!(written.len(), 3);
        for index in 0..3 {
            assert!(written.contains(&dir.path().join(format!("{}.ll", index))));
        }
        // every function body landed in exactly one shard
        let bodies: usize = written
            .iter()
            .map(|p| {
                fs::read_to_string(p)
                    .unwrap()
                    .lines()
                    .filter(|l| l.starts_with("define "))
                    .count()
            })
            .sum();
        assert_eq!(bodies, 3);
    }

    #[test]
    fn output_is_byte_identical_across_runs() {
        let run = || {
            let dir = tempfile::tempdir().unwrap();
            let mut config = Config::new(dir.path());
            config.target_triple = "x86_64-unknown-linux-gnu".to_string();
            config.procs = 2;
            let written = codegen(&config, sample_program()).unwrap();
            written
                .iter()
                .map(|p| fs::read(p).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn lowering_runs_per_top_level_group() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(dir.path());
        config.mode = Mode::Release;

        let written = codegen_with_lowering(&config, sample_program(), |group| {
            // every group holds exactly one owner's definitions
            let tops: std::collections::BTreeSet<&str> =
                group.iter().map(|d| d.name().top_id()).collect();
            assert_eq!(tops.len(), 1);
            Ok(group)
        })
        .unwrap();
        assert_eq!(written.len(), 1);
    }

    #[test]
    fn lowering_failures_fail_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path());
        let result = codegen_with_lowering(&config, sample_program(), |_| {
            Err(CodeGenError::Unsupported("boom".to_string()))
        });
        assert!(result.is_err());
    }
}
