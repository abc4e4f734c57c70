//! Emitter state.

use std::collections::{BTreeSet, HashMap, HashSet};
use vela_nir::{Defn, Global, Local, Type, Val};

/// One shard's IR emitter.
///
/// The emitter owns everything a shard needs: the body text buffer, the
/// constant-intern tables, the copy-elision map of the function being
/// emitted, the set of names referenced from other shards, and the set
/// of names already emitted here. None of this state is shared between
/// shards; the driver constructs one emitter per output module.
pub struct Emitter<'a> {
    /// Whole-program definition map, keyed by normalized name.
    pub(super) env: &'a HashMap<Global, Defn>,
    pub(super) triple: &'a str,
    pub(super) module_id: String,
    /// Definition bodies; the prelude is prepended once bodies are done.
    pub(super) buf: String,
    /// Interned structural constants, keyed by deconstified value.
    pub(super) const_map: HashMap<Val, Global>,
    /// Type of each interned constant.
    pub(super) const_ty: HashMap<Global, Type>,
    /// `Copy` aliases of the function currently being emitted.
    pub(super) copies: HashMap<Local, Val>,
    /// Referenced names that must be extern-declared in the prelude.
    pub(super) deps: BTreeSet<Global>,
    /// Normalized names already emitted in this shard.
    pub(super) generated: HashSet<Global>,
    /// Next synthetic register id; reset above the function's own ids.
    pub(super) fresh: u64,
    pub(super) block_name: Local,
    pub(super) block_split: usize,
}

impl<'a> Emitter<'a> {
    pub fn new(env: &'a HashMap<Global, Defn>, triple: &'a str, module_id: impl Into<String>) -> Emitter<'a> {
        Emitter {
            env,
            triple,
            module_id: module_id.into(),
            buf: String::new(),
            const_map: HashMap::new(),
            const_ty: HashMap::new(),
            copies: HashMap::new(),
            deps: BTreeSet::new(),
            generated: HashSet::new(),
            fresh: 0,
            block_name: Local(0),
            block_split: 0,
        }
    }

    /// A register id unused by the current function.
    pub(super) fn fresh_local(&mut self) -> Local {
        let l = Local(self.fresh);
        self.fresh += 1;
        l
    }
}
