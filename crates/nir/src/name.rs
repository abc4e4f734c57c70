//! Global and local names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hierarchical name of a top-level definition or one of its members.
///
/// Member ids may carry a `!tag` alias suffix attached by the dispatch
/// tables of the upstream linker. Two names that differ only in their
/// alias tags refer to the same symbol; [`Global::normalized`] strips the
/// tags and is the form used for identity in sets and maps. The printed
/// form ([`Global::show`]) is always the normalized path, joined with
/// `::`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Global {
    Top { id: String },
    Member { owner: Box<Global>, id: String },
}

impl Global {
    pub fn top(id: impl Into<String>) -> Global {
        Global::Top { id: id.into() }
    }

    pub fn member(owner: Global, id: impl Into<String>) -> Global {
        Global::Member {
            owner: Box::new(owner),
            id: id.into(),
        }
    }

    /// Id of the enclosing top-level definition.
    pub fn top_id(&self) -> &str {
        match self {
            Global::Top { id } => id,
            Global::Member { owner, .. } => owner.top_id(),
        }
    }

    /// The name with all alias tags stripped.
    pub fn normalized(&self) -> Global {
        match self {
            Global::Top { .. } => self.clone(),
            Global::Member { owner, id } => Global::Member {
                owner: Box::new(owner.normalized()),
                id: strip_tag(id).to_string(),
            },
        }
    }

    /// Normalized path with `::` as the nesting separator, e.g.
    /// `collections.List::head`. This is the symbol name a backend emits.
    pub fn show(&self) -> String {
        match self {
            Global::Top { id } => id.clone(),
            Global::Member { owner, id } => format!("{}::{}", owner.show(), strip_tag(id)),
        }
    }
}

fn strip_tag(id: &str) -> &str {
    match id.split_once('!') {
        Some((base, _)) => base,
        None => id,
    }
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.show())
    }
}

/// Numeric register or block name, unique within one function.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Local(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_joins_with_double_colon() {
        let n = Global::member(Global::top("collections.List"), "head");
        assert_eq!(n.show(), "collections.List::head");
        assert_eq!(n.top_id(), "collections.List");
    }

    #[test]
    fn normalized_strips_alias_tags() {
        let tagged = Global::member(Global::top("A"), "m!dispatch0");
        let plain = Global::member(Global::top("A"), "m");
        assert_eq!(tagged.normalized(), plain);
        assert_eq!(tagged.show(), "A::m");
    }
}
