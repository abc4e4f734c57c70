//! Control-flow graph over a function's instruction list.
//!
//! A block is the maximal straight-line run from a `Label` to a
//! terminator. The graph records, per block, whether it is an exception
//! handler (reached through an unwind edge), how many of its calls carry
//! unwind edges (each one splits the block during emission), and the
//! incoming phi edges of every block. Blocks are kept in DFS preorder
//! from the entry; anything unreachable from the entry is dropped, since
//! a parameterized block with no predecessors cannot be given a valid
//! phi prologue.

use crate::error::CodeGenError;
use std::collections::{HashMap, HashSet};
use vela_nir::{Inst, Local, Next, Op, Type, Val};

pub(super) struct Block<'a> {
    pub name: Local,
    pub params: &'a [(Local, Type)],
    /// Instructions of the block, label excluded, terminator included.
    pub insts: &'a [Inst],
    pub handler: bool,
    /// Calls with an unwind edge; each forces a block split.
    pub invokes: usize,
}

impl Block<'_> {
    /// Split suffix of the block's last emitted label. Handler blocks
    /// start at split 1 because their landing-pad prologue branches into
    /// the first split.
    pub fn final_split(&self) -> usize {
        self.invokes + usize::from(self.handler)
    }
}

/// An incoming branch edge carrying phi arguments.
pub(super) struct Edge<'a> {
    pub pred: Local,
    pub args: &'a [Val],
}

pub(super) struct Graph<'a> {
    /// Reachable blocks in DFS preorder; the entry block is first.
    pub blocks: Vec<Block<'a>>,
    /// Incoming `Next::Label` edges per block, in emission order.
    pub preds: HashMap<Local, Vec<Edge<'a>>>,
    /// Final split suffix per reachable block.
    pub splits: HashMap<Local, usize>,
}

impl<'a> Graph<'a> {
    pub fn build(insts: &'a [Inst]) -> Result<Graph<'a>, CodeGenError> {
        let raw = split_blocks(insts)?;

        let mut handlers: HashSet<Local> = HashSet::new();
        for (_, _, body) in &raw {
            for inst in *body {
                if let Some(h) = unwind_target(inst) {
                    handlers.insert(h);
                }
            }
        }

        let index: HashMap<Local, usize> = raw
            .iter()
            .enumerate()
            .map(|(i, (name, _, _))| (*name, i))
            .collect();

        // DFS preorder from the entry, unwind edges before branch edges
        // so handlers appear close to the calls that reach them.
        let mut order = Vec::new();
        let mut seen: HashSet<Local> = HashSet::new();
        let mut stack = vec![raw[0].0];
        while let Some(name) = stack.pop() {
            if !seen.insert(name) {
                continue;
            }
            let i = index[&name];
            order.push(i);
            let mut succs = Vec::new();
            for inst in raw[i].2 {
                collect_successors(inst, &mut succs);
            }
            for succ in succs.into_iter().rev() {
                if index.contains_key(&succ) {
                    stack.push(succ);
                }
            }
        }

        let mut blocks = Vec::with_capacity(order.len());
        let mut splits = HashMap::new();
        let mut preds: HashMap<Local, Vec<Edge<'a>>> = HashMap::new();
        for i in order {
            let (name, params, body) = raw[i];
            let invokes = body
                .iter()
                .filter(|inst| {
                    matches!(
                        inst,
                        Inst::Let {
                            op: Op::Call { .. },
                            unwind: Next::Unwind { .. },
                            ..
                        }
                    )
                })
                .count();
            let block = Block {
                name,
                params,
                insts: body,
                handler: handlers.contains(&name),
                invokes,
            };
            splits.insert(name, block.final_split());
            for inst in body {
                for (target, args) in label_edges(inst) {
                    preds
                        .entry(target)
                        .or_default()
                        .push(Edge { pred: name, args });
                }
            }
            blocks.push(block);
        }

        Ok(Graph {
            blocks,
            preds,
            splits,
        })
    }
}

type RawBlock<'a> = (Local, &'a [(Local, Type)], &'a [Inst]);

fn split_blocks(insts: &[Inst]) -> Result<Vec<RawBlock<'_>>, CodeGenError> {
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < insts.len() {
        let Inst::Label { name, params } = &insts[i] else {
            return Err(CodeGenError::unsupported(&insts[i]));
        };
        let start = i + 1;
        let mut end = start;
        while end < insts.len() && !matches!(insts[end], Inst::Label { .. }) {
            end += 1;
        }
        blocks.push((*name, params.as_slice(), &insts[start..end]));
        i = end;
    }
    if blocks.is_empty() {
        return Err(CodeGenError::Unsupported(
            "function body without an entry block".to_string(),
        ));
    }
    Ok(blocks)
}

fn unwind_target(inst: &Inst) -> Option<Local> {
    let (Inst::Let { unwind, .. } | Inst::Throw { unwind, .. }) = inst else {
        return None;
    };
    match unwind {
        Next::Unwind { name } => Some(*name),
        _ => None,
    }
}

fn collect_successors(inst: &Inst, out: &mut Vec<Local>) {
    match inst {
        Inst::Let { unwind, .. } | Inst::Throw { unwind, .. } => {
            if let Next::Unwind { name } = unwind {
                out.push(*name);
            }
        }
        Inst::Jump(next) => push_next(next, out),
        Inst::If {
            then_dst, else_dst, ..
        } => {
            push_next(then_dst, out);
            push_next(else_dst, out);
        }
        Inst::Switch { default, cases, .. } => {
            push_next(default, out);
            for case in cases {
                push_next(case, out);
            }
        }
        _ => {}
    }
}

fn push_next(next: &Next, out: &mut Vec<Local>) {
    match next {
        Next::Label { name, .. } | Next::Case { name, .. } | Next::Unwind { name } => {
            out.push(*name)
        }
        Next::None => {}
    }
}

/// Outgoing `Next::Label` edges of an instruction, with phi arguments.
fn label_edges<'a>(inst: &'a Inst) -> Vec<(Local, &'a [Val])> {
    let mut out = Vec::new();
    let mut push = |next: &'a Next| {
        if let Next::Label { name, args } = next {
            out.push((*name, args.as_slice()));
        }
    };
    match inst {
        Inst::Jump(next) => push(next),
        Inst::If {
            then_dst, else_dst, ..
        } => {
            push(then_dst);
            push(else_dst);
        }
        Inst::Switch { default, .. } => push(default),
        _ => {}
    }
    out
}
