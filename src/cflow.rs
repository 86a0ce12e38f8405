//! Structured view of a function's control flow: linearized block
//! order plus the natural-loop nest. This is the shape the emitted
//! high-level code will have, and therefore the oracle for deciding
//! which explicit jumps are redundant.
//!
//! Requires `Function::recompute_edges` to have run; irreducible
//! control flow is a precondition violation and panics.

use crate::entity::{EntityRef, PerEntity};
use crate::ir::{Block, Function, Stmt};
use fxhash::{FxHashMap, FxHashSet};

#[derive(Clone, Debug)]
pub struct StructuredFlow {
    /// Reachable blocks in structured (reverse-postorder) emission order.
    order: Vec<Block>,
    /// Position of each block in `order`, if reachable.
    pos: PerEntity<Block, Option<usize>>,
    /// Innermost loop header containing each block (headers contain
    /// themselves); invalid when the block is in no loop.
    innermost: PerEntity<Block, Block>,
    /// Loop body blocks per header, header included.
    bodies: FxHashMap<Block, FxHashSet<Block>>,
}

impl StructuredFlow {
    pub fn compute(func: &Function) -> StructuredFlow {
        let order = {
            let mut postorder = postorder(func);
            postorder.reverse();
            postorder
        };
        let mut pos: PerEntity<Block, Option<usize>> = PerEntity::default();
        for (i, &block) in order.iter().enumerate() {
            pos[block] = Some(i);
        }

        // Backedges: any edge from a block to one at or before it in
        // the order. With reducible control flow these are exactly the
        // loop-closing edges.
        let mut bodies: FxHashMap<Block, FxHashSet<Block>> = FxHashMap::default();
        for &block in &order {
            for &succ in &func.blocks[block].succs {
                let succ_pos = match pos[succ] {
                    Some(p) => p,
                    None => continue,
                };
                if succ_pos <= pos[block].unwrap() {
                    log::trace!("structured flow: backedge {} -> {}", block, succ);
                    collect_loop_body(
                        bodies.entry(succ).or_insert_with(FxHashSet::default),
                        succ,
                        block,
                        func,
                    );
                }
            }
        }
        for (&header, body) in &bodies {
            for &block in body {
                assert!(
                    pos[block].map_or(false, |p| p >= pos[header].unwrap()),
                    "Irreducible loop at {} (body block {})",
                    header,
                    block
                );
            }
        }

        // Innermost header per block: paint bodies largest-first so the
        // smallest containing loop wins.
        let mut innermost: PerEntity<Block, Block> = PerEntity::default();
        let mut headers = bodies.keys().copied().collect::<Vec<_>>();
        headers.sort_by_key(|header| std::cmp::Reverse(bodies[header].len()));
        for header in headers {
            for &block in &bodies[&header] {
                innermost[block] = header;
            }
        }

        StructuredFlow {
            order,
            pos,
            innermost,
            bodies,
        }
    }

    /// Reachable blocks in emission order.
    pub fn order(&self) -> &[Block] {
        &self.order[..]
    }

    pub fn pos(&self, block: Block) -> Option<usize> {
        self.pos[block]
    }

    pub fn is_reachable(&self, block: Block) -> bool {
        self.pos[block].is_some()
    }

    pub fn is_loop_header(&self, block: Block) -> bool {
        self.bodies.contains_key(&block)
    }

    pub fn in_loop(&self, header: Block, block: Block) -> bool {
        self.bodies
            .get(&header)
            .map_or(false, |body| body.contains(&block))
    }

    /// Every statement of every reachable block, each exactly once, in
    /// structured order. The liveness driver's traversal.
    pub fn stmts<'a>(&'a self, func: &'a Function) -> impl Iterator<Item = Stmt> + 'a {
        self.order
            .iter()
            .flat_map(move |&block| func.blocks[block].stmts.iter().copied())
    }

    /// The block control reaches from the end of `block` with no
    /// explicit jump emitted: the next block in order while it stays
    /// within the same loop body, else the loop header (the back edge a
    /// structured loop construct implies). `None` past the last block.
    pub fn implied_successor(&self, block: Block) -> Option<Block> {
        let p = self.pos[block]?;
        let next = self.order.get(p + 1).copied();
        let header = self.innermost[block];
        if header.is_valid() {
            let exits_body = match next {
                Some(next) => !self.in_loop(header, next),
                None => true,
            };
            if exits_body {
                return Some(header);
            }
        }
        next
    }
}

fn postorder(func: &Function) -> Vec<Block> {
    let mut ret = vec![];
    let mut visited: PerEntity<Block, bool> = PerEntity::default();
    // Explicit DFS stack: (block, next successor index to explore).
    let mut stack: Vec<(Block, usize)> = vec![];

    visited[func.entry] = true;
    stack.push((func.entry, 0));
    while let Some(&mut (block, ref mut next_succ)) = stack.last_mut() {
        let succs = &func.blocks[block].succs;
        if *next_succ < succs.len() {
            let succ = succs[*next_succ];
            *next_succ += 1;
            if !visited[succ] {
                visited[succ] = true;
                stack.push((succ, 0));
            }
        } else {
            ret.push(block);
            stack.pop();
        }
    }
    ret
}

fn collect_loop_body(body: &mut FxHashSet<Block>, header: Block, backedge_src: Block, func: &Function) {
    body.insert(header);
    let mut workset = vec![backedge_src];
    while let Some(block) = workset.pop() {
        if !body.insert(block) {
            continue;
        }
        for &pred in &func.blocks[block].preds {
            workset.push(pred);
        }
    }
}
