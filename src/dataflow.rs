//! The def-use index the liveness analysis walks backward over.
//!
//! Built by the dataflow solver stage before this crate's analysis runs;
//! from this crate's point of view it is a read-only substrate. The
//! builder methods exist for the surrounding pipeline (and tests) to
//! populate it.

use crate::entity::PerEntity;
use crate::ir::Term;
use crate::arch::Reg;
use smallvec::SmallVec;

/// Resolved storage location of a term, when the solver knows it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemLoc {
    Reg(Reg),
    /// Frame-relative stack slot; purely local storage.
    Stack(i64),
    /// Absolute address outside the frame.
    Global(u64),
    Unknown,
}

#[derive(Clone, Debug, Default)]
pub struct Dataflow {
    /// Reaching definitions of each read term. Empty for values supplied
    /// from outside the function.
    defs: PerEntity<Term, SmallVec<[Term; 2]>>,
    /// Read terms reached by each definition.
    uses: PerEntity<Term, SmallVec<[Term; 4]>>,
    /// Resolved location of a term, where known.
    locs: PerEntity<Term, Option<MemLoc>>,
}

impl Dataflow {
    pub fn new() -> Dataflow {
        Dataflow::default()
    }

    /// Records that `use_` may read the value written by `def`.
    pub fn add_def_use(&mut self, def: Term, use_: Term) {
        log::trace!("dataflow: {} defines {}", def, use_);
        self.defs[use_].push(def);
        self.uses[def].push(use_);
    }

    pub fn set_loc(&mut self, term: Term, loc: MemLoc) {
        self.locs[term] = Some(loc);
    }

    /// Terms that define the value(s) this term reads.
    pub fn defs(&self, term: Term) -> &[Term] {
        &self.defs[term][..]
    }

    /// Terms that read the value this term defines.
    pub fn uses(&self, term: Term) -> &[Term] {
        &self.uses[term][..]
    }

    pub fn loc(&self, term: Term) -> Option<MemLoc> {
        self.locs[term]
    }
}
