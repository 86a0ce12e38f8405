use super::{Block, Term};
use smallvec::SmallVec;

/// Destination of a control transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JumpTarget {
    /// Direct transfer to a known block; `addr` is the address-immediate
    /// term the instruction encoded the destination with.
    Direct { block: Block, addr: Term },
    /// Indirect transfer through a computed address.
    Computed(Term),
}

impl JumpTarget {
    pub fn block(&self) -> Option<Block> {
        match self {
            &JumpTarget::Direct { block, .. } => Some(block),
            &JumpTarget::Computed(_) => None,
        }
    }
}

/// One IR instruction-equivalent, composed of terms.
#[derive(Clone, Debug)]
pub enum StmtData {
    /// `dst` is a write term, `src` computes the stored value.
    Assign { dst: Term, src: Term },
    /// Unconditional control transfer.
    Jump { target: JumpTarget },
    /// Conditional control transfer. `if_false` is the fallthrough arm
    /// in the decoded instruction stream.
    Branch {
        cond: Term,
        if_true: JumpTarget,
        if_false: JumpTarget,
    },
    Call {
        target: Term,
        args: SmallVec<[Term; 4]>,
        rets: SmallVec<[Term; 2]>,
    },
    Return { values: SmallVec<[Term; 2]> },
    Nop,
}

impl StmtData {
    /// Whether this statement transfers control (and must therefore be
    /// the last statement of its block).
    pub fn is_terminator(&self) -> bool {
        match self {
            StmtData::Jump { .. }
            | StmtData::Branch { .. }
            | StmtData::Return { .. } => true,
            _ => false,
        }
    }

    pub fn is_jump(&self) -> bool {
        match self {
            StmtData::Jump { .. } | StmtData::Branch { .. } => true,
            _ => false,
        }
    }

    /// Visits the top-level terms of this statement (operands of those
    /// terms are reached through `TermData::visit_subterms`).
    pub fn visit_terms<F: FnMut(Term)>(&self, mut f: F) {
        let visit_target = |target: &JumpTarget, f: &mut F| match target {
            &JumpTarget::Direct { addr, .. } => f(addr),
            &JumpTarget::Computed(term) => f(term),
        };
        match self {
            &StmtData::Assign { dst, src } => {
                f(dst);
                f(src);
            }
            StmtData::Jump { target } => visit_target(target, &mut f),
            StmtData::Branch {
                cond,
                if_true,
                if_false,
            } => {
                f(*cond);
                visit_target(if_true, &mut f);
                visit_target(if_false, &mut f);
            }
            StmtData::Call { target, args, rets } => {
                f(*target);
                for &arg in args {
                    f(arg);
                }
                for &ret in rets {
                    f(ret);
                }
            }
            StmtData::Return { values } => {
                for &value in values {
                    f(value);
                }
            }
            StmtData::Nop => {}
        }
    }

    pub fn visit_successors<F: FnMut(Block)>(&self, mut f: F) {
        let visit_target = |target: &JumpTarget, f: &mut F| {
            if let Some(block) = target.block() {
                f(block);
            }
        };
        match self {
            StmtData::Jump { target } => visit_target(target, &mut f),
            StmtData::Branch {
                if_true, if_false, ..
            } => {
                visit_target(if_true, &mut f);
                visit_target(if_false, &mut f);
            }
            _ => {}
        }
    }
}
