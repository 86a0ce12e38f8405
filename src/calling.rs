//! Call-boundary collaborators: the signature catalog (read-only) and
//! the per-call-site resolution data (read-write; the one collaborator
//! the liveness analysis annotates).

use crate::declare_entity;
use crate::ir::{Stmt, Term};
use fxhash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

declare_entity!(Callee, "callee");

/// Known or inferred parameter/return shape of a call target.
#[derive(Clone, Debug)]
pub struct Signature {
    /// Number of leading argument slots the callee actually consumes.
    pub params: usize,
    /// Number of return-value slots the callee produces.
    pub returns: usize,
    /// Variadic callees consume an unknown suffix of arguments.
    pub variadic: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SignatureCatalog {
    sigs: FxHashMap<Callee, Signature>,
}

impl SignatureCatalog {
    pub fn new() -> SignatureCatalog {
        SignatureCatalog::default()
    }

    pub fn add(&mut self, callee: Callee, sig: Signature) {
        self.sigs.insert(callee, sig);
    }

    pub fn get(&self, callee: Callee) -> Option<&Signature> {
        self.sigs.get(&callee)
    }
}

/// Resolved argument/return term mapping for one call statement.
#[derive(Clone, Debug)]
pub struct CallSite {
    /// Resolved call target, when known.
    pub callee: Option<Callee>,
    /// Terms holding actual arguments, in callee argument order.
    pub args: SmallVec<[Term; 4]>,
    /// Terms holding returned values.
    pub rets: SmallVec<[Term; 2]>,
}

/// Per-function call-site bookkeeping. Built by the calling-convention
/// recovery stage; the liveness analysis reads the mapping and writes
/// back which return slots turned out to be meaningful, so that code
/// emission can prune the rest.
#[derive(Clone, Debug, Default)]
pub struct CallResolution {
    sites: FxHashMap<Stmt, CallSite>,
    /// Owning call statement of each return-slot term.
    ret_slots: FxHashMap<Term, Stmt>,
    /// Return slots some later code actually reads.
    used_rets: FxHashSet<Term>,
}

impl CallResolution {
    pub fn new() -> CallResolution {
        CallResolution::default()
    }

    pub fn add_site(&mut self, stmt: Stmt, site: CallSite) {
        for &ret in &site.rets {
            self.ret_slots.insert(ret, stmt);
        }
        self.sites.insert(stmt, site);
    }

    pub fn site(&self, stmt: Stmt) -> Option<&CallSite> {
        self.sites.get(&stmt)
    }

    /// The call statement owning `term` as a return slot, if any.
    pub fn ret_slot_owner(&self, term: Term) -> Option<Stmt> {
        self.ret_slots.get(&term).copied()
    }

    /// Analyzer annotation: this return slot is read by live code.
    /// Idempotent.
    pub fn mark_ret_used(&mut self, term: Term) {
        if self.used_rets.insert(term) {
            log::trace!("call resolution: return slot {} is used", term);
        }
    }

    pub fn ret_is_used(&self, term: Term) -> bool {
        self.used_rets.contains(&term)
    }
}
