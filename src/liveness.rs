//! Determination of which terms must survive into generated high-level
//! code, and which jumps are artifacts of linear instruction encoding.
//!
//! This differs from classic liveness analysis. A term can be live in
//! the textbook sense (its value may be read before being overwritten)
//! and still be dead for our purposes: a stack-pointer update never
//! appears in the generated code once frame offsets have been resolved.
//! The analysis therefore combines backward def-use propagation with
//! per-kind judgment about what has an observable effect in the output
//! language.

use crate::arch::ArchDesc;
use crate::calling::{CallResolution, SignatureCatalog};
use crate::cflow::StructuredFlow;
use crate::dataflow::{Dataflow, MemLoc};
use crate::entity::EntityRef;
use crate::ir::{Access, Function, JumpTarget, Stmt, StmtData, Term, TermData};
use fxhash::FxHashSet;
use smallvec::SmallVec;

/// The analysis result: the set of terms needed to reproduce the
/// function's observable behavior, plus the jumps whose transfers the
/// structured flow shape already implies.
///
/// The live set is append-only for the lifetime of the value; re-running
/// an analysis over a populated result is a no-op.
#[derive(Clone, Debug, Default)]
pub struct Liveness {
    live: FxHashSet<Term>,
    useless_jumps: Vec<Stmt>,
    useless_set: FxHashSet<Stmt>,
}

impl Liveness {
    pub fn new() -> Liveness {
        Liveness::default()
    }

    /// Inserts a term into the live set. Returns `false` if it was
    /// already present.
    pub fn mark(&mut self, term: Term) -> bool {
        self.live.insert(term)
    }

    pub fn is_live(&self, term: Term) -> bool {
        self.live.contains(&term)
    }

    pub fn live_terms(&self) -> impl Iterator<Item = Term> + '_ {
        self.live.iter().copied()
    }

    pub fn num_live(&self) -> usize {
        self.live.len()
    }

    pub fn record_useless_jump(&mut self, stmt: Stmt) {
        if self.useless_set.insert(stmt) {
            self.useless_jumps.push(stmt);
        }
    }

    pub fn is_useless_jump(&self, stmt: Stmt) -> bool {
        self.useless_set.contains(&stmt)
    }

    /// Jumps code emission should not render, in discovery order.
    pub fn useless_jumps(&self) -> &[Stmt] {
        &self.useless_jumps[..]
    }
}

/// The three decision points of the analysis, replaceable wholesale for
/// architecture- or scenario-specific variants. Every method has a
/// default body implementing the standard rules; overrides that handle
/// only some kinds should delegate the rest to the `default_*` free
/// functions, and must panic on a kind they do not understand rather
/// than silently skip it: keeping an unnecessary term is safe, losing
/// a necessary one drops behavior from the generated code.
pub trait Policy {
    /// Decides which of a statement's terms are roots (live regardless
    /// of downstream reads) and seeds propagation from them. Also the
    /// only place useless jumps are recorded.
    fn compute_statement_liveness(&self, cx: &mut LivenessAnalyzer<'_>, stmt: Stmt) {
        default_statement_liveness(cx, stmt);
    }

    /// Per-kind side effects for a term that just became live. Invoked
    /// exactly once per term per run, from within `make_live`.
    fn compute_term_liveness(&self, cx: &mut LivenessAnalyzer<'_>, term: Term) {
        default_term_liveness(cx, term);
    }

    /// Marks live everything the given live term depends on: structural
    /// operands, reaching definitions, and an assignment's source for
    /// its destination.
    fn propagate_liveness(&self, cx: &mut LivenessAnalyzer<'_>, term: Term) {
        default_propagate_liveness(cx, term);
    }
}

/// The standard rules, unmodified.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPolicy;

impl Policy for DefaultPolicy {}

const DEFAULT_POLICY: DefaultPolicy = DefaultPolicy;

/// Drives one liveness run over one function. Borrows every collaborator
/// for the duration of `analyze()`; all collaborators must be fully
/// built and mutually consistent before construction (the dataflow index
/// must already reflect the final structured flow).
pub struct LivenessAnalyzer<'a> {
    liveness: &'a mut Liveness,
    function: &'a Function,
    dataflow: &'a Dataflow,
    arch: &'a ArchDesc,
    flow: &'a StructuredFlow,
    call_resolution: &'a mut CallResolution,
    signatures: &'a SignatureCatalog,
    policy: &'a dyn Policy,
}

impl<'a> LivenessAnalyzer<'a> {
    pub fn new(
        liveness: &'a mut Liveness,
        function: &'a Function,
        dataflow: &'a Dataflow,
        arch: &'a ArchDesc,
        flow: &'a StructuredFlow,
        call_resolution: &'a mut CallResolution,
        signatures: &'a SignatureCatalog,
    ) -> LivenessAnalyzer<'a> {
        Self::with_policy(
            &DEFAULT_POLICY,
            liveness,
            function,
            dataflow,
            arch,
            flow,
            call_resolution,
            signatures,
        )
    }

    pub fn with_policy(
        policy: &'a dyn Policy,
        liveness: &'a mut Liveness,
        function: &'a Function,
        dataflow: &'a Dataflow,
        arch: &'a ArchDesc,
        flow: &'a StructuredFlow,
        call_resolution: &'a mut CallResolution,
        signatures: &'a SignatureCatalog,
    ) -> LivenessAnalyzer<'a> {
        LivenessAnalyzer {
            liveness,
            function,
            dataflow,
            arch,
            flow,
            call_resolution,
            signatures,
            policy,
        }
    }

    pub fn liveness(&self) -> &Liveness {
        self.liveness
    }

    pub fn liveness_mut(&mut self) -> &mut Liveness {
        self.liveness
    }

    pub fn function(&self) -> &'a Function {
        self.function
    }

    pub fn dataflow(&self) -> &'a Dataflow {
        self.dataflow
    }

    pub fn arch(&self) -> &'a ArchDesc {
        self.arch
    }

    pub fn flow(&self) -> &'a StructuredFlow {
        self.flow
    }

    pub fn signatures(&self) -> &'a SignatureCatalog {
        self.signatures
    }

    pub fn call_resolution(&self) -> &CallResolution {
        self.call_resolution
    }

    pub fn call_resolution_mut(&mut self) -> &mut CallResolution {
        self.call_resolution
    }

    /// Computes the set of used terms and the set of useless jumps,
    /// writing both into the `Liveness` sink.
    pub fn analyze(&mut self) {
        let flow = self.flow;
        let function = self.function;
        let policy = self.policy;
        for stmt in flow.stmts(function) {
            log::trace!("liveness: classifying {}", stmt);
            policy.compute_statement_liveness(self, stmt);
        }
    }

    /// If the term is not yet live, marks it live and propagates
    /// further. The mark happens before the expansion; that ordering is
    /// what terminates propagation over cyclic (loop-carried) def-use
    /// chains.
    pub fn make_live(&mut self, term: Term) {
        if !self.liveness.mark(term) {
            return;
        }
        log::trace!("liveness: {} is live", term);
        let policy = self.policy;
        policy.compute_term_liveness(self, term);
        policy.propagate_liveness(self, term);
    }

    /// Whether a write term has an effect visible outside the function
    /// even if nothing in the function reads it back: a write to one of
    /// the function's own return registers, or a store to non-local
    /// memory. Stack-pointer, frame-pointer and flag updates are never
    /// observable; they vanish once frame offsets and conditions are
    /// resolved.
    pub fn write_is_observable(&self, term: Term) -> bool {
        match self.function.terms[term] {
            TermData::Reg(reg, Access::Write) => {
                if self.arch.is_stack_pointer(reg)
                    || self.arch.is_frame_pointer(reg)
                    || self.arch.is_flag(reg)
                {
                    false
                } else {
                    self.function.ret_regs.contains(&reg)
                }
            }
            TermData::Mem {
                access: Access::Write,
                ..
            } => match self.dataflow.loc(term) {
                // Frame-local storage; invisible from outside.
                Some(MemLoc::Stack(_)) | Some(MemLoc::Reg(_)) => false,
                Some(MemLoc::Global(_)) | Some(MemLoc::Unknown) | None => true,
            },
            _ => false,
        }
    }
}

/// Standard statement classification: seeds roots per statement kind and
/// records useless jumps.
pub fn default_statement_liveness(cx: &mut LivenessAnalyzer<'_>, stmt: Stmt) {
    match &cx.function().stmts[stmt] {
        &StmtData::Assign { dst, .. } => {
            // Plain writes become live through their readers; only
            // externally observable ones are roots.
            if cx.write_is_observable(dst) {
                cx.make_live(dst);
            }
        }
        &StmtData::Jump { target } => match target {
            JumpTarget::Direct { block, addr } => {
                let from = cx.function().stmt_block[stmt];
                if cx.flow().implied_successor(from) == Some(block) {
                    log::trace!("liveness: {} is a useless jump", stmt);
                    cx.liveness_mut().record_useless_jump(stmt);
                } else {
                    cx.make_live(addr);
                }
            }
            JumpTarget::Computed(term) => cx.make_live(term),
        },
        &StmtData::Branch {
            cond,
            if_true,
            if_false,
        } => {
            cx.make_live(cond);
            let from = cx.function().stmt_block[stmt];
            for target in &[if_true, if_false] {
                match *target {
                    JumpTarget::Direct { block, addr } => {
                        // The fallthrough arm's address immediate dies
                        // with the branch's linear encoding.
                        if cx.flow().implied_successor(from) != Some(block) {
                            cx.make_live(addr);
                        }
                    }
                    JumpTarget::Computed(term) => cx.make_live(term),
                }
            }
        }
        StmtData::Call { target, args, .. } => {
            cx.make_live(*target);
            // Arguments the callee consumes are roots; with an unknown
            // or variadic signature every argument is, conservatively.
            // Return slots are left to backward propagation.
            let consumed = cx
                .call_resolution()
                .site(stmt)
                .and_then(|site| site.callee)
                .and_then(|callee| cx.signatures().get(callee))
                .map(|sig| {
                    if sig.variadic {
                        args.len()
                    } else {
                        sig.params.min(args.len())
                    }
                })
                .unwrap_or(args.len());
            for &arg in &args[..consumed] {
                cx.make_live(arg);
            }
        }
        StmtData::Return { values } => {
            // A function's returned values are its externally observable
            // output.
            for &value in values {
                cx.make_live(value);
            }
        }
        StmtData::Nop => {}
    }
}

/// Standard per-term handling on becoming live. The only side effect in
/// the standard rules is the call-resolution annotation: a live return
/// slot means the call's result is actually consumed.
pub fn default_term_liveness(cx: &mut LivenessAnalyzer<'_>, term: Term) {
    if cx.call_resolution().ret_slot_owner(term).is_some() {
        cx.call_resolution_mut().mark_ret_used(term);
    }
}

/// Standard backward closure step for one live term.
pub fn default_propagate_liveness(cx: &mut LivenessAnalyzer<'_>, term: Term) {
    let mut deps: SmallVec<[Term; 4]> = SmallVec::new();
    let data = &cx.function().terms[term];
    // Structural operands: a memory access needs its address, an
    // operator its operands.
    data.visit_subterms(|sub| deps.push(sub));
    // Reads need the definitions that may reach them.
    if data.is_read() {
        deps.extend(cx.dataflow().defs(term).iter().copied());
    }
    // An assignment's destination needs the source that computes the
    // stored value.
    if data.is_write() {
        let stmt = cx.function().term_stmt[term];
        if stmt.is_valid() {
            if let &StmtData::Assign { dst, src } = &cx.function().stmts[stmt] {
                if dst == term {
                    deps.push(src);
                }
            }
        }
    }
    for dep in deps {
        cx.make_live(dep);
    }
}
