//! Integration tests for the liveness analysis: scenario coverage plus
//! the structural properties (idempotence, closure, useless-jump
//! soundness) the rest of the pipeline relies on.

use salvage::arch::{ArchDesc, Reg, RegClass};
use salvage::calling::{CallResolution, CallSite, Callee, Signature, SignatureCatalog};
use salvage::cflow::StructuredFlow;
use salvage::dataflow::{Dataflow, MemLoc};
use salvage::liveness::{self, Liveness, LivenessAnalyzer, Policy};
use salvage::{Access, BinaryOp, Block, Function, JumpTarget, Stmt, StmtData, Term, TermData};
use smallvec::{smallvec, SmallVec};

struct Env {
    arch: ArchDesc,
    func: Function,
    dataflow: Dataflow,
    resolution: CallResolution,
    signatures: SignatureCatalog,
    r0: Reg,
    r1: Reg,
    r2: Reg,
    sp: Reg,
    zf: Reg,
}

impl Env {
    fn new() -> Env {
        let mut arch = ArchDesc::new("testarch");
        let r0 = arch.add_reg("r0", RegClass::General);
        let r1 = arch.add_reg("r1", RegClass::General);
        let r2 = arch.add_reg("r2", RegClass::General);
        let sp = arch.add_reg("sp", RegClass::General);
        let zf = arch.add_reg("zf", RegClass::Flag);
        arch.set_stack_pointer(sp);
        Env {
            arch,
            func: Function::new(),
            dataflow: Dataflow::new(),
            resolution: CallResolution::new(),
            signatures: SignatureCatalog::new(),
            r0,
            r1,
            r2,
            sp,
            zf,
        }
    }

    fn read(&mut self, reg: Reg) -> Term {
        self.func.add_term(TermData::Reg(reg, Access::Read))
    }

    fn write(&mut self, reg: Reg) -> Term {
        self.func.add_term(TermData::Reg(reg, Access::Write))
    }

    fn konst(&mut self, value: u64) -> Term {
        self.func.add_term(TermData::Const(value))
    }

    fn assign(&mut self, block: Block, dst: Term, src: Term) -> Stmt {
        self.func.append_stmt(block, StmtData::Assign { dst, src })
    }

    /// Appends a direct jump; returns the statement and its
    /// address-immediate term.
    fn jump(&mut self, block: Block, to: Block) -> (Stmt, Term) {
        let addr = self.konst(0x1000);
        let stmt = self.func.append_stmt(
            block,
            StmtData::Jump {
                target: JumpTarget::Direct { block: to, addr },
            },
        );
        (stmt, addr)
    }

    fn ret(&mut self, block: Block, values: Vec<Term>) -> Stmt {
        self.func.append_stmt(
            block,
            StmtData::Return {
                values: values.into_iter().collect(),
            },
        )
    }

    fn finish(&mut self) -> StructuredFlow {
        self.func.recompute_edges();
        self.func.validate().unwrap();
        StructuredFlow::compute(&self.func)
    }

    fn run(&mut self, flow: &StructuredFlow) -> Liveness {
        let mut liveness = Liveness::new();
        self.run_into(flow, &mut liveness);
        liveness
    }

    fn run_into(&mut self, flow: &StructuredFlow, liveness: &mut Liveness) {
        LivenessAnalyzer::new(
            liveness,
            &self.func,
            &self.dataflow,
            &self.arch,
            flow,
            &mut self.resolution,
            &self.signatures,
        )
        .analyze();
    }
}

/// Every live term's dependencies are live too: reaching definitions
/// and structural operands.
fn assert_closure(env: &Env, liveness: &Liveness) {
    for term in liveness.live_terms() {
        for &def in env.dataflow.defs(term) {
            assert!(
                liveness.is_live(def),
                "dangling live dependency: {} defines live {} but is dead",
                def,
                term
            );
        }
        env.func.terms[term].visit_subterms(|sub| {
            assert!(
                liveness.is_live(sub),
                "dangling operand: {} of live {} is dead",
                sub,
                term
            );
        });
    }
}

/// Every jump marked useless transfers exactly where the structured
/// shape already goes.
fn assert_useless_sound(env: &Env, flow: &StructuredFlow, liveness: &Liveness) {
    for &stmt in liveness.useless_jumps() {
        let block = env.func.stmt_block[stmt];
        let target = match &env.func.stmts[stmt] {
            StmtData::Jump { target } => target.block().expect("direct jump"),
            other => panic!("non-jump {} marked useless: {:?}", stmt, other),
        };
        assert_eq!(flow.implied_successor(block), Some(target));
    }
}

/// Builds `r2 = r0 + r1; return r2`, returning the interesting terms:
/// (a, b, add, dst, ret_read).
fn build_sum(env: &mut Env) -> (Term, Term, Term, Term, Term) {
    let block = env.func.add_block();
    let a = env.read(env.r0);
    let b = env.read(env.r1);
    let add = env.func.add_term(TermData::Binary(BinaryOp::Add, a, b));
    let dst = env.write(env.r2);
    env.assign(block, dst, add);
    let ret_read = env.read(env.r2);
    env.ret(block, vec![ret_read]);
    env.dataflow.add_def_use(dst, ret_read);
    (a, b, add, dst, ret_read)
}

#[test]
fn scenario_sum_exact_live_set() {
    let mut env = Env::new();
    let (a, b, add, dst, ret_read) = build_sum(&mut env);
    let flow = env.finish();
    let liveness = env.run(&flow);

    for &term in &[a, b, add, dst, ret_read] {
        assert!(liveness.is_live(term), "{} should be live", term);
    }
    assert_eq!(liveness.num_live(), 5, "nothing else should be live");
    assert!(liveness.useless_jumps().is_empty());
    assert_closure(&env, &liveness);
}

#[test]
fn scenario_stack_adjustment_is_dead() {
    let mut env = Env::new();
    let block = env.func.add_block();
    // sp = sp - 8, with no remaining reads of sp (the dataflow layer
    // resolved them into frame offsets).
    let sp_read = env.read(env.sp);
    let eight = env.konst(8);
    let sub = env
        .func
        .add_term(TermData::Binary(BinaryOp::Sub, sp_read, eight));
    let sp_write = env.write(env.sp);
    env.assign(block, sp_write, sub);
    let ret_read = env.read(env.r0);
    let ret_dst = env.write(env.r0);
    let one = env.konst(1);
    env.assign(block, ret_dst, one);
    env.ret(block, vec![ret_read]);
    env.dataflow.add_def_use(ret_dst, ret_read);
    let flow = env.finish();
    let liveness = env.run(&flow);

    for &term in &[sp_write, sub, sp_read, eight] {
        assert!(!liveness.is_live(term), "{} should be dead", term);
    }
    for &term in &[ret_read, ret_dst, one] {
        assert!(liveness.is_live(term), "{} should be live", term);
    }
    assert_closure(&env, &liveness);
}

#[test]
fn return_register_write_is_root_without_reader() {
    let mut env = Env::new();
    env.func.ret_regs.push(env.r0);
    let block = env.func.add_block();
    let dst = env.write(env.r0);
    let value = env.konst(42);
    env.assign(block, dst, value);
    env.ret(block, vec![]);
    let flow = env.finish();
    let liveness = env.run(&flow);

    assert!(liveness.is_live(dst));
    assert!(liveness.is_live(value));
}

#[test]
fn scenario_unread_call_return_is_dead() {
    let mut env = Env::new();
    let block = env.func.add_block();
    let target = env.konst(0x4000);
    let arg = env.read(env.r0);
    let ret_slot = env.write(env.r1);
    let call = env.func.append_stmt(
        block,
        StmtData::Call {
            target,
            args: smallvec![arg],
            rets: smallvec![ret_slot],
        },
    );
    env.ret(block, vec![]);

    let callee = Callee::from(0);
    env.signatures.add(
        callee,
        Signature {
            params: 1,
            returns: 1,
            variadic: false,
        },
    );
    env.resolution.add_site(
        call,
        CallSite {
            callee: Some(callee),
            args: smallvec![arg],
            rets: smallvec![ret_slot],
        },
    );
    let flow = env.finish();
    let liveness = env.run(&flow);

    assert!(liveness.is_live(target));
    assert!(liveness.is_live(arg), "signature consumes the argument");
    assert!(!liveness.is_live(ret_slot), "return value never read");
    assert!(!env.resolution.ret_is_used(ret_slot));
}

#[test]
fn read_call_return_is_live_and_annotated() {
    let mut env = Env::new();
    let block = env.func.add_block();
    let target = env.konst(0x4000);
    let ret_slot = env.write(env.r1);
    let call = env.func.append_stmt(
        block,
        StmtData::Call {
            target,
            args: SmallVec::new(),
            rets: smallvec![ret_slot],
        },
    );
    let ret_read = env.read(env.r1);
    env.ret(block, vec![ret_read]);
    env.dataflow.add_def_use(ret_slot, ret_read);

    env.resolution.add_site(
        call,
        CallSite {
            callee: None,
            args: SmallVec::new(),
            rets: smallvec![ret_slot],
        },
    );
    let flow = env.finish();
    let liveness = env.run(&flow);

    assert!(liveness.is_live(ret_slot));
    assert!(env.resolution.ret_is_used(ret_slot));
    assert_closure(&env, &liveness);
}

#[test]
fn unknown_signature_roots_all_args_known_roots_consumed_prefix() {
    let mut env = Env::new();
    let block = env.func.add_block();
    let target = env.konst(0x4000);
    let arg0 = env.read(env.r0);
    let arg1 = env.read(env.r1);
    let call = env.func.append_stmt(
        block,
        StmtData::Call {
            target,
            args: smallvec![arg0, arg1],
            rets: SmallVec::new(),
        },
    );
    env.ret(block, vec![]);

    // Known, single-parameter signature: only the consumed prefix of
    // the argument slots is rooted.
    let callee = Callee::from(0);
    env.signatures.add(
        callee,
        Signature {
            params: 1,
            returns: 0,
            variadic: false,
        },
    );
    env.resolution.add_site(
        call,
        CallSite {
            callee: Some(callee),
            args: smallvec![arg0, arg1],
            rets: SmallVec::new(),
        },
    );
    let flow = env.finish();
    let liveness = env.run(&flow);
    assert!(liveness.is_live(arg0));
    assert!(!liveness.is_live(arg1));

    // Unresolved callee: every argument slot is conservatively a root.
    let mut env = Env::new();
    let block = env.func.add_block();
    let target = env.konst(0x4000);
    let arg0 = env.read(env.r0);
    let arg1 = env.read(env.r1);
    env.func.append_stmt(
        block,
        StmtData::Call {
            target,
            args: smallvec![arg0, arg1],
            rets: SmallVec::new(),
        },
    );
    env.ret(block, vec![]);
    let flow = env.finish();
    let liveness = env.run(&flow);
    assert!(liveness.is_live(arg0));
    assert!(liveness.is_live(arg1));
}

/// An indirect jump can never be elided: its address computation is a
/// root regardless of where control actually lands.
#[test]
fn computed_jump_target_is_always_root() {
    let mut env = Env::new();
    let block = env.func.add_block();
    let base = env.read(env.r0);
    let disp = env.konst(0x100);
    let addr = env
        .func
        .add_term(TermData::Binary(BinaryOp::Add, base, disp));
    let jump = env.func.append_stmt(
        block,
        StmtData::Jump {
            target: JumpTarget::Computed(addr),
        },
    );
    let flow = env.finish();
    let liveness = env.run(&flow);

    assert!(!liveness.is_useless_jump(jump));
    assert!(liveness.useless_jumps().is_empty());
    for &term in &[addr, base, disp] {
        assert!(liveness.is_live(term), "{} should be live", term);
    }
    assert_eq!(liveness.num_live(), 3, "nothing else should be live");
    assert_closure(&env, &liveness);
}

/// A variadic callee may consume any argument slot, so the
/// consumed-prefix rule does not apply even with a resolved signature.
#[test]
fn variadic_signature_roots_every_argument() {
    let mut env = Env::new();
    let block = env.func.add_block();
    let target = env.konst(0x4000);
    let fmt = env.read(env.r0);
    let extra0 = env.read(env.r1);
    let extra1 = env.read(env.r2);
    let call = env.func.append_stmt(
        block,
        StmtData::Call {
            target,
            args: smallvec![fmt, extra0, extra1],
            rets: SmallVec::new(),
        },
    );
    env.ret(block, vec![]);

    // One declared parameter, but variadic.
    let callee = Callee::from(0);
    env.signatures.add(
        callee,
        Signature {
            params: 1,
            returns: 0,
            variadic: true,
        },
    );
    env.resolution.add_site(
        call,
        CallSite {
            callee: Some(callee),
            args: smallvec![fmt, extra0, extra1],
            rets: SmallVec::new(),
        },
    );
    let flow = env.finish();
    let liveness = env.run(&flow);
    for &term in &[fmt, extra0, extra1] {
        assert!(liveness.is_live(term), "{} should be live", term);
    }
}

/// Diamond: b0 branches to b1/b2, both jump to b3. With emission order
/// b0, b2, b1, b3 the jump out of b1 is the fallthrough (useless) and
/// the jump out of b2 is a real goto.
#[test]
fn scenario_useless_and_needed_jumps() {
    let mut env = Env::new();
    let b0 = env.func.add_block();
    let b1 = env.func.add_block();
    let b2 = env.func.add_block();
    let b3 = env.func.add_block();

    let cond = env.read(env.zf);
    let t_addr = env.konst(0x10);
    let f_addr = env.konst(0x20);
    env.func.append_stmt(
        b0,
        StmtData::Branch {
            cond,
            if_true: JumpTarget::Direct {
                block: b1,
                addr: t_addr,
            },
            if_false: JumpTarget::Direct {
                block: b2,
                addr: f_addr,
            },
        },
    );
    let (jump1, addr1) = env.jump(b1, b3);
    let (jump2, addr2) = env.jump(b2, b3);
    env.ret(b3, vec![]);
    let flow = env.finish();
    assert_eq!(flow.order(), &[b0, b2, b1, b3]);

    let liveness = env.run(&flow);
    assert!(liveness.is_live(cond));
    // b1 falls through to b3 in the structured order.
    assert_eq!(liveness.useless_jumps(), &[jump1]);
    assert!(!liveness.is_live(addr1));
    // b2's jump skips over b1: a real transfer, target term live.
    assert!(!liveness.is_useless_jump(jump2));
    assert!(liveness.is_live(addr2));
    // The taken arm of the branch needs its target; the fallthrough
    // arm's immediate dies with the encoding.
    assert!(liveness.is_live(t_addr));
    assert!(!liveness.is_live(f_addr));
    assert_useless_sound(&env, &flow, &liveness);
}

/// A while-loop: the back-edge jump is implied by the loop construct,
/// and loop-carried def-use cycles terminate cleanly.
#[test]
fn loop_back_jump_and_cyclic_dataflow() {
    let mut env = Env::new();
    let b0 = env.func.add_block();
    let b1 = env.func.add_block(); // header: branch on zf
    let b2 = env.func.add_block(); // body: r1 += 1; zf = (r1 == 10); jump b1
    let b3 = env.func.add_block(); // exit: return r1

    let (entry_jump, _) = env.jump(b0, b1);
    let cond = env.read(env.zf);
    let t_addr = env.konst(0x30);
    let f_addr = env.konst(0x40);
    env.func.append_stmt(
        b1,
        StmtData::Branch {
            cond,
            if_true: JumpTarget::Direct {
                block: b3,
                addr: t_addr,
            },
            if_false: JumpTarget::Direct {
                block: b2,
                addr: f_addr,
            },
        },
    );

    let i_read = env.read(env.r1);
    let one = env.konst(1);
    let inc = env
        .func
        .add_term(TermData::Binary(BinaryOp::Add, i_read, one));
    let i_write = env.write(env.r1);
    env.assign(b2, i_write, inc);
    let i_read2 = env.read(env.r1);
    let ten = env.konst(10);
    let eq = env
        .func
        .add_term(TermData::Binary(BinaryOp::Equal, i_read2, ten));
    let zf_write = env.write(env.zf);
    env.assign(b2, zf_write, eq);
    let (back_jump, back_addr) = env.jump(b2, b1);

    let i_read3 = env.read(env.r1);
    env.ret(b3, vec![i_read3]);

    // Loop-carried definitions: every read of r1 may see the increment
    // from a previous iteration.
    env.dataflow.add_def_use(i_write, i_read);
    env.dataflow.add_def_use(i_write, i_read2);
    env.dataflow.add_def_use(i_write, i_read3);
    env.dataflow.add_def_use(zf_write, cond);

    let flow = env.finish();
    assert_eq!(flow.order(), &[b0, b1, b2, b3]);
    let liveness = env.run(&flow);

    // Both the entry jump (fallthrough) and the back-edge jump (implied
    // by the loop construct) are useless.
    assert_eq!(liveness.useless_jumps(), &[entry_jump, back_jump]);
    assert!(!liveness.is_live(back_addr));
    // The cyclic chain cond -> zf_write -> i_read2 -> i_write -> i_read
    // -> i_write terminates and marks everything once.
    for &term in &[cond, zf_write, eq, i_read2, ten, i_write, inc, i_read, one, i_read3] {
        assert!(liveness.is_live(term), "{} should be live", term);
    }
    assert!(!liveness.is_live(f_addr), "fallthrough arm immediate dies");
    assert_closure(&env, &liveness);
    assert_useless_sound(&env, &flow, &liveness);
}

#[test]
fn local_store_dead_global_store_root() {
    let mut env = Env::new();
    let block = env.func.add_block();

    // Local spill: mem[sp - 8] = r0, never reloaded.
    let sp_read = env.read(env.sp);
    let eight = env.konst(8);
    let slot_addr = env
        .func
        .add_term(TermData::Binary(BinaryOp::Sub, sp_read, eight));
    let spill = env.func.add_term(TermData::Mem {
        addr: slot_addr,
        access: Access::Write,
    });
    let spill_src = env.read(env.r0);
    env.assign(block, spill, spill_src);
    env.dataflow.set_loc(spill, MemLoc::Stack(-8));

    // Global store: mem[0x6000] = r1.
    let global_addr = env.konst(0x6000);
    let store = env.func.add_term(TermData::Mem {
        addr: global_addr,
        access: Access::Write,
    });
    let store_src = env.read(env.r1);
    env.assign(block, store, store_src);
    env.dataflow.set_loc(store, MemLoc::Global(0x6000));

    env.ret(block, vec![]);
    let flow = env.finish();
    let liveness = env.run(&flow);

    for &term in &[spill, slot_addr, sp_read, eight, spill_src] {
        assert!(!liveness.is_live(term), "{} should be dead", term);
    }
    for &term in &[store, global_addr, store_src] {
        assert!(liveness.is_live(term), "{} should be live", term);
    }
    assert_closure(&env, &liveness);
}

#[test]
fn rerunning_analysis_is_idempotent() {
    let mut env = Env::new();
    build_sum(&mut env);
    let flow = env.finish();
    let mut liveness = env.run(&flow);

    let live_before = liveness.num_live();
    let jumps_before = liveness.useless_jumps().len();
    env.run_into(&flow, &mut liveness);
    assert_eq!(liveness.num_live(), live_before);
    assert_eq!(liveness.useless_jumps().len(), jumps_before);
}

/// A policy that keeps every flag write, wrapping the default rules.
struct FlagsAlwaysLive;

impl Policy for FlagsAlwaysLive {
    fn compute_statement_liveness(&self, cx: &mut LivenessAnalyzer<'_>, stmt: Stmt) {
        liveness::default_statement_liveness(cx, stmt);
        if let &StmtData::Assign { dst, .. } = &cx.function().stmts[stmt] {
            if let &TermData::Reg(reg, Access::Write) = &cx.function().terms[dst] {
                if cx.arch().is_flag(reg) {
                    cx.make_live(dst);
                }
            }
        }
    }
}

#[test]
fn policy_override_keeps_flag_writes() {
    let build = |env: &mut Env| -> Term {
        let block = env.func.add_block();
        let a = env.read(env.r0);
        let b = env.read(env.r1);
        let eq = env.func.add_term(TermData::Binary(BinaryOp::Equal, a, b));
        let zf_write = env.write(env.zf);
        env.assign(block, zf_write, eq);
        env.ret(block, vec![]);
        zf_write
    };

    // Default rules: an unread flag write is dead.
    let mut env = Env::new();
    let zf_write = build(&mut env);
    let flow = env.finish();
    let liveness = env.run(&flow);
    assert!(!liveness.is_live(zf_write));

    // Overriding policy: rooted.
    let mut env = Env::new();
    let zf_write = build(&mut env);
    let flow = env.finish();
    let mut liveness = Liveness::new();
    let policy = FlagsAlwaysLive;
    LivenessAnalyzer::with_policy(
        &policy,
        &mut liveness,
        &env.func,
        &env.dataflow,
        &env.arch,
        &flow,
        &mut env.resolution,
        &env.signatures,
    )
    .analyze();
    assert!(liveness.is_live(zf_write));
    assert_closure(&env, &liveness);
}

#[test]
fn pipeline_analyzes_functions_in_parallel() {
    use salvage::pipeline::{analyze_all, AnalysisUnit};

    let arch = {
        let env = Env::new();
        env.arch
    };
    let signatures = SignatureCatalog::new();

    let mut units = vec![];
    for _ in 0..8 {
        let mut env = Env::new();
        build_sum(&mut env);
        env.func.recompute_edges();
        units.push(AnalysisUnit::new(
            env.func,
            env.dataflow,
            CallResolution::new(),
        ));
    }
    analyze_all(&mut units, &arch, &signatures);
    for unit in &units {
        assert_eq!(unit.liveness.num_live(), 5);
    }
}
