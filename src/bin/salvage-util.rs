//! SALVAGE command-line tool: builds small sample functions and shows
//! what the liveness analysis keeps and discards.

use anyhow::{bail, Result};
use log::debug;
use salvage::arch::{ArchDesc, RegClass};
use salvage::calling::{CallResolution, SignatureCatalog};
use salvage::cflow::StructuredFlow;
use salvage::dataflow::Dataflow;
use salvage::liveness::{Liveness, LivenessAnalyzer};
use salvage::{Access, BinaryOp, Function, StmtData, TermData};
use smallvec::smallvec;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "salvage-util", about = "SALVAGE utility.")]
struct Options {
    #[structopt(short, long)]
    debug: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    #[structopt(name = "print-ir", about = "Build a sample function and print its IR")]
    PrintIr {
        #[structopt(help = "Sample name: sum | dead-store")]
        sample: String,
    },
    #[structopt(
        name = "analyze",
        about = "Analyze a sample and print the live/dead classification"
    )]
    Analyze {
        #[structopt(help = "Sample name: sum | dead-store")]
        sample: String,
    },
}

struct Sample {
    arch: ArchDesc,
    function: Function,
    dataflow: Dataflow,
}

/// `r2 = r0 + r1; return r2`.
fn sample_sum() -> Sample {
    let mut arch = ArchDesc::new("demo");
    let r0 = arch.add_reg("r0", RegClass::General);
    let r1 = arch.add_reg("r1", RegClass::General);
    let r2 = arch.add_reg("r2", RegClass::General);

    let mut function = Function::new();
    let block = function.add_block();
    let a = function.add_term(TermData::Reg(r0, Access::Read));
    let b = function.add_term(TermData::Reg(r1, Access::Read));
    let add = function.add_term(TermData::Binary(BinaryOp::Add, a, b));
    let dst = function.add_term(TermData::Reg(r2, Access::Write));
    function.append_stmt(block, StmtData::Assign { dst, src: add });
    let ret = function.add_term(TermData::Reg(r2, Access::Read));
    function.append_stmt(block, StmtData::Return { values: smallvec![ret] });
    function.recompute_edges();
    function.ret_regs.push(r2);

    let mut dataflow = Dataflow::new();
    dataflow.add_def_use(dst, ret);

    Sample {
        arch,
        function,
        dataflow,
    }
}

/// `sp = sp - 8; r2 = r0 + r1; return r2`, with the stack-pointer value
/// resolved away by the dataflow layer (no remaining reads of it).
fn sample_dead_store() -> Sample {
    let mut arch = ArchDesc::new("demo");
    let r0 = arch.add_reg("r0", RegClass::General);
    let r1 = arch.add_reg("r1", RegClass::General);
    let r2 = arch.add_reg("r2", RegClass::General);
    let sp = arch.add_reg("sp", RegClass::General);
    arch.set_stack_pointer(sp);

    let mut function = Function::new();
    let block = function.add_block();
    let sp_read = function.add_term(TermData::Reg(sp, Access::Read));
    let eight = function.add_term(TermData::Const(8));
    let sub = function.add_term(TermData::Binary(BinaryOp::Sub, sp_read, eight));
    let sp_write = function.add_term(TermData::Reg(sp, Access::Write));
    function.append_stmt(
        block,
        StmtData::Assign {
            dst: sp_write,
            src: sub,
        },
    );
    let a = function.add_term(TermData::Reg(r0, Access::Read));
    let b = function.add_term(TermData::Reg(r1, Access::Read));
    let add = function.add_term(TermData::Binary(BinaryOp::Add, a, b));
    let dst = function.add_term(TermData::Reg(r2, Access::Write));
    function.append_stmt(block, StmtData::Assign { dst, src: add });
    let ret = function.add_term(TermData::Reg(r2, Access::Read));
    function.append_stmt(block, StmtData::Return { values: smallvec![ret] });
    function.recompute_edges();
    function.ret_regs.push(r2);

    let mut dataflow = Dataflow::new();
    dataflow.add_def_use(dst, ret);

    Sample {
        arch,
        function,
        dataflow,
    }
}

fn build(name: &str) -> Result<Sample> {
    match name {
        "sum" => Ok(sample_sum()),
        "dead-store" => Ok(sample_dead_store()),
        other => bail!("unknown sample: {}", other),
    }
}

fn main() -> Result<()> {
    let opts = Options::from_args();

    let mut logger = env_logger::Builder::from_default_env();
    if opts.debug {
        logger.filter_level(log::LevelFilter::Trace);
    }
    let _ = logger.try_init();

    match opts.command {
        Command::PrintIr { sample } => {
            let sample = build(&sample)?;
            sample.function.validate()?;
            print!("{}", sample.function.display(""));
        }
        Command::Analyze { sample } => {
            let sample = build(&sample)?;
            sample.function.validate()?;
            let flow = StructuredFlow::compute(&sample.function);
            let signatures = SignatureCatalog::new();
            let mut resolution = CallResolution::new();
            let mut liveness = Liveness::new();
            LivenessAnalyzer::new(
                &mut liveness,
                &sample.function,
                &sample.dataflow,
                &sample.arch,
                &flow,
                &mut resolution,
                &signatures,
            )
            .analyze();
            debug!(
                "{} live terms, {} useless jumps",
                liveness.num_live(),
                liveness.useless_jumps().len()
            );
            print!("{}", sample.function.display_with_liveness("", &liveness));
        }
    }

    Ok(())
}
