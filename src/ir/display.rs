//! Displaying IR.

use super::{Function, JumpTarget, StmtData, Term, TermData};
use crate::liveness::Liveness;

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Renders one term as an expression, operands inlined.
pub struct TermDisplay<'a>(pub(crate) &'a Function, pub(crate) Term);

impl<'a> Display for TermDisplay<'a> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let func = self.0;
        match &func.terms[self.1] {
            &TermData::Const(value) => write!(f, "{:#x}", value),
            &TermData::Reg(reg, access) => write!(f, "{}.{:?}", reg, access),
            &TermData::Mem { addr, access } => {
                write!(f, "mem[{}].{:?}", TermDisplay(func, addr), access)
            }
            &TermData::Unary(op, a) => write!(f, "{:?}({})", op, TermDisplay(func, a)),
            &TermData::Binary(op, a, b) => write!(
                f,
                "{:?}({}, {})",
                op,
                TermDisplay(func, a),
                TermDisplay(func, b)
            ),
        }
    }
}

fn target_string(func: &Function, target: &JumpTarget) -> String {
    match target {
        &JumpTarget::Direct { block, addr } => {
            format!("{} ({})", block, TermDisplay(func, addr))
        }
        &JumpTarget::Computed(term) => format!("*{}", TermDisplay(func, term)),
    }
}

/// Displays a function body; with a `Liveness` attached, statements and
/// terms the analysis classified away are annotated.
pub struct FunctionDisplay<'a>(
    pub(crate) &'a Function,
    pub(crate) &'a str,
    pub(crate) Option<&'a Liveness>,
);

impl<'a> Display for FunctionDisplay<'a> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let func = self.0;
        let indent = self.1;
        writeln!(f, "{}function {{", indent)?;
        for (block, data) in func.blocks.entries() {
            writeln!(f, "{}  {}:", indent, block)?;
            for &pred in &data.preds {
                writeln!(f, "{}    # pred: {}", indent, pred)?;
            }
            for &stmt in &data.stmts {
                let note = match self.2 {
                    Some(liveness) if liveness.is_useless_jump(stmt) => "  # useless",
                    Some(liveness) if stmt_is_dead(func, liveness, stmt) => "  # dead",
                    _ => "",
                };
                let body = match &func.stmts[stmt] {
                    &StmtData::Assign { dst, src } => format!(
                        "{} := {}",
                        TermDisplay(func, dst),
                        TermDisplay(func, src)
                    ),
                    StmtData::Jump { target } => {
                        format!("jump {}", target_string(func, target))
                    }
                    StmtData::Branch {
                        cond,
                        if_true,
                        if_false,
                    } => format!(
                        "if {} then {} else {}",
                        TermDisplay(func, *cond),
                        target_string(func, if_true),
                        target_string(func, if_false)
                    ),
                    StmtData::Call { target, args, rets } => {
                        let args = args
                            .iter()
                            .map(|&arg| format!("{}", TermDisplay(func, arg)))
                            .collect::<Vec<_>>();
                        let rets = rets
                            .iter()
                            .map(|&ret| format!("{}", TermDisplay(func, ret)))
                            .collect::<Vec<_>>();
                        format!(
                            "[{}] = call {}({})",
                            rets.join(", "),
                            TermDisplay(func, *target),
                            args.join(", ")
                        )
                    }
                    StmtData::Return { values } => {
                        let values = values
                            .iter()
                            .map(|&value| format!("{}", TermDisplay(func, value)))
                            .collect::<Vec<_>>();
                        format!("return {}", values.join(", "))
                    }
                    StmtData::Nop => "nop".to_owned(),
                };
                writeln!(f, "{}    {}: {}{}", indent, stmt, body, note)?;
            }
        }
        writeln!(f, "{}}}", indent)?;
        Ok(())
    }
}

/// A statement is dead for display purposes when none of its terms
/// survived the analysis.
fn stmt_is_dead(func: &Function, liveness: &Liveness, stmt: super::Stmt) -> bool {
    let mut any_live = false;
    func.stmts[stmt].visit_terms(|term| {
        if liveness.is_live(term) {
            any_live = true;
        }
    });
    !any_live
}

impl Function {
    pub fn display_with_liveness<'a>(
        &'a self,
        indent: &'a str,
        liveness: &'a Liveness,
    ) -> FunctionDisplay<'a> {
        FunctionDisplay(self, indent, Some(liveness))
    }
}
