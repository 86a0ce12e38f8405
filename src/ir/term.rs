use super::Term;
use crate::arch::Reg;

/// Direction of a register or memory access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    SignExtend,
    ZeroExtend,
    Truncate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Sar,
    Equal,
    SignedLess,
    UnsignedLess,
}

/// One atomic IR value site. Terms are owned by the function's arena;
/// operands are handles into the same arena.
///
/// Condition-code computations are not a separate kind: a flag is an
/// ordinary `Reg` of class `Flag`, written by an assignment whose source
/// is an operator term.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TermData {
    /// Integer immediate.
    Const(u64),
    /// Register or flag access.
    Reg(Reg, Access),
    /// Memory access; the address is computed by a subterm.
    Mem { addr: Term, access: Access },
    Unary(UnaryOp, Term),
    Binary(BinaryOp, Term, Term),
}

impl TermData {
    /// Visits the structural operands of this term (not its reaching
    /// definitions; those live in the dataflow index).
    pub fn visit_subterms<F: FnMut(Term)>(&self, mut f: F) {
        match self {
            TermData::Const(_) | TermData::Reg(..) => {}
            &TermData::Mem { addr, .. } => f(addr),
            &TermData::Unary(_, a) => f(a),
            &TermData::Binary(_, a, b) => {
                f(a);
                f(b);
            }
        }
    }

    /// Whether this term is a location write. Operator and constant
    /// terms only produce values.
    pub fn is_write(&self) -> bool {
        match self {
            TermData::Reg(_, Access::Write) => true,
            TermData::Mem {
                access: Access::Write,
                ..
            } => true,
            _ => false,
        }
    }

    /// Whether this term reads a location whose reaching definitions
    /// the dataflow index tracks.
    pub fn is_read(&self) -> bool {
        match self {
            TermData::Reg(_, Access::Read) => true,
            TermData::Mem {
                access: Access::Read,
                ..
            } => true,
            _ => false,
        }
    }
}
