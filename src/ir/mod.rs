//! Intermediate representation of one decompiled function.

use crate::declare_entity;

declare_entity!(Block, "block");
declare_entity!(Stmt, "stmt");
declare_entity!(Term, "term");

mod func;
mod stmt;
mod term;
pub use func::{BlockData, Function};
pub use stmt::{JumpTarget, StmtData};
pub use term::{Access, BinaryOp, TermData, UnaryOp};

mod display;
pub use display::{FunctionDisplay, TermDisplay};
