use super::{Block, FunctionDisplay, Stmt, StmtData, Term, TermData};
use crate::arch::Reg;
use crate::entity::{EntityRef, EntityVec, PerEntity};
use crate::errors::IrError;
use smallvec::SmallVec;

/// One decompiled function: the owning arena for its blocks, statements
/// and terms. The liveness analyzer and its result hold handles into
/// these arenas, never references.
#[derive(Clone, Debug, Default)]
pub struct Function {
    /// Entry block.
    pub entry: Block,
    /// Block bodies.
    pub blocks: EntityVec<Block, BlockData>,
    /// Statement bodies.
    pub stmts: EntityVec<Stmt, StmtData>,
    /// Term bodies.
    pub terms: EntityVec<Term, TermData>,
    /// Owning block of each placed statement.
    pub stmt_block: PerEntity<Stmt, Block>,
    /// Owning statement of each placed term, including operand subterms.
    pub term_stmt: PerEntity<Term, Stmt>,
    /// Registers that carry this function's own return value, per its
    /// recovered signature. Writes to these are externally observable.
    pub ret_regs: Vec<Reg>,
}

#[derive(Clone, Debug, Default)]
pub struct BlockData {
    /// Statements in this block, terminator last.
    pub stmts: Vec<Stmt>,
    /// Successor blocks (direct jump targets only).
    pub succs: SmallVec<[Block; 2]>,
    /// Predecessor blocks.
    pub preds: SmallVec<[Block; 2]>,
}

impl Function {
    pub fn new() -> Function {
        Function::default()
    }

    pub fn add_block(&mut self) -> Block {
        let block = self.blocks.push(BlockData::default());
        log::trace!("add_block: {}", block);
        if block.index() == 0 {
            self.entry = block;
        }
        block
    }

    pub fn add_term(&mut self, data: TermData) -> Term {
        let term = self.terms.push(data);
        log::trace!("add_term: {} = {:?}", term, self.terms[term]);
        term
    }

    /// Appends a statement to a block, recording statement and term
    /// ownership. Operand subterms are claimed transitively.
    pub fn append_stmt(&mut self, block: Block, data: StmtData) -> Stmt {
        let stmt = self.stmts.push(data);
        log::trace!("append_stmt: {} in {}: {:?}", stmt, block, self.stmts[stmt]);
        self.blocks[block].stmts.push(stmt);
        self.stmt_block[stmt] = block;
        let mut worklist: SmallVec<[Term; 8]> = SmallVec::new();
        self.stmts[stmt].visit_terms(|term| worklist.push(term));
        while let Some(term) = worklist.pop() {
            self.term_stmt[term] = stmt;
            self.terms[term].visit_subterms(|sub| worklist.push(sub));
        }
        stmt
    }

    /// Recomputes block successor/predecessor edges from terminators.
    /// Call after the last statement of every block is in place.
    pub fn recompute_edges(&mut self) {
        for block in self.blocks.iter() {
            self.blocks[block].succs.clear();
            self.blocks[block].preds.clear();
        }
        for block in self.blocks.iter() {
            let term_stmt = match self.blocks[block].stmts.last() {
                Some(&stmt) => stmt,
                None => continue,
            };
            let mut succs: SmallVec<[Block; 2]> = SmallVec::new();
            self.stmts[term_stmt].visit_successors(|succ| succs.push(succ));
            for &succ in &succs {
                self.blocks[block].succs.push(succ);
                self.blocks[succ].preds.push(block);
            }
        }
    }

    /// Checks the structural invariants the analysis relies on: every
    /// block ends in a terminator, terminators appear only at block
    /// ends, and every handle points into its arena.
    pub fn validate(&self) -> Result<(), IrError> {
        for (block, data) in self.blocks.entries() {
            let last = match data.stmts.last() {
                Some(&stmt) => stmt,
                None => {
                    return Err(IrError::Unterminated(format!("{} is empty", block)));
                }
            };
            if !self.stmts[last].is_terminator() {
                return Err(IrError::Unterminated(format!(
                    "{} ends in non-terminator {}",
                    block, last
                )));
            }
            for &stmt in &data.stmts[..data.stmts.len() - 1] {
                if self.stmts[stmt].is_terminator() {
                    return Err(IrError::MisplacedTerminator(format!(
                        "{} mid-block in {}",
                        stmt, block
                    )));
                }
            }
        }
        for (stmt, data) in self.stmts.entries() {
            let mut result = Ok(());
            data.visit_terms(|term| {
                if !self.terms.contains(term) {
                    result = Err(IrError::DanglingHandle(format!(
                        "{} in {} out of range",
                        term, stmt
                    )));
                }
            });
            result?;
        }
        for (term, data) in self.terms.entries() {
            let mut result = Ok(());
            data.visit_subterms(|sub| {
                if !self.terms.contains(sub) {
                    result = Err(IrError::DanglingHandle(format!(
                        "operand {} of {} out of range",
                        sub, term
                    )));
                }
            });
            result?;
        }
        Ok(())
    }

    pub fn display<'a>(&'a self, indent: &'a str) -> FunctionDisplay<'a> {
        FunctionDisplay(self, indent, None)
    }
}
