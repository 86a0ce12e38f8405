//! Error types.

/// An error found while validating a function IR or the collaborator
/// data built around it.
#[derive(Clone, Debug)]
pub enum IrError {
    /// A basic block does not end in a jump, branch or return.
    Unterminated(String),
    /// A control-transfer statement appears before the end of a block.
    MisplacedTerminator(String),
    /// A term or statement handle points outside its owning arena.
    DanglingHandle(String),
    /// An internal consistency check failed.
    Inconsistent(String),
}

impl std::fmt::Display for IrError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for IrError {}
