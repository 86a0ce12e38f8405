//! SALVAGE: liveness and dead-jump analysis for decompiler IR.
//!
//! Given a decompiled function's IR, its def-use index, its structured
//! control-flow view and its call-boundary data, this crate computes
//! which terms must survive into emitted high-level code and which
//! jumps are redundant encoding artifacts. It classifies only; the IR
//! is never mutated.

#![allow(dead_code)]

pub mod arch;
pub mod calling;
pub mod cflow;
pub mod dataflow;
pub mod entity;
mod errors;
mod ir;
pub mod liveness;
pub mod pipeline;

pub use errors::*;
pub use ir::*;
pub use liveness::{DefaultPolicy, Liveness, LivenessAnalyzer, Policy};
