//! Architecture descriptors: the register file as seen by the IR.
//!
//! The liveness rules only need a coarse view of the target machine:
//! which registers exist, which one is the stack pointer (writes to it
//! vanish once frame offsets are resolved), which one is the frame
//! pointer, and which registers are condition-code flags.

use crate::declare_entity;
use crate::entity::{EntityRef, EntityVec};

declare_entity!(Reg, "r");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegClass {
    General,
    Flag,
}

#[derive(Clone, Debug)]
pub struct RegInfo {
    pub name: String,
    pub class: RegClass,
}

#[derive(Clone, Debug)]
pub struct ArchDesc {
    name: String,
    regs: EntityVec<Reg, RegInfo>,
    stack_pointer: Reg,
    frame_pointer: Reg,
}

impl ArchDesc {
    pub fn new<S: Into<String>>(name: S) -> ArchDesc {
        ArchDesc {
            name: name.into(),
            regs: EntityVec::default(),
            stack_pointer: Reg::invalid(),
            frame_pointer: Reg::invalid(),
        }
    }

    pub fn add_reg<S: Into<String>>(&mut self, name: S, class: RegClass) -> Reg {
        self.regs.push(RegInfo {
            name: name.into(),
            class,
        })
    }

    pub fn set_stack_pointer(&mut self, reg: Reg) {
        self.stack_pointer = reg;
    }

    pub fn set_frame_pointer(&mut self, reg: Reg) {
        self.frame_pointer = reg;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reg_name(&self, reg: Reg) -> &str {
        &self.regs[reg].name
    }

    pub fn num_regs(&self) -> usize {
        self.regs.len()
    }

    pub fn is_stack_pointer(&self, reg: Reg) -> bool {
        reg == self.stack_pointer
    }

    pub fn is_frame_pointer(&self, reg: Reg) -> bool {
        reg == self.frame_pointer
    }

    pub fn is_flag(&self, reg: Reg) -> bool {
        self.regs[reg].class == RegClass::Flag
    }
}
