//! The three machine registers and effective-address computation.

use crate::instruction::{Instruction, Op1Src, Register};
use crate::relocatable::{MaybeRelocatable, Relocatable, RelocatableError};

/// Holds `pc`, `ap` and `fp`, and computes operand addresses from decoded instructions.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RunContext {
    pub pc: Relocatable,
    pub ap: Relocatable,
    pub fp: Relocatable,
}

impl RunContext {
    pub fn new(pc: Relocatable, ap: Relocatable, fp: Relocatable) -> Self {
        Self { pc, ap, fp }
    }

    pub fn pc(&self) -> Relocatable {
        self.pc
    }

    pub fn ap(&self) -> Relocatable {
        self.ap
    }

    pub fn fp(&self) -> Relocatable {
        self.fp
    }

    fn base_for(&self, register: Register) -> Relocatable {
        match register {
            Register::Ap => self.ap,
            Register::Fp => self.fp,
        }
    }

    pub fn compute_dst_addr(&self, instr: &Instruction) -> Result<Relocatable, RelocatableError> {
        self.base_for(instr.dst_register)
            .offset_by(instr.off_dst as i64)
    }

    pub fn compute_op0_addr(&self, instr: &Instruction) -> Result<Relocatable, RelocatableError> {
        self.base_for(instr.op0_register)
            .offset_by(instr.off_op0 as i64)
    }

    /// Computes the address of the second operand. `op0` is required when `op1_src` is
    /// [`Op1Src::Op0`] (double dereference), since the base address is read from the value at
    /// `op0`, not the `op0` register.
    pub fn compute_op1_addr(
        &self,
        instr: &Instruction,
        op0: Option<&MaybeRelocatable>,
    ) -> Result<Relocatable, RelocatableError> {
        let base_addr = match instr.op1_src {
            Op1Src::Fp => self.fp,
            Op1Src::Ap => self.ap,
            Op1Src::Imm => {
                if instr.off_op1 != 1 {
                    return Err(RelocatableError::TypeMismatch);
                }
                self.pc
            }
            Op1Src::Op0 => op0
                .ok_or(RelocatableError::TypeMismatch)?
                .as_relocatable()?
                .to_owned(),
        };
        base_addr.offset_by(instr.off_op1 as i64)
    }
}
