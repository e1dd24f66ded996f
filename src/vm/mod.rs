//! The virtual machine: orchestrates fetch, decode, operand resolution and register update.
//!
//! `step` computes the entire outcome of an instruction into local variables before writing
//! anything back to [`RunContext`] — registers are committed atomically at the end of the
//! function, the same "compute fully, then commit" discipline a sequential core applies to avoid
//! ever observing a half-updated register file.

mod operands;

use crate::errors::VirtualMachineError;
use crate::instruction::{ApUpdate, FpUpdate, Instruction, Opcode, PcUpdate};
use crate::memory::Memory;
use crate::relocatable::{MaybeRelocatable, Relocatable};
use crate::run_context::RunContext;
use log::{debug, trace};

/// Owns the memory and registers for one run and advances them one instruction at a time.
#[derive(Debug)]
pub struct VirtualMachine {
    memory: Memory,
    run_context: RunContext,
    current_step: u64,
}

impl VirtualMachine {
    pub fn new(memory: Memory, run_context: RunContext) -> Self {
        Self {
            memory,
            run_context,
            current_step: 0,
        }
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn run_context(&self) -> &RunContext {
        &self.run_context
    }

    pub fn run_context_mut(&mut self) -> &mut RunContext {
        &mut self.run_context
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    /// Executes exactly one instruction, or returns the error that prevented it from completing.
    /// On error, no register has been mutated (memory writes already performed by the deduction
    /// cascade before the error may persist, per the write-once discipline).
    pub fn step(&mut self) -> Result<(), VirtualMachineError> {
        let instr = self.fetch_and_decode()?;
        trace!(
            "Step {}: pc={} instr={:?}",
            self.current_step,
            self.run_context.pc,
            instr
        );

        let dst_addr = self.run_context.compute_dst_addr(&instr)?;
        let op0_addr = self.run_context.compute_op0_addr(&instr)?;

        let mut dst = self.memory.get(&dst_addr)?.cloned();
        let mut op0 = self.memory.get(&op0_addr)?.cloned();

        // op1's address may depend on a freshly-read op0 (double dereference), so it is computed
        // only once op0's initial read attempt has happened, mirroring the cascade's own ordering.
        let op1_addr = self.run_context.compute_op1_addr(&instr, op0.as_ref())?;
        let mut op1 = self.memory.get(&op1_addr)?.cloned();

        let mut res: Option<MaybeRelocatable> = None;

        if op0.is_none() {
            if matches!(instr.opcode, Opcode::Call) {
                let deduced = operands::call_op0(&instr, &self.run_context.pc);
                self.memory.insert(op0_addr, deduced.clone())?;
                op0 = Some(deduced);
            } else {
                let (deduced_op0, deduced_res) = operands::deduce_op0(&instr, dst.as_ref(), op1.as_ref());
                if let Some(value) = deduced_op0 {
                    self.memory.insert(op0_addr, value.clone())?;
                    op0 = Some(value);
                }
                res = deduced_res;
            }
        }

        if op1.is_none() {
            let (deduced_op1, deduced_res) = operands::deduce_op1(&instr, dst.as_ref(), op0.as_ref());
            if let Some(value) = deduced_op1 {
                self.memory.insert(op1_addr, value.clone())?;
                op1 = Some(value);
            }
            if res.is_none() {
                res = deduced_res;
            }
        }

        if res.is_none() {
            if let (Some(op0), Some(op1)) = (op0.as_ref(), op1.as_ref()) {
                res = operands::compute_res(&instr, op0, op1)?;
            }
        }

        if dst.is_none() {
            let deduced = operands::deduce_dst(&instr, res.as_ref(), &self.run_context.fp);
            if let Some(value) = deduced {
                self.memory.insert(dst_addr, value.clone())?;
                dst = Some(value);
            }
        }

        self.assert_opcode(&instr, op0.as_ref(), dst.as_ref(), res.as_ref())?;

        let (next_pc, next_ap, next_fp) =
            self.compute_register_updates(&instr, op1.as_ref(), dst.as_ref(), res.as_ref())?;

        debug!(
            "Step {}: pc {} -> {}, ap {} -> {}, fp {} -> {}",
            self.current_step,
            self.run_context.pc,
            next_pc,
            self.run_context.ap,
            next_ap,
            self.run_context.fp,
            next_fp
        );

        self.run_context.pc = next_pc;
        self.run_context.ap = next_ap;
        self.run_context.fp = next_fp;
        self.current_step += 1;

        Ok(())
    }

    fn fetch_and_decode(&self) -> Result<Instruction, VirtualMachineError> {
        let word = self
            .memory
            .get(&self.run_context.pc)?
            .ok_or(VirtualMachineError::EndOfInstructions)?;
        let raw = word
            .as_felt()
            .map_err(|_| VirtualMachineError::InstructionEncodingError)?
            .to_u64()
            .map_err(|_| VirtualMachineError::InstructionEncodingError)?;
        Ok(Instruction::decode(raw)?)
    }

    fn assert_opcode(
        &self,
        instr: &Instruction,
        op0: Option<&MaybeRelocatable>,
        dst: Option<&MaybeRelocatable>,
        res: Option<&MaybeRelocatable>,
    ) -> Result<(), VirtualMachineError> {
        match instr.opcode {
            Opcode::AssertEq => {
                let res = res.ok_or(VirtualMachineError::UnconstrainedRes)?;
                let dst = dst.ok_or(VirtualMachineError::UnconstrainedRes)?;
                if dst != res {
                    return Err(VirtualMachineError::DiffAssertValues {
                        dst: dst.to_string(),
                        res: res.to_string(),
                    });
                }
                Ok(())
            }
            Opcode::Call => {
                let expected_op0 =
                    MaybeRelocatable::Ptr(self.run_context.pc.offset_by(instr.size())?);
                let op0 = op0.ok_or(VirtualMachineError::InvalidOp0ForCall {
                    found: "<undefined>".to_string(),
                })?;
                if *op0 != expected_op0 {
                    return Err(VirtualMachineError::InvalidOp0ForCall {
                        found: op0.to_string(),
                    });
                }
                let dst = dst.ok_or(VirtualMachineError::InvalidDstForCall {
                    found: "<undefined>".to_string(),
                })?;
                let expected_dst = MaybeRelocatable::Ptr(self.run_context.fp);
                if *dst != expected_dst {
                    return Err(VirtualMachineError::InvalidDstForCall {
                        found: dst.to_string(),
                    });
                }
                Ok(())
            }
            Opcode::Ret | Opcode::NoOp => Ok(()),
        }
    }

    fn compute_register_updates(
        &self,
        instr: &Instruction,
        op1: Option<&MaybeRelocatable>,
        dst: Option<&MaybeRelocatable>,
        res: Option<&MaybeRelocatable>,
    ) -> Result<(Relocatable, Relocatable, Relocatable), VirtualMachineError> {
        let pc = self.run_context.pc;
        let ap = self.run_context.ap;
        let fp = self.run_context.fp;

        let next_pc = match instr.pc_update {
            PcUpdate::Regular => pc.offset_by(instr.size())?,
            PcUpdate::Jump => {
                let res = res.ok_or(VirtualMachineError::UnconstrainedRes)?;
                *res.as_relocatable()
                    .map_err(|_| VirtualMachineError::InvalidJumpTarget {
                        found: res.to_string(),
                    })?
            }
            PcUpdate::JumpRel => {
                let res = res.ok_or(VirtualMachineError::UnconstrainedRes)?;
                let delta = res
                    .as_felt()
                    .map_err(|_| VirtualMachineError::InvalidJumpRelTarget {
                        found: res.to_string(),
                    })?
                    .to_u64()
                    .map_err(|_| VirtualMachineError::InvalidJumpRelTarget {
                        found: res.to_string(),
                    })?;
                pc.offset_by(delta as i64)?
            }
            PcUpdate::Jnz => {
                let dst = dst.ok_or(VirtualMachineError::UnconstrainedJnzDst)?;
                if operands::is_logically_zero(dst) {
                    pc.offset_by(instr.size())?
                } else {
                    let op1 = op1.ok_or(VirtualMachineError::UnconstrainedJnzDst)?;
                    let delta = op1
                        .as_felt()
                        .map_err(|_| VirtualMachineError::InvalidJnzOp1 {
                            found: op1.to_string(),
                        })?
                        .to_u64()
                        .map_err(|_| VirtualMachineError::InvalidJnzOp1 {
                            found: op1.to_string(),
                        })?;
                    pc.offset_by(delta as i64)?
                }
            }
        };

        let next_ap = match (instr.opcode, instr.ap_update) {
            (Opcode::Call, _) => ap.offset_by(2)?,
            (_, ApUpdate::Regular) => ap,
            (_, ApUpdate::Add) => {
                let res = res.ok_or(VirtualMachineError::UnconstrainedRes)?;
                let delta = res
                    .as_felt()
                    .map_err(|_| VirtualMachineError::UnconstrainedRes)?
                    .to_u64()
                    .map_err(|_| VirtualMachineError::UnconstrainedRes)?;
                ap.offset_by(delta as i64)?
            }
            (_, ApUpdate::Add1) => ap.offset_by(1)?,
            (_, ApUpdate::Add2) => ap.offset_by(2)?,
        };

        let next_fp = match instr.fp_update() {
            FpUpdate::Regular => fp,
            FpUpdate::ApPlus2 => ap.offset_by(2)?,
            FpUpdate::Dst => {
                let dst = dst.ok_or(VirtualMachineError::InvalidFpUpdate {
                    found: "<undefined>".to_string(),
                })?;
                *dst.as_relocatable()
                    .map_err(|_| VirtualMachineError::InvalidFpUpdate {
                        found: dst.to_string(),
                    })?
            }
        };

        Ok((next_pc, next_ap, next_fp))
    }
}
