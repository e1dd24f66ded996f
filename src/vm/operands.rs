//! The deduction cascade: filling in operands that were absent from memory.
//!
//! Any of `op0`, `op1`, `res`, `dst` may be missing from memory at the point their address is
//! read. This module infers the missing ones from whichever are present, following the same
//! dependency order a Cairo prover's reference runner uses: op0 before op1 (op1's double
//! dereference may need a freshly-deduced op0), then res, then dst.

use crate::felt::Felt;
use crate::instruction::{Instruction, Opcode, ResLogic};
use crate::relocatable::MaybeRelocatable;

/// Attempts to deduce `op0` (and, as a side effect, `res`) from `instr`, `dst` and `op1`.
///
/// Division by zero inside a `Mul` deduction is not an error here: it simply yields `(None,
/// None)`, deferring to whatever later stage of the cascade might still resolve things.
pub fn deduce_op0(
    instr: &Instruction,
    dst: Option<&MaybeRelocatable>,
    op1: Option<&MaybeRelocatable>,
) -> (Option<MaybeRelocatable>, Option<MaybeRelocatable>) {
    match instr.opcode {
        Opcode::Call => (None, None),
        Opcode::AssertEq => match (instr.res_logic, dst, op1) {
            (ResLogic::Add, Some(dst), Some(op1)) => match dst.sub(op1) {
                Ok(op0) => (Some(op0), Some(dst.clone())),
                Err(_) => (None, None),
            },
            (ResLogic::Mul, Some(dst), Some(op1)) if !op1.is_zero() => match dst.div(op1) {
                Ok(op0) => (Some(op0), Some(dst.clone())),
                Err(_) => (None, None),
            },
            _ => (None, None),
        },
        Opcode::NoOp | Opcode::Ret => (None, None),
    }
}

/// Call's op0 is pinned to `pc + size(instr)` independent of memory contents; it is deduced
/// separately from [`deduce_op0`] because it does not depend on `dst`/`op1` at all and is needed
/// before the opcode assertion even when `op0` was already read from memory.
pub fn call_op0(instr: &Instruction, pc: &crate::relocatable::Relocatable) -> MaybeRelocatable {
    MaybeRelocatable::Ptr(
        pc.offset_by(instr.size())
            .expect("pc + instruction size never underflows"),
    )
}

/// Attempts to deduce `op1` (and, as a side effect, `res`) from `instr`, `dst` and `op0`.
pub fn deduce_op1(
    instr: &Instruction,
    dst: Option<&MaybeRelocatable>,
    op0: Option<&MaybeRelocatable>,
) -> (Option<MaybeRelocatable>, Option<MaybeRelocatable>) {
    if !matches!(instr.opcode, Opcode::AssertEq) {
        return (None, None);
    }
    match instr.res_logic {
        ResLogic::Op1 => match dst {
            Some(dst) => (Some(dst.clone()), Some(dst.clone())),
            None => (None, None),
        },
        ResLogic::Add => match (dst, op0) {
            (Some(dst), Some(op0)) => match dst.sub(op0) {
                Ok(op1) => (Some(op1), Some(dst.clone())),
                Err(_) => (None, None),
            },
            _ => (None, None),
        },
        ResLogic::Mul => match (dst, op0) {
            (Some(dst), Some(op0)) if !op0.is_zero() => match dst.div(op0) {
                Ok(op1) => (Some(op1), Some(dst.clone())),
                Err(_) => (None, None),
            },
            _ => (None, None),
        },
        ResLogic::Unconstrained => (None, None),
    }
}

/// Computes `res` directly once both operands are known. Returns `None` when `res_logic` is
/// `Unconstrained` (the Jnz case), in which case no assertion downstream requires `res`.
pub fn compute_res(
    instr: &Instruction,
    op0: &MaybeRelocatable,
    op1: &MaybeRelocatable,
) -> Result<Option<MaybeRelocatable>, crate::relocatable::RelocatableError> {
    match instr.res_logic {
        ResLogic::Op1 => Ok(Some(op1.clone())),
        ResLogic::Add => Ok(Some(op0.add(op1)?)),
        ResLogic::Mul => Ok(Some(op0.mul(op1)?)),
        ResLogic::Unconstrained => Ok(None),
    }
}

/// Deduces `dst` from `res`, when the opcode pins it.
pub fn deduce_dst(
    instr: &Instruction,
    res: Option<&MaybeRelocatable>,
    fp: &crate::relocatable::Relocatable,
) -> Option<MaybeRelocatable> {
    match instr.opcode {
        Opcode::AssertEq => res.cloned(),
        Opcode::Call => Some(MaybeRelocatable::Ptr(*fp)),
        Opcode::NoOp | Opcode::Ret => None,
    }
}

/// `true` iff a word represents the Cairo notion of "zero" for the purposes of `jnz`: a zero
/// field element. A relocatable operand is never treated as zero, regardless of its offset.
pub fn is_logically_zero(value: &MaybeRelocatable) -> bool {
    matches!(value, MaybeRelocatable::Field(f) if f.is_zero())
}
