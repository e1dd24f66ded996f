//! The error taxonomy for a single execution step.

use crate::felt::MathError;
use crate::instruction::DecodeError;
use crate::memory::MemoryError;
use crate::relocatable::RelocatableError;
use thiserror::Error;

/// Anything that can go wrong while executing a single instruction.
///
/// Every step either commits its register and memory updates or returns one of these and leaves
/// the registers untouched; see the module documentation of [`crate::vm`] for the commit
/// discipline.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum VirtualMachineError {
    #[error("no instruction at the current program counter")]
    EndOfInstructions,
    #[error("instruction encoding at the program counter is not a field element")]
    InstructionEncodingError,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Relocatable(#[from] RelocatableError),
    #[error(transparent)]
    Math(#[from] MathError),
    #[error("res is unconstrained but required by assert_eq")]
    UnconstrainedRes,
    #[error("assert_eq failed: dst ({dst}) != res ({res})")]
    DiffAssertValues { dst: String, res: String },
    #[error("call instruction requires op0 == pc + instruction size, found {found}")]
    InvalidOp0ForCall { found: String },
    #[error("call instruction requires dst == fp, found {found}")]
    InvalidDstForCall { found: String },
    #[error("jnz requires a defined dst operand")]
    UnconstrainedJnzDst,
    #[error("absolute jump target must be a relocatable, found {found}")]
    InvalidJumpTarget { found: String },
    #[error("relative jump offset must be a field element, found {found}")]
    InvalidJumpRelTarget { found: String },
    #[error("jnz op1 must be a field element, found {found}")]
    InvalidJnzOp1 { found: String },
    #[error("ret requires dst to be a relocatable, found {found}")]
    InvalidFpUpdate { found: String },
}
