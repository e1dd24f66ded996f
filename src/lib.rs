//! Execution core for the Cairo virtual machine: a deterministic register machine whose word
//! type is an element of a large prime field, with segmented, write-once memory.
//!
//! Program loading, builtin runners, hint processing, trace serialization and any outer run loop
//! are external collaborators and live outside this crate; what's here is fetch, decode, operand
//! resolution (including the deduction cascade that lets an instruction encode fewer operands
//! than it uses) and register update for a single [`vm::VirtualMachine::step`].

pub mod errors;
pub mod felt;
pub mod instruction;
pub mod memory;
pub mod relocatable;
pub mod run_context;
pub mod vm;

pub use errors::VirtualMachineError;
pub use felt::Felt;
pub use instruction::Instruction;
pub use memory::Memory;
pub use relocatable::{MaybeRelocatable, Relocatable};
pub use run_context::RunContext;
pub use vm::VirtualMachine;
