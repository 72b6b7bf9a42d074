//! CPU emulation for the LS-8.
//!
//! This module implements the complete LS-8 architecture:
//! - 256 eight-bit memory cells shared by code, data and the stack
//! - 8 general-purpose registers, with R7 doubling as the stack pointer
//! - 8-bit program counter and a three-bit comparison flags register
//! - 13-instruction set with one-byte opcodes and inline operands

pub mod memory;
pub mod registers;
pub mod decode;
pub mod alu;
pub mod execute;

pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use registers::{Registers, Flags, NUM_REGISTERS, SP, STACK_TOP};
pub use decode::{Instruction, Opcode, DecodeError};
pub use alu::AluError;
pub use execute::{Cpu, CpuError, CpuState};
