//! # LS-8 Emulator
//!
//! An emulator of the LS-8, an 8-bit microcomputer with eight
//! general-purpose registers, 256 bytes of RAM, and a hardware stack that
//! shares the address space with code and data, growing downward from
//! 0xF4. R7 doubles as the stack pointer, so stack and register
//! instructions can address it interchangeably.
//!
//! Programs are plain text, one binary instruction byte per line (see
//! [`loader`]). The [`cpu::Cpu`] fetches, decodes and executes them until
//! a HLT instruction or an unrecognized opcode stops the machine. PRN
//! output goes to a caller-supplied sink, so the emulator embeds cleanly
//! as a library; run one independent `Cpu` per program.

pub mod cpu;
pub mod loader;
pub mod disasm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, Memory, Registers, Flags, Instruction, Opcode};
pub use loader::{load_program, parse_program, LoadError};
pub use disasm::{disassemble, format_instruction};
