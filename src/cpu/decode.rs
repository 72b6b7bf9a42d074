//! Instruction decoder for the LS-8.
//!
//! Every instruction is a one-byte opcode followed by zero, one or two
//! operand bytes. The opcode byte describes its own layout:
//! - Bits 7-6: number of operand bytes
//! - Bit 5: instruction is routed through the ALU
//! - Bit 4: instruction sets the PC
//! - Bits 3-0: instruction identifier
//!
//! The layout bits are informational; dispatch goes through the closed
//! [`Opcode`] and [`Instruction`] enums, but they are preserved so a
//! disassembler or tracer can be layered on the raw encoding.

use crate::cpu::memory::Memory;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Raw LS-8 opcode byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Ldi = 0b1000_0010,
    Prn = 0b0100_0111,
    Hlt = 0b0000_0001,
    Add = 0b1010_0000,
    Mul = 0b1010_0010,
    Cmp = 0b1010_0111,
    Push = 0b0100_0101,
    Pop = 0b0100_0110,
    Call = 0b0101_0000,
    Ret = 0b0001_0001,
    Jmp = 0b0101_0100,
    Jeq = 0b0101_0101,
    Jne = 0b0101_0110,
}

impl Opcode {
    /// Every opcode the machine understands.
    pub const ALL: [Opcode; 13] = [
        Opcode::Ldi,
        Opcode::Prn,
        Opcode::Hlt,
        Opcode::Add,
        Opcode::Mul,
        Opcode::Cmp,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Call,
        Opcode::Ret,
        Opcode::Jmp,
        Opcode::Jeq,
        Opcode::Jne,
    ];

    /// Decode a raw byte into an opcode.
    pub fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        let opcode = match byte {
            b if b == Opcode::Ldi as u8 => Opcode::Ldi,
            b if b == Opcode::Prn as u8 => Opcode::Prn,
            b if b == Opcode::Hlt as u8 => Opcode::Hlt,
            b if b == Opcode::Add as u8 => Opcode::Add,
            b if b == Opcode::Mul as u8 => Opcode::Mul,
            b if b == Opcode::Cmp as u8 => Opcode::Cmp,
            b if b == Opcode::Push as u8 => Opcode::Push,
            b if b == Opcode::Pop as u8 => Opcode::Pop,
            b if b == Opcode::Call as u8 => Opcode::Call,
            b if b == Opcode::Ret as u8 => Opcode::Ret,
            b if b == Opcode::Jmp as u8 => Opcode::Jmp,
            b if b == Opcode::Jeq as u8 => Opcode::Jeq,
            b if b == Opcode::Jne as u8 => Opcode::Jne,
            _ => return Err(DecodeError::UnknownOpcode(byte)),
        };
        Ok(opcode)
    }

    /// Number of operand bytes, from the two high bits of the opcode.
    pub const fn operand_count(self) -> u8 {
        (self as u8) >> 6
    }

    /// Total encoded size in bytes, opcode included.
    pub const fn size(self) -> u8 {
        1 + self.operand_count()
    }

    /// True for opcodes routed through the ALU (bit 5).
    pub const fn is_alu_op(self) -> bool {
        self as u8 & 0b0010_0000 != 0
    }

    /// True for opcodes that set the PC directly (bit 4).
    pub const fn sets_pc(self) -> bool {
        self as u8 & 0b0001_0000 != 0
    }

    /// Assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Ldi => "LDI",
            Opcode::Prn => "PRN",
            Opcode::Hlt => "HLT",
            Opcode::Add => "ADD",
            Opcode::Mul => "MUL",
            Opcode::Cmp => "CMP",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::Jmp => "JMP",
            Opcode::Jeq => "JEQ",
            Opcode::Jne => "JNE",
        }
    }
}

/// Decoded LS-8 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Load an immediate into a register: Rr := imm
    Ldi { reg: usize, value: u8 },

    /// Print the decimal value of a register to the output sink
    Prn { reg: usize },

    /// Halt execution
    Hlt,

    /// Ra := (Ra + Rb) mod 256
    Add { a: usize, b: usize },

    /// Ra := (Ra * Rb) mod 256
    Mul { a: usize, b: usize },

    /// Compare Ra against Rb and rewrite the flags register
    Cmp { a: usize, b: usize },

    /// Push the value of a register onto the stack
    Push { reg: usize },

    /// Pop the top of the stack into a register
    Pop { reg: usize },

    /// Push the return address and jump to the address held in a register
    Call { reg: usize },

    /// Pop the return address and jump to it
    Ret,

    /// PC := Rr
    Jmp { reg: usize },

    /// PC := Rr if the equal flag is set, else fall through
    Jeq { reg: usize },

    /// PC := Rr if the equal flag is clear, else fall through
    Jne { reg: usize },
}

impl Instruction {
    /// The opcode this instruction decodes from.
    pub const fn opcode(self) -> Opcode {
        match self {
            Instruction::Ldi { .. } => Opcode::Ldi,
            Instruction::Prn { .. } => Opcode::Prn,
            Instruction::Hlt => Opcode::Hlt,
            Instruction::Add { .. } => Opcode::Add,
            Instruction::Mul { .. } => Opcode::Mul,
            Instruction::Cmp { .. } => Opcode::Cmp,
            Instruction::Push { .. } => Opcode::Push,
            Instruction::Pop { .. } => Opcode::Pop,
            Instruction::Call { .. } => Opcode::Call,
            Instruction::Ret => Opcode::Ret,
            Instruction::Jmp { .. } => Opcode::Jmp,
            Instruction::Jeq { .. } => Opcode::Jeq,
            Instruction::Jne { .. } => Opcode::Jne,
        }
    }

    /// Encoded size in bytes.
    pub const fn size(self) -> u8 {
        self.opcode().size()
    }
}

/// Register operands occupy the low three bits of their byte.
#[inline]
fn reg_operand(byte: u8) -> usize {
    (byte & 0x07) as usize
}

/// Decode the instruction at `pc`, reading operand bytes as needed.
///
/// Operand reads wrap within the 8-bit address space, like every other
/// memory access on this machine.
pub fn decode(mem: &Memory, pc: u8) -> Result<Instruction, DecodeError> {
    let window = [
        mem.read(pc),
        mem.read(pc.wrapping_add(1)),
        mem.read(pc.wrapping_add(2)),
    ];
    decode_bytes(&window)
}

/// Decode an instruction from the start of a byte slice.
///
/// Missing operand bytes past the end of the slice read as zero, matching
/// the machine's zeroed memory.
pub fn decode_bytes(bytes: &[u8]) -> Result<Instruction, DecodeError> {
    let &first = bytes.first().ok_or(DecodeError::Truncated)?;
    let opcode = Opcode::from_byte(first)?;

    let op_a = bytes.get(1).copied().unwrap_or(0);
    let op_b = bytes.get(2).copied().unwrap_or(0);

    let instruction = match opcode {
        Opcode::Ldi => Instruction::Ldi { reg: reg_operand(op_a), value: op_b },
        Opcode::Prn => Instruction::Prn { reg: reg_operand(op_a) },
        Opcode::Hlt => Instruction::Hlt,
        Opcode::Add => Instruction::Add { a: reg_operand(op_a), b: reg_operand(op_b) },
        Opcode::Mul => Instruction::Mul { a: reg_operand(op_a), b: reg_operand(op_b) },
        Opcode::Cmp => Instruction::Cmp { a: reg_operand(op_a), b: reg_operand(op_b) },
        Opcode::Push => Instruction::Push { reg: reg_operand(op_a) },
        Opcode::Pop => Instruction::Pop { reg: reg_operand(op_a) },
        Opcode::Call => Instruction::Call { reg: reg_operand(op_a) },
        Opcode::Ret => Instruction::Ret,
        Opcode::Jmp => Instruction::Jmp { reg: reg_operand(op_a) },
        Opcode::Jeq => Instruction::Jeq { reg: reg_operand(op_a) },
        Opcode::Jne => Instruction::Jne { reg: reg_operand(op_a) },
    };

    Ok(instruction)
}

/// Encode an instruction back to its byte form.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    match *instr {
        Instruction::Ldi { reg, value } => vec![Opcode::Ldi as u8, reg as u8, value],
        Instruction::Prn { reg } => vec![Opcode::Prn as u8, reg as u8],
        Instruction::Hlt => vec![Opcode::Hlt as u8],
        Instruction::Add { a, b } => vec![Opcode::Add as u8, a as u8, b as u8],
        Instruction::Mul { a, b } => vec![Opcode::Mul as u8, a as u8, b as u8],
        Instruction::Cmp { a, b } => vec![Opcode::Cmp as u8, a as u8, b as u8],
        Instruction::Push { reg } => vec![Opcode::Push as u8, reg as u8],
        Instruction::Pop { reg } => vec![Opcode::Pop as u8, reg as u8],
        Instruction::Call { reg } => vec![Opcode::Call as u8, reg as u8],
        Instruction::Ret => vec![Opcode::Ret as u8],
        Instruction::Jmp { reg } => vec![Opcode::Jmp as u8, reg as u8],
        Instruction::Jeq { reg } => vec![Opcode::Jeq as u8, reg as u8],
        Instruction::Jne { reg } => vec![Opcode::Jne as u8, reg as u8],
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode 0b{0:08b} (0x{0:02X})")]
    UnknownOpcode(u8),

    #[error("truncated instruction")]
    Truncated,
}
