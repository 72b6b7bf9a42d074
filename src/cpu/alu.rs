//! Arithmetic logic unit.
//!
//! The ALU handles the three two-register operations: ADD and MUL write
//! back to the first operand register, wrapping modulo 256; CMP rewrites
//! the flags register wholesale. Routing any other opcode here is a
//! dispatch bug, not a runtime condition, and fails fast.

use crate::cpu::decode::Opcode;
use crate::cpu::registers::{Flags, Registers};
use thiserror::Error;

/// Apply an ALU operation to registers `a` and `b`.
pub fn alu(regs: &mut Registers, op: Opcode, a: usize, b: usize) -> Result<(), AluError> {
    let x = regs.get(a);
    let y = regs.get(b);

    match op {
        Opcode::Add => regs.set(a, x.wrapping_add(y)),
        Opcode::Mul => regs.set(a, x.wrapping_mul(y)),
        Opcode::Cmp => regs.fl = Flags::compare(x, y),
        other => return Err(AluError::UnsupportedOp(other)),
    }

    Ok(())
}

/// Errors raised by the ALU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AluError {
    #[error("unsupported ALU operation {}", .0.mnemonic())]
    UnsupportedOp(Opcode),
}
