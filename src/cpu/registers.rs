//! LS-8 CPU registers.
//!
//! The LS-8 has 8 general-purpose 8-bit registers R0-R7, an 8-bit program
//! counter and a comparison flags register. R7 is reserved as the stack
//! pointer: it is still addressable by every register instruction, so
//! PUSH/POP/CALL/RET and ordinary register moves can manipulate it
//! interchangeably.

use serde::{Serialize, Deserialize};

/// Number of general-purpose registers.
pub const NUM_REGISTERS: usize = 8;

/// Register index reserved for the stack pointer.
pub const SP: usize = 7;

/// Initial stack pointer value. The stack grows downward from here.
pub const STACK_TOP: u8 = 0xF4;

/// Comparison flags register.
///
/// Three meaningful bits, exactly one of which is set by the most recent
/// CMP: bit 0 = equal, bit 1 = greater-than, bit 2 = less-than. The whole
/// register is rewritten on every comparison.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags(u8);

impl Flags {
    /// Bit set when the operands compared equal.
    pub const EQUAL: u8 = 0b0000_0001;
    /// Bit set when the first operand was greater.
    pub const GREATER: u8 = 0b0000_0010;
    /// Bit set when the first operand was less.
    pub const LESS: u8 = 0b0000_0100;

    /// All bits clear (machine reset state).
    pub const fn clear() -> Self {
        Flags(0)
    }

    /// Compute the flags for a comparison of `a` against `b`.
    ///
    /// Evaluated in fixed order: less, else greater, else equal.
    pub fn compare(a: u8, b: u8) -> Self {
        use std::cmp::Ordering;

        match a.cmp(&b) {
            Ordering::Less => Flags(Self::LESS),
            Ordering::Greater => Flags(Self::GREATER),
            Ordering::Equal => Flags(Self::EQUAL),
        }
    }

    pub fn is_equal(self) -> bool {
        self.0 & Self::EQUAL != 0
    }

    pub fn is_greater(self) -> bool {
        self.0 & Self::GREATER != 0
    }

    pub fn is_less(self) -> bool {
        self.0 & Self::LESS != 0
    }

    /// Raw bit pattern.
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = if self.is_less() {
            "L"
        } else if self.is_greater() {
            "G"
        } else if self.is_equal() {
            "E"
        } else {
            "-"
        };
        write!(f, "Flags({})", tag)
    }
}

/// The LS-8 register file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7. R7 doubles as the stack pointer.
    r: [u8; NUM_REGISTERS],

    /// Program counter. Points at the next instruction byte to fetch.
    pub pc: u8,

    /// Comparison flags.
    pub fl: Flags,
}

impl Registers {
    /// Create a new register file: everything zeroed except the stack
    /// pointer, which starts at `STACK_TOP`.
    pub fn new() -> Self {
        let mut r = [0; NUM_REGISTERS];
        r[SP] = STACK_TOP;

        Self {
            r,
            pc: 0,
            fl: Flags::clear(),
        }
    }

    /// Reset all registers to their power-on values.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read register `index`.
    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        self.r[index]
    }

    /// Write register `index`.
    #[inline]
    pub fn set(&mut self, index: usize, value: u8) {
        self.r[index] = value;
    }

    /// Advance the program counter by `len` bytes, wrapping within the
    /// 8-bit address space.
    pub fn advance_pc(&mut self, len: u8) {
        self.pc = self.pc.wrapping_add(len);
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u8) {
        self.pc = addr;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
