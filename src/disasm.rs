//! Disassembler for LS-8 programs.
//!
//! Converts raw instruction bytes back to readable mnemonics. Layered
//! entirely on the decoder; used by the CLI `--disasm` flag.

use crate::cpu::decode::{self, Instruction};

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    match *instr {
        Instruction::Ldi { reg, value } => format!("LDI R{},{}", reg, value),
        Instruction::Prn { reg } => format!("PRN R{}", reg),
        Instruction::Hlt => "HLT".to_string(),
        Instruction::Add { a, b } => format!("ADD R{},R{}", a, b),
        Instruction::Mul { a, b } => format!("MUL R{},R{}", a, b),
        Instruction::Cmp { a, b } => format!("CMP R{},R{}", a, b),
        Instruction::Push { reg } => format!("PUSH R{}", reg),
        Instruction::Pop { reg } => format!("POP R{}", reg),
        Instruction::Call { reg } => format!("CALL R{}", reg),
        Instruction::Ret => "RET".to_string(),
        Instruction::Jmp { reg } => format!("JMP R{}", reg),
        Instruction::Jeq { reg } => format!("JEQ R{}", reg),
        Instruction::Jne { reg } => format!("JNE R{}", reg),
    }
}

/// Disassemble a program image, starting at address 0.
///
/// Bytes that do not decode as an opcode are rendered as raw data and the
/// walk resumes at the next byte.
pub fn disassemble(image: &[u8]) -> String {
    let mut output = String::new();
    let mut addr = 0;

    while addr < image.len() {
        match decode::decode_bytes(&image[addr..]) {
            Ok(instr) => {
                output.push_str(&format!("{:02X}: {}\n", addr, format_instruction(&instr)));
                addr += instr.size() as usize;
            }
            Err(_) => {
                output.push_str(&format!("{:02X}: .db 0b{:08b}\n", addr, image[addr]));
                addr += 1;
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{encode, Opcode};

    #[test]
    fn test_format_hlt() {
        assert_eq!(format_instruction(&Instruction::Hlt), "HLT");
    }

    #[test]
    fn test_format_ldi() {
        let instr = Instruction::Ldi { reg: 0, value: 8 };
        assert_eq!(format_instruction(&instr), "LDI R0,8");
    }

    #[test]
    fn test_disassemble_program() {
        let mut image = Vec::new();
        image.extend(encode(&Instruction::Ldi { reg: 0, value: 8 }));
        image.extend(encode(&Instruction::Prn { reg: 0 }));
        image.extend(encode(&Instruction::Hlt));

        let listing = disassemble(&image);

        assert_eq!(listing, "00: LDI R0,8\n03: PRN R0\n05: HLT\n");
    }

    #[test]
    fn test_disassemble_data_fallback() {
        let image = [0b1111_1111, Opcode::Hlt as u8];

        let listing = disassemble(&image);

        assert_eq!(listing, "00: .db 0b11111111\n01: HLT\n");
    }
}
