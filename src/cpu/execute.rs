//! CPU execution engine for the LS-8.
//!
//! Implements the fetch-decode-execute cycle and all instruction
//! behaviors. Handlers advance the PC themselves: not every instruction
//! is the same length, and control transfers must not auto-advance. Every
//! handler leaves the PC pointing at the next instruction to execute,
//! either past its own encoding or at an explicit jump target.

use crate::cpu::alu::{self, AluError};
use crate::cpu::decode::{self, DecodeError, Instruction, Opcode};
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::{Registers, NUM_REGISTERS, SP};
use serde::{Serialize, Deserialize};
use std::io::Write;
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HLT).
    Halted,
    /// CPU stopped on an unrecognized opcode or internal fault.
    Error,
}

/// The LS-8 CPU.
///
/// Owns all mutable execution state. PRN output goes to a caller-supplied
/// sink, so the machine itself stays serializable and multiple machines
/// can run independently.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling).
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU in its power-on state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Reset the CPU to its power-on state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Load a program image into memory at address 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(0, program)
    }

    /// Fetch, decode and execute a single instruction.
    ///
    /// PRN output is written to `out`. Returns the instruction that was
    /// executed. An unrecognized opcode stops the machine cleanly before
    /// any register or memory mutation and surfaces a diagnostic naming
    /// the offending byte.
    pub fn step<W: Write>(&mut self, out: &mut W) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        let pc = self.regs.pc;
        let instr = match decode::decode(&self.mem, pc) {
            Ok(instr) => instr,
            Err(e) => {
                self.state = CpuState::Error;
                return Err(CpuError::Decode { pc, source: e });
            }
        };

        self.execute(instr, out)?;

        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(instr)
    }

    /// Run until halt or error (blocking).
    ///
    /// Returns the number of instructions executed.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited<W: Write>(&mut self, max_cycles: u64, out: &mut W) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction.
    fn execute<W: Write>(&mut self, instr: Instruction, out: &mut W) -> Result<(), CpuError> {
        match instr {
            // ==================== Data Movement ====================

            Instruction::Ldi { reg, value } => {
                self.regs.set(reg, value);
                self.regs.advance_pc(instr.size());
            }

            Instruction::Prn { reg } => {
                writeln!(out, "{}", self.regs.get(reg))?;
                self.regs.advance_pc(instr.size());
            }

            // ==================== Arithmetic ====================

            Instruction::Add { a, b } => {
                alu::alu(&mut self.regs, Opcode::Add, a, b)?;
                self.regs.advance_pc(instr.size());
            }

            Instruction::Mul { a, b } => {
                alu::alu(&mut self.regs, Opcode::Mul, a, b)?;
                self.regs.advance_pc(instr.size());
            }

            Instruction::Cmp { a, b } => {
                alu::alu(&mut self.regs, Opcode::Cmp, a, b)?;
                self.regs.advance_pc(instr.size());
            }

            // ==================== Stack ====================

            Instruction::Push { reg } => {
                let value = self.regs.get(reg);
                self.push(value);
                self.regs.advance_pc(instr.size());
            }

            Instruction::Pop { reg } => {
                let value = self.pop();
                self.regs.set(reg, value);
                self.regs.advance_pc(instr.size());
            }

            // ==================== Control Flow ====================

            Instruction::Call { reg } => {
                let return_addr = self.regs.pc.wrapping_add(instr.size());
                self.push(return_addr);
                let target = self.regs.get(reg);
                self.regs.jump(target);
            }

            Instruction::Ret => {
                let return_addr = self.pop();
                self.regs.jump(return_addr);
            }

            Instruction::Jmp { reg } => {
                let target = self.regs.get(reg);
                self.regs.jump(target);
            }

            Instruction::Jeq { reg } => {
                if self.regs.fl.is_equal() {
                    let target = self.regs.get(reg);
                    self.regs.jump(target);
                } else {
                    self.regs.advance_pc(instr.size());
                }
            }

            Instruction::Jne { reg } => {
                if self.regs.fl.is_equal() {
                    self.regs.advance_pc(instr.size());
                } else {
                    let target = self.regs.get(reg);
                    self.regs.jump(target);
                }
            }

            Instruction::Hlt => {
                self.state = CpuState::Halted;
            }
        }

        Ok(())
    }

    /// Push a byte onto the stack: decrement SP (wrapping within the
    /// 8-bit address space), then write at the new SP.
    fn push(&mut self, value: u8) {
        let sp = self.regs.get(SP).wrapping_sub(1);
        self.regs.set(SP, sp);
        self.mem.write(sp, value);
    }

    /// Pop the byte at the top of the stack, then increment SP.
    fn pop(&mut self) -> u8 {
        let sp = self.regs.get(SP);
        let value = self.mem.read(sp);
        self.regs.set(SP, sp.wrapping_add(1));
        value
    }

    /// One line of trace output: PC, the next three memory bytes, and
    /// all 8 register values.
    pub fn trace(&self) -> String {
        let pc = self.regs.pc;
        let mut line = format!(
            "TRACE: {:02X} | {:02X} {:02X} {:02X} |",
            pc,
            self.mem.read(pc),
            self.mem.read(pc.wrapping_add(1)),
            self.mem.read(pc.wrapping_add(2)),
        );

        for i in 0..NUM_REGISTERS {
            line.push_str(&format!(" {:02X}", self.regs.get(i)));
        }

        line
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("unrecognized instruction at PC {pc:02X}: {source}")]
    Decode { pc: u8, source: DecodeError },

    #[error("ALU fault: {0}")]
    Alu(#[from] AluError),

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;
    use crate::cpu::registers::STACK_TOP;
    use proptest::prelude::*;

    fn make_program(instructions: &[Instruction]) -> Vec<u8> {
        instructions.iter().flat_map(encode).collect()
    }

    fn run_to_halt(program: &[u8]) -> (Cpu, String) {
        let mut cpu = Cpu::new();
        cpu.load_program(program).unwrap();

        let mut out = Vec::new();
        cpu.run(&mut out).unwrap();

        (cpu, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_cpu_halt() {
        let program = make_program(&[Instruction::Hlt]);
        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();

        let executed = cpu.run(&mut Vec::new()).unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_ldi_then_prn() {
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 8 },
            Instruction::Prn { reg: 0 },
            Instruction::Hlt,
        ]);

        let (_, output) = run_to_halt(&program);

        assert_eq!(output, "8\n");
    }

    #[test]
    fn test_add() {
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 250 },
            Instruction::Ldi { reg: 1, value: 10 },
            Instruction::Add { a: 0, b: 1 },
            Instruction::Hlt,
        ]);

        let (cpu, _) = run_to_halt(&program);

        assert_eq!(cpu.regs.get(0), 4); // (250 + 10) mod 256
        assert_eq!(cpu.regs.get(1), 10);
    }

    #[test]
    fn test_mul() {
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 8 },
            Instruction::Ldi { reg: 1, value: 9 },
            Instruction::Mul { a: 0, b: 1 },
            Instruction::Prn { reg: 0 },
            Instruction::Hlt,
        ]);

        let (cpu, output) = run_to_halt(&program);

        assert_eq!(output, "72\n");
        assert_eq!(cpu.regs.get(1), 9);
    }

    #[test]
    fn test_push_pop_roundtrip() {
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 42 },
            Instruction::Push { reg: 0 },
            Instruction::Pop { reg: 1 },
            Instruction::Hlt,
        ]);

        let (cpu, _) = run_to_halt(&program);

        assert_eq!(cpu.regs.get(1), 42);
        assert_eq!(cpu.regs.get(SP), STACK_TOP);
    }

    #[test]
    fn test_push_writes_below_stack_top() {
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 7 },
            Instruction::Push { reg: 0 },
            Instruction::Hlt,
        ]);

        let (cpu, _) = run_to_halt(&program);

        assert_eq!(cpu.regs.get(SP), STACK_TOP - 1);
        assert_eq!(cpu.mem.read(STACK_TOP - 1), 7);
    }

    #[test]
    fn test_call_ret_resumes_after_call() {
        // 0: LDI R1,11  3: LDI R0,10  6: CALL R1  8: PRN R0  10: HLT
        // 11: ADD R0,R0  14: RET
        let program = make_program(&[
            Instruction::Ldi { reg: 1, value: 11 },
            Instruction::Ldi { reg: 0, value: 10 },
            Instruction::Call { reg: 1 },
            Instruction::Prn { reg: 0 },
            Instruction::Hlt,
            Instruction::Add { a: 0, b: 0 },
            Instruction::Ret,
        ]);

        let (cpu, output) = run_to_halt(&program);

        assert_eq!(output, "20\n");
        assert_eq!(cpu.regs.get(SP), STACK_TOP);
    }

    #[test]
    fn test_jmp() {
        // 0: LDI R0,6  3: JMP R0  5: HLT (skipped target of nothing)
        // 6: LDI R1,1  9: HLT
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 6 },
            Instruction::Jmp { reg: 0 },
            Instruction::Hlt,
            Instruction::Ldi { reg: 1, value: 1 },
            Instruction::Hlt,
        ]);

        let (cpu, _) = run_to_halt(&program);

        assert_eq!(cpu.regs.get(1), 1);
    }

    #[test]
    fn test_jeq_taken_when_equal() {
        // 0: LDI R0,5  3: LDI R1,5  6: LDI R2,16  9: CMP R0,R1
        // 12: JEQ R2  14: HLT  15: HLT  16: LDI R3,1  19: HLT
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 5 },
            Instruction::Ldi { reg: 1, value: 5 },
            Instruction::Ldi { reg: 2, value: 16 },
            Instruction::Cmp { a: 0, b: 1 },
            Instruction::Jeq { reg: 2 },
            Instruction::Hlt,
            Instruction::Hlt,
            Instruction::Ldi { reg: 3, value: 1 },
            Instruction::Hlt,
        ]);

        let (cpu, _) = run_to_halt(&program);

        assert_eq!(cpu.regs.get(3), 1);
    }

    #[test]
    fn test_jeq_falls_through_by_own_length() {
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 1 },
            Instruction::Ldi { reg: 1, value: 2 },
            Instruction::Cmp { a: 0, b: 1 },
            Instruction::Jeq { reg: 5 }, // not taken: 1 != 2
            Instruction::Hlt,
        ]);
        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();
        let mut out = Vec::new();

        for _ in 0..3 {
            cpu.step(&mut out).unwrap();
        }
        let pc_before = cpu.regs.pc;
        cpu.step(&mut out).unwrap(); // the JEQ

        assert_eq!(cpu.regs.pc, pc_before + 2);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_jne_taken_when_not_equal() {
        // 0: LDI R0,1  3: LDI R1,2  6: LDI R2,15  9: CMP R0,R1
        // 12: JNE R2  14: HLT  15: LDI R3,1  18: HLT
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 1 },
            Instruction::Ldi { reg: 1, value: 2 },
            Instruction::Ldi { reg: 2, value: 15 },
            Instruction::Cmp { a: 0, b: 1 },
            Instruction::Jne { reg: 2 },
            Instruction::Hlt,
            Instruction::Ldi { reg: 3, value: 1 },
            Instruction::Hlt,
        ]);

        let (cpu, _) = run_to_halt(&program);

        assert_eq!(cpu.regs.get(3), 1);
    }

    #[test]
    fn test_jne_falls_through_when_equal() {
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 3 },
            Instruction::Ldi { reg: 1, value: 3 },
            Instruction::Ldi { reg: 2, value: 0 }, // would loop forever if taken
            Instruction::Cmp { a: 0, b: 1 },
            Instruction::Jne { reg: 2 },
            Instruction::Hlt,
        ]);

        let (cpu, _) = run_to_halt(&program);

        assert!(cpu.is_halted());
    }

    #[test]
    fn test_unknown_opcode_stops_cleanly() {
        let mut program = make_program(&[Instruction::Ldi { reg: 0, value: 5 }]);
        program.push(0b1111_1111);

        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();
        let mut out = Vec::new();

        let err = cpu.run(&mut out).unwrap_err();

        assert!(matches!(
            err,
            CpuError::Decode {
                pc: 3,
                source: DecodeError::UnknownOpcode(0b1111_1111),
            }
        ));
        assert!(!cpu.is_running());
        assert_eq!(cpu.state, CpuState::Error);
        // Only the LDI before the bad byte took effect.
        assert_eq!(cpu.cycles, 1);
        assert_eq!(cpu.regs.get(0), 5);
        assert_eq!(cpu.regs.get(SP), STACK_TOP);
        assert!(out.is_empty());
    }

    #[test]
    fn test_step_refused_after_halt() {
        let program = make_program(&[Instruction::Hlt]);
        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();
        let mut out = Vec::new();

        cpu.run(&mut out).unwrap();
        let err = cpu.step(&mut out).unwrap_err();

        assert!(matches!(err, CpuError::NotRunning(CpuState::Halted)));
    }

    #[test]
    fn test_loop_sum_matches_reference() {
        let step = 10u8;
        let iterations = 5u8;

        // 0..17: setup. 18: loop head. Counter in R2 counts down by
        // adding 0xFF (-1 mod 256); R4 holds the zero to compare against.
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: step },
            Instruction::Ldi { reg: 1, value: 0 },
            Instruction::Ldi { reg: 2, value: iterations },
            Instruction::Ldi { reg: 3, value: 0xFF },
            Instruction::Ldi { reg: 4, value: 0 },
            Instruction::Ldi { reg: 5, value: 18 },
            Instruction::Add { a: 1, b: 0 },
            Instruction::Add { a: 2, b: 3 },
            Instruction::Cmp { a: 2, b: 4 },
            Instruction::Jne { reg: 5 },
            Instruction::Prn { reg: 1 },
            Instruction::Hlt,
        ]);

        let (_, output) = run_to_halt(&program);

        let expected = (0..iterations).fold(0u8, |acc, _| acc.wrapping_add(step));
        assert_eq!(output, format!("{}\n", expected));
    }

    #[test]
    fn test_run_limited_bounds_an_infinite_loop() {
        // 0: LDI R0,3  3: JMP R0 (jumps to itself)
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 3 },
            Instruction::Jmp { reg: 0 },
        ]);
        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();

        let executed = cpu.run_limited(10, &mut Vec::new()).unwrap();

        assert_eq!(executed, 10);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_trace_format() {
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 8 },
            Instruction::Hlt,
        ]);
        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();

        let line = cpu.trace();

        assert_eq!(line, "TRACE: 00 | 82 00 08 | 00 00 00 00 00 00 00 F4");
    }

    #[test]
    fn test_reset() {
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 9 },
            Instruction::Hlt,
        ]);
        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();
        cpu.run(&mut Vec::new()).unwrap();

        cpu.reset();

        assert!(cpu.is_running());
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.regs.get(0), 0);
        assert_eq!(cpu.mem.read(0), 0);
        assert!(cpu.last_instruction().is_none());
    }

    proptest! {
        #[test]
        fn push_pop_roundtrips_any_value(value in any::<u8>(), reg in 0usize..7) {
            let other = (reg + 1) % 7;
            let program = make_program(&[
                Instruction::Ldi { reg, value },
                Instruction::Push { reg },
                Instruction::Pop { reg: other },
                Instruction::Hlt,
            ]);

            let (cpu, _) = run_to_halt(&program);

            prop_assert_eq!(cpu.regs.get(other), value);
            prop_assert_eq!(cpu.regs.get(SP), STACK_TOP);
        }
    }
}
