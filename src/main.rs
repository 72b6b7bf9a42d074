//! LS-8 Emulator - CLI entry point.
//!
//! Usage:
//! - `ls8-emu <program>` - run a `.ls8` program
//! - `ls8-emu <program> --trace` - run with a trace line per instruction
//! - `ls8-emu <program> --disasm` - disassemble instead of running

use clap::Parser;
use ls8::{disassemble, load_program, Cpu};

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the LS-8 8-bit microcomputer")]
struct Cli {
    /// Path to the .ls8 program to execute
    program: String,

    /// Print a trace line (PC, next bytes, registers) before each step
    #[arg(short, long)]
    trace: bool,

    /// Disassemble the program instead of running it
    #[arg(short, long)]
    disasm: bool,

    /// Maximum number of instructions to execute
    #[arg(long, default_value = "1000000")]
    max_cycles: u64,

    /// Write the final CPU state as JSON to this file
    #[arg(long)]
    dump_state: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let program = match load_program(&cli.program) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if program.is_empty() {
        eprintln!("no instructions in {}", cli.program);
        std::process::exit(1);
    }

    if cli.disasm {
        print!("{}", disassemble(&program));
        return;
    }

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&program) {
        eprintln!("failed to load program: {}", e);
        std::process::exit(1);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    while cpu.is_running() && cpu.cycles < cli.max_cycles {
        if cli.trace {
            eprintln!("{}", cpu.trace());
        }

        if let Err(e) = cpu.step(&mut out) {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }

    if cpu.is_running() {
        eprintln!(
            "reached max cycles limit ({}); use --max-cycles to raise it",
            cli.max_cycles
        );
    }

    if let Some(path) = &cli.dump_state {
        dump_state(&cpu, path);
    }
}

fn dump_state(cpu: &Cpu, path: &str) {
    let json = match serde_json::to_string_pretty(cpu) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("failed to serialize CPU state: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = std::fs::write(path, json) {
        eprintln!("failed to write {}: {}", path, e);
        std::process::exit(1);
    }
}
