//! Program loader for `.ls8` source files.
//!
//! A program is plain UTF-8 text with one instruction byte per line,
//! written as a base-2 literal:
//!
//! ```text
//! # print the number 8
//! 10000010 # LDI R0,8
//! 00000000
//! 00001000
//! 01000111 # PRN R0
//! 00000000
//! 00000001 # HLT
//! ```
//!
//! Everything after a `#` is a comment. Lines that do not parse as a
//! binary literal (blank lines, stray comments, garbage) are silently
//! skipped without shifting the load address of later lines.

use std::path::Path;
use thiserror::Error;

/// Parse program text into instruction bytes.
pub fn parse_program(source: &str) -> Vec<u8> {
    source.lines().filter_map(parse_line).collect()
}

/// Parse one line: strip the comment, then read a base-2 literal.
fn parse_line(line: &str) -> Option<u8> {
    let code = match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    };
    u8::from_str_radix(code.trim(), 2).ok()
}

/// Load a program from disk.
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, LoadError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| LoadError::FileNotFound {
        path: path.display().to_string(),
        source,
    })?;

    Ok(parse_program(&source))
}

/// Errors that can occur while loading a program.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("couldn't read program file {path}: {source}")]
    FileNotFound {
        path: String,
        source: std::io::Error,
    },
}
