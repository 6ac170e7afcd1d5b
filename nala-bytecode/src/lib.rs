// nala-bytecode - Opcode definitions and instruction codec for the Nala virtual machine
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # nala-bytecode
//!
//! Opcode definitions and the byte-level instruction codec shared by the
//! Nala compiler and virtual machine. Instructions are encoded as a flat
//! byte buffer: one opcode byte followed by zero or more big-endian
//! operands with per-opcode fixed widths.

pub mod opcode;

pub use opcode::{lookup, make, read_operands, read_u16, read_u8, Definition, Instructions, Op};
