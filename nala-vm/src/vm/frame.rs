// nala-vm - Call frames for the Nala virtual machine
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Call frames.

use std::rc::Rc;

use nala_bytecode::Instructions;
use nala_core::Closure;

/// A call frame: the invoked closure, its instruction pointer and the
/// stack index where its locals begin (arguments first, then `let`-bound
/// slots).
#[derive(Debug)]
pub struct Frame {
    pub closure: Rc<Closure>,
    pub ip: usize,
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Frame {
            closure,
            ip: 0,
            base_pointer,
        }
    }

    #[inline]
    pub fn instructions(&self) -> &Instructions {
        &self.closure.func.instructions
    }
}
