// nala-vm - Stack-based virtual machine for the Nala programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The stack machine.
//!
//! A fetch-decode-execute loop over the byte-encoded instruction stream,
//! with a fixed-capacity value stack, a frame stack, a global slot array
//! and builtin dispatch. Execution terminates when the instruction pointer
//! runs off the end of the outermost frame; every execution error aborts
//! the current run without rolling back the stack or globals.

pub mod frame;
pub mod stack;

use std::fmt;
use std::rc::Rc;

use im::{HashMap, Vector};
use nala_bytecode::{read_u16, read_u8, Op};
use nala_core::{Builtin, Closure, CompiledFunction, HashPair, Object, BUILTINS};

use crate::compiler::Bytecode;

pub use frame::Frame;
pub use stack::ValueStack;

/// Value stack capacity.
pub const STACK_SIZE: usize = 2048;
/// Global slot array size.
pub const GLOBALS_SIZE: usize = 65536;
/// Frame stack capacity.
pub const MAX_FRAMES: usize = 1024;

/// Runtime error during VM execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    StackOverflow,
    StackUnderflow,
    UndefinedOpcode(u8),
    DivisionByZero,
    /// Binary operands of differing types.
    DisjointedTypes(&'static str, &'static str),
    /// Operator with no meaning for the operand type.
    UnknownOperator { kind: &'static str, code: u8 },
    UnsupportedBinaryTypes(&'static str, &'static str),
    UnsupportedUnaryType(&'static str),
    WrongArgumentCount { want: usize, got: usize },
    NotCallable,
    UnusableHashKey(&'static str),
    IndexNotSupported(&'static str),
    /// Invariant violation: malformed bytecode or corrupted state.
    Internal(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::StackOverflow => write!(f, "stack overflow"),
            RuntimeError::StackUnderflow => write!(f, "stack underflow"),
            RuntimeError::UndefinedOpcode(byte) => write!(f, "opcode {} undefined", byte),
            RuntimeError::DivisionByZero => write!(f, "division by 0 error"),
            RuntimeError::DisjointedTypes(left, right) => {
                write!(f, "disjointed types for operators: {}, {}", left, right)
            }
            RuntimeError::UnknownOperator { kind, code } => {
                write!(f, "unknown {} operator: {}", kind, code)
            }
            RuntimeError::UnsupportedBinaryTypes(left, right) => {
                write!(f, "unsupported types {} and {} for binary operation", left, right)
            }
            RuntimeError::UnsupportedUnaryType(kind) => {
                write!(f, "unsupported type {} for unary operation", kind)
            }
            RuntimeError::WrongArgumentCount { want, got } => {
                write!(f, "wrong number of arguments: want={}, got={}", want, got)
            }
            RuntimeError::NotCallable => write!(f, "calling non-function"),
            RuntimeError::UnusableHashKey(kind) => write!(f, "unusable as hash key: {}", kind),
            RuntimeError::IndexNotSupported(kind) => {
                write!(f, "index operator not supported: {}", kind)
            }
            RuntimeError::Internal(message) => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for VM operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// The Nala virtual machine.
pub struct VM {
    constants: Vec<Object>,
    stack: ValueStack,
    globals: Vec<Object>,
    frames: Vec<Frame>,
}

impl VM {
    /// A fresh VM seeded with a main frame whose callable is a synthetic
    /// zero-capture closure around the top-level instructions.
    pub fn new(byte_code: Bytecode) -> Self {
        VM::new_with_globals(byte_code, VM::new_globals())
    }

    /// Reuse a globals array across runs, for incremental (REPL) use.
    pub fn new_with_globals(byte_code: Bytecode, globals: Vec<Object>) -> Self {
        let main_function = Rc::new(CompiledFunction {
            instructions: byte_code.instructions,
            num_locals: 0,
            num_parameters: 0,
        });
        let main_closure = Rc::new(Closure {
            func: main_function,
            free: Vec::new(),
        });

        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(main_closure, 0));

        VM {
            constants: byte_code.constants,
            stack: ValueStack::new(STACK_SIZE),
            globals,
            frames,
        }
    }

    /// A nil-filled globals array of the configured size.
    pub fn new_globals() -> Vec<Object> {
        vec![Object::Nil; GLOBALS_SIZE]
    }

    /// The global slots.
    pub fn globals(&self) -> &[Object] {
        &self.globals
    }

    /// Take the globals array back for the next run.
    pub fn into_globals(self) -> Vec<Object> {
        self.globals
    }

    /// The element most recently popped off the stack: the result of the
    /// final expression statement.
    pub fn last_popped_element(&self) -> &Object {
        self.stack.last_popped()
    }

    /// Execute until the main frame's instructions are exhausted.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let frame = self.frame();
            let ip = frame.ip;
            if ip >= frame.instructions().len() {
                // Functions always return explicitly, so only the main
                // frame runs off the end of its instructions.
                return Ok(());
            }

            let byte = frame.instructions().as_bytes()[ip];
            let op = Op::try_from(byte).map_err(RuntimeError::UndefinedOpcode)?;
            self.frame_mut().ip += 1;

            match op {
                Op::Constant => {
                    let index = self.read_u16_operand();
                    let constant = self.constant(index)?;
                    self.stack.push(constant)?;
                }
                Op::Pop => {
                    self.stack.pop()?;
                }
                Op::Add
                | Op::Subtract
                | Op::Multiply
                | Op::Divide
                | Op::Modulo
                | Op::GThan
                | Op::LThan
                | Op::Equal
                | Op::NotEqual => self.execute_binary_operation(op)?,
                Op::NegateInt | Op::NegateBool => self.execute_unary_operation(op)?,
                Op::True => self.stack.push(Object::Boolean(true))?,
                Op::False => self.stack.push(Object::Boolean(false))?,
                Op::Nil => self.stack.push(Object::Nil)?,
                Op::Jump => {
                    let target = self.read_u16_operand();
                    self.frame_mut().ip = target;
                }
                Op::JumpNotTruthy => {
                    let target = self.read_u16_operand();
                    let condition = self.stack.pop()?;
                    if !condition.is_truthy() {
                        self.frame_mut().ip = target;
                    }
                }
                Op::SetGlobal => {
                    let index = self.read_u16_operand();
                    self.globals[index] = self.stack.pop()?;
                }
                Op::GetGlobal => {
                    let index = self.read_u16_operand();
                    self.stack.push(self.globals[index].clone())?;
                }
                Op::SetLocal => {
                    let index = self.read_u8_operand();
                    let base_pointer = self.frame().base_pointer;
                    let value = self.stack.pop()?;
                    self.stack.set(base_pointer + index, value)?;
                }
                Op::GetLocal => {
                    let index = self.read_u8_operand();
                    let base_pointer = self.frame().base_pointer;
                    let value = self.stack.get(base_pointer + index)?;
                    self.stack.push(value)?;
                }
                Op::GetBuiltin => {
                    let index = self.read_u8_operand();
                    let builtin = BUILTINS.get(index).ok_or_else(|| {
                        RuntimeError::Internal(format!("builtin index {} out of bounds", index))
                    })?;
                    self.stack.push(Object::Builtin(builtin))?;
                }
                Op::Array => {
                    let count = self.read_u16_operand();
                    let sp = self.stack.sp();
                    let elements: Vector<Object> =
                        self.stack.slice(sp - count, sp).iter().cloned().collect();
                    self.stack.set_sp(sp - count);
                    self.stack.push(Object::array(elements))?;
                }
                Op::HashMap => {
                    let count = self.read_u16_operand();
                    let map = self.build_hash_map(count)?;
                    self.stack.push(map)?;
                }
                Op::Index => {
                    let index = self.stack.pop()?;
                    let left = self.stack.pop()?;
                    self.execute_index_expression(left, index)?;
                }
                Op::Call => {
                    let num_args = self.read_u8_operand();
                    self.execute_call(num_args)?;
                }
                Op::ReturnValue => {
                    let value = self.stack.pop()?;
                    if self.frames.len() == 1 {
                        // A top-level `return` ends the program with its
                        // value left on the stack.
                        self.stack.push(value)?;
                        return Ok(());
                    }
                    if let Some(frame) = self.frames.pop() {
                        self.stack.set_sp(frame.base_pointer - 1);
                    }
                    self.stack.push(value)?;
                }
                Op::Return => {
                    if self.frames.len() == 1 {
                        self.stack.push(Object::Nil)?;
                        return Ok(());
                    }
                    if let Some(frame) = self.frames.pop() {
                        self.stack.set_sp(frame.base_pointer - 1);
                    }
                    self.stack.push(Object::Nil)?;
                }
                Op::Closure => {
                    let const_index = self.read_u16_operand();
                    let num_free = self.read_u8_operand();
                    self.push_closure(const_index, num_free)?;
                }
                Op::GetFree => {
                    let index = self.read_u8_operand();
                    let value = self
                        .frame()
                        .closure
                        .free
                        .get(index)
                        .cloned()
                        .ok_or_else(|| {
                            RuntimeError::Internal(format!(
                                "free variable index {} out of bounds",
                                index
                            ))
                        })?;
                    self.stack.push(value)?;
                }
            }
        }
    }

    // =========================================================================
    // Fetch helpers
    // =========================================================================

    fn frame(&self) -> &Frame {
        self.frames.last().expect("no active frame")
    }

    fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("no active frame")
    }

    fn read_u16_operand(&mut self) -> usize {
        let frame = self.frame_mut();
        let value = read_u16(&frame.instructions().as_bytes()[frame.ip..]) as usize;
        frame.ip += 2;
        value
    }

    fn read_u8_operand(&mut self) -> usize {
        let frame = self.frame_mut();
        let value = read_u8(&frame.instructions().as_bytes()[frame.ip..]) as usize;
        frame.ip += 1;
        value
    }

    fn constant(&self, index: usize) -> Result<Object> {
        self.constants.get(index).cloned().ok_or_else(|| {
            RuntimeError::Internal(format!("constant index {} out of bounds", index))
        })
    }

    // =========================================================================
    // Calls and closures
    // =========================================================================

    fn execute_call(&mut self, num_args: usize) -> Result<()> {
        let callee_index = self
            .stack
            .sp()
            .checked_sub(num_args + 1)
            .ok_or(RuntimeError::StackUnderflow)?;
        let callee = self.stack.get(callee_index)?;

        match callee {
            Object::Closure(closure) => self.call_closure(closure, num_args),
            Object::CompiledFunction(func) => {
                // Bare compiled functions are callable too; wrap them in a
                // capture-free closure.
                let closure = Rc::new(Closure {
                    func,
                    free: Vec::new(),
                });
                self.call_closure(closure, num_args)
            }
            Object::Builtin(builtin) => self.call_builtin(builtin, num_args),
            _ => Err(RuntimeError::NotCallable),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, num_args: usize) -> Result<()> {
        if num_args != closure.func.num_parameters {
            return Err(RuntimeError::WrongArgumentCount {
                want: closure.func.num_parameters,
                got: num_args,
            });
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(RuntimeError::StackOverflow);
        }

        let base_pointer = self.stack.sp() - num_args;
        let num_locals = closure.func.num_locals;
        if base_pointer + num_locals > STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }

        self.frames.push(Frame::new(closure, base_pointer));
        // Arguments already sit in slots 0..num_args of the frame window;
        // reserve the remaining local slots.
        self.stack.set_sp(base_pointer + num_locals);
        Ok(())
    }

    fn call_builtin(&mut self, builtin: &'static Builtin, num_args: usize) -> Result<()> {
        let sp = self.stack.sp();
        let arguments = self.stack.slice(sp - num_args, sp).to_vec();

        let result = (builtin.func)(&arguments);

        self.stack.set_sp(sp - num_args - 1);
        self.stack.push(result)
    }

    fn push_closure(&mut self, const_index: usize, num_free: usize) -> Result<()> {
        let func = match self.constant(const_index)? {
            Object::CompiledFunction(func) => func,
            other => {
                return Err(RuntimeError::Internal(format!(
                    "not a function: {}",
                    other.kind()
                )));
            }
        };

        let sp = self.stack.sp();
        let free = self.stack.slice(sp - num_free, sp).to_vec();
        self.stack.set_sp(sp - num_free);

        self.stack.push(Object::Closure(Rc::new(Closure { func, free })))
    }

    // =========================================================================
    // Collections
    // =========================================================================

    fn build_hash_map(&mut self, count: usize) -> Result<Object> {
        let sp = self.stack.sp();
        let mut pairs = HashMap::new();

        {
            let window = self.stack.slice(sp - count, sp);
            for chunk in window.chunks(2) {
                let key = &chunk[0];
                let value = &chunk[1];
                let hash_key = key
                    .hash_key()
                    .ok_or(RuntimeError::UnusableHashKey(key.kind()))?;
                pairs.insert(
                    hash_key,
                    HashPair {
                        key: key.clone(),
                        value: value.clone(),
                    },
                );
            }
        }

        self.stack.set_sp(sp - count);
        Ok(Object::hash_map(pairs))
    }

    fn execute_index_expression(&mut self, left: Object, index: Object) -> Result<()> {
        match (&left, &index) {
            (Object::Array(elements), Object::Integer(i)) => {
                let elements = elements.borrow();
                let value = if *i >= 0 && (*i as usize) < elements.len() {
                    elements.get(*i as usize).cloned().unwrap_or(Object::Nil)
                } else {
                    Object::Nil
                };
                self.stack.push(value)
            }
            (Object::HashMap(pairs), _) => {
                let hash_key = index
                    .hash_key()
                    .ok_or(RuntimeError::UnusableHashKey(index.kind()))?;
                let value = pairs
                    .borrow()
                    .get(&hash_key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Object::Nil);
                self.stack.push(value)
            }
            _ => Err(RuntimeError::IndexNotSupported(left.kind())),
        }
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn execute_binary_operation(&mut self, op: Op) -> Result<()> {
        let right = self.stack.pop()?;
        let left = self.stack.pop()?;

        match (&left, &right) {
            (Object::Integer(l), Object::Integer(r)) => {
                self.execute_integer_binary_operation(op, *l, *r)
            }
            (Object::Str(l), Object::Str(r)) => {
                let (l, r) = (Rc::clone(l), Rc::clone(r));
                self.execute_string_binary_operation(op, &l, &r)
            }
            (Object::Boolean(l), Object::Boolean(r)) => {
                self.execute_boolean_binary_operation(op, *l, *r)
            }
            (Object::Integer(_), _) | (Object::Str(_), _) | (Object::Boolean(_), _) => {
                Err(RuntimeError::DisjointedTypes(left.kind(), right.kind()))
            }
            _ => Err(RuntimeError::UnsupportedBinaryTypes(
                left.kind(),
                right.kind(),
            )),
        }
    }

    fn execute_integer_binary_operation(&mut self, op: Op, left: i64, right: i64) -> Result<()> {
        let result = match op {
            Op::Add => Object::Integer(left.wrapping_add(right)),
            Op::Subtract => Object::Integer(left.wrapping_sub(right)),
            Op::Multiply => Object::Integer(left.wrapping_mul(right)),
            Op::Divide => {
                if right == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                Object::Integer(left.wrapping_div(right))
            }
            Op::Modulo => {
                if right == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                Object::Integer(left.wrapping_rem(right))
            }
            Op::LThan => Object::Boolean(left < right),
            Op::GThan => Object::Boolean(left > right),
            Op::Equal => Object::Boolean(left == right),
            Op::NotEqual => Object::Boolean(left != right),
            other => {
                return Err(RuntimeError::UnknownOperator {
                    kind: "integer",
                    code: other as u8,
                });
            }
        };
        self.stack.push(result)
    }

    fn execute_string_binary_operation(&mut self, op: Op, left: &str, right: &str) -> Result<()> {
        let result = match op {
            Op::Add => Object::string(format!("{}{}", left, right)),
            Op::Equal => Object::Boolean(left == right),
            Op::NotEqual => Object::Boolean(left != right),
            other => {
                return Err(RuntimeError::UnknownOperator {
                    kind: "string",
                    code: other as u8,
                });
            }
        };
        self.stack.push(result)
    }

    fn execute_boolean_binary_operation(&mut self, op: Op, left: bool, right: bool) -> Result<()> {
        let result = match op {
            Op::Equal => Object::Boolean(left == right),
            Op::NotEqual => Object::Boolean(left != right),
            other => {
                return Err(RuntimeError::UnknownOperator {
                    kind: "boolean",
                    code: other as u8,
                });
            }
        };
        self.stack.push(result)
    }

    fn execute_unary_operation(&mut self, op: Op) -> Result<()> {
        let right = self.stack.pop()?;

        match right {
            Object::Integer(value) => {
                if op != Op::NegateInt {
                    return Err(RuntimeError::UnknownOperator {
                        kind: "integer",
                        code: op as u8,
                    });
                }
                self.stack.push(Object::Integer(value.wrapping_neg()))
            }
            Object::Boolean(value) => {
                if op != Op::NegateBool {
                    return Err(RuntimeError::UnknownOperator {
                        kind: "boolean",
                        code: op as u8,
                    });
                }
                self.stack.push(Object::Boolean(!value))
            }
            other => Err(RuntimeError::UnsupportedUnaryType(other.kind())),
        }
    }
}
