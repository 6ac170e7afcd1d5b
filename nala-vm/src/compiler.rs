// nala-vm - Bytecode compiler for the Nala programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! AST to bytecode compilation.
//!
//! A recursive walker over the parsed program. Each function literal gets
//! its own compilation scope (instruction buffer plus the records of the
//! last two emitted instructions, for peephole decisions) and an enclosed
//! symbol table. Forward jumps are emitted with a placeholder operand and
//! backpatched once the target offset is known.

use std::fmt;
use std::rc::Rc;

use nala_bytecode::{make, Instructions, Op};
use nala_core::{CompiledFunction, Object, BUILTINS};
use nala_parser::ast::{BlockStatement, Expression, Program, Statement};

use crate::symbol_table::{Symbol, SymbolScope, SymbolTable};

/// Error during compilation. The first error aborts the compile; emission
/// is append-only and is not rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Identifier that resolves in no enclosing scope.
    UndefinedVariable(String),
    /// Operator with no opcode for the expression form it appears in.
    UnknownOperator(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UndefinedVariable(name) => write!(f, "undefined variable {}", name),
            CompileError::UnknownOperator(operator) => write!(f, "unknown operator {}", operator),
        }
    }
}

impl std::error::Error for CompileError {}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

/// The compiler's output: instructions plus the constant pool.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Object>,
}

/// Record of an emitted instruction, for peephole decisions.
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Op,
    position: usize,
}

/// Per-function emission state.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

/// The bytecode compiler.
pub struct Compiler {
    constants: Vec<Object>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
    scope_index: usize,
}

impl Compiler {
    /// Fresh compiler state with the builtins predeclared at their table
    /// indices.
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbol_table.define_builtin(index, builtin.name);
        }

        Compiler {
            constants: Vec::new(),
            symbol_table,
            scopes: vec![CompilationScope::default()],
            scope_index: 0,
        }
    }

    /// Compiler state carried over from a previous compile, for
    /// incremental (REPL) use.
    pub fn new_with_state(symbol_table: SymbolTable, constants: Vec<Object>) -> Self {
        Compiler {
            constants,
            symbol_table,
            ..Compiler::new()
        }
    }

    /// Hand back the symbol table and constant pool for the next
    /// incremental compile.
    pub fn into_state(self) -> (SymbolTable, Vec<Object>) {
        (self.symbol_table, self.constants)
    }

    /// The compiled output so far.
    pub fn byte_code(&self) -> Bytecode {
        Bytecode {
            instructions: self.scope().instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    /// Compile a whole program.
    pub fn compile(&mut self, program: &Program) -> Result<()> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Expression { expression, .. } => {
                self.compile_expression(expression)?;
                self.emit(Op::Pop, &[]);
            }
            Statement::Let { name, value, .. } => {
                // Defining before compiling the value lets a function
                // literal on the right-hand side see its own name for
                // recursion.
                let symbol = self.symbol_table.define(&name.value);
                self.compile_expression(value)?;
                match symbol.scope {
                    SymbolScope::Global => {
                        self.emit(Op::SetGlobal, &[symbol.index]);
                    }
                    _ => {
                        self.emit(Op::SetLocal, &[symbol.index]);
                    }
                }
            }
            Statement::Return { value, .. } => {
                self.compile_expression(value)?;
                self.emit(Op::ReturnValue, &[]);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> Result<()> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression) -> Result<()> {
        match expression {
            Expression::IntegerLiteral { value, .. } => {
                let index = self.add_constant(Object::Integer(*value));
                self.emit(Op::Constant, &[index]);
            }
            Expression::StringLiteral { value, .. } => {
                let index = self.add_constant(Object::string(value));
                self.emit(Op::Constant, &[index]);
            }
            Expression::BooleanLiteral { value, .. } => {
                self.emit(if *value { Op::True } else { Op::False }, &[]);
            }
            Expression::Prefix {
                operator, right, ..
            } => {
                self.compile_expression(right)?;
                match operator.as_str() {
                    "-" => self.emit(Op::NegateInt, &[]),
                    "!" => self.emit(Op::NegateBool, &[]),
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
            }
            Expression::Infix {
                operator,
                left,
                right,
                ..
            } => {
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                let op = match operator.as_str() {
                    "+" => Op::Add,
                    "-" => Op::Subtract,
                    "*" => Op::Multiply,
                    "/" => Op::Divide,
                    "%" => Op::Modulo,
                    ">" => Op::GThan,
                    "<" => Op::LThan,
                    "==" => Op::Equal,
                    "!=" => Op::NotEqual,
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
                self.emit(op, &[]);
            }
            Expression::Identifier(identifier) => {
                let symbol = self
                    .symbol_table
                    .resolve(&identifier.value)
                    .ok_or_else(|| CompileError::UndefinedVariable(identifier.value.clone()))?;
                self.load_symbol(&symbol);
            }
            Expression::If {
                condition,
                consequence,
                alternative,
                ..
            } => self.compile_if(condition, consequence, alternative.as_ref())?,
            Expression::ArrayLiteral { elements, .. } => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Op::Array, &[elements.len()]);
            }
            Expression::HashLiteral { pairs, .. } => {
                // Sort by rendered key so the emitted bytecode is
                // reproducible regardless of source pair order.
                let mut sorted: Vec<&(Expression, Expression)> = pairs.iter().collect();
                sorted.sort_by_cached_key(|(key, _)| key.to_string());

                for (key, value) in sorted {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Op::HashMap, &[pairs.len() * 2]);
            }
            Expression::Index { left, index, .. } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Op::Index, &[]);
            }
            Expression::FunctionLiteral {
                parameters, body, ..
            } => self.compile_function_literal(parameters, body)?,
            Expression::Call {
                function,
                arguments,
                ..
            } => {
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Op::Call, &[arguments.len()]);
            }
        }
        Ok(())
    }

    fn compile_if(
        &mut self,
        condition: &Expression,
        consequence: &BlockStatement,
        alternative: Option<&BlockStatement>,
    ) -> Result<()> {
        self.compile_expression(condition)?;

        // Placeholder target, patched once the consequence is compiled.
        let jump_not_truthy_pos = self.emit(Op::JumpNotTruthy, &[9999]);

        self.compile_block(consequence)?;
        // The branch yields its final expression value.
        if self.last_instruction_is(Op::Pop) {
            self.remove_last_pop();
        }

        let jump_pos = self.emit(Op::Jump, &[9999]);

        let after_consequence = self.scope().instructions.len();
        self.change_operand(jump_not_truthy_pos, after_consequence);

        match alternative {
            None => {
                self.emit(Op::Nil, &[]);
            }
            Some(alternative) => {
                self.compile_block(alternative)?;
                if self.last_instruction_is(Op::Pop) {
                    self.remove_last_pop();
                }
            }
        }

        let after_alternative = self.scope().instructions.len();
        self.change_operand(jump_pos, after_alternative);
        Ok(())
    }

    fn compile_function_literal(
        &mut self,
        parameters: &[nala_parser::ast::Identifier],
        body: &BlockStatement,
    ) -> Result<()> {
        self.enter_scope();

        for parameter in parameters {
            self.symbol_table.define(&parameter.value);
        }

        self.compile_block(body)?;

        // A trailing Pop means the body ended in an expression statement:
        // rewrite it in place to an implicit return. A body with neither
        // gets a nil-returning Return.
        if self.last_instruction_is(Op::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Op::ReturnValue) {
            self.emit(Op::Return, &[]);
        }

        let free_symbols = self.symbol_table.free_symbols.clone();
        let num_locals = self.symbol_table.num_definitions;
        let instructions = self.leave_scope();

        // Load each captured symbol in the enclosing scope, then wrap the
        // function constant and the captures into a closure.
        for symbol in &free_symbols {
            self.load_symbol(symbol);
        }

        let function = Object::CompiledFunction(Rc::new(CompiledFunction {
            instructions,
            num_locals,
            num_parameters: parameters.len(),
        }));
        let index = self.add_constant(function);
        self.emit(Op::Closure, &[index, free_symbols.len()]);
        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Op::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Op::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Op::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Op::GetFree, &[symbol.index]),
        };
    }

    // =========================================================================
    // Constant pool
    // =========================================================================

    /// Add a constant, deduplicating against existing entries: by hash key
    /// when both sides are hashable, by rendered form otherwise.
    fn add_constant(&mut self, object: Object) -> usize {
        if let Some(index) = self.find_constant(&object) {
            return index;
        }
        self.constants.push(object);
        self.constants.len() - 1
    }

    fn find_constant(&self, object: &Object) -> Option<usize> {
        let key = object.hash_key();
        self.constants.iter().position(|existing| {
            match (key, existing.hash_key()) {
                (Some(key), Some(existing_key)) => key == existing_key,
                _ => existing.to_string() == object.to_string(),
            }
        })
    }

    // =========================================================================
    // Emission and peephole helpers
    // =========================================================================

    fn emit(&mut self, op: Op, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let position = self.scope_mut().instructions.push_instruction(&instruction);
        self.set_last_instruction(op, position);
        position
    }

    fn set_last_instruction(&mut self, opcode: Op, position: usize) {
        let scope = self.scope_mut();
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { opcode, position });
    }

    fn last_instruction_is(&self, op: Op) -> bool {
        self.scope()
            .last_instruction
            .is_some_and(|last| last.opcode == op)
    }

    /// Truncate the buffer to drop the last instruction (a Pop), restoring
    /// the previous-instruction record.
    fn remove_last_pop(&mut self) {
        let scope = self.scope_mut();
        if let Some(last) = scope.last_instruction {
            scope.instructions.truncate(last.position);
            scope.last_instruction = scope.previous_instruction.take();
        }
    }

    /// Overwrite the trailing Pop byte in place with ReturnValue.
    fn replace_last_pop_with_return(&mut self) {
        if let Some(last) = self.scope().last_instruction {
            let position = last.position;
            let instruction = make(Op::ReturnValue, &[]);
            self.scope_mut()
                .instructions
                .replace_instruction(position, &instruction);
            self.scope_mut().last_instruction = Some(EmittedInstruction {
                opcode: Op::ReturnValue,
                position,
            });
        }
    }

    /// Re-encode the instruction at `position` with a new operand. Used to
    /// backpatch jump targets.
    fn change_operand(&mut self, position: usize, operand: usize) {
        let byte = self.scope().instructions.as_bytes()[position];
        if let Ok(op) = Op::try_from(byte) {
            let instruction = make(op, &[operand]);
            self.scope_mut()
                .instructions
                .replace_instruction(position, &instruction);
        } else {
            debug_assert!(false, "change_operand on undefined opcode {byte}");
        }
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    fn scope(&self) -> &CompilationScope {
        &self.scopes[self.scope_index]
    }

    fn scope_mut(&mut self) -> &mut CompilationScope {
        &mut self.scopes[self.scope_index]
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.scope_index += 1;

        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::new_enclosed(outer);
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().unwrap_or_default();
        self.scope_index -= 1;

        let table = std::mem::take(&mut self.symbol_table);
        self.symbol_table = table.into_outer().unwrap_or_default();

        scope.instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}
