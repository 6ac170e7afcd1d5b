// nala-core - Runtime value model and built-in functions for the Nala programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # nala-core
//!
//! The Nala runtime value model: tagged value variants, hash key
//! derivation, and the built-in function table shared by the compiler's
//! symbol table and the virtual machine.

pub mod builtins;
pub mod value;

pub use builtins::{Builtin, BuiltinFn, BUILTINS};
pub use value::{Closure, CompiledFunction, HashKey, HashPair, Object};
