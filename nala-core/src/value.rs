// nala-core - Runtime value model for the Nala programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime values.
//!
//! Values are a tagged union cloned freely by the VM, so every heap-backed
//! variant is behind an `Rc`. Arrays and hash maps additionally sit behind
//! a `RefCell` over a persistent collection: `ins`/`del` mutate in place
//! through the shared handle, while `push`/`copy` take cheap structural
//! clones of the underlying `im` collection.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use im::{HashMap, Vector};
use nala_bytecode::Instructions;

use crate::builtins::Builtin;

/// Shared handle to an array's elements.
pub type ArrayRef = Rc<RefCell<Vector<Object>>>;

/// Shared handle to a hash map's pairs.
pub type HashMapRef = Rc<RefCell<HashMap<HashKey, HashPair>>>;

/// A Nala runtime value.
#[derive(Debug, Clone)]
pub enum Object {
    Integer(i64),
    Boolean(bool),
    Str(Rc<str>),
    Nil,
    Array(ArrayRef),
    HashMap(HashMapRef),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(&'static Builtin),
    /// An error value produced by a built-in. Flows through the stack like
    /// any other value; distinct from a VM execution error.
    Error(String),
}

/// Derived key for hashable values.
///
/// Only integers, booleans and strings are hashable; everything else is
/// rejected when used as a hash map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub kind: &'static str,
    pub value: u64,
}

/// A key/value pair stored in a hash map, keeping the original key value
/// alongside the entry for projection builtins.
#[derive(Debug, Clone)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

/// A compiled function: its bytecode plus the frame layout the VM needs.
#[derive(Debug)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    /// Number of local slots to reserve (parameters included).
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A compiled function bundled with its captured free variables.
#[derive(Debug)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Object>,
}

impl Object {
    /// Build an array value from elements.
    pub fn array(elements: Vector<Object>) -> Object {
        Object::Array(Rc::new(RefCell::new(elements)))
    }

    /// Build a hash map value from pairs.
    pub fn hash_map(pairs: HashMap<HashKey, HashPair>) -> Object {
        Object::HashMap(Rc::new(RefCell::new(pairs)))
    }

    /// Build a string value.
    pub fn string(text: impl AsRef<str>) -> Object {
        Object::Str(Rc::from(text.as_ref()))
    }

    /// The type tag, as surfaced by the `type` builtin and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Object::Integer(_) => "INTEGER",
            Object::Boolean(_) => "BOOLEAN",
            Object::Str(_) => "STRING",
            Object::Nil => "NIL",
            Object::Array(_) => "ARRAY",
            Object::HashMap(_) => "HASHMAP",
            Object::CompiledFunction(_) => "COMPILED_FUNCTION",
            Object::Closure(_) => "CLOSURE",
            Object::Builtin(_) => "BUILTIN",
            Object::Error(_) => "ERROR",
        }
    }

    /// Derive the hash key for a hashable value, `None` otherwise.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Object::Integer(value) => Some(HashKey {
                kind: self.kind(),
                value: *value as u64,
            }),
            Object::Boolean(value) => Some(HashKey {
                kind: self.kind(),
                value: u64::from(*value),
            }),
            Object::Str(text) => {
                let mut hasher = DefaultHasher::new();
                text.hash(&mut hasher);
                Some(HashKey {
                    kind: self.kind(),
                    value: hasher.finish(),
                })
            }
            _ => None,
        }
    }

    /// Truthiness as used by conditional jumps: nil, `false` and integer
    /// zero are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(
            self,
            Object::Nil | Object::Boolean(false) | Object::Integer(0)
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }
}

impl PartialEq for Object {
    /// Structural equality for scalars and collections; identity for
    /// functions and closures.
    fn eq(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::Str(a), Object::Str(b)) => a == b,
            (Object::Nil, Object::Nil) => true,
            (Object::Array(a), Object::Array(b)) => *a.borrow() == *b.borrow(),
            (Object::HashMap(a), Object::HashMap(b)) => *a.borrow() == *b.borrow(),
            (Object::CompiledFunction(a), Object::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Object::Closure(a), Object::Closure(b)) => Rc::ptr_eq(a, b),
            (Object::Builtin(a), Object::Builtin(b)) => std::ptr::eq(*a, *b),
            (Object::Error(a), Object::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for HashPair {
    fn eq(&self, other: &HashPair) -> bool {
        self.key == other.key && self.value == other.value
    }
}

impl fmt::Display for Object {
    /// The inspect form shown by the REPL and print builtins.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(value) => write!(f, "{}", value),
            Object::Boolean(value) => write!(f, "{}", value),
            Object::Str(text) => f.write_str(text),
            Object::Nil => f.write_str("nil"),
            Object::Array(elements) => {
                let rendered: Vec<String> =
                    elements.borrow().iter().map(Object::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Object::HashMap(pairs) => {
                // Sorted by rendered key so the output is stable despite
                // the unordered backing map.
                let mut rendered: Vec<String> = pairs
                    .borrow()
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect();
                rendered.sort();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Object::CompiledFunction(func) => {
                write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(func))
            }
            Object::Closure(closure) => write!(f, "Closure[{:p}]", Rc::as_ptr(closure)),
            Object::Builtin(builtin) => write!(f, "#<builtin {}>", builtin.name),
            Object::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}
