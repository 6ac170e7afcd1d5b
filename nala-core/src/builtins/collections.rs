// nala-core - Collection built-in functions
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Collection operations: len, first, last, rest, push, keys, values,
//! items, ins, del, copy.

use im::Vector;

use super::{new_error, wrong_argument_count};
use crate::value::{HashPair, Object};

pub(crate) fn builtin_len(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_argument_count(args.len(), 1);
    }

    match &args[0] {
        Object::Str(text) => Object::Integer(text.len() as i64),
        Object::Array(elements) => Object::Integer(elements.borrow().len() as i64),
        other => new_error(format!(
            "argument to `len` is not supported, got {}",
            other.kind()
        )),
    }
}

pub(crate) fn builtin_first(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_argument_count(args.len(), 1);
    }

    match &args[0] {
        Object::Array(elements) => elements.borrow().front().cloned().unwrap_or(Object::Nil),
        other => new_error(format!(
            "argument to `first` must be ARRAY, got {}",
            other.kind()
        )),
    }
}

pub(crate) fn builtin_last(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_argument_count(args.len(), 1);
    }

    match &args[0] {
        Object::Array(elements) => elements.borrow().back().cloned().unwrap_or(Object::Nil),
        other => new_error(format!(
            "argument to `last` must be ARRAY, got {}",
            other.kind()
        )),
    }
}

pub(crate) fn builtin_rest(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_argument_count(args.len(), 1);
    }

    match &args[0] {
        Object::Array(elements) => {
            let elements = elements.borrow();
            if elements.is_empty() {
                return Object::Nil;
            }
            Object::array(elements.iter().skip(1).cloned().collect())
        }
        other => new_error(format!(
            "argument to `rest` must be ARRAY, got {}",
            other.kind()
        )),
    }
}

pub(crate) fn builtin_push(args: &[Object]) -> Object {
    if args.len() != 2 {
        return wrong_argument_count(args.len(), 2);
    }

    match &args[0] {
        Object::Array(elements) => {
            let mut appended = elements.borrow().clone();
            appended.push_back(args[1].clone());
            Object::array(appended)
        }
        other => new_error(format!(
            "argument to `push` must be ARRAY, got {}",
            other.kind()
        )),
    }
}

pub(crate) fn builtin_keys(args: &[Object]) -> Object {
    hash_map_projection(args, "keys", |pair| pair.key.clone())
}

pub(crate) fn builtin_values(args: &[Object]) -> Object {
    hash_map_projection(args, "values", |pair| pair.value.clone())
}

pub(crate) fn builtin_items(args: &[Object]) -> Object {
    hash_map_projection(args, "items", |pair| {
        Object::array(Vector::from(vec![pair.key.clone(), pair.value.clone()]))
    })
}

fn hash_map_projection(
    args: &[Object],
    name: &str,
    project: impl Fn(&HashPair) -> Object,
) -> Object {
    if args.len() != 1 {
        return wrong_argument_count(args.len(), 1);
    }

    match &args[0] {
        Object::HashMap(pairs) => Object::array(pairs.borrow().values().map(project).collect()),
        other => new_error(format!(
            "argument to `{}` must be HASHMAP, got {}",
            name,
            other.kind()
        )),
    }
}

/// In-place insertion: map entry for hash maps, append-or-replace for
/// arrays.
pub(crate) fn builtin_ins(args: &[Object]) -> Object {
    if args.len() != 3 {
        return wrong_argument_count(args.len(), 3);
    }

    match &args[0] {
        Object::HashMap(pairs) => {
            let key = &args[1];
            let hash_key = match key.hash_key() {
                Some(hash_key) => hash_key,
                None => return new_error(format!("unusable as hash key: {}", key.kind())),
            };
            pairs.borrow_mut().insert(
                hash_key,
                HashPair {
                    key: key.clone(),
                    value: args[2].clone(),
                },
            );
            Object::Nil
        }
        Object::Array(elements) => {
            let index = match array_index(&args[1]) {
                Ok(index) => index,
                Err(error) => return error,
            };
            let mut elements = elements.borrow_mut();
            if index > elements.len() {
                return new_error("Index is greater than indexable length of Array.".to_string());
            }
            if index == elements.len() {
                elements.push_back(args[2].clone());
            } else {
                elements.set(index, args[2].clone());
            }
            Object::Nil
        }
        other => new_error(format!(
            "argument to `ins` must be HASHMAP/ARRAY, got {}",
            other.kind()
        )),
    }
}

/// In-place removal by key or index.
pub(crate) fn builtin_del(args: &[Object]) -> Object {
    if args.len() != 2 {
        return wrong_argument_count(args.len(), 2);
    }

    match &args[0] {
        Object::HashMap(pairs) => {
            let key = &args[1];
            let hash_key = match key.hash_key() {
                Some(hash_key) => hash_key,
                None => return new_error(format!("unusable as hash key: {}", key.kind())),
            };
            if pairs.borrow_mut().remove(&hash_key).is_none() {
                return new_error("key does not exist in HashMap".to_string());
            }
            Object::Nil
        }
        Object::Array(elements) => {
            let index = match array_index(&args[1]) {
                Ok(index) => index,
                Err(error) => return error,
            };
            let mut elements = elements.borrow_mut();
            if index >= elements.len() {
                return new_error("Index is greater than indexable length of Array.".to_string());
            }
            elements.remove(index);
            Object::Nil
        }
        other => new_error(format!(
            "argument to `del` must be HASHMAP/ARRAY, got {}",
            other.kind()
        )),
    }
}

/// Shallow copy of an array or hash map.
pub(crate) fn builtin_copy(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_argument_count(args.len(), 1);
    }

    match &args[0] {
        Object::Array(elements) => Object::array(elements.borrow().clone()),
        Object::HashMap(pairs) => Object::hash_map(pairs.borrow().clone()),
        other => new_error(format!(
            "argument to `copy` is not supported, got {}",
            other.kind()
        )),
    }
}

fn array_index(key: &Object) -> Result<usize, Object> {
    match key {
        Object::Integer(index) if *index >= 0 => Ok(*index as usize),
        Object::Integer(_) => Err(new_error(
            "Index is greater than indexable length of Array.".to_string(),
        )),
        other => Err(new_error(format!(
            "Array key should be INTEGER. got {}",
            other.kind()
        ))),
    }
}
