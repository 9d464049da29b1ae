//! `length`, `copy`, `append` as vector methods. The receiver is always
//! `args[0]`; a bytecode member call pushes it there the same way it
//! pushes any other argument.

use deva_core::DevaError;

use crate::builtins::NativeFn;
use crate::executor::Executor;
use crate::value::Object;

pub const TABLE: &[(&str, NativeFn)] = &[
    ("length", do_length),
    ("copy", do_copy),
    ("append", do_append),
];

fn do_length(ex: &mut Executor, mut args: Vec<Object>) -> deva_core::DevaResult<Object> {
    if args.len() != 1 {
        return Err(DevaError::runtime("vector.length() takes no arguments"));
    }
    let recv = args.pop().unwrap();
    let h = match recv {
        Object::Vector(h) => h,
        other => {
            ex.discard(other);
            return Err(DevaError::runtime("length() called on a non-vector"));
        }
    };
    let n = ex
        .heaps()
        .vector(h)
        .ok_or_else(|| DevaError::ice("vector.length() on a freed vector"))?
        .items
        .len() as f64;
    ex.discard(Object::Vector(h));
    Ok(Object::number(n))
}

fn do_copy(ex: &mut Executor, mut args: Vec<Object>) -> deva_core::DevaResult<Object> {
    if args.len() != 1 {
        return Err(DevaError::runtime("vector.copy() takes no arguments"));
    }
    let recv = args.pop().unwrap();
    let result = ex.shallow_copy(&recv)?;
    ex.discard(recv);
    Ok(result)
}

fn do_append(ex: &mut Executor, mut args: Vec<Object>) -> deva_core::DevaResult<Object> {
    if args.len() != 2 {
        return Err(DevaError::runtime("vector.append() requires one argument"));
    }
    let value = args.pop().unwrap();
    let recv = args.pop().unwrap();
    let h = match recv {
        Object::Vector(h) => h,
        other => {
            ex.discard(other);
            ex.discard(value);
            return Err(DevaError::runtime("append() called on a non-vector"));
        }
    };
    ex.heaps_mut()
        .vector_mut(h)
        .ok_or_else(|| DevaError::ice("vector.append() on a freed vector"))?
        .items
        .push(value);
    ex.discard(Object::Vector(h));
    Ok(Object::Null)
}
