//! `print`, `str`, `append`, `length`, `copy`, `eval`, `delete` — the
//! built-ins reachable from any scope, not bound to a vector or map.

use deva_core::DevaError;

use crate::builtins::NativeFn;
use crate::executor::Executor;
use crate::value::Object;

pub const TABLE: &[(&str, NativeFn)] = &[
    ("print", do_print),
    ("str", do_str),
    ("append", do_append),
    ("length", do_length),
    ("copy", do_copy),
    ("eval", do_eval),
    ("delete", do_delete),
];

fn do_print(ex: &mut Executor, args: Vec<Object>) -> deva_core::DevaResult<Object> {
    let mut line = String::new();
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(&ex.render_top_level(a));
    }
    ex.discard_all(&args);
    ex.write_output(&line);
    Ok(Object::Null)
}

fn do_str(ex: &mut Executor, args: Vec<Object>) -> deva_core::DevaResult<Object> {
    let obj = args
        .first()
        .ok_or_else(|| DevaError::runtime("str() requires one argument"))?;
    let s = ex.render_top_level(obj);
    ex.discard_all(&args);
    Ok(Object::Str(s))
}

fn do_append(ex: &mut Executor, mut args: Vec<Object>) -> deva_core::DevaResult<Object> {
    if args.len() != 2 {
        return Err(DevaError::runtime("append() requires two arguments"));
    }
    let value = args.pop().unwrap();
    let target = args.pop().unwrap();
    match target {
        Object::Vector(h) => {
            let data = ex
                .heaps_mut()
                .vector_mut(h)
                .ok_or_else(|| DevaError::ice("append() on a freed vector"))?;
            data.items.push(value);
            ex.heaps_mut().release(&Object::Vector(h));
            Ok(Object::Null)
        }
        Object::Str(a) => match value {
            Object::Str(b) => Ok(Object::Str(a + &b)),
            other => {
                ex.discard(other);
                Err(DevaError::runtime("append() on strings requires both operands be strings"))
            }
        },
        other => {
            ex.discard(other);
            ex.discard(value);
            Err(DevaError::runtime("append() requires a vector or two strings"))
        }
    }
}

fn do_length(ex: &mut Executor, args: Vec<Object>) -> deva_core::DevaResult<Object> {
    let obj = args
        .into_iter()
        .next()
        .ok_or_else(|| DevaError::runtime("length() requires one argument"))?;
    let n = match &obj {
        Object::Str(s) => s.len() as f64,
        Object::Vector(h) => ex
            .heaps()
            .vector(*h)
            .ok_or_else(|| DevaError::ice("length() on a freed vector"))?
            .items
            .len() as f64,
        Object::Map(h) | Object::Class(h) | Object::Instance(h) => ex
            .heaps()
            .map(*h)
            .ok_or_else(|| DevaError::ice("length() on a freed map"))?
            .entries
            .len() as f64,
        _ => {
            ex.discard(obj);
            return Err(DevaError::runtime("length() requires a string, vector, or map"));
        }
    };
    ex.discard(obj);
    Ok(Object::number(n))
}

fn do_copy(ex: &mut Executor, args: Vec<Object>) -> deva_core::DevaResult<Object> {
    let obj = args
        .into_iter()
        .next()
        .ok_or_else(|| DevaError::runtime("copy() requires one argument"))?;
    let result = ex.shallow_copy(&obj)?;
    ex.discard(obj);
    Ok(result)
}

fn do_eval(ex: &mut Executor, args: Vec<Object>) -> deva_core::DevaResult<Object> {
    let obj = args
        .into_iter()
        .next()
        .ok_or_else(|| DevaError::runtime("eval() requires one argument"))?;
    let source = match &obj {
        Object::Str(s) => s.clone(),
        _ => {
            ex.discard(obj);
            return Err(DevaError::runtime("eval() requires a string"));
        }
    };
    ex.discard(obj);
    ex.eval_source(&source)
}

fn do_delete(ex: &mut Executor, args: Vec<Object>) -> deva_core::DevaResult<Object> {
    let obj = args
        .into_iter()
        .next()
        .ok_or_else(|| DevaError::runtime("delete() requires one argument"))?;
    let name = match &obj {
        Object::Str(s) => s.clone(),
        Object::Unknown(s) => s.clone(),
        _ => {
            ex.discard(obj);
            return Err(DevaError::runtime("delete() requires a name"));
        }
    };
    ex.delete_binding(&name)?;
    Ok(Object::Null)
}
