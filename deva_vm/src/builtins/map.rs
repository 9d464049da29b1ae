//! `length`, `copy`, `remove`, `find`, `keys`, `values` as map methods.
//! Classes and instances share this same table since they're maps with
//! a tag.

use deva_core::DevaError;

use crate::builtins::NativeFn;
use crate::container::VectorData;
use crate::executor::Executor;
use crate::value::Object;

pub const TABLE: &[(&str, NativeFn)] = &[
    ("length", do_length),
    ("copy", do_copy),
    ("remove", do_remove),
    ("find", do_find),
    ("keys", do_keys),
    ("values", do_values),
];

fn map_handle(ex: &mut Executor, obj: Object, context: &str) -> deva_core::DevaResult<crate::heap::Handle> {
    match obj {
        Object::Map(h) | Object::Class(h) | Object::Instance(h) => Ok(h),
        other => {
            ex.discard(other);
            Err(DevaError::runtime(format!("{context} called on a non-map")))
        }
    }
}

fn do_length(ex: &mut Executor, mut args: Vec<Object>) -> deva_core::DevaResult<Object> {
    if args.len() != 1 {
        return Err(DevaError::runtime("map.length() takes no arguments"));
    }
    let recv = args.pop().unwrap();
    let h = map_handle(ex, recv, "length()")?;
    let n = ex
        .heaps()
        .map(h)
        .ok_or_else(|| DevaError::ice("map.length() on a freed map"))?
        .entries
        .len() as f64;
    ex.discard(Object::Map(h));
    Ok(Object::number(n))
}

fn do_copy(ex: &mut Executor, mut args: Vec<Object>) -> deva_core::DevaResult<Object> {
    if args.len() != 1 {
        return Err(DevaError::runtime("map.copy() takes no arguments"));
    }
    let recv = args.pop().unwrap();
    let result = ex.shallow_copy(&recv)?;
    ex.discard(recv);
    Ok(result)
}

fn do_remove(ex: &mut Executor, mut args: Vec<Object>) -> deva_core::DevaResult<Object> {
    if args.len() != 2 {
        return Err(DevaError::runtime("map.remove() requires one argument"));
    }
    let key = args.pop().unwrap();
    let recv = args.pop().unwrap();
    let h = map_handle(ex, recv, "remove()")?;
    let removed = ex
        .heaps_mut()
        .map_mut(h)
        .ok_or_else(|| DevaError::ice("map.remove() on a freed map"))?
        .entries
        .remove_entry(&key);
    if let Some((old_key, old_value)) = removed {
        ex.discard(old_key);
        ex.discard(old_value);
    }
    ex.discard(key);
    ex.discard(Object::Map(h));
    Ok(Object::Null)
}

fn do_find(ex: &mut Executor, mut args: Vec<Object>) -> deva_core::DevaResult<Object> {
    if args.len() != 2 {
        return Err(DevaError::runtime("map.find() requires one argument"));
    }
    let key = args.pop().unwrap();
    let recv = args.pop().unwrap();
    let h = map_handle(ex, recv, "find()")?;
    let raw_found: Option<Object> = ex
        .heaps()
        .map(h)
        .ok_or_else(|| DevaError::ice("map.find() on a freed map"))?
        .entries
        .get(&key)
        .cloned();
    let found = raw_found.map(|v| ex.duplicate(&v));
    ex.discard(key);
    ex.discard(Object::Map(h));
    Ok(found.unwrap_or(Object::Null))
}

fn do_keys(ex: &mut Executor, mut args: Vec<Object>) -> deva_core::DevaResult<Object> {
    if args.len() != 1 {
        return Err(DevaError::runtime("map.keys() takes no arguments"));
    }
    let recv = args.pop().unwrap();
    let h = map_handle(ex, recv, "keys()")?;
    let raw_keys: Vec<Object> = ex
        .heaps()
        .map(h)
        .ok_or_else(|| DevaError::ice("map.keys() on a freed map"))?
        .entries
        .keys()
        .cloned()
        .collect();
    let keys: Vec<Object> = raw_keys.iter().map(|k| ex.duplicate(k)).collect();
    ex.discard(Object::Map(h));
    let handle = ex.heaps_mut().alloc_vector(VectorData { items: keys });
    Ok(Object::Vector(handle))
}

fn do_values(ex: &mut Executor, mut args: Vec<Object>) -> deva_core::DevaResult<Object> {
    if args.len() != 1 {
        return Err(DevaError::runtime("map.values() takes no arguments"));
    }
    let recv = args.pop().unwrap();
    let h = map_handle(ex, recv, "values()")?;
    let raw_values: Vec<Object> = ex
        .heaps()
        .map(h)
        .ok_or_else(|| DevaError::ice("map.values() on a freed map"))?
        .entries
        .values()
        .cloned()
        .collect();
    let values: Vec<Object> = raw_values.iter().map(|v| ex.duplicate(v)).collect();
    ex.discard(Object::Map(h));
    let handle = ex.heaps_mut().alloc_vector(VectorData { items: values });
    Ok(Object::Vector(handle))
}
