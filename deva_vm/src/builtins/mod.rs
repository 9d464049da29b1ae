//! The three built-in registries: global functions, vector methods, and
//! map methods. All three are flattened into one table at construction
//! time; a [`NativeId`] is just an index into it, so dispatch never has
//! to ask which table a given id came from.

mod global;
mod map;
mod vector;

use deva_core::DevaResult;

use crate::executor::Executor;
use crate::value::{NativeId, Object};

pub type NativeFn = fn(&mut Executor, Vec<Object>) -> DevaResult<Object>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeCategory {
    Global,
    Vector,
    Map,
}

pub struct BuiltinEntry {
    pub name: &'static str,
    pub category: NativeCategory,
    pub func: NativeFn,
}

/// Holds every registered native function, in one flat table, plus a
/// name index per category for resolution.
pub struct Builtins {
    entries: Vec<BuiltinEntry>,
}

impl Builtins {
    pub fn new() -> Self {
        let mut entries = Vec::new();
        for (name, func) in global::TABLE {
            entries.push(BuiltinEntry {
                name,
                category: NativeCategory::Global,
                func: *func,
            });
        }
        for (name, func) in vector::TABLE {
            entries.push(BuiltinEntry {
                name,
                category: NativeCategory::Vector,
                func: *func,
            });
        }
        for (name, func) in map::TABLE {
            entries.push(BuiltinEntry {
                name,
                category: NativeCategory::Map,
                func: *func,
            });
        }
        Builtins { entries }
    }

    fn resolve_in(&self, category: NativeCategory, name: &str) -> Option<NativeId> {
        self.entries
            .iter()
            .position(|e| e.category == category && e.name == name)
            .map(|i| NativeId(i as u32))
    }

    pub fn resolve_global(&self, name: &str) -> Option<NativeId> {
        self.resolve_in(NativeCategory::Global, name)
    }

    pub fn resolve_vector(&self, name: &str) -> Option<NativeId> {
        self.resolve_in(NativeCategory::Vector, name)
    }

    pub fn resolve_map(&self, name: &str) -> Option<NativeId> {
        self.resolve_in(NativeCategory::Map, name)
    }

    /// Name resolution order for a bare call: global, then vector
    /// methods, then map methods. Used when a callee couldn't be
    /// resolved through the scope chain or the function table.
    pub fn resolve_any(&self, name: &str) -> Option<NativeId> {
        self.resolve_global(name)
            .or_else(|| self.resolve_vector(name))
            .or_else(|| self.resolve_map(name))
    }

    pub fn name_of(&self, id: NativeId) -> &str {
        self.entries[id.0 as usize].name
    }

    pub fn call(&self, id: NativeId, ex: &mut Executor, args: Vec<Object>) -> DevaResult<Object> {
        let func = self.entries[id.0 as usize].func;
        func(ex, args)
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}
