//! Lexical name resolution. A [`Scope`] never owns storage; it only
//! indexes into a [`Frame`](crate::frame::Frame)'s locals array or the
//! executor's function table, identified by a `(frame_index, slot)` pair
//! rather than a raw pointer, so a scope can outlive or be compared
//! safely without worrying about frame relocation.

use std::collections::HashMap;

use deva_core::FunctionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// A slot in the locals array of the frame at `call_stack[frame_index]`.
    Local { frame_index: usize, slot: usize },
    /// An entry in the executor's function table.
    Function(FunctionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Block,
    Function,
    Module,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub frame_index: usize,
    bindings: HashMap<String, Binding>,
}

impl Scope {
    pub fn new(kind: ScopeKind, frame_index: usize) -> Self {
        Scope {
            kind,
            frame_index,
            bindings: HashMap::new(),
        }
    }

    pub fn is_function(&self) -> bool {
        self.kind == ScopeKind::Function
    }

    pub fn is_module(&self) -> bool {
        self.kind == ScopeKind::Module
    }

    /// Bind `name`; same-scope shadowing is forbidden by the compiler, so
    /// finding an existing binding here indicates a defensive case, not
    /// the normal path — it is simply replaced.
    pub fn add_symbol(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
    }

    pub fn find_local(&self, name: &str) -> Option<Binding> {
        self.bindings.get(name).copied()
    }

    pub fn remove(&mut self, name: &str) -> Option<Binding> {
        self.bindings.remove(name)
    }

    pub fn find_name(&self, target: Binding) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, b)| **b == target)
            .map(|(n, _)| n.as_str())
    }

    pub fn functions(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.bindings.values().filter_map(|b| match b {
            Binding::Function(f) => Some(*f),
            _ => None,
        })
    }

    pub fn local_bindings(&self) -> impl Iterator<Item = (&str, Binding)> + '_ {
        self.bindings.iter().map(|(n, b)| (n.as_str(), *b))
    }
}

/// A stack of lexically-nested [`Scope`]s. Lookup walks outward from the
/// innermost scope.
#[derive(Debug, Clone, Default)]
pub struct ScopeTable {
    scopes: Vec<Scope>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    /// Pop a plain block or function scope.
    pub fn pop(&mut self) -> Option<Scope> {
        self.scopes.pop()
    }

    pub fn current(&self) -> Option<&Scope> {
        self.scopes.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut Scope> {
        self.scopes.last_mut()
    }

    pub fn at(&self, idx: usize) -> Option<&Scope> {
        self.scopes.get(idx)
    }

    pub fn at_mut(&mut self, idx: usize) -> Option<&mut Scope> {
        self.scopes.get_mut(idx)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn find_symbol(&self, name: &str, local_only: bool) -> Option<Binding> {
        if local_only {
            return self.current().and_then(|s| s.find_local(name));
        }
        for scope in self.scopes.iter().rev() {
            if let Some(b) = scope.find_local(name) {
                return Some(b);
            }
        }
        None
    }

    pub fn find_symbol_name(&self, target: Binding) -> Option<&str> {
        for scope in self.scopes.iter().rev() {
            if let Some(n) = scope.find_name(target) {
                return Some(n);
            }
        }
        None
    }

    /// The frame-local slot index of `target` if it names a local in
    /// `frame_index`'s frame, else `None`.
    pub fn find_symbol_index(&self, target: Binding, frame_index: usize) -> Option<usize> {
        match target {
            Binding::Local {
                frame_index: fi,
                slot,
            } if fi == frame_index => Some(slot),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outward_walk_finds_enclosing_binding() {
        let mut table = ScopeTable::new();
        let mut outer = Scope::new(ScopeKind::Function, 0);
        outer.add_symbol(
            "x",
            Binding::Local {
                frame_index: 0,
                slot: 0,
            },
        );
        table.push(outer);
        table.push(Scope::new(ScopeKind::Block, 0));

        assert_eq!(
            table.find_symbol("x", false),
            Some(Binding::Local {
                frame_index: 0,
                slot: 0
            })
        );
        assert_eq!(table.find_symbol("x", true), None, "local_only misses outer scope");
    }

    #[test]
    fn same_scope_rebinding_replaces_not_duplicates() {
        let mut s = Scope::new(ScopeKind::Block, 0);
        s.add_symbol(
            "x",
            Binding::Local {
                frame_index: 0,
                slot: 1,
            },
        );
        s.add_symbol(
            "x",
            Binding::Local {
                frame_index: 0,
                slot: 2,
            },
        );
        assert_eq!(
            s.find_local("x"),
            Some(Binding::Local {
                frame_index: 0,
                slot: 2
            })
        );
    }
}
